use cellpop_core::errors::CellPopError;
use cellpop_core::DynamicalSystem;
use ndarray::Zip;
use rand::Rng;
use rand_distr::{Distribution, Poisson};
use tracing::{debug, info, instrument};

use super::validate_time_range;
use crate::trajectory::Trajectory;

/// Poisson draw that treats non-positive or non-finite rates as "no event".
pub fn poisson_draw<R: Rng + ?Sized>(rate: f64, rng: &mut R) -> f64 {
    if !(rate.is_finite() && rate > 0.0) {
        return 0.0;
    }
    match Poisson::new(rate) {
        Ok(poisson) => poisson.sample(rng),
        Err(_) => 0.0,
    }
}

/// Tau-leaping: every entry jumps by `Poisson(tau * production) -
/// Poisson(tau * decay)` per grid interval and is clamped at zero.
#[instrument(level = "debug", skip_all, fields(points = time_range.len()))]
pub fn simulate_tau_leaping<S, R>(
    system: &mut S,
    time_range: &[f64],
    rng: &mut R,
) -> Result<Trajectory, CellPopError>
where
    S: DynamicalSystem + ?Sized,
    R: Rng + ?Sized,
{
    validate_time_range(time_range)?;
    let mut trajectory = Trajectory::starting_at(time_range, system.state());
    let (n_cells, n_nodes, dim) = system.state().dim();
    info!(n_cells, n_nodes, dim, steps = time_range.len() - 1, "tau-leaping started");

    let mut total_clamped = 0usize;
    for (step, window) in time_range.windows(2).enumerate() {
        let tau = window[1] - window[0];
        let production = system.get_production_rates()?;
        let decay = system.get_decay_rates()?;
        let mut next = system.state().to_owned();
        let mut clamped = 0usize;
        Zip::from(&mut next)
            .and(&production)
            .and(&decay)
            .for_each(|value, &produced, &decayed| {
                let jump = poisson_draw(tau * produced, rng) - poisson_draw(tau * decayed, rng);
                let updated = *value + jump;
                if updated < 0.0 {
                    clamped += 1;
                    *value = 0.0;
                } else {
                    *value = updated;
                }
            });
        if clamped > 0 {
            debug!(step, clamped, "clamped negative entries to zero");
        }
        total_clamped += clamped;
        system.set_state(next)?;
        trajectory.record(step + 1, system.state());
    }

    info!(clamped = total_clamped, "tau-leaping finished");
    Ok(trajectory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellpop_core::rng::RngHandle;

    #[test]
    fn degenerate_rates_draw_nothing() {
        let mut rng = RngHandle::from_seed(3);
        for rate in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert_eq!(poisson_draw(rate, &mut rng), 0.0);
        }
    }

    #[test]
    fn draws_are_non_negative_integers() {
        let mut rng = RngHandle::from_seed(4);
        for _ in 0..100 {
            let draw = poisson_draw(3.5, &mut rng);
            assert!(draw >= 0.0);
            assert_eq!(draw.fract(), 0.0);
        }
    }
}
