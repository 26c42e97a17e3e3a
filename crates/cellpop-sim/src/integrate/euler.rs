use cellpop_core::errors::CellPopError;
use cellpop_core::DynamicalSystem;
use tracing::{info, instrument};

use super::validate_time_range;
use crate::trajectory::Trajectory;

/// Fixed-step explicit Euler: `state += tau * derivatives(state)` for every
/// grid interval.
#[instrument(level = "debug", skip_all, fields(points = time_range.len()))]
pub fn simulate_euler<S>(system: &mut S, time_range: &[f64]) -> Result<Trajectory, CellPopError>
where
    S: DynamicalSystem + ?Sized,
{
    validate_time_range(time_range)?;
    let mut trajectory = Trajectory::starting_at(time_range, system.state());
    let (n_cells, n_nodes, dim) = system.state().dim();
    info!(n_cells, n_nodes, dim, steps = time_range.len() - 1, "euler started");

    for (step, window) in time_range.windows(2).enumerate() {
        let tau = window[1] - window[0];
        let mut next = system.state().to_owned();
        let derivatives = system.get_derivatives(next.view())?;
        next.scaled_add(tau, &derivatives);
        system.set_state(next)?;
        trajectory.record(step + 1, system.state());
    }

    info!("euler finished");
    Ok(trajectory)
}
