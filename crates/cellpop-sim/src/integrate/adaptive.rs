use cellpop_core::errors::CellPopError;
use cellpop_core::DynamicalSystem;
use tracing::{info, instrument};

use super::validate_time_range;
use crate::solver::OdeSolver;
use crate::trajectory::Trajectory;

/// Hands the system to a black-box solver as an autonomous right-hand side.
///
/// The time argument is ignored; every evaluation caches the evaluated state
/// on the system. On success the system is left at the final grid state; when
/// the solver fails the initial state is restored.
#[instrument(level = "debug", skip_all, fields(points = time_range.len(), method = %method))]
pub fn simulate_adaptive<S, O>(
    system: &mut S,
    time_range: &[f64],
    solver: &O,
    method: &str,
) -> Result<Trajectory, CellPopError>
where
    S: DynamicalSystem + ?Sized,
    O: OdeSolver + ?Sized,
{
    validate_time_range(time_range)?;
    let initial = system.state().to_owned();
    let (n_cells, n_nodes, dim) = initial.dim();
    info!(n_cells, n_nodes, dim, method, "adaptive integration started");

    let solved = solver.solve(
        &mut |_t, state| system.get_derivatives(state),
        initial.view(),
        time_range,
        method,
    );
    let states = match solved {
        Ok(states) => states,
        Err(err) => {
            system.set_state(initial)?;
            return Err(err);
        }
    };
    let trajectory = Trajectory::new(time_range.to_vec(), states)?;
    if let Some(last) = trajectory.final_state() {
        system.set_state(last.to_owned())?;
    }

    info!("adaptive integration finished");
    Ok(trajectory)
}
