//! Strategies that advance a [`DynamicalSystem`](cellpop_core::DynamicalSystem)
//! over a time grid and record every grid point.
//!
//! All strategies validate the grid first, record the current state as the
//! first entry and only replace the system's state once a step has fully
//! succeeded. An error aborts the run and leaves the system at its last
//! committed state.

mod adaptive;
mod euler;
mod tau_leap;

pub use adaptive::simulate_adaptive;
pub use euler::simulate_euler;
pub use tau_leap::{poisson_draw, simulate_tau_leaping};

use cellpop_core::errors::{CellPopError, ErrorInfo};

/// Checks that `time_range` is non-empty, finite and strictly increasing.
pub fn validate_time_range(time_range: &[f64]) -> Result<(), CellPopError> {
    if time_range.is_empty() {
        return Err(CellPopError::Integration(ErrorInfo::new(
            "empty-time-grid",
            "time grid needs at least one point",
        )));
    }
    if let Some(position) = time_range.iter().position(|t| !t.is_finite()) {
        return Err(CellPopError::Integration(
            ErrorInfo::new("non-finite-time", "time grid contains a non-finite value")
                .with_context("position", position.to_string()),
        ));
    }
    if let Some(position) = time_range.windows(2).position(|pair| pair[1] <= pair[0]) {
        return Err(CellPopError::Integration(
            ErrorInfo::new("non-increasing-time", "time grid must be strictly increasing")
                .with_context("position", (position + 1).to_string())
                .with_context("previous", time_range[position].to_string())
                .with_context("value", time_range[position + 1].to_string()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_single_point() {
        assert!(validate_time_range(&[0.0]).is_ok());
    }

    #[test]
    fn rejects_bad_grids() {
        let codes: Vec<String> = [&[][..], &[0.0, f64::NAN][..], &[0.0, 1.0, 1.0][..]]
            .iter()
            .map(|grid| validate_time_range(grid).unwrap_err().info().code.clone())
            .collect();
        assert_eq!(
            codes,
            ["empty-time-grid", "non-finite-time", "non-increasing-time"]
        );
    }
}
