//! Numerical ODE solvers used by the adaptive integrator.

use cellpop_core::errors::{CellPopError, ErrorInfo};
use cellpop_core::StateArray;
use ndarray::{Array4, ArrayView3, Axis, Zip};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Right-hand side `f(t, y)` handed to a solver.
pub type DerivativeFn<'a> =
    dyn FnMut(f64, ArrayView3<'_, f64>) -> Result<StateArray, CellPopError> + 'a;

/// Black-box ODE solver.
pub trait OdeSolver {
    /// Integrates `derivative_fn` from `initial_state` over `time_grid` and
    /// returns the states at every grid point, shape
    /// `(time_grid.len(), ..initial_state.shape())`.
    fn solve(
        &self,
        derivative_fn: &mut DerivativeFn<'_>,
        initial_state: ArrayView3<'_, f64>,
        time_grid: &[f64],
        method: &str,
    ) -> Result<Array4<f64>, CellPopError>;
}

/// Methods understood by [`DormandPrince`].
pub const SOLVER_METHODS: &[&str] = &["dopri5", "rk4"];

// Dormand-Prince 5(4) tableau.
const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// Difference between the 5th and embedded 4th order weights.
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;

fn default_rtol() -> f64 {
    1e-7
}

fn default_atol() -> f64 {
    1e-9
}

fn default_max_steps() -> usize {
    100_000
}

/// Explicit Runge-Kutta solver: adaptive Dormand-Prince (`"dopri5"`) or
/// classic fixed-step RK4 (`"rk4"`, one step per grid interval).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DormandPrince {
    /// Relative error tolerance per step.
    #[serde(default = "default_rtol")]
    pub rtol: f64,
    /// Absolute error tolerance per step.
    #[serde(default = "default_atol")]
    pub atol: f64,
    /// Upper bound on attempted steps over the whole grid.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

impl Default for DormandPrince {
    fn default() -> Self {
        Self {
            rtol: default_rtol(),
            atol: default_atol(),
            max_steps: default_max_steps(),
        }
    }
}

impl OdeSolver for DormandPrince {
    fn solve(
        &self,
        derivative_fn: &mut DerivativeFn<'_>,
        initial_state: ArrayView3<'_, f64>,
        time_grid: &[f64],
        method: &str,
    ) -> Result<Array4<f64>, CellPopError> {
        if time_grid.is_empty() {
            return Err(CellPopError::Integration(ErrorInfo::new(
                "empty-time-grid",
                "time grid needs at least one point",
            )));
        }
        match method {
            "dopri5" => self.dopri5(derivative_fn, initial_state, time_grid),
            "rk4" => self.rk4(derivative_fn, initial_state, time_grid),
            other => Err(CellPopError::Integration(
                ErrorInfo::new("unknown-method", "solver method is not supported")
                    .with_context("method", other)
                    .with_hint(format!("available: {}", SOLVER_METHODS.join(", "))),
            )),
        }
    }
}

impl DormandPrince {
    fn dopri5(
        &self,
        f: &mut DerivativeFn<'_>,
        initial_state: ArrayView3<'_, f64>,
        time_grid: &[f64],
    ) -> Result<Array4<f64>, CellPopError> {
        let mut out = allocate(initial_state, time_grid.len());
        let mut t = time_grid[0];
        let mut y = initial_state.to_owned();
        let mut k1 = f(t, y.view())?;
        let span = time_grid[time_grid.len() - 1] - t;
        let mut h = initial_step(span, time_grid.len());
        let mut steps = 0usize;
        let mut rejected = 0usize;

        for (index, &target) in time_grid.iter().enumerate().skip(1) {
            while t < target {
                if steps >= self.max_steps {
                    return Err(self.max_steps_error(t));
                }
                steps += 1;
                let lands_on_target = h >= target - t;
                let h_step = if lands_on_target { target - t } else { h };

                let k2 = f(t + C2 * h_step, combine(&y, h_step, &[(A21, &k1)]).view())?;
                let k3 = f(
                    t + C3 * h_step,
                    combine(&y, h_step, &[(A31, &k1), (A32, &k2)]).view(),
                )?;
                let k4 = f(
                    t + C4 * h_step,
                    combine(&y, h_step, &[(A41, &k1), (A42, &k2), (A43, &k3)]).view(),
                )?;
                let k5 = f(
                    t + C5 * h_step,
                    combine(
                        &y,
                        h_step,
                        &[(A51, &k1), (A52, &k2), (A53, &k3), (A54, &k4)],
                    )
                    .view(),
                )?;
                let k6 = f(
                    t + h_step,
                    combine(
                        &y,
                        h_step,
                        &[(A61, &k1), (A62, &k2), (A63, &k3), (A64, &k4), (A65, &k5)],
                    )
                    .view(),
                )?;
                let y_next = combine(
                    &y,
                    h_step,
                    &[(B1, &k1), (B3, &k3), (B4, &k4), (B5, &k5), (B6, &k6)],
                );
                let k7 = f(t + h_step, y_next.view())?;

                let mut error = StateArray::zeros(y.raw_dim());
                for (weight, k) in [(E1, &k1), (E3, &k3), (E4, &k4), (E5, &k5), (E6, &k6), (E7, &k7)]
                {
                    error.scaled_add(h_step * weight, k);
                }
                let error_norm = self.error_norm(&error, &y, &y_next);
                if !error_norm.is_finite() {
                    return Err(CellPopError::Integration(
                        ErrorInfo::new("non-finite-error", "step error estimate is not finite")
                            .with_context("t", t.to_string()),
                    ));
                }

                let factor = if error_norm == 0.0 {
                    MAX_FACTOR
                } else {
                    (SAFETY * error_norm.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
                };
                if error_norm <= 1.0 {
                    t = if lands_on_target { target } else { t + h_step };
                    y = y_next;
                    k1 = k7;
                } else {
                    rejected += 1;
                }
                h = h_step * factor;
                if h <= f64::EPSILON * t.abs().max(1.0) {
                    return Err(CellPopError::Integration(
                        ErrorInfo::new("step-underflow", "step size collapsed below resolution")
                            .with_context("t", t.to_string()),
                    ));
                }
            }
            out.index_axis_mut(Axis(0), index).assign(&y);
        }
        debug!(steps, rejected, "dopri5 finished");
        Ok(out)
    }

    fn rk4(
        &self,
        f: &mut DerivativeFn<'_>,
        initial_state: ArrayView3<'_, f64>,
        time_grid: &[f64],
    ) -> Result<Array4<f64>, CellPopError> {
        let mut out = allocate(initial_state, time_grid.len());
        let mut y = initial_state.to_owned();
        for (index, window) in time_grid.windows(2).enumerate() {
            if index >= self.max_steps {
                return Err(self.max_steps_error(window[0]));
            }
            let (t, h) = (window[0], window[1] - window[0]);
            let k1 = f(t, y.view())?;
            let k2 = f(t + 0.5 * h, combine(&y, h, &[(0.5, &k1)]).view())?;
            let k3 = f(t + 0.5 * h, combine(&y, h, &[(0.5, &k2)]).view())?;
            let k4 = f(t + h, combine(&y, h, &[(1.0, &k3)]).view())?;
            y = combine(
                &y,
                h,
                &[(1.0 / 6.0, &k1), (1.0 / 3.0, &k2), (1.0 / 3.0, &k3), (1.0 / 6.0, &k4)],
            );
            out.index_axis_mut(Axis(0), index + 1).assign(&y);
        }
        Ok(out)
    }

    fn error_norm(&self, error: &StateArray, y: &StateArray, y_next: &StateArray) -> f64 {
        if error.is_empty() {
            return 0.0;
        }
        let mut sum = 0.0;
        Zip::from(error).and(y).and(y_next).for_each(|e, a, b| {
            let scale = self.atol + self.rtol * a.abs().max(b.abs());
            sum += (e / scale).powi(2);
        });
        (sum / error.len() as f64).sqrt()
    }

    fn max_steps_error(&self, t: f64) -> CellPopError {
        CellPopError::Integration(
            ErrorInfo::new("max-steps", "solver exceeded its step budget")
                .with_context("max_steps", self.max_steps.to_string())
                .with_context("t", t.to_string()),
        )
    }
}

fn allocate(initial_state: ArrayView3<'_, f64>, points: usize) -> Array4<f64> {
    let (n_cells, n_nodes, dim) = initial_state.dim();
    let mut out = Array4::zeros((points, n_cells, n_nodes, dim));
    out.index_axis_mut(Axis(0), 0).assign(&initial_state);
    out
}

fn initial_step(span: f64, points: usize) -> f64 {
    let intervals = points.saturating_sub(1).max(1) as f64;
    (span / intervals).abs().max(f64::EPSILON) * 0.1
}

/// `y + h * sum(weight * k)`.
fn combine(y: &StateArray, h: f64, terms: &[(f64, &StateArray)]) -> StateArray {
    let mut out = y.clone();
    for (weight, k) in terms {
        out.scaled_add(h * weight, *k);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn decay(rate: f64) -> impl FnMut(f64, ArrayView3<'_, f64>) -> Result<StateArray, CellPopError> {
        move |_t, y| Ok(y.mapv(|v| -rate * v))
    }

    #[test]
    fn dopri5_matches_exponential_decay() {
        let y0 = Array3::from_elem((1, 1, 1), 10.0);
        let grid: Vec<f64> = (0..=10).map(|i| i as f64 * 0.1).collect();
        let mut f = decay(2.0);
        let states = DormandPrince::default()
            .solve(&mut f, y0.view(), &grid, "dopri5")
            .unwrap();
        for (i, t) in grid.iter().enumerate() {
            let expected = 10.0 * (-2.0 * t).exp();
            assert!((states[[i, 0, 0, 0]] - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn rk4_is_accurate_on_fine_grid() {
        let y0 = Array3::from_elem((1, 1, 1), 1.0);
        let grid: Vec<f64> = (0..=100).map(|i| i as f64 * 0.01).collect();
        let mut f = decay(1.0);
        let states = DormandPrince::default()
            .solve(&mut f, y0.view(), &grid, "rk4")
            .unwrap();
        assert!((states[[100, 0, 0, 0]] - (-1.0f64).exp()).abs() < 1e-8);
    }

    #[test]
    fn unknown_method_is_rejected() {
        let y0 = Array3::from_elem((1, 1, 1), 1.0);
        let mut f = decay(1.0);
        let err = DormandPrince::default()
            .solve(&mut f, y0.view(), &[0.0, 1.0], "bosh3")
            .unwrap_err();
        assert!(matches!(err, CellPopError::Integration(_)));
        assert_eq!(err.info().code, "unknown-method");
    }

    #[test]
    fn step_budget_is_enforced() {
        let y0 = Array3::from_elem((1, 1, 1), 1.0);
        let mut f = decay(50.0);
        let solver = DormandPrince {
            max_steps: 3,
            ..DormandPrince::default()
        };
        let err = solver.solve(&mut f, y0.view(), &[0.0, 10.0], "dopri5").unwrap_err();
        assert_eq!(err.info().code, "max-steps");
    }
}
