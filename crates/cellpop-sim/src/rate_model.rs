use cellpop_core::errors::{CellPopError, ErrorInfo};
use cellpop_core::rng::RngHandle;
use cellpop_graph::{SetRegistry, StateArrays};
use ndarray::Array3;

/// Concentration the default prior assigns to every state entry.
pub const DEFAULT_INITIAL_CONCENTRATION: f64 = 10.0;

/// Production/decay strategy supplied by a concrete population variant.
///
/// Both compute hooks must update `arrays` in place: production into
/// `arrays.production_rates`, decay into `arrays.decay_rates`. Production is
/// accumulated across edge types, so implementations zero it first
/// (see [`SetRegistry::set_production_rates_to_zero`]).
pub trait RateModel {
    /// Number of tracked quantities per node.
    fn per_node_state_dim(&self) -> usize {
        1
    }

    /// Registers the parameters the model reads (decay coefficients, edge
    /// weights, ...) on the freshly built sets.
    fn initialize_parameters(
        &self,
        _sets: &mut SetRegistry,
        _rng: &mut RngHandle,
    ) -> Result<(), CellPopError> {
        Ok(())
    }

    /// Writes production rates for the current state into `arrays`.
    fn compute_production_rates(
        &self,
        sets: &SetRegistry,
        arrays: &mut StateArrays,
    ) -> Result<(), CellPopError>;

    /// Writes decay rates for the current state into `arrays`.
    fn compute_decay_rates(
        &self,
        sets: &SetRegistry,
        arrays: &mut StateArrays,
    ) -> Result<(), CellPopError>;
}

impl<M: RateModel + ?Sized> RateModel for Box<M> {
    fn per_node_state_dim(&self) -> usize {
        (**self).per_node_state_dim()
    }

    fn initialize_parameters(
        &self,
        sets: &mut SetRegistry,
        rng: &mut RngHandle,
    ) -> Result<(), CellPopError> {
        (**self).initialize_parameters(sets, rng)
    }

    fn compute_production_rates(
        &self,
        sets: &SetRegistry,
        arrays: &mut StateArrays,
    ) -> Result<(), CellPopError> {
        (**self).compute_production_rates(sets, arrays)
    }

    fn compute_decay_rates(
        &self,
        sets: &SetRegistry,
        arrays: &mut StateArrays,
    ) -> Result<(), CellPopError> {
        (**self).compute_decay_rates(sets, arrays)
    }
}

/// Samples the initial state of a population.
pub trait StatePrior {
    /// Returns a state of shape `(n_cells, n_nodes, per_node_state_dim)`.
    fn sample(&self, shape: (usize, usize, usize)) -> Array3<f64>;
}

/// Prior that fills every entry with the same concentration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantPrior(pub f64);

impl Default for ConstantPrior {
    fn default() -> Self {
        Self(DEFAULT_INITIAL_CONCENTRATION)
    }
}

impl StatePrior for ConstantPrior {
    fn sample(&self, shape: (usize, usize, usize)) -> Array3<f64> {
        Array3::from_elem(shape, self.0)
    }
}

impl<F> StatePrior for F
where
    F: Fn((usize, usize, usize)) -> Array3<f64>,
{
    fn sample(&self, shape: (usize, usize, usize)) -> Array3<f64> {
        self(shape)
    }
}

type RateFn = Box<dyn Fn(&SetRegistry, &mut StateArrays) -> Result<(), CellPopError>>;
type ParamFn = Box<dyn Fn(&mut SetRegistry, &mut RngHandle) -> Result<(), CellPopError>>;

/// Rate model composed from plain closures instead of a dedicated type.
pub struct FnRateModel {
    per_node_state_dim: usize,
    initialize: Option<ParamFn>,
    production: RateFn,
    decay: RateFn,
}

impl std::fmt::Debug for FnRateModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnRateModel")
            .field("per_node_state_dim", &self.per_node_state_dim)
            .finish_non_exhaustive()
    }
}

impl FnRateModel {
    /// Starts composing a closure-backed model.
    pub fn builder() -> FnRateModelBuilder {
        FnRateModelBuilder::default()
    }
}

impl RateModel for FnRateModel {
    fn per_node_state_dim(&self) -> usize {
        self.per_node_state_dim
    }

    fn initialize_parameters(
        &self,
        sets: &mut SetRegistry,
        rng: &mut RngHandle,
    ) -> Result<(), CellPopError> {
        match &self.initialize {
            Some(initialize) => initialize(sets, rng),
            None => Ok(()),
        }
    }

    fn compute_production_rates(
        &self,
        sets: &SetRegistry,
        arrays: &mut StateArrays,
    ) -> Result<(), CellPopError> {
        (self.production)(sets, arrays)
    }

    fn compute_decay_rates(
        &self,
        sets: &SetRegistry,
        arrays: &mut StateArrays,
    ) -> Result<(), CellPopError> {
        (self.decay)(sets, arrays)
    }
}

/// Builder for [`FnRateModel`]; both rate closures are mandatory.
#[derive(Default)]
pub struct FnRateModelBuilder {
    per_node_state_dim: Option<usize>,
    initialize: Option<ParamFn>,
    production: Option<RateFn>,
    decay: Option<RateFn>,
}

impl FnRateModelBuilder {
    /// Sets the number of tracked quantities per node (default 1).
    pub fn per_node_state_dim(mut self, dim: usize) -> Self {
        self.per_node_state_dim = Some(dim);
        self
    }

    /// Sets the parameter initialization closure.
    pub fn initialize<F>(mut self, initialize: F) -> Self
    where
        F: Fn(&mut SetRegistry, &mut RngHandle) -> Result<(), CellPopError> + 'static,
    {
        self.initialize = Some(Box::new(initialize));
        self
    }

    /// Sets the production closure.
    pub fn production<F>(mut self, production: F) -> Self
    where
        F: Fn(&SetRegistry, &mut StateArrays) -> Result<(), CellPopError> + 'static,
    {
        self.production = Some(Box::new(production));
        self
    }

    /// Sets the decay closure.
    pub fn decay<F>(mut self, decay: F) -> Self
    where
        F: Fn(&SetRegistry, &mut StateArrays) -> Result<(), CellPopError> + 'static,
    {
        self.decay = Some(Box::new(decay));
        self
    }

    /// Finishes the model, failing when either rate closure is missing.
    pub fn build(self) -> Result<FnRateModel, CellPopError> {
        let production = self.production.ok_or_else(|| {
            CellPopError::Strategy(
                ErrorInfo::new("missing-production", "no production rate strategy supplied")
                    .with_hint("call FnRateModelBuilder::production"),
            )
        })?;
        let decay = self.decay.ok_or_else(|| {
            CellPopError::Strategy(
                ErrorInfo::new("missing-decay", "no decay rate strategy supplied")
                    .with_hint("call FnRateModelBuilder::decay"),
            )
        })?;
        let per_node_state_dim = self.per_node_state_dim.unwrap_or(1);
        if per_node_state_dim == 0 {
            return Err(CellPopError::Shape(ErrorInfo::new(
                "state-dim",
                "per-node state dimension must be positive",
            )));
        }
        Ok(FnRateModel {
            per_node_state_dim,
            initialize: self.initialize,
            production,
            decay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_strategies_are_reported() {
        let err = FnRateModel::builder()
            .decay(|_, _| Ok(()))
            .build()
            .unwrap_err();
        assert!(matches!(err, CellPopError::Strategy(_)));
        assert_eq!(err.info().code, "missing-production");

        let err = FnRateModel::builder()
            .production(|_, _| Ok(()))
            .build()
            .unwrap_err();
        assert_eq!(err.info().code, "missing-decay");
    }

    #[test]
    fn constant_prior_fills_shape() {
        let state = ConstantPrior::default().sample((2, 3, 1));
        assert_eq!(state.dim(), (2, 3, 1));
        assert!(state.iter().all(|value| *value == DEFAULT_INITIAL_CONCENTRATION));
    }
}
