use cellpop_core::StateArray;
use ndarray::Array3;

/// One of the three per-cell arrays owned by a population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Tracked concentrations.
    State,
    /// Production rates accumulated from edge contributions.
    ProductionRate,
    /// Decay rates computed per node type.
    DecayRate,
}

impl Field {
    /// Short label used in diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::State => "state",
            Field::ProductionRate => "production_rate",
            Field::DecayRate => "decay_rate",
        }
    }
}

/// Backing storage of shape `(n_cells, n_nodes, per_node_state_dim)` for
/// state, production rates and decay rates.
///
/// Node sets never own any of this; they hold an index range and read or
/// write the matching slice through accessors that take these arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct StateArrays {
    /// Current state.
    pub state: StateArray,
    /// Production rates at the current state.
    pub production_rates: StateArray,
    /// Decay rates at the current state.
    pub decay_rates: StateArray,
}

impl StateArrays {
    /// Allocates zeroed arrays of the given shape.
    pub fn zeros(n_cells: usize, n_nodes: usize, per_node_state_dim: usize) -> Self {
        let shape = (n_cells, n_nodes, per_node_state_dim);
        Self {
            state: Array3::zeros(shape),
            production_rates: Array3::zeros(shape),
            decay_rates: Array3::zeros(shape),
        }
    }

    /// Shape shared by the three arrays.
    pub fn dim(&self) -> (usize, usize, usize) {
        self.state.dim()
    }

    /// Returns the array backing `field`.
    pub fn get(&self, field: Field) -> &StateArray {
        match field {
            Field::State => &self.state,
            Field::ProductionRate => &self.production_rates,
            Field::DecayRate => &self.decay_rates,
        }
    }

    /// Returns the mutable array backing `field`.
    pub fn get_mut(&mut self, field: Field) -> &mut StateArray {
        match field {
            Field::State => &mut self.state,
            Field::ProductionRate => &mut self.production_rates,
            Field::DecayRate => &mut self.decay_rates,
        }
    }
}
