#![deny(missing_docs)]
#![doc = "Core contracts for cell population simulation: the shared error taxonomy, deterministic randomness, provenance descriptors and the dynamical-system interface consumed by integrators."]

use ndarray::{Array3, ArrayView3};

pub mod errors;
pub mod provenance;
pub mod rng;

pub use errors::{CellPopError, ErrorInfo};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, RngHandle, JUMP_SUBSTREAM, PARAMETER_SUBSTREAM};

/// Dense per-cell state of shape `(n_cells, n_nodes, per_node_state_dim)`.
pub type StateArray = Array3<f64>;

/// Describes an object that integrators can advance through time.
///
/// The state always has shape `(n_cells, n_nodes, per_node_state_dim)`.
/// Implementations own the state; integrators only replace it through
/// [`DynamicalSystem::set_state`] and read rates through the getters.
pub trait DynamicalSystem {
    /// Returns a read-only view of the current state.
    fn state(&self) -> ArrayView3<'_, f64>;

    /// Replaces the current state. Fails if the shape differs from the current one.
    fn set_state(&mut self, state: StateArray) -> Result<(), CellPopError>;

    /// Caches `state` as the current state and returns `production - decay` at it.
    fn get_derivatives(&mut self, state: ArrayView3<'_, f64>) -> Result<StateArray, CellPopError>;

    /// Recomputes and returns the production rates at the current state.
    fn get_production_rates(&mut self) -> Result<StateArray, CellPopError>;

    /// Recomputes and returns the decay rates at the current state.
    fn get_decay_rates(&mut self) -> Result<StateArray, CellPopError>;
}
