#![deny(missing_docs)]

//! Cell populations driven by message passing over a typed interaction
//! graph, and the integrators that turn them into trajectories.
//!
//! A [`CellPopulation`] owns the per-cell state of every node and delegates
//! production and decay to a [`RateModel`]. Any [`DynamicalSystem`] can be
//! advanced with [`simulate_euler`], [`simulate_adaptive`] or
//! [`simulate_tau_leaping`]; [`run_simulation`] wires a YAML
//! [`SimulationConfig`] to the right one.
//!
//! [`DynamicalSystem`]: cellpop_core::DynamicalSystem

mod aggregate;
mod config;
pub mod integrate;
mod models;
mod population;
mod rate_model;
mod run;
pub mod solver;
mod trajectory;

pub use aggregate::{broadcast_param, exponential_decay, SimpleConv};
pub use config::{
    IntegratorConfig, ModelKind, PopulationConfig, SeedPolicy, SimulationConfig, TimeGridConfig,
};
pub use integrate::{simulate_adaptive, simulate_euler, simulate_tau_leaping, validate_time_range};
pub use models::{ProteinRnaRateModel, TestRateModel};
pub use population::CellPopulation;
pub use rate_model::{
    ConstantPrior, FnRateModel, FnRateModelBuilder, RateModel, StatePrior,
    DEFAULT_INITIAL_CONCENTRATION,
};
pub use run::{build_population, run_simulation, RunSummary};
pub use solver::{DormandPrince, OdeSolver};
pub use trajectory::Trajectory;
