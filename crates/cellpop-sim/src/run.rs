use std::fs;
use std::path::Path;

use cellpop_core::errors::{CellPopError, ErrorInfo};
use cellpop_core::provenance::RunProvenance;
use cellpop_core::rng::RngHandle;
use cellpop_graph::load_interaction_data;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::config::{IntegratorConfig, ModelKind, SimulationConfig};
use crate::integrate::{simulate_adaptive, simulate_euler, simulate_tau_leaping};
use crate::models::{ProteinRnaRateModel, TestRateModel};
use crate::population::CellPopulation;
use crate::rate_model::{ConstantPrior, RateModel};
use crate::solver::DormandPrince;
use crate::trajectory::Trajectory;

/// Result of [`run_simulation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Recorded states.
    pub trajectory: Trajectory,
    /// Where the trajectory came from.
    pub provenance: RunProvenance,
}

impl RunSummary {
    /// Writes the summary as pretty JSON, creating parent directories.
    pub fn write_json(&self, path: &Path) -> Result<(), CellPopError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                CellPopError::Serde(
                    ErrorInfo::new("summary-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            CellPopError::Serde(ErrorInfo::new("summary-serialize", err.to_string()))
        })?;
        fs::write(path, json).map_err(|err| {
            CellPopError::Serde(
                ErrorInfo::new("summary-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}

/// Builds the population described by `config`, drawing parameters from `rng`.
pub fn build_population(
    config: &SimulationConfig,
    rng: &mut RngHandle,
) -> Result<CellPopulation<Box<dyn RateModel>>, CellPopError> {
    config.validate()?;
    let data = load_interaction_data(&config.population.dataset)?;
    let model: Box<dyn RateModel> = match config.population.model {
        ModelKind::Test => Box::new(TestRateModel),
        ModelKind::ProteinRna => Box::new(ProteinRnaRateModel::default()),
    };
    CellPopulation::new(&data, model, config.population.n_cells, rng)?
        .with_prior(ConstantPrior(config.initial_concentration))
}

/// Integrates `population` over the configured grid with the configured
/// strategy and attaches provenance to the trajectory.
pub fn run_simulation<M: RateModel>(
    population: &mut CellPopulation<M>,
    config: &SimulationConfig,
) -> Result<RunSummary, CellPopError> {
    config.validate()?;
    let grid = config.time.grid();
    let seed = config.seed_policy.master_seed;
    info!(
        integrator = %config.integrator.label(),
        points = grid.len(),
        seed,
        "running simulation"
    );

    let trajectory = match &config.integrator {
        IntegratorConfig::Euler => simulate_euler(population, &grid)?,
        IntegratorConfig::Adaptive {
            method,
            rtol,
            atol,
            max_steps,
        } => {
            let solver = DormandPrince {
                rtol: *rtol,
                atol: *atol,
                max_steps: *max_steps,
            };
            simulate_adaptive(population, &grid, &solver, method)?
        }
        IntegratorConfig::TauLeaping => {
            let mut rng = RngHandle::for_jumps(seed);
            simulate_tau_leaping(population, &grid, &mut rng)?
        }
    };

    let provenance = RunProvenance::new(
        config_hash(config)?,
        population.graph_hash().unwrap_or_default(),
        seed,
        config.integrator.label(),
    )
    .with_tool(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    Ok(RunSummary {
        trajectory,
        provenance,
    })
}

fn config_hash(config: &SimulationConfig) -> Result<String, CellPopError> {
    let json = serde_json::to_vec(config).map_err(|err| {
        CellPopError::Serde(ErrorInfo::new("serialize-config", err.to_string()))
    })?;
    Ok(format!("{:x}", Sha256::digest(&json)))
}
