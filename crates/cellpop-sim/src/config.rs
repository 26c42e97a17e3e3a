use std::fs;
use std::path::Path;

use cellpop_core::errors::{CellPopError, ErrorInfo};
use cellpop_graph::BUILTIN_DATASETS;
use serde::{Deserialize, Serialize};

use crate::rate_model::DEFAULT_INITIAL_CONCENTRATION;
use crate::solver::{DormandPrince, SOLVER_METHODS};

/// YAML-configurable parameters of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Graph, batch size and rate model.
    #[serde(default)]
    pub population: PopulationConfig,
    /// Time grid the trajectory is recorded on.
    #[serde(default)]
    pub time: TimeGridConfig,
    /// Integration strategy.
    #[serde(default)]
    pub integrator: IntegratorConfig,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Concentration the default prior assigns to every state entry.
    #[serde(default = "default_initial_concentration")]
    pub initial_concentration: f64,
}

fn default_initial_concentration() -> f64 {
    DEFAULT_INITIAL_CONCENTRATION
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            population: PopulationConfig::default(),
            time: TimeGridConfig::default(),
            integrator: IntegratorConfig::default(),
            seed_policy: SeedPolicy::default(),
            initial_concentration: default_initial_concentration(),
        }
    }
}

impl SimulationConfig {
    /// Parses and validates a YAML document.
    pub fn from_yaml_str(contents: &str) -> Result<Self, CellPopError> {
        let config: Self = serde_yaml::from_str(contents).map_err(|err| {
            CellPopError::Config(ErrorInfo::new("yaml-parse", err.to_string()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CellPopError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| {
            CellPopError::Config(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&contents).map_err(|err| err.with_context("path", path.display()))
    }

    /// Serializes the configuration back to YAML.
    pub fn to_yaml_string(&self) -> Result<String, CellPopError> {
        serde_yaml::to_string(self)
            .map_err(|err| CellPopError::Serde(ErrorInfo::new("yaml-serialize", err.to_string())))
    }

    /// Checks cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), CellPopError> {
        if !BUILTIN_DATASETS.contains(&self.population.dataset.as_str()) {
            return Err(invalid("population.dataset", "unknown built-in dataset")
                .with_context("dataset", &self.population.dataset));
        }
        if self.population.n_cells == 0 {
            return Err(invalid("population.n_cells", "must be at least 1"));
        }
        self.time.validate()?;
        if let IntegratorConfig::Adaptive {
            method,
            rtol,
            atol,
            max_steps,
        } = &self.integrator
        {
            if !SOLVER_METHODS.contains(&method.as_str()) {
                return Err(invalid("integrator.method", "unknown solver method")
                    .with_context("method", method));
            }
            if !(*rtol > 0.0 && *atol > 0.0) {
                return Err(invalid("integrator.tolerance", "rtol and atol must be positive"));
            }
            if *max_steps == 0 {
                return Err(invalid("integrator.max_steps", "must be at least 1"));
            }
        }
        if !(self.initial_concentration.is_finite() && self.initial_concentration >= 0.0) {
            return Err(invalid(
                "initial_concentration",
                "must be a finite, non-negative concentration",
            ));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> CellPopError {
    CellPopError::Config(ErrorInfo::new("invalid-config", message).with_context("field", field))
}

/// Which population variant to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    /// One tracked quantity per node.
    #[default]
    Test,
    /// RNA and protein per node.
    ProteinRna,
}

/// Population settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Name of the built-in interaction graph.
    #[serde(default = "default_dataset")]
    pub dataset: String,
    /// Number of cells simulated side by side.
    #[serde(default = "default_n_cells")]
    pub n_cells: usize,
    /// Population variant.
    #[serde(default)]
    pub model: ModelKind,
}

fn default_dataset() -> String {
    "test".to_string()
}

fn default_n_cells() -> usize {
    1
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            dataset: default_dataset(),
            n_cells: default_n_cells(),
            model: ModelKind::default(),
        }
    }
}

/// Linearly spaced time grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeGridConfig {
    /// First time point.
    #[serde(default)]
    pub start: f64,
    /// Last time point.
    #[serde(default = "default_end")]
    pub end: f64,
    /// Number of time points, both ends included.
    #[serde(default = "default_points")]
    pub points: usize,
}

fn default_end() -> f64 {
    1.0
}

fn default_points() -> usize {
    100
}

impl Default for TimeGridConfig {
    fn default() -> Self {
        Self {
            start: 0.0,
            end: default_end(),
            points: default_points(),
        }
    }
}

impl TimeGridConfig {
    /// Checks that the grid has at least two points over a positive span.
    pub fn validate(&self) -> Result<(), CellPopError> {
        if self.points < 2 {
            return Err(invalid("time.points", "must be at least 2"));
        }
        if !(self.start.is_finite() && self.end.is_finite() && self.end > self.start) {
            return Err(invalid("time", "end must be finite and greater than start")
                .with_context("start", self.start)
                .with_context("end", self.end));
        }
        Ok(())
    }

    /// Materializes the grid; the last point equals `end` exactly.
    pub fn grid(&self) -> Vec<f64> {
        let intervals = self.points.saturating_sub(1).max(1) as f64;
        let step = (self.end - self.start) / intervals;
        let mut grid: Vec<f64> = (0..self.points)
            .map(|i| self.start + step * i as f64)
            .collect();
        if let Some(last) = grid.last_mut() {
            if self.points > 1 {
                *last = self.end;
            }
        }
        grid
    }
}

fn default_method() -> String {
    "dopri5".to_string()
}

fn default_rtol() -> f64 {
    DormandPrince::default().rtol
}

fn default_atol() -> f64 {
    DormandPrince::default().atol
}

fn default_max_steps() -> usize {
    DormandPrince::default().max_steps
}

/// Integration strategy and its knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum IntegratorConfig {
    /// Fixed-step explicit Euler on the grid.
    #[default]
    Euler,
    /// Black-box solver, see [`DormandPrince`].
    Adaptive {
        /// Solver method name.
        #[serde(default = "default_method")]
        method: String,
        /// Relative tolerance.
        #[serde(default = "default_rtol")]
        rtol: f64,
        /// Absolute tolerance.
        #[serde(default = "default_atol")]
        atol: f64,
        /// Step budget over the whole grid.
        #[serde(default = "default_max_steps")]
        max_steps: usize,
    },
    /// Poisson jumps per grid interval.
    TauLeaping,
}

impl IntegratorConfig {
    /// Label recorded in run provenance.
    pub fn label(&self) -> String {
        match self {
            IntegratorConfig::Euler => "euler".to_string(),
            IntegratorConfig::Adaptive { method, .. } => format!("adaptive:{method}"),
            IntegratorConfig::TauLeaping => "tau-leaping".to_string(),
        }
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed used for the run.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional free-form label kept with the run.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x0CE1_1505_EED5_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}
