//! Schema versions of serialized graphs and provenance of simulation runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version of the serialized interaction-graph layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Bumped when a reader can no longer load older payloads.
    pub major: u32,
    /// Bumped when fields are added.
    pub minor: u32,
    /// Bumped for fixes that leave the layout unchanged.
    pub patch: u32,
}

impl SchemaVersion {
    /// Layout written by this version of the crates.
    pub const CURRENT: SchemaVersion = SchemaVersion::new(1, 0, 0);

    /// Creates a new schema version descriptor.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Whether a reader at `self` can load a payload written at `payload`.
    ///
    /// Majors must match and the payload may not be from a newer minor.
    pub fn reads(&self, payload: SchemaVersion) -> bool {
        self.major == payload.major && payload.minor <= self.minor
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

/// Where a trajectory came from: enough to rerun it bit for bit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RunProvenance {
    /// SHA-256 of the run configuration.
    pub input_hash: String,
    /// Canonical hash of the interaction graph the population was built from.
    pub graph_hash: String,
    /// Master seed every random substream was derived from.
    pub seed: u64,
    /// Integrator label, e.g. `euler` or `adaptive:dopri5`.
    pub integrator: String,
    /// Crate name to version for every crate involved in the run.
    pub tool_versions: BTreeMap<String, String>,
}

impl RunProvenance {
    /// Provenance with an empty tool map.
    pub fn new(
        input_hash: impl Into<String>,
        graph_hash: impl Into<String>,
        seed: u64,
        integrator: impl Into<String>,
    ) -> Self {
        Self {
            input_hash: input_hash.into(),
            graph_hash: graph_hash.into(),
            seed,
            integrator: integrator.into(),
            tool_versions: BTreeMap::new(),
        }
    }

    /// Records the version of one crate involved in the run.
    pub fn with_tool(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.tool_versions.insert(name.into(), version.into());
        self
    }
}
