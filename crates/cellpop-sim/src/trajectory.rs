use std::io::Write;

use cellpop_core::errors::{CellPopError, ErrorInfo};
use cellpop_graph::NodeSet;
use ndarray::{s, Array4, ArrayView3, ArrayView4, Axis};
use serde::{Deserialize, Serialize};

/// Recorded states of a population over a time grid.
///
/// `states` has shape `(n_time_points, n_cells, n_nodes, per_node_state_dim)`;
/// entry `i` along the first axis is the state at `times[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    times: Vec<f64>,
    states: Array4<f64>,
}

#[derive(Serialize)]
struct TrajectoryRow {
    time: f64,
    cell: usize,
    node: usize,
    channel: usize,
    value: f64,
}

impl Trajectory {
    /// Pairs recorded states with their time points.
    pub fn new(times: Vec<f64>, states: Array4<f64>) -> Result<Self, CellPopError> {
        if states.len_of(Axis(0)) != times.len() {
            return Err(CellPopError::Integration(
                ErrorInfo::new("trajectory-length", "one recorded state per time point is required")
                    .with_context("times", times.len().to_string())
                    .with_context("states", states.len_of(Axis(0)).to_string()),
            ));
        }
        Ok(Self { times, states })
    }

    /// Allocates a trajectory whose first entry is `initial`.
    pub(crate) fn starting_at(times: &[f64], initial: ArrayView3<'_, f64>) -> Self {
        let (n_cells, n_nodes, dim) = initial.dim();
        let mut states = Array4::zeros((times.len(), n_cells, n_nodes, dim));
        states.index_axis_mut(Axis(0), 0).assign(&initial);
        Self {
            times: times.to_vec(),
            states,
        }
    }

    /// Stores `state` as the entry for time point `index`.
    pub(crate) fn record(&mut self, index: usize, state: ArrayView3<'_, f64>) {
        self.states.index_axis_mut(Axis(0), index).assign(&state);
    }

    /// Time points.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// All recorded states.
    pub fn states(&self) -> ArrayView4<'_, f64> {
        self.states.view()
    }

    /// Consumes the trajectory, returning the raw state array.
    pub fn into_states(self) -> Array4<f64> {
        self.states
    }

    /// Number of time points.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Returns whether no time point was recorded.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// State at time point `index`.
    pub fn at(&self, index: usize) -> Option<ArrayView3<'_, f64>> {
        (index < self.len()).then(|| self.states.index_axis(Axis(0), index))
    }

    /// Last recorded state.
    pub fn final_state(&self) -> Option<ArrayView3<'_, f64>> {
        self.len().checked_sub(1).and_then(|last| self.at(last))
    }

    /// Sub-trajectory restricted to the nodes of `set`.
    pub fn node_type_slice(&self, set: &NodeSet) -> Result<ArrayView4<'_, f64>, CellPopError> {
        let n_nodes = self.states.len_of(Axis(2));
        if set.idx_high() >= n_nodes {
            return Err(CellPopError::Shape(
                ErrorInfo::new("node-range", "node set lies outside the recorded nodes")
                    .with_context("idx_high", set.idx_high().to_string())
                    .with_context("n_nodes", n_nodes.to_string()),
            ));
        }
        Ok(self.states.slice(s![.., .., set.range(), ..]))
    }

    /// Writes long-form `time,cell,node,channel,value` rows.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), CellPopError> {
        let mut csv = csv::Writer::from_writer(writer);
        for ((step, cell, node, channel), value) in self.states.indexed_iter() {
            csv.serialize(TrajectoryRow {
                time: self.times[step],
                cell,
                node,
                channel,
                value: *value,
            })
            .map_err(|err| CellPopError::Serde(ErrorInfo::new("trajectory-csv", err.to_string())))?;
        }
        csv.flush()
            .map_err(|err| CellPopError::Serde(ErrorInfo::new("trajectory-csv", err.to_string())))
    }

    /// Serializes the trajectory to JSON.
    pub fn to_json(&self) -> Result<String, CellPopError> {
        serde_json::to_string(self)
            .map_err(|err| CellPopError::Serde(ErrorInfo::new("serialize-json", err.to_string())))
    }

    /// Restores a trajectory from JSON, rechecking the time/state pairing.
    pub fn from_json(json: &str) -> Result<Self, CellPopError> {
        let raw: Trajectory = serde_json::from_str(json).map_err(|err| {
            CellPopError::Serde(ErrorInfo::new("deserialize-json", err.to_string()))
        })?;
        Self::new(raw.times, raw.states)
    }
}
