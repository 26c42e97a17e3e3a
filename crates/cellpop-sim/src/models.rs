use cellpop_core::errors::{CellPopError, ErrorInfo};
use cellpop_core::rng::RngHandle;
use cellpop_graph::{ElementSet, EdgeSet, Field, NodeSet, SetRegistry, StateArrays};
use ndarray::{s, Array3};
use rand_distr::Normal;

use crate::aggregate::{broadcast_param, exponential_decay, SimpleConv};
use crate::rate_model::RateModel;

fn normal(mean: f64, std_dev: f64) -> Result<Normal<f64>, CellPopError> {
    Normal::new(mean, std_dev).map_err(|err| {
        CellPopError::Config(
            ErrorInfo::new("invalid-prior", err.to_string())
                .with_context("mean", mean.to_string())
                .with_context("std_dev", std_dev.to_string()),
        )
    })
}

/// Runs the edge set's weighted convolution over `x`, producing one row per
/// node of `tgt`.
fn convolve(
    edge_set: &EdgeSet,
    tgt: &NodeSet,
    x: ndarray::ArrayView3<'_, f64>,
) -> Result<Array3<f64>, CellPopError> {
    let weights = edge_set.attribute("weights")?;
    SimpleConv::new(tgt.len()).forward(x, edge_set.edges().reversed_axes(), weights)
}

/// Linear production along every edge type plus first-order decay, with one
/// tracked quantity per node.
///
/// Parameters: `alpha ~ Normal(5, 0.01)` of shape `(1, n, 1)` on every node
/// set and `weights ~ Normal(0, 1)` of shape `(1, n_edges, 1)` on every edge
/// set.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestRateModel;

impl RateModel for TestRateModel {
    fn initialize_parameters(
        &self,
        sets: &mut SetRegistry,
        rng: &mut RngHandle,
    ) -> Result<(), CellPopError> {
        for (_, set) in sets.node_sets_mut() {
            set.init_param("alpha", &normal(5.0, 0.01)?, None, rng);
        }
        for (_, set) in sets.edge_sets_mut() {
            set.init_param("weights", &normal(0.0, 1.0)?, None, rng);
        }
        Ok(())
    }

    fn compute_production_rates(
        &self,
        sets: &SetRegistry,
        arrays: &mut StateArrays,
    ) -> Result<(), CellPopError> {
        sets.set_production_rates_to_zero(arrays);
        for (edge_type, edge_set) in sets.edge_sets() {
            let src = sets.node_set(&edge_type.src)?;
            let tgt = sets.node_set(&edge_type.dst)?;
            let contribution = convolve(edge_set, tgt, src.state(arrays))
                .map_err(|err| err.with_context("edge_type", edge_type))?;
            let mut production = tgt.view_mut(arrays, Field::ProductionRate);
            production += &contribution;
        }
        Ok(())
    }

    fn compute_decay_rates(
        &self,
        sets: &SetRegistry,
        arrays: &mut StateArrays,
    ) -> Result<(), CellPopError> {
        for (node_type, set) in sets.node_sets() {
            let decay = exponential_decay(set.state(arrays), set.attribute("alpha")?)
                .map_err(|err| err.with_context("node_type", node_type))?;
            set.set_decay_rate(arrays, decay.view())?;
        }
        Ok(())
    }
}

/// Two tracked quantities per node: channel 0 is RNA, channel 1 protein.
///
/// Edges between two nodes of the transcribed type (`"gene"` by default) are
/// driven by the source protein and feed the target's RNA production. Every
/// other edge type convolves all channels. Each transcribed node then
/// produces protein at `translation_rate * rna`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProteinRnaRateModel {
    transcribed_type: String,
}

impl Default for ProteinRnaRateModel {
    fn default() -> Self {
        Self::new("gene")
    }
}

impl ProteinRnaRateModel {
    /// Creates the model with `transcribed_type` as the node type carrying
    /// transcription and translation.
    pub fn new(transcribed_type: impl Into<String>) -> Self {
        Self {
            transcribed_type: transcribed_type.into(),
        }
    }

    /// Node type whose RNA is translated into protein.
    pub fn transcribed_type(&self) -> &str {
        &self.transcribed_type
    }

    fn is_transcriptional(&self, src: &str, dst: &str) -> bool {
        src == self.transcribed_type && dst == self.transcribed_type
    }
}

impl RateModel for ProteinRnaRateModel {
    fn per_node_state_dim(&self) -> usize {
        2
    }

    fn initialize_parameters(
        &self,
        sets: &mut SetRegistry,
        rng: &mut RngHandle,
    ) -> Result<(), CellPopError> {
        for (node_type, set) in sets.node_sets_mut() {
            let len = set.len();
            if node_type == self.transcribed_type {
                set.init_param("alpha", &normal(5.0, 1.0)?, Some(&[1, len, 2][..]), rng);
                set.init_param("translation_rate", &normal(5.0, 1.0)?, None, rng);
            } else {
                set.init_param("alpha", &normal(5.0, 0.01)?, Some(&[1, len, 2][..]), rng);
            }
        }
        for (_, set) in sets.edge_sets_mut() {
            set.init_param("weights", &normal(0.0, 1.0)?, None, rng);
        }
        Ok(())
    }

    fn compute_production_rates(
        &self,
        sets: &SetRegistry,
        arrays: &mut StateArrays,
    ) -> Result<(), CellPopError> {
        sets.set_production_rates_to_zero(arrays);
        for (edge_type, edge_set) in sets.edge_sets() {
            let src = sets.node_set(&edge_type.src)?;
            let tgt = sets.node_set(&edge_type.dst)?;
            if self.is_transcriptional(&edge_type.src, &edge_type.dst) {
                let protein = src.state(arrays).slice_move(s![.., .., 1..2]);
                let contribution = convolve(edge_set, tgt, protein)
                    .map_err(|err| err.with_context("edge_type", edge_type))?;
                let mut rna_production = tgt
                    .view_mut(arrays, Field::ProductionRate)
                    .slice_move(s![.., .., 0..1]);
                rna_production += &contribution;
            } else {
                let contribution = convolve(edge_set, tgt, src.state(arrays))
                    .map_err(|err| err.with_context("edge_type", edge_type))?;
                let mut production = tgt.view_mut(arrays, Field::ProductionRate);
                production += &contribution;
            }
        }

        let transcribed = sets.node_set(&self.transcribed_type)?;
        let rna = transcribed.state(arrays).slice_move(s![.., .., 0..1]);
        let translation_rate = broadcast_param(
            "translation_rate",
            transcribed.attribute("translation_rate")?,
            rna.dim(),
        )?;
        let translation = &translation_rate * &rna;
        let mut protein_production = transcribed
            .view_mut(arrays, Field::ProductionRate)
            .slice_move(s![.., .., 1..2]);
        protein_production += &translation;
        Ok(())
    }

    fn compute_decay_rates(
        &self,
        sets: &SetRegistry,
        arrays: &mut StateArrays,
    ) -> Result<(), CellPopError> {
        TestRateModel.compute_decay_rates(sets, arrays)
    }
}
