#![allow(dead_code)]

use std::cell::Cell;

use cellpop_core::errors::{CellPopError, ErrorInfo};
use cellpop_core::rng::RngHandle;
use cellpop_graph::{EdgeTable, EdgeType, InteractionData, NodeTable};
use cellpop_sim::{CellPopulation, FnRateModel, RateModel};
use ndarray::Array2;

/// Node table covering the inclusive global id range `[low, high]`.
pub fn node_range(low: usize, high: usize) -> NodeTable {
    NodeTable::new((low..=high).collect())
}

/// Edge table from global `(tail, head)` pairs.
pub fn edge_pairs(pairs: &[(usize, usize)]) -> EdgeTable {
    EdgeTable::new(Array2::from_shape_fn((pairs.len(), 2), |(row, col)| {
        if col == 0 {
            pairs[row].0
        } else {
            pairs[row].1
        }
    }))
}

/// One node type `x` with `n` nodes and no edges.
pub fn isolated_nodes(n: usize) -> InteractionData {
    InteractionData::new().with_node_type("x", node_range(0, n - 1))
}

/// Two genes joined by a single regulatory edge `0 -> 1`.
pub fn gene_pair() -> InteractionData {
    InteractionData::new()
        .with_node_type("gene", node_range(0, 1))
        .with_edge_type(("gene", "regulates", "gene"), edge_pairs(&[(0, 1)]))
}

pub fn regulates() -> EdgeType {
    EdgeType::new("gene", "regulates", "gene")
}

/// Production fixed at `production` everywhere, no decay.
pub fn constant_rate_model(production: f64) -> FnRateModel {
    FnRateModel::builder()
        .production(move |_, arrays| {
            arrays.production_rates.fill(production);
            Ok(())
        })
        .decay(|_, arrays| {
            arrays.decay_rates.fill(0.0);
            Ok(())
        })
        .build()
        .unwrap()
}

/// No production, decay `rate * state`.
pub fn linear_decay_model(rate: f64) -> FnRateModel {
    FnRateModel::builder()
        .production(|_, arrays| {
            arrays.production_rates.fill(0.0);
            Ok(())
        })
        .decay(move |_, arrays| {
            arrays.decay_rates = arrays.state.mapv(|value| rate * value);
            Ok(())
        })
        .build()
        .unwrap()
}

/// Constant production that fails once any state entry exceeds `limit`.
pub fn bounded_model(production: f64, limit: f64) -> FnRateModel {
    FnRateModel::builder()
        .production(move |_, arrays| {
            if arrays.state.iter().any(|value| *value > limit) {
                return Err(CellPopError::Strategy(ErrorInfo::new(
                    "limit-exceeded",
                    "state left the supported range",
                )));
            }
            arrays.production_rates.fill(production);
            Ok(())
        })
        .decay(|_, arrays| {
            arrays.decay_rates.fill(0.0);
            Ok(())
        })
        .build()
        .unwrap()
}

/// Constant production, no decay; the `fail_at`-th production call errors.
pub fn flaky_model(production: f64, fail_at: usize) -> FnRateModel {
    let calls = Cell::new(0usize);
    FnRateModel::builder()
        .production(move |_, arrays| {
            calls.set(calls.get() + 1);
            if calls.get() == fail_at {
                return Err(CellPopError::Strategy(ErrorInfo::new(
                    "transient-failure",
                    "rate evaluation failed",
                )));
            }
            arrays.production_rates.fill(production);
            Ok(())
        })
        .decay(|_, arrays| {
            arrays.decay_rates.fill(0.0);
            Ok(())
        })
        .build()
        .unwrap()
}

pub fn population<M: RateModel>(
    data: &InteractionData,
    model: M,
    n_cells: usize,
) -> CellPopulation<M> {
    let mut rng = RngHandle::from_seed(7);
    CellPopulation::new(data, model, n_cells, &mut rng).unwrap()
}
