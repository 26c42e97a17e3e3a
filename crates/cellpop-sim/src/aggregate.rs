use cellpop_core::errors::{CellPopError, ErrorInfo};
use cellpop_graph::Tensor;
use ndarray::{Array3, ArrayView2, ArrayView3, Axis};

/// Weighted message passing from a source node set into a target node set.
///
/// For every edge `(tail, head)` with weight `w`, `w * x[.., tail, ..]` is
/// added to row `head` of the output. Targets without incoming edges stay at
/// zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimpleConv {
    tgt_nodeset_len: usize,
}

impl SimpleConv {
    /// Creates an aggregator writing into a target set of `tgt_nodeset_len` nodes.
    pub fn new(tgt_nodeset_len: usize) -> Self {
        Self { tgt_nodeset_len }
    }

    /// Number of target rows in the output.
    pub fn tgt_nodeset_len(&self) -> usize {
        self.tgt_nodeset_len
    }

    /// Aggregates source features along the edges.
    ///
    /// * `x`: `(n_cells, n_src, dim)` source features.
    /// * `edge_index`: `(2, n_edges)`; row 0 holds tails, row 1 heads, both
    ///   local to their node set.
    /// * `edge_weight`: one weight per edge (any shape with `n_edges` entries,
    ///   typically `(1, n_edges, 1)`).
    ///
    /// Returns `(n_cells, tgt_nodeset_len, dim)`.
    pub fn forward(
        &self,
        x: ArrayView3<'_, f64>,
        edge_index: ArrayView2<'_, usize>,
        edge_weight: &Tensor,
    ) -> Result<Array3<f64>, CellPopError> {
        let (n_cells, n_src, dim) = x.dim();
        let mut out = Array3::zeros((n_cells, self.tgt_nodeset_len, dim));
        if edge_index.nrows() != 2 {
            return Err(CellPopError::Shape(
                ErrorInfo::new("edge-index-rows", "edge index must have two rows")
                    .with_context("rows", edge_index.nrows().to_string()),
            ));
        }
        let n_edges = edge_index.ncols();
        if edge_weight.len() != n_edges {
            return Err(CellPopError::Shape(
                ErrorInfo::new("edge-weight-length", "one weight per edge is required")
                    .with_context("edges", n_edges.to_string())
                    .with_context("weights", edge_weight.len().to_string()),
            ));
        }

        for (edge, weight) in edge_index.columns().into_iter().zip(edge_weight.iter()) {
            let (tail, head) = (edge[0], edge[1]);
            if tail >= n_src || head >= self.tgt_nodeset_len {
                return Err(CellPopError::Shape(
                    ErrorInfo::new("edge-index-out-of-range", "edge endpoint outside its node set")
                        .with_context("tail", tail.to_string())
                        .with_context("head", head.to_string())
                        .with_context("n_src", n_src.to_string())
                        .with_context("n_tgt", self.tgt_nodeset_len.to_string()),
                ));
            }
            let message = x.index_axis(Axis(1), tail);
            out.index_axis_mut(Axis(1), head)
                .scaled_add(*weight, &message);
        }
        Ok(out)
    }
}

/// Broadcasts a parameter tensor against a `(n_cells, n_nodes, dim)` shape.
pub fn broadcast_param<'a>(
    name: &str,
    param: &'a Tensor,
    dim: (usize, usize, usize),
) -> Result<ArrayView3<'a, f64>, CellPopError> {
    param.broadcast(dim).ok_or_else(|| {
        CellPopError::shape_mismatch(name, &[dim.0, dim.1, dim.2], param.shape())
            .with_context("parameter", name)
    })
}

/// First-order decay `alpha * state`, with `alpha` broadcast over cells.
pub fn exponential_decay(
    state: ArrayView3<'_, f64>,
    alpha: &Tensor,
) -> Result<Array3<f64>, CellPopError> {
    let alpha = broadcast_param("alpha", alpha, state.dim())?;
    Ok(&alpha * &state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Array, IxDyn};

    fn weights(values: &[f64]) -> Tensor {
        Array::from_shape_vec(IxDyn(&[1, values.len(), 1]), values.to_vec()).unwrap()
    }

    #[test]
    fn single_edge_scales_source_feature() {
        let x = Array3::from_shape_vec((1, 2, 1), vec![3.0, 0.0]).unwrap();
        let edge_index = arr2(&[[0usize], [1]]);
        let out = SimpleConv::new(2)
            .forward(x.view(), edge_index.view(), &weights(&[2.0]))
            .unwrap();
        assert_eq!(out[[0, 1, 0]], 6.0);
        assert_eq!(out[[0, 0, 0]], 0.0);
    }

    #[test]
    fn parallel_edges_accumulate() {
        let x = Array3::from_shape_vec((2, 2, 1), vec![1.0, 2.0, 10.0, 20.0]).unwrap();
        let edge_index = arr2(&[[0usize, 1], [0, 0]]);
        let out = SimpleConv::new(1)
            .forward(x.view(), edge_index.view(), &weights(&[1.0, -1.0]))
            .unwrap();
        assert_eq!(out.dim(), (2, 1, 1));
        assert_eq!(out[[0, 0, 0]], -1.0);
        assert_eq!(out[[1, 0, 0]], -10.0);
    }

    #[test]
    fn no_edges_yields_zeros() {
        let x = Array3::from_elem((1, 3, 2), 4.0);
        let edge_index = ndarray::Array2::<usize>::zeros((2, 0));
        let out = SimpleConv::new(5)
            .forward(x.view(), edge_index.view(), &weights(&[]))
            .unwrap();
        assert_eq!(out.dim(), (1, 5, 2));
        assert!(out.iter().all(|value| *value == 0.0));
    }

    #[test]
    fn out_of_range_endpoint_is_rejected() {
        let x = Array3::from_elem((1, 2, 1), 1.0);
        let edge_index = arr2(&[[0usize], [3]]);
        let err = SimpleConv::new(2)
            .forward(x.view(), edge_index.view(), &weights(&[1.0]))
            .unwrap_err();
        assert_eq!(err.info().code, "edge-index-out-of-range");
    }

    #[test]
    fn decay_broadcasts_over_cells() {
        let state = Array3::from_elem((3, 2, 1), 2.0);
        let alpha = Array::from_shape_vec(IxDyn(&[1, 2, 1]), vec![0.5, 1.5]).unwrap();
        let decay = exponential_decay(state.view(), &alpha).unwrap();
        assert_eq!(decay[[2, 0, 0]], 1.0);
        assert_eq!(decay[[2, 1, 0]], 3.0);
    }

    #[test]
    fn decay_rejects_incompatible_alpha() {
        let state = Array3::from_elem((1, 2, 1), 2.0);
        let alpha = Array::from_shape_vec(IxDyn(&[1, 3, 1]), vec![0.5; 3]).unwrap();
        let err = exponential_decay(state.view(), &alpha).unwrap_err();
        assert_eq!(err.info().code, "shape-mismatch");
    }
}
