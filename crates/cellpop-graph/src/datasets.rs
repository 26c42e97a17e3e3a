use std::collections::BTreeSet;

use cellpop_core::errors::{CellPopError, ErrorInfo};
use cellpop_core::rng::RngHandle;
use ndarray::Array2;
use rand::Rng;
use tracing::debug;

use crate::interaction::{Column, EdgeTable, InteractionData, NodeTable};
use crate::types::EdgeType;

const TEST_DATASET_SEED: u64 = 0x0CA1_C1A0;
const TEST_GENES: usize = 45;
const TEST_COMPOUNDS: usize = 15;

/// Names accepted by [`load_interaction_data`].
pub const BUILTIN_DATASETS: &[&str] = &["test"];

/// Loads a built-in interaction graph by name.
pub fn load_interaction_data(name: &str) -> Result<InteractionData, CellPopError> {
    match name {
        "test" => {
            let data = test_dataset();
            debug!(
                dataset = name,
                nodes = data.n_nodes(),
                edges = data.n_edges(),
                "loaded built-in interaction data"
            );
            Ok(data)
        }
        other => Err(CellPopError::Key(
            ErrorInfo::new("unknown-dataset", "no built-in dataset with this name")
                .with_context("dataset", other)
                .with_hint(format!("available: {}", BUILTIN_DATASETS.join(", "))),
        )),
    }
}

/// Small signalling-pathway sized graph: 45 genes (global ids 0..=44), 15
/// compounds (45..=59) and 57 edges over five edge types.
fn test_dataset() -> InteractionData {
    let genes: Vec<usize> = (0..TEST_GENES).collect();
    let compounds: Vec<usize> = (TEST_GENES..TEST_GENES + TEST_COMPOUNDS).collect();

    let gene_names = genes.iter().map(|id| format!("gene_{id:02}")).collect();
    let compound_names = compounds
        .iter()
        .map(|id| format!("compound_{:02}", id - TEST_GENES))
        .collect();

    let mut rng = RngHandle::from_seed(TEST_DATASET_SEED);
    let layout: [(EdgeType, &[usize], &[usize], usize); 5] = [
        (EdgeType::new("gene", "activation", "gene"), &genes, &genes, 20),
        (EdgeType::new("gene", "inhibition", "gene"), &genes, &genes, 10),
        (
            EdgeType::new("gene", "binding/association", "gene"),
            &genes,
            &genes,
            10,
        ),
        (
            EdgeType::new("compound", "compound", "gene"),
            &compounds,
            &genes,
            9,
        ),
        (EdgeType::new("gene", "", "compound"), &genes, &compounds, 8),
    ];

    let mut data = InteractionData::new()
        .with_node_type(
            "gene",
            NodeTable::new(genes.clone()).with_column("name", Column::Labels(gene_names)),
        )
        .with_node_type(
            "compound",
            NodeTable::new(compounds.clone()).with_column("name", Column::Labels(compound_names)),
        );
    for (edge_type, tails, heads, count) in layout {
        let pairs = sample_distinct_pairs(tails, heads, count, &mut rng);
        data = data.with_edge_type(edge_type, EdgeTable::new(pairs));
    }
    data
}

fn sample_distinct_pairs(
    tails: &[usize],
    heads: &[usize],
    count: usize,
    rng: &mut RngHandle,
) -> Array2<usize> {
    let mut seen = BTreeSet::new();
    let mut pairs = Vec::with_capacity(count);
    while pairs.len() < count {
        let tail = tails[rng.gen_range(0..tails.len())];
        let head = heads[rng.gen_range(0..heads.len())];
        if tail == head || !seen.insert((tail, head)) {
            continue;
        }
        pairs.push([tail, head]);
    }
    Array2::from_shape_fn((count, 2), |(row, col)| pairs[row][col])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_cardinalities() {
        let data = load_interaction_data("test").unwrap();
        assert_eq!(data.n_nodes(), 60);
        assert_eq!(data.n_edges(), 57);
        assert_eq!(data.nodes.len(), 2);
        assert_eq!(data.edges.len(), 5);
    }

    #[test]
    fn test_dataset_is_deterministic() {
        assert_eq!(
            load_interaction_data("test").unwrap(),
            load_interaction_data("test").unwrap()
        );
    }

    #[test]
    fn unknown_dataset() {
        let err = load_interaction_data("kegg-full").unwrap_err();
        assert_eq!(err.info().code, "unknown-dataset");
    }
}
