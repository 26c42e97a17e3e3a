use cellpop_core::provenance::SchemaVersion;
use indexmap::IndexMap;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::hash::canonical_hash;
use crate::tensor::Tensor;
use crate::types::EdgeType;

/// One named column of a node or edge table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Column {
    /// Array-like values; these become set attributes.
    Tensor(Tensor),
    /// Free-form labels (names, accession ids); not carried into sets.
    Labels(Vec<String>),
}

impl Column {
    /// Returns the tensor when the column is array-like.
    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Column::Tensor(value) => Some(value),
            Column::Labels(_) => None,
        }
    }
}

/// All nodes of one type as supplied by a graph data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTable {
    /// Global node id of every node of this type.
    pub idx: Vec<usize>,
    /// Remaining named columns.
    #[serde(default)]
    pub columns: IndexMap<String, Column>,
}

impl NodeTable {
    /// Creates a table with no extra columns.
    pub fn new(idx: Vec<usize>) -> Self {
        Self {
            idx,
            columns: IndexMap::new(),
        }
    }

    /// Adds a column and returns the table.
    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Self {
        self.columns.insert(name.into(), column);
        self
    }
}

/// All edges of one type as supplied by a graph data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeTable {
    /// `(n_edges, 2)` pairs of global node ids (tail, head).
    pub idx: Array2<usize>,
    /// Remaining named columns.
    #[serde(default)]
    pub columns: IndexMap<String, Column>,
}

impl EdgeTable {
    /// Creates a table with no extra columns.
    pub fn new(idx: Array2<usize>) -> Self {
        Self {
            idx,
            columns: IndexMap::new(),
        }
    }

    /// Adds a column and returns the table.
    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Self {
        self.columns.insert(name.into(), column);
        self
    }
}

/// Narrow interface through which populations read a raw interaction graph.
pub trait InteractionSource {
    /// Node tables keyed by node type, in the order types should be registered.
    fn node_data(&self) -> IndexMap<String, NodeTable>;

    /// Edge tables keyed by edge type, in the order types should be registered.
    fn edge_data(&self) -> IndexMap<EdgeType, EdgeTable>;

    /// Structural hash recorded in run provenance, when the source has one.
    fn graph_hash(&self) -> Option<String> {
        None
    }
}

/// Typed interaction graph held in memory.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InteractionData {
    /// Schema version stored alongside serialized payloads.
    pub schema_version: SchemaVersion,
    /// Node tables keyed by node type.
    pub nodes: IndexMap<String, NodeTable>,
    /// Edge tables keyed by edge type.
    pub edges: IndexMap<EdgeType, EdgeTable>,
}

impl InteractionData {
    /// Creates an empty interaction graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the table of a node type.
    pub fn with_node_type(mut self, node_type: impl Into<String>, table: NodeTable) -> Self {
        self.nodes.insert(node_type.into(), table);
        self
    }

    /// Adds (or replaces) the table of an edge type.
    pub fn with_edge_type(mut self, edge_type: impl Into<EdgeType>, table: EdgeTable) -> Self {
        self.edges.insert(edge_type.into(), table);
        self
    }

    /// Total number of nodes over all types.
    pub fn n_nodes(&self) -> usize {
        self.nodes.values().map(|table| table.idx.len()).sum()
    }

    /// Total number of edges over all types.
    pub fn n_edges(&self) -> usize {
        self.edges.values().map(|table| table.idx.nrows()).sum()
    }
}

impl InteractionSource for InteractionData {
    fn node_data(&self) -> IndexMap<String, NodeTable> {
        self.nodes.clone()
    }

    fn edge_data(&self) -> IndexMap<EdgeType, EdgeTable> {
        self.edges.clone()
    }

    fn graph_hash(&self) -> Option<String> {
        Some(canonical_hash(self))
    }
}
