#![deny(missing_docs)]

//! Typed node and edge sets over a partitioned per-cell state, plus the
//! interaction graph data they are built from.
//!
//! Every node type owns a contiguous range of the node axis of the
//! population arrays; every edge type stores its endpoints local to the
//! source and target node sets. Sets carry named attributes and learnable
//! parameters in an explicit registry.

mod attributes;
mod datasets;
mod edge_set;
mod hash;
mod interaction;
mod node_set;
mod registry;
mod serialization;
mod state;
mod tensor;
mod types;

pub use attributes::{Attribute, AttributeMap, ElementSet};
pub use datasets::{load_interaction_data, BUILTIN_DATASETS};
pub use edge_set::EdgeSet;
pub use hash::canonical_hash;
pub use interaction::{Column, EdgeTable, InteractionData, InteractionSource, NodeTable};
pub use node_set::NodeSet;
pub use registry::{SetRegistry, SetValue};
pub use state::{Field, StateArrays};
pub use tensor::{is_element_level, promote, Tensor, ELEMENT_AXIS};
pub use types::{EdgeType, SetKey};

/// Re-export serialization helpers for downstream crates.
pub use serialization::{graph_from_bytes, graph_from_json, graph_to_bytes, graph_to_json};
