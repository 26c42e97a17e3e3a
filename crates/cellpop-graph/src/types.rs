use std::fmt;

use serde::{Deserialize, Serialize};

/// Edge type triple `(source node type, relation, target node type)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeType {
    /// Node type of every edge tail.
    pub src: String,
    /// Interaction name (e.g. "activation"); may be empty.
    pub relation: String,
    /// Node type of every edge head.
    pub dst: String,
}

impl EdgeType {
    /// Creates an edge type from its three components.
    pub fn new(src: impl Into<String>, relation: impl Into<String>, dst: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            relation: relation.into(),
            dst: dst.into(),
        }
    }
}

impl From<(&str, &str, &str)> for EdgeType {
    fn from((src, relation, dst): (&str, &str, &str)) -> Self {
        Self::new(src, relation, dst)
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.src, self.relation, self.dst)
    }
}

/// Key addressing either a node set (by type name) or an edge set (by triple).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SetKey {
    /// Node type name.
    Node(String),
    /// Edge type triple.
    Edge(EdgeType),
}

impl From<&str> for SetKey {
    fn from(name: &str) -> Self {
        SetKey::Node(name.to_string())
    }
}

impl From<String> for SetKey {
    fn from(name: String) -> Self {
        SetKey::Node(name)
    }
}

impl From<EdgeType> for SetKey {
    fn from(edge_type: EdgeType) -> Self {
        SetKey::Edge(edge_type)
    }
}

impl From<(&str, &str, &str)> for SetKey {
    fn from(triple: (&str, &str, &str)) -> Self {
        SetKey::Edge(triple.into())
    }
}

impl fmt::Display for SetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetKey::Node(name) => write!(f, "{name}"),
            SetKey::Edge(edge_type) => write!(f, "{edge_type}"),
        }
    }
}
