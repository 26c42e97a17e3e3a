use std::ops::{Index, IndexMut};

use cellpop_core::errors::{CellPopError, ErrorInfo};
use indexmap::IndexMap;

use crate::attributes::ElementSet;
use crate::edge_set::EdgeSet;
use crate::node_set::NodeSet;
use crate::state::{Field, StateArrays};
use crate::tensor::Tensor;
use crate::types::{EdgeType, SetKey};

/// Value accepted by [`SetRegistry::insert`].
#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    /// A node set.
    Node(NodeSet),
    /// An edge set.
    Edge(EdgeSet),
}

impl From<NodeSet> for SetValue {
    fn from(set: NodeSet) -> Self {
        SetValue::Node(set)
    }
}

impl From<EdgeSet> for SetValue {
    fn from(set: EdgeSet) -> Self {
        SetValue::Edge(set)
    }
}

/// Registration-ordered maps from node type to [`NodeSet`] and from edge
/// type to [`EdgeSet`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetRegistry {
    node_sets: IndexMap<String, NodeSet>,
    edge_sets: IndexMap<EdgeType, EdgeSet>,
}

impl SetRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a set under `key`.
    ///
    /// Fails with a type error when a node set is offered under an edge key
    /// (or the reverse) and with a key error when the key is already taken.
    pub fn insert(
        &mut self,
        key: impl Into<SetKey>,
        value: impl Into<SetValue>,
    ) -> Result<(), CellPopError> {
        match (key.into(), value.into()) {
            (SetKey::Node(name), SetValue::Node(set)) => {
                if self.node_sets.contains_key(&name) {
                    return Err(CellPopError::Key(
                        ErrorInfo::new("duplicate-node-type", "node type is already registered")
                            .with_context("node_type", name),
                    ));
                }
                self.node_sets.insert(name, set);
            }
            (SetKey::Edge(edge_type), SetValue::Edge(set)) => {
                if self.edge_sets.contains_key(&edge_type) {
                    return Err(CellPopError::Key(
                        ErrorInfo::new("duplicate-edge-type", "edge type is already registered")
                            .with_context("edge_type", edge_type.to_string()),
                    ));
                }
                self.edge_sets.insert(edge_type, set);
            }
            (SetKey::Node(name), SetValue::Edge(_)) => {
                return Err(CellPopError::Type(
                    ErrorInfo::new("expected-node-set", "node type keys only accept node sets")
                        .with_context("key", name),
                ));
            }
            (SetKey::Edge(edge_type), SetValue::Node(_)) => {
                return Err(CellPopError::Type(
                    ErrorInfo::new("expected-edge-set", "edge type keys only accept edge sets")
                        .with_context("key", edge_type.to_string()),
                ));
            }
        }
        Ok(())
    }

    /// Returns the node set registered for `node_type`.
    pub fn node_set(&self, node_type: &str) -> Result<&NodeSet, CellPopError> {
        self.node_sets
            .get(node_type)
            .ok_or_else(|| unknown_node_type(node_type))
    }

    /// Returns the mutable node set registered for `node_type`.
    pub fn node_set_mut(&mut self, node_type: &str) -> Result<&mut NodeSet, CellPopError> {
        self.node_sets
            .get_mut(node_type)
            .ok_or_else(|| unknown_node_type(node_type))
    }

    /// Returns the edge set registered for `edge_type`.
    pub fn edge_set(&self, edge_type: &EdgeType) -> Result<&EdgeSet, CellPopError> {
        self.edge_sets
            .get(edge_type)
            .ok_or_else(|| unknown_edge_type(edge_type))
    }

    /// Returns the mutable edge set registered for `edge_type`.
    pub fn edge_set_mut(&mut self, edge_type: &EdgeType) -> Result<&mut EdgeSet, CellPopError> {
        self.edge_sets
            .get_mut(edge_type)
            .ok_or_else(|| unknown_edge_type(edge_type))
    }

    /// Iterates over node sets in registration order.
    pub fn node_sets(&self) -> impl Iterator<Item = (&str, &NodeSet)> {
        self.node_sets.iter().map(|(name, set)| (name.as_str(), set))
    }

    /// Iterates mutably over node sets in registration order.
    pub fn node_sets_mut(&mut self) -> impl Iterator<Item = (&str, &mut NodeSet)> {
        self.node_sets.iter_mut().map(|(name, set)| (name.as_str(), set))
    }

    /// Iterates over edge sets in registration order.
    pub fn edge_sets(&self) -> impl Iterator<Item = (&EdgeType, &EdgeSet)> {
        self.edge_sets.iter()
    }

    /// Iterates mutably over edge sets in registration order.
    pub fn edge_sets_mut(&mut self) -> impl Iterator<Item = (&EdgeType, &mut EdgeSet)> {
        self.edge_sets.iter_mut()
    }

    /// Registered node types in registration order.
    pub fn node_types(&self) -> Vec<String> {
        self.node_sets.keys().cloned().collect()
    }

    /// Registered edge types in registration order.
    pub fn edge_types(&self) -> Vec<EdgeType> {
        self.edge_sets.keys().cloned().collect()
    }

    /// Total number of nodes across all node sets.
    pub fn n_nodes(&self) -> usize {
        self.node_sets.values().map(ElementSet::len).sum()
    }

    /// Checks that the node-set ranges tile `[0, n_nodes)` without gaps or overlaps.
    pub fn validate_partition(&self) -> Result<(), CellPopError> {
        let mut ranges: Vec<(&str, usize, usize)> = self
            .node_sets
            .iter()
            .map(|(name, set)| (name.as_str(), set.idx_low(), set.idx_high()))
            .collect();
        ranges.sort_by_key(|(_, low, _)| *low);
        let mut next = 0usize;
        for (name, low, high) in ranges {
            if low < next {
                return Err(CellPopError::Graph(
                    ErrorInfo::new("partition-overlap", "node type ranges overlap")
                        .with_context("node_type", name)
                        .with_context("idx_low", low.to_string())
                        .with_context("covered_until", next.to_string()),
                ));
            }
            if low > next {
                return Err(CellPopError::Graph(
                    ErrorInfo::new("partition-gap", "node type ranges leave global ids unused")
                        .with_context("node_type", name)
                        .with_context("idx_low", low.to_string())
                        .with_context("expected", next.to_string()),
                ));
            }
            next = high + 1;
        }
        Ok(())
    }

    /// Zeroes the production-rate view of every node set.
    pub fn set_production_rates_to_zero(&self, arrays: &mut StateArrays) {
        for set in self.node_sets.values() {
            set.view_mut(arrays, Field::ProductionRate).fill(0.0);
        }
    }

    /// Learnable parameters of every node set, then every edge set, in
    /// registration order, each paired with its dotted path.
    pub fn named_parameters(&self) -> Vec<(String, &Tensor)> {
        let mut parameters = Vec::new();
        for (name, set) in &self.node_sets {
            for (param, value) in set.attributes().parameters() {
                parameters.push((format!("{name}.{param}"), value));
            }
        }
        for (edge_type, set) in &self.edge_sets {
            for (param, value) in set.attributes().parameters() {
                parameters.push((format!("{edge_type}.{param}"), value));
            }
        }
        parameters
    }

    /// Resolves a dotted parameter path produced by [`SetRegistry::named_parameters`].
    pub fn parameter_mut(&mut self, path: &str) -> Option<&mut Tensor> {
        let (owner, param) = path.rsplit_once('.')?;
        if let Some(set) = self.node_sets.get_mut(owner) {
            return learnable_mut(set, param);
        }
        let edge_type = self
            .edge_sets
            .keys()
            .find(|edge_type| edge_type.to_string() == owner)?
            .clone();
        let set = self.edge_sets.get_mut(&edge_type)?;
        learnable_mut(set, param)
    }
}

fn learnable_mut<'a, S: ElementSet>(set: &'a mut S, param: &str) -> Option<&'a mut Tensor> {
    if !set.attributes().entry(param)?.learnable {
        return None;
    }
    set.attributes_mut().get_mut(param)
}

/// # Panics
///
/// Panics when `node_type` is not registered; [`SetRegistry::node_set`]
/// returns a `Key` error instead.
impl Index<&str> for SetRegistry {
    type Output = NodeSet;

    fn index(&self, node_type: &str) -> &NodeSet {
        &self.node_sets[node_type]
    }
}

impl IndexMut<&str> for SetRegistry {
    fn index_mut(&mut self, node_type: &str) -> &mut NodeSet {
        &mut self.node_sets[node_type]
    }
}

/// # Panics
///
/// Panics when `edge_type` is not registered; [`SetRegistry::edge_set`]
/// returns a `Key` error instead.
impl Index<&EdgeType> for SetRegistry {
    type Output = EdgeSet;

    fn index(&self, edge_type: &EdgeType) -> &EdgeSet {
        &self.edge_sets[edge_type]
    }
}

impl IndexMut<&EdgeType> for SetRegistry {
    fn index_mut(&mut self, edge_type: &EdgeType) -> &mut EdgeSet {
        &mut self.edge_sets[edge_type]
    }
}

fn unknown_node_type(node_type: &str) -> CellPopError {
    CellPopError::Key(
        ErrorInfo::new("unknown-node-type", "node type is not registered")
            .with_context("node_type", node_type),
    )
}

fn unknown_edge_type(edge_type: &EdgeType) -> CellPopError {
    CellPopError::Key(
        ErrorInfo::new("unknown-edge-type", "edge type is not registered")
            .with_context("edge_type", edge_type.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SetRegistry {
        let mut registry = SetRegistry::new();
        registry
            .insert("gene", NodeSet::new(0, 2, IndexMap::new()).unwrap())
            .unwrap();
        registry
            .insert("compound", NodeSet::new(3, 4, IndexMap::new()).unwrap())
            .unwrap();
        registry
    }

    #[test]
    fn rejects_duplicates() {
        let mut registry = registry();
        let err = registry
            .insert("gene", NodeSet::new(5, 6, IndexMap::new()).unwrap())
            .unwrap_err();
        assert_eq!(err.info().code, "duplicate-node-type");
    }

    #[test]
    fn rejects_type_confusion() {
        let mut registry = registry();
        let err = registry
            .insert("protein", EdgeSet::new(None, IndexMap::new()).unwrap())
            .unwrap_err();
        assert!(matches!(err, CellPopError::Type(_)));
        let err = registry
            .insert(
                ("gene", "activation", "gene"),
                NodeSet::new(5, 6, IndexMap::new()).unwrap(),
            )
            .unwrap_err();
        assert_eq!(err.info().code, "expected-edge-set");
    }

    #[test]
    fn partition_checks() {
        let registry = registry();
        assert_eq!(registry.n_nodes(), 5);
        registry.validate_partition().unwrap();

        let mut gapped = SetRegistry::new();
        gapped
            .insert("gene", NodeSet::new(1, 2, IndexMap::new()).unwrap())
            .unwrap();
        assert_eq!(
            gapped.validate_partition().unwrap_err().info().code,
            "partition-gap"
        );

        let mut overlapping = registry;
        overlapping
            .insert("protein", NodeSet::new(4, 6, IndexMap::new()).unwrap())
            .unwrap();
        assert_eq!(
            overlapping.validate_partition().unwrap_err().info().code,
            "partition-overlap"
        );
    }

    #[test]
    fn zeroes_production_rates() {
        let registry = registry();
        let mut arrays = StateArrays::zeros(2, 5, 1);
        arrays.production_rates.fill(3.0);
        registry.set_production_rates_to_zero(&mut arrays);
        assert!(arrays.production_rates.iter().all(|value| *value == 0.0));
    }
}
