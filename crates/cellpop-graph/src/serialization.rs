use cellpop_core::errors::{CellPopError, ErrorInfo};
use cellpop_core::provenance::SchemaVersion;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::interaction::{EdgeTable, InteractionData, NodeTable};
use crate::types::EdgeType;

/// Serializes the interaction graph to a compact binary representation using `bincode`.
pub fn graph_to_bytes(data: &InteractionData) -> Result<Vec<u8>, CellPopError> {
    let serializable = SerializableInteraction::from_data(data);
    bincode::serialize(&serializable)
        .map_err(|err| CellPopError::Serde(ErrorInfo::new("serialize-bytes", err.to_string())))
}

/// Restores an interaction graph from its binary representation.
pub fn graph_from_bytes(bytes: &[u8]) -> Result<InteractionData, CellPopError> {
    let serializable: SerializableInteraction = bincode::deserialize(bytes).map_err(|err| {
        CellPopError::Serde(ErrorInfo::new("deserialize-bytes", err.to_string()))
    })?;
    serializable.into_data()
}

/// Serializes the interaction graph to a JSON string.
pub fn graph_to_json(data: &InteractionData) -> Result<String, CellPopError> {
    let serializable = SerializableInteraction::from_data(data);
    serde_json::to_string_pretty(&serializable)
        .map_err(|err| CellPopError::Serde(ErrorInfo::new("serialize-json", err.to_string())))
}

/// Restores an interaction graph from a JSON string.
pub fn graph_from_json(json: &str) -> Result<InteractionData, CellPopError> {
    let serializable: SerializableInteraction = serde_json::from_str(json)
        .map_err(|err| CellPopError::Serde(ErrorInfo::new("deserialize-json", err.to_string())))?;
    serializable.into_data()
}

#[derive(Debug, Serialize, Deserialize)]
struct SerializableInteraction {
    schema_version: SchemaVersion,
    nodes: IndexMap<String, NodeTable>,
    edges: Vec<SerializableEdgeType>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SerializableEdgeType {
    edge_type: EdgeType,
    table: EdgeTable,
}

impl SerializableInteraction {
    fn from_data(data: &InteractionData) -> Self {
        let edges = data
            .edges
            .iter()
            .map(|(edge_type, table)| SerializableEdgeType {
                edge_type: edge_type.clone(),
                table: table.clone(),
            })
            .collect();
        Self {
            schema_version: data.schema_version,
            nodes: data.nodes.clone(),
            edges,
        }
    }

    fn into_data(self) -> Result<InteractionData, CellPopError> {
        if !SchemaVersion::CURRENT.reads(self.schema_version) {
            let SchemaVersion {
                major,
                minor,
                patch,
            } = self.schema_version;
            return Err(CellPopError::Serde(
                ErrorInfo::new("schema-version", "payload schema is not readable")
                    .with_context("payload", format!("{major}.{minor}.{patch}"))
                    .with_hint("re-export the graph with a matching crate version"),
            ));
        }
        let mut edges = IndexMap::with_capacity(self.edges.len());
        for SerializableEdgeType { edge_type, table } in self.edges {
            if edges.contains_key(&edge_type) {
                return Err(CellPopError::Serde(
                    ErrorInfo::new("duplicate-edge-type", "edge type appears twice in payload")
                        .with_context("edge_type", edge_type.to_string()),
                ));
            }
            edges.insert(edge_type, table);
        }
        Ok(InteractionData {
            schema_version: self.schema_version,
            nodes: self.nodes,
            edges,
        })
    }
}
