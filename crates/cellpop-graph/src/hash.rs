use sha2::{Digest, Sha256};

use crate::interaction::{Column, InteractionData};

/// Computes the canonical structural hash of an interaction graph.
///
/// Node types and edge types are hashed in sorted order and edge rows are
/// sorted within each type, so the digest does not depend on insertion or
/// row order.
pub fn canonical_hash(data: &InteractionData) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.schema_version.major.to_le_bytes());
    hasher.update(data.schema_version.minor.to_le_bytes());
    hasher.update(data.schema_version.patch.to_le_bytes());

    let mut node_types: Vec<_> = data.nodes.iter().collect();
    node_types.sort_by(|a, b| a.0.cmp(b.0));
    hasher.update((node_types.len() as u64).to_le_bytes());
    for (name, table) in node_types {
        update_str(name, &mut hasher);
        let mut ids = table.idx.clone();
        ids.sort_unstable();
        update_slice(&ids, &mut hasher);
        let mut columns: Vec<_> = table.columns.iter().collect();
        columns.sort_by(|a, b| a.0.cmp(b.0));
        for (column, value) in columns {
            update_str(column, &mut hasher);
            encode_column(value, &mut hasher);
        }
    }

    let mut edge_types: Vec<_> = data.edges.iter().collect();
    edge_types.sort_by(|a, b| a.0.cmp(b.0));
    hasher.update((edge_types.len() as u64).to_le_bytes());
    for (edge_type, table) in edge_types {
        update_str(&edge_type.src, &mut hasher);
        update_str(&edge_type.relation, &mut hasher);
        update_str(&edge_type.dst, &mut hasher);
        let mut rows: Vec<(usize, usize)> = table
            .idx
            .rows()
            .into_iter()
            .map(|row| (row[0], row[1]))
            .collect();
        rows.sort_unstable();
        hasher.update((rows.len() as u64).to_le_bytes());
        for (tail, head) in rows {
            hasher.update((tail as u64).to_le_bytes());
            hasher.update((head as u64).to_le_bytes());
        }
    }

    format!("{:x}", hasher.finalize())
}

fn encode_column(column: &Column, hasher: &mut Sha256) {
    match column {
        Column::Tensor(value) => {
            hasher.update(b"tensor");
            update_slice(value.shape(), hasher);
            for entry in value.iter() {
                hasher.update(entry.to_bits().to_le_bytes());
            }
        }
        Column::Labels(labels) => {
            hasher.update(b"labels");
            hasher.update((labels.len() as u64).to_le_bytes());
            for label in labels {
                update_str(label, hasher);
            }
        }
    }
}

fn update_str(value: &str, hasher: &mut Sha256) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

fn update_slice(values: &[usize], hasher: &mut Sha256) {
    hasher.update((values.len() as u64).to_le_bytes());
    for value in values {
        hasher.update((*value as u64).to_le_bytes());
    }
}
