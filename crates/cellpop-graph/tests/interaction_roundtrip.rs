use cellpop_graph::{
    canonical_hash, graph_from_bytes, graph_from_json, graph_to_bytes, graph_to_json,
    load_interaction_data, Column, EdgeTable, EdgeType, InteractionData, NodeTable, Tensor,
};
use ndarray::{arr1, arr2};

fn small_graph() -> InteractionData {
    InteractionData::new()
        .with_node_type(
            "gene",
            NodeTable::new(vec![0, 1, 2])
                .with_column("basal", Column::Tensor(arr1(&[0.5, 1.0, 1.5]).into_dyn()))
                .with_column(
                    "name",
                    Column::Labels(vec!["a".into(), "b".into(), "c".into()]),
                ),
        )
        .with_node_type("compound", NodeTable::new(vec![3, 4]))
        .with_edge_type(
            ("gene", "activation", "gene"),
            EdgeTable::new(arr2(&[[0, 1], [1, 2]]))
                .with_column("sign", Column::Tensor(Tensor::from_elem(vec![2], 1.0))),
        )
        .with_edge_type(
            ("compound", "compound", "gene"),
            EdgeTable::new(arr2(&[[3, 0]])),
        )
}

#[test]
fn json_roundtrip() {
    let data = small_graph();
    let json = graph_to_json(&data).unwrap();
    let restored = graph_from_json(&json).unwrap();
    assert_eq!(data, restored);
    assert_eq!(canonical_hash(&data), canonical_hash(&restored));
}

#[test]
fn bytes_roundtrip_of_builtin_dataset() {
    let data = load_interaction_data("test").unwrap();
    let bytes = graph_to_bytes(&data).unwrap();
    let restored = graph_from_bytes(&bytes).unwrap();
    assert_eq!(data, restored);
}

#[test]
fn bytes_roundtrip_keeps_tensor_and_label_columns() {
    let data = small_graph();
    let restored = graph_from_bytes(&graph_to_bytes(&data).unwrap()).unwrap();
    assert_eq!(restored, data);
    let gene = &restored.nodes["gene"];
    assert!(gene.columns["basal"].as_tensor().is_some());
    assert!(matches!(gene.columns["name"], Column::Labels(_)));
}

#[test]
fn hash_ignores_edge_row_order() {
    let data = small_graph();
    let mut shuffled = data.clone();
    let key: EdgeType = ("gene", "activation", "gene").into();
    shuffled.edges.get_mut(&key).unwrap().idx = arr2(&[[1, 2], [0, 1]]);
    assert_eq!(canonical_hash(&data), canonical_hash(&shuffled));

    let mut rewired = data.clone();
    rewired.edges.get_mut(&key).unwrap().idx = arr2(&[[2, 1], [0, 1]]);
    assert_ne!(canonical_hash(&data), canonical_hash(&rewired));
}

#[test]
fn malformed_json_is_a_serde_error() {
    let err = graph_from_json("{\"nodes\": 3}").unwrap_err();
    assert!(err.info().code.starts_with("deserialize"));
}

#[test]
fn newer_major_schema_is_rejected() {
    let mut data = small_graph();
    data.schema_version = cellpop_core::provenance::SchemaVersion::new(2, 0, 0);
    let json = graph_to_json(&data).unwrap();
    let err = graph_from_json(&json).unwrap_err();
    assert_eq!(err.info().code, "schema-version");
}
