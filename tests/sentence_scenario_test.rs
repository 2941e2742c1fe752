use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use samyama_vector::{Client, ErrorKind, NewRow, SchemaDescriptor, Value, VectorDbError};

const SENTENCES_SCHEMA: &str = r#"[
    {"name": "sentences", "kind": {"scalar": {"type": "string"}}},
    {"name": "vectors", "kind": {"vector": {"dims": 384, "metric": "L2", "index": "hnsw"}}}
]"#;

fn sentence_table(client: &Client) -> Vec<Vec<f32>> {
    let descriptor = SchemaDescriptor::from_json(SENTENCES_SCHEMA).unwrap();
    client.create_table_from_descriptor("sentences", descriptor).unwrap();

    let mut rng = StdRng::seed_from_u64(384);
    let vectors: Vec<Vec<f32>> = (0..50)
        .map(|_| (0..384).map(|_| rng.gen::<f32>()).collect())
        .collect();
    let rows = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| NewRow::new(v.clone()).with("sentences", format!("sentence number {}", i)))
        .collect();
    assert_eq!(client.insert("sentences", rows).unwrap(), 50);
    vectors
}

#[test]
fn test_seventh_sentence_matches_itself() {
    let client = Client::default();
    let vectors = sentence_table(&client);

    let results = client.search("sentences", &[vectors[7].clone()], 1, None).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].len(), 1);

    let hit = &results[0][0];
    assert_eq!(hit.get("sentences"), Some(&Value::from("sentence number 7")));
    assert!(hit.distance.abs() < 1e-6, "distance {}", hit.distance);
}

#[test]
fn test_every_sentence_matches_itself() {
    let client = Client::default();
    let vectors = sentence_table(&client);

    let results = client.search("sentences", &vectors, 1, None).unwrap();
    for (i, hits) in results.iter().enumerate() {
        assert_eq!(hits[0].get("sentences"), Some(&Value::String(format!("sentence number {}", i))));
    }
}

#[test]
fn test_short_vector_is_rejected() {
    let client = Client::default();
    sentence_table(&client);

    let short = NewRow::new(vec![0.5; 300]).with("sentences", "too short");
    let err = client.insert("sentences", vec![short]).unwrap_err();
    assert_eq!(err, VectorDbError::DimensionMismatch { expected: 384, got: 300 });
    assert_eq!(client.scan("sentences", None).unwrap().len(), 50);

    let err = client.search("sentences", &[vec![0.5; 300]], 1, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DimensionMismatch);
}

#[test]
fn test_drop_then_scan_fails() {
    let client = Client::default();
    sentence_table(&client);

    client.drop_table("sentences").unwrap();
    assert!(matches!(client.scan("sentences", None), Err(VectorDbError::TableNotFound(_))));
    assert!(!client.list_tables().contains(&"sentences".to_string()));
}

#[test]
fn test_scan_returns_rows_in_insert_order() {
    let client = Client::default();
    let vectors = sentence_table(&client);

    let records = client.scan("sentences", None).unwrap();
    assert_eq!(records.len(), 50);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.row_id.as_u64(), i as u64);
        assert_eq!(&record.vector[..], vectors[i].as_slice());
    }
}
