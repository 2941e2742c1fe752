use samyama_vector::{
    Client, DistanceMetric, EngineConfig, IndexKind, NewRow, Predicate, ScalarType, Schema, TableOptions, Value,
};

fn schema(index: IndexKind) -> Schema {
    Schema::builder()
        .scalar("sku", ScalarType::String)
        .scalar("price", ScalarType::Float)
        .vector("embedding", 3, DistanceMetric::L2, index)
        .build()
        .unwrap()
}

fn product(sku: &str, price: f64, vector: [f32; 3]) -> NewRow {
    NewRow::new(vector.to_vec()).with("sku", sku).with("price", price)
}

#[test]
fn test_duplicates_appended_by_default() {
    let client = Client::default();
    client.create_table("products", schema(IndexKind::Flat)).unwrap();
    client.insert("products", vec![product("a-1", 1.0, [0.0; 3])]).unwrap();
    client.insert("products", vec![product("a-1", 2.0, [1.0; 3])]).unwrap();
    assert_eq!(client.scan("products", None).unwrap().len(), 2);
}

#[test]
fn test_engine_wide_overwrite_policy() {
    for index in [IndexKind::Flat, IndexKind::Hnsw] {
        let client = Client::new(EngineConfig {
            allow_duplicates: false,
            ..Default::default()
        });
        client.create_table("products", schema(index)).unwrap();
        client
            .insert(
                "products",
                vec![product("a-1", 1.0, [0.0, 0.0, 0.0]), product("b-2", 5.0, [9.0, 9.0, 9.0])],
            )
            .unwrap();
        client.insert("products", vec![product("a-1", 1.5, [4.0, 4.0, 4.0])]).unwrap();

        let records = client.scan("products", Some(&Predicate::eq("sku", "a-1"))).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("price"), Some(&Value::Float(1.5)));

        // The overwritten vector no longer answers queries
        let hits = client.search("products", &[vec![0.0; 3]], 2, None).unwrap();
        let prices: Vec<_> = hits[0].iter().map(|h| h.get("price").cloned()).collect();
        assert_eq!(prices, vec![Some(Value::Float(1.5)), Some(Value::Float(5.0))]);
        assert_eq!(client.stats("products").unwrap().tombstones, 1);
    }
}

#[test]
fn test_table_option_overrides_engine_default() {
    let client = Client::new(EngineConfig {
        allow_duplicates: false,
        ..Default::default()
    });
    client
        .create_table_with(
            "log",
            schema(IndexKind::Flat),
            TableOptions::default().allow_duplicates(true),
        )
        .unwrap();
    client
        .insert("log", vec![product("x", 1.0, [0.0; 3]), product("x", 1.0, [0.0; 3])])
        .unwrap();
    assert_eq!(client.scan("log", None).unwrap().len(), 2);
    assert!(!client.get_table("log").unwrap().rejects_duplicates());
}

#[test]
fn test_last_row_of_a_batch_wins() {
    let client = Client::default();
    client
        .create_table_with(
            "products",
            schema(IndexKind::Hnsw),
            TableOptions::default().allow_duplicates(false),
        )
        .unwrap();
    let stored = client
        .insert(
            "products",
            vec![
                product("a-1", 1.0, [0.0; 3]),
                product("a-1", 2.0, [1.0; 3]),
                product("a-1", 3.0, [2.0; 3]),
            ],
        )
        .unwrap();
    assert_eq!(stored, 1);

    let records = client.scan("products", None).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("price"), Some(&Value::Float(3.0)));
    assert_eq!(&records[0].vector[..], &[2.0, 2.0, 2.0]);
}

#[test]
fn test_key_column_selects_identity() {
    let client = Client::default();
    client
        .create_table_with(
            "products",
            schema(IndexKind::Flat),
            TableOptions::default().allow_duplicates(false).key_column("price"),
        )
        .unwrap();
    client
        .insert("products", vec![product("a", 1.0, [0.0; 3]), product("b", 2.0, [0.0; 3])])
        .unwrap();
    client.insert("products", vec![product("c", 1.0, [0.0; 3])]).unwrap();

    let skus: Vec<_> = client
        .scan("products", None)
        .unwrap()
        .into_iter()
        .filter_map(|r| r.get("sku").and_then(Value::as_string).map(str::to_string))
        .collect();
    assert_eq!(skus, vec!["b", "c"]);
}
