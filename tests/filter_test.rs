use samyama_vector::{
    Client, DistanceMetric, ErrorKind, IndexKind, NewRow, Predicate, ScalarType, Schema, SearchRequest, Value,
};

const GENRES: [&str; 3] = ["jazz", "rock", "folk"];

fn catalog_client(index: IndexKind) -> Client {
    let client = Client::default();
    let schema = Schema::builder()
        .scalar("title", ScalarType::String)
        .scalar("genre", ScalarType::String)
        .scalar("year", ScalarType::Integer)
        .scalar("rating", ScalarType::Float)
        .scalar("explicit", ScalarType::Boolean)
        .vector("embedding", 2, DistanceMetric::L2, index)
        .build()
        .unwrap();
    client.create_table("tracks", schema).unwrap();

    let rows = (0..60)
        .map(|i| {
            let rating = if i % 10 == 9 { Value::Null } else { Value::from(i as f64 / 10.0) };
            NewRow::new(vec![i as f32, 0.0])
                .with("title", format!("track {}", i))
                .with("genre", GENRES[i % 3])
                .with("year", 1990 + (i as i64 % 30))
                .with("rating", rating)
                .with("explicit", i % 4 == 0)
        })
        .collect();
    client.insert("tracks", rows).unwrap();
    client
}

fn titles(rows: impl IntoIterator<Item = Option<Value>>) -> Vec<String> {
    rows.into_iter()
        .filter_map(|v| v.and_then(|v| v.as_string().map(str::to_string)))
        .collect()
}

#[test]
fn test_filtered_search_returns_only_matches() {
    for index in [IndexKind::Flat, IndexKind::Hnsw] {
        let client = catalog_client(index);
        let filter = Predicate::parse("genre = 'rock' AND year >= 2000").unwrap();
        let results = client.search("tracks", &[vec![30.0, 0.0]], 5, Some(&filter)).unwrap();

        let hits = &results[0];
        assert_eq!(hits.len(), 5);
        for hit in hits {
            assert_eq!(hit.get("genre"), Some(&Value::from("rock")));
            assert!(hit.get("year").and_then(Value::as_integer).unwrap() >= 2000);
        }
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }
}

#[test]
fn test_filtered_search_is_exact_on_flat() {
    let client = catalog_client(IndexKind::Flat);
    let filter = Predicate::eq("genre", "folk");
    let results = client.search("tracks", &[vec![0.0, 0.0]], 3, Some(&filter)).unwrap();
    let found = titles(results[0].iter().map(|h| h.get("title").cloned()));
    assert_eq!(found, vec!["track 2", "track 5", "track 8"]);
}

#[test]
fn test_filter_smaller_than_k() {
    for index in [IndexKind::Flat, IndexKind::Hnsw] {
        let client = catalog_client(index);
        let filter = Predicate::parse("title IN ('track 3', 'track 41')").unwrap();
        let results = client.search("tracks", &[vec![0.0, 0.0]], 10, Some(&filter)).unwrap();
        let found = titles(results[0].iter().map(|h| h.get("title").cloned()));
        assert_eq!(found, vec!["track 3", "track 41"]);
    }
}

#[test]
fn test_filter_matching_nothing() {
    let client = catalog_client(IndexKind::Hnsw);
    let filter = Predicate::parse("year > 3000").unwrap();
    let results = client.search("tracks", &[vec![1.0, 1.0]], 4, Some(&filter)).unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].is_empty());
}

#[test]
fn test_null_values_never_compare() {
    let client = catalog_client(IndexKind::Flat);

    let nulls = client.scan("tracks", Some(&Predicate::is_null("rating"))).unwrap();
    assert_eq!(nulls.len(), 6);

    let low = client.scan("tracks", Some(&Predicate::parse("rating < 100").unwrap())).unwrap();
    assert_eq!(low.len(), 54);

    let flipped = client
        .scan("tracks", Some(&Predicate::parse("NOT rating < 100").unwrap()))
        .unwrap();
    assert_eq!(flipped.len(), 6);

    let present = client
        .scan("tracks", Some(&Predicate::parse("rating IS NOT NULL").unwrap()))
        .unwrap();
    assert_eq!(present.len(), 54);
}

#[test]
fn test_boolean_and_integer_literals() {
    let client = catalog_client(IndexKind::Flat);
    let explicit = client
        .scan("tracks", Some(&Predicate::parse("explicit = true").unwrap()))
        .unwrap();
    assert_eq!(explicit.len(), 15);

    // Integer literal against a float column
    let top = client.scan("tracks", Some(&Predicate::parse("rating >= 5").unwrap())).unwrap();
    assert_eq!(top.len(), 9);
}

#[test]
fn test_or_and_precedence() {
    let client = catalog_client(IndexKind::Flat);
    let loose = Predicate::parse("genre = 'jazz' OR genre = 'rock' AND year < 1991").unwrap();
    let grouped = Predicate::parse("(genre = 'jazz' OR genre = 'rock') AND year < 1991").unwrap();

    // Only tracks 0 and 30 are from 1990, and both are jazz
    let loose_rows = client.scan("tracks", Some(&loose)).unwrap();
    let grouped_rows = client.scan("tracks", Some(&grouped)).unwrap();
    assert_eq!(loose_rows.len(), 20);
    assert_eq!(grouped_rows.len(), 2);
}

#[test]
fn test_invalid_filters_rejected_before_searching() {
    let client = catalog_client(IndexKind::Hnsw);
    let bad = [
        "composer = 'x'",
        "embedding = 1",
        "year = 'nineteen'",
        "explicit < true",
        "genre IN ()",
        "year = NULL",
    ];
    for text in bad {
        let err = match Predicate::parse(text) {
            Ok(filter) => client
                .search("tracks", &[vec![0.0, 0.0]], 1, Some(&filter))
                .unwrap_err(),
            Err(err) => err,
        };
        assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{}", text);
    }
}

#[test]
fn test_delete_by_filter_then_search() {
    for index in [IndexKind::Flat, IndexKind::Hnsw] {
        let client = catalog_client(index);
        let removed = client.delete("tracks", &Predicate::ne("genre", "jazz")).unwrap();
        assert_eq!(removed, 40);

        let results = client
            .search_with("tracks", &[vec![31.0, 0.0]], &SearchRequest::new(60).with_ef(120))
            .unwrap();
        assert_eq!(results[0].len(), 20);
        assert!(results[0].iter().all(|h| h.get("genre") == Some(&Value::from("jazz"))));
        assert_eq!(client.stats("tracks").unwrap().rows, 20);
    }
}
