use std::path::{Path, PathBuf};

use bson::{Bson, doc};
use serde::Deserialize;
use serde_json::json;

use docstore::{chart::PlottersRenderer, memory::InMemoryConnector, prelude::*};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .try_init();
}

async fn connected() -> StoreClient<InMemoryConnector> {
    init_tracing();

    let mut client = StoreClient::in_memory(ClientConfig::default());
    client.connect().await.unwrap();
    client
}

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

const PEOPLE: &str = "{\"name\":\"A\"}\n{\"name\":\"B\"}\n{\"name\":\"C\"}";

fn names(documents: &[Document]) -> Vec<String> {
    documents
        .iter()
        .filter_map(|doc| doc.get("name").and_then(Bson::as_str))
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn ingest_then_size_and_find() {
    let client = connected().await;

    assert_eq!(client.ingest("T", PEOPLE.as_bytes(), false).await.unwrap(), 3);
    assert_eq!(client.size("T").await.unwrap(), 3);

    let all = client.find("T", FindQuery::new(), false).await.unwrap();
    assert_eq!(names(&all), ["A", "B", "C"]);
}

#[tokio::test]
async fn match_then_count() {
    let client = connected().await;
    client.ingest("T", PEOPLE.as_bytes(), false).await.unwrap();

    let counted = client
        .aggregate(
            "T",
            Pipeline::new()
                .stage(doc! { "$match": { "name": "A" } })
                .stage(doc! { "$count": "n" }),
            true,
        )
        .await
        .unwrap();
    assert_eq!(counted, vec![doc! { "n": 1 }]);
}

#[tokio::test]
async fn find_without_matches_is_empty() {
    let client = connected().await;
    client.ingest("T", PEOPLE.as_bytes(), false).await.unwrap();

    let query = FindQuery::builder().filter(doc! { "name": "Z" }).build();
    assert!(client.find("T", query, true).await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_ingest_changes_nothing() {
    let client = connected().await;
    client.ingest("T", PEOPLE.as_bytes(), false).await.unwrap();

    let err = client
        .ingest("T", "{\"name\":\"D\"}\n{\"name\":".as_bytes(), true)
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::Format { line: 2, .. }), "{err:?}");
    assert_eq!(client.size("T").await.unwrap(), 3);
}

#[tokio::test]
async fn flush_empties_but_keeps_the_collection() {
    let client = connected().await;
    client.ingest("T", PEOPLE.as_bytes(), false).await.unwrap();

    assert_eq!(client.flush("T").await.unwrap(), 3);
    assert_eq!(client.size("T").await.unwrap(), 0);
    assert_eq!(client.list_collections().await.unwrap(), ["T"]);
}

#[tokio::test]
async fn drop_then_resolve_gives_a_fresh_collection() {
    let client = connected().await;
    client.ingest("T", PEOPLE.as_bytes(), false).await.unwrap();

    client.drop_collection("T").await.unwrap();
    assert!(client.list_collections().await.unwrap().is_empty());
    client.drop_collection("T").await.unwrap();

    let handle = client.resolve_collection("T").await.unwrap();
    assert_eq!(handle.name(), "T");
    assert_eq!(client.size("T").await.unwrap(), 0);
    assert_eq!(client.list_collections().await.unwrap(), ["T"]);
}

#[tokio::test]
async fn resolve_is_idempotent() {
    let client = connected().await;

    client.resolve_collection("T").await.unwrap();
    client.resolve_collection("T").await.unwrap();
    client.ingest("T", PEOPLE.as_bytes(), false).await.unwrap();
    client.resolve_collection("T").await.unwrap();

    assert_eq!(client.list_collections().await.unwrap(), ["T"]);
    assert_eq!(client.size("T").await.unwrap(), 3);
}

#[tokio::test]
async fn size_of_missing_collection_is_zero_and_creates_nothing() {
    let client = connected().await;

    assert_eq!(client.size("nothing").await.unwrap(), 0);
    assert_eq!(client.flush("nothing").await.unwrap(), 0);
    assert!(client.list_collections().await.unwrap().is_empty());
}

#[tokio::test]
async fn create_collection_is_strict() {
    let client = connected().await;

    client.create_collection("T").await.unwrap();
    let err = client.create_collection("T").await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::CollectionAlreadyExists(ref name) if name == "T"));
}

#[tokio::test]
async fn empty_ingest_with_clear_first_empties_the_collection() {
    let client = connected().await;
    client.ingest("T", PEOPLE.as_bytes(), false).await.unwrap();

    assert_eq!(client.ingest("T", "\n  \n".as_bytes(), true).await.unwrap(), 0);
    assert_eq!(client.size("T").await.unwrap(), 0);

    assert_eq!(client.ingest("U", "".as_bytes(), false).await.unwrap(), 0);
    assert!(client.list_collections().await.unwrap().contains(&"U".to_string()));
}

#[tokio::test]
async fn ingest_with_clear_first_replaces_contents() {
    let client = connected().await;
    client.ingest("T", PEOPLE.as_bytes(), false).await.unwrap();

    assert_eq!(client.ingest("T", "{\"name\":\"D\"}".as_bytes(), true).await.unwrap(), 1);
    assert_eq!(names(&client.find("T", FindQuery::new(), false).await.unwrap()), ["D"]);
}

#[tokio::test]
async fn connect_failure_is_not_fatal() {
    init_tracing();

    let mut client = StoreClient::new(InMemoryConnector::unreachable(), ClientConfig::default());

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::Connection(_)));
    assert!(!client.is_connected());

    let err = client.size("T").await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::NotConnected));
}

#[tokio::test]
async fn operations_need_a_connection() {
    init_tracing();

    let mut client = StoreClient::in_memory(ClientConfig::default());

    assert!(matches!(client.resolve_collection("T").await, Err(DocumentStoreError::NotConnected)));
    assert!(matches!(client.ingest("T", PEOPLE.as_bytes(), false).await, Err(DocumentStoreError::NotConnected)));
    assert!(matches!(client.find("T", FindQuery::new(), false).await, Err(DocumentStoreError::NotConnected)));
    assert!(matches!(client.aggregate("T", Pipeline::new(), false).await, Err(DocumentStoreError::NotConnected)));
    assert!(matches!(client.flush("T").await, Err(DocumentStoreError::NotConnected)));
    assert!(matches!(client.drop_collection("T").await, Err(DocumentStoreError::NotConnected)));
    assert!(matches!(client.disconnect().await, Err(DocumentStoreError::NotConnected)));
}

#[tokio::test]
async fn reconnecting_finds_the_same_data() {
    let mut client = connected().await;
    client.ingest("T", PEOPLE.as_bytes(), false).await.unwrap();

    client.connect().await.unwrap();
    assert!(client.is_connected());

    client.disconnect().await.unwrap();
    assert!(!client.is_connected());
    assert!(matches!(client.disconnect().await, Err(DocumentStoreError::NotConnected)));

    client.connect().await.unwrap();
    assert_eq!(client.size("T").await.unwrap(), 3);
    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn find_with_projection_and_limit() {
    let client = connected().await;
    client.ingest_file("restaurants", fixture("restaurants.jsonl"), false).await.unwrap();

    let query = FindQuery::builder()
        .filter(doc! { "borough": "Brooklyn" })
        .projection(doc! { "name": 1, "_id": 0 })
        .limit(2)
        .build();

    assert_eq!(
        client.find("restaurants", query, true).await.unwrap(),
        vec![doc! { "name": "Wendy'S" }, doc! { "name": "Riviera Caterer" }]
    );
}

#[tokio::test]
async fn typed_filters_and_decoding() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct Restaurant {
        name: String,
        borough: String,
    }

    let client = connected().await;
    client.ingest_file("restaurants", fixture("restaurants.jsonl"), false).await.unwrap();

    let query = FindQuery::builder()
        .filter(Filter::eq("borough", "Queens").and(Filter::eq("cuisine", "American")))
        .build();
    let found: Vec<Restaurant> = client.find_as("restaurants", query).await.unwrap();
    assert_eq!(
        found,
        vec![Restaurant { name: "Brunos On The Boulevard".into(), borough: "Queens".into() }]
    );

    let low_scores = FindQuery::builder()
        .filter(Filter::lt("grades.score", 3).and(Filter::eq("borough", "Bronx")))
        .build();
    let found = client.find("restaurants", low_scores, false).await.unwrap();
    assert_eq!(names(&found), ["Morris Park Bake Shop"]);
}

#[tokio::test]
async fn rejected_pipeline_is_a_query_error() {
    let client = connected().await;
    client.ingest("T", PEOPLE.as_bytes(), false).await.unwrap();

    let err = client
        .aggregate("T", Pipeline::new().stage(doc! { "$bogus": {} }), false)
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::Query(_)));

    let query = FindQuery::builder().filter(doc! { "name": { "$regexp": "A" } }).build();
    let err = client.find("T", query, false).await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::Query(_)));
}

#[tokio::test]
async fn missing_fixture_is_an_io_error() {
    let client = connected().await;

    let err = client
        .ingest_file("restaurants", fixture("missing.jsonl"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::Io(ref message) if message.contains("missing.jsonl")));
}

#[tokio::test]
async fn restaurants_by_borough_and_cuisine() {
    let client = connected().await;

    if client.size("restaurants_collection").await.unwrap() == 0 {
        let loaded = client
            .ingest_file("restaurants_collection", fixture("restaurants.jsonl"), false)
            .await
            .unwrap();
        assert_eq!(loaded, 12);
    }

    let pipeline = Pipeline::from_json(json!([
        { "$group": { "_id": { "borough": "$borough", "cuisine": "$cuisine" }, "count": { "$sum": 1 } } },
        { "$project": { "borough": "$_id.borough", "cuisine": "$_id.cuisine", "count": "$count", "_id": 0 } },
        { "$sort": { "count": -1, "borough": 1, "cuisine": 1 } }
    ]))
    .unwrap();

    let results = client
        .aggregate("restaurants_collection", pipeline, true)
        .await
        .unwrap();

    assert_eq!(results.len(), 10);
    assert_eq!(results[0], doc! { "borough": "Bronx", "cuisine": "Bakery", "count": Bson::Int64(2) });
    assert_eq!(results[1], doc! { "borough": "Brooklyn", "cuisine": "American", "count": Bson::Int64(2) });
    assert_eq!(results[9], doc! { "borough": "Staten Island", "cuisine": "Jewish/Kosher", "count": Bson::Int64(1) });

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("mongo_visualization.svg");
    let spec = ChartSpec::new("borough", "count", "cuisine")
        .with_title("Restaurant Count by Cuisine in NYC Boroughs");

    client.render(&results, &spec, Some(&output)).unwrap();

    let svg = std::fs::read_to_string(&output).unwrap();
    assert!(svg.contains("Staten Island"));
}

#[tokio::test]
async fn render_needs_no_connection_but_valid_fields() {
    init_tracing();

    let client = StoreClient::in_memory(ClientConfig::default())
        .with_renderer(PlottersRenderer::new().with_size(320, 240));
    let rows = vec![
        doc! { "borough": "Bronx", "cuisine": "Bakery", "count": 2 },
        doc! { "borough": "Queens", "count": 1 },
    ];
    let spec = ChartSpec::new("borough", "count", "cuisine");

    client.render(&rows[..1], &spec, None).unwrap();

    let err = client.render(&rows, &spec, None).unwrap_err();
    assert!(matches!(err, DocumentStoreError::Render(ref message) if message.contains("record 1")));

    let dir = tempfile::tempdir().unwrap();
    let err = client
        .render(&rows[..1], &spec, Some(&dir.path().join("chart.tiff")))
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::Render(_)));
}

#[tokio::test]
async fn render_saves_png() {
    init_tracing();

    let client = StoreClient::in_memory(ClientConfig::default())
        .with_renderer(PlottersRenderer::new().with_size(480, 320));
    let rows = vec![
        doc! { "borough": "Bronx", "cuisine": "Bakery", "count": 2 },
        doc! { "borough": "Brooklyn", "cuisine": "American", "count": 2 },
        doc! { "borough": "Brooklyn", "cuisine": "Bakery", "count": 1 },
    ];
    let spec = ChartSpec::new("borough", "count", "cuisine");

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("mongo_visualization.png");

    client.render(&rows, &spec, Some(&output)).unwrap();

    let image = std::fs::read(&output).unwrap();
    assert!(image.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]));
}
