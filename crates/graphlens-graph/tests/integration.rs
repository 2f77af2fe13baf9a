//! Integration tests for graphlens-graph against a live Neo4j instance with
//! the APOC plugin.
//!
//! Run with: cargo test --package graphlens-graph --test integration -- --ignored
//!
//! Connection settings come from `GraphConfig::default()`, overridable with
//! `GRAPHLENS_TEST_NEO4J_URI` and `GRAPHLENS_TEST_NEO4J_PASSWORD`. Skipped
//! automatically if Neo4j is not available.

use serde_json::{json, Map, Value};

use graphlens_core::{GraphDocument, GraphNode, Params, SchemaConfig, SourceDocument};
use graphlens_graph::{
    node_import_query, rel_import_query, GraphClient, GraphConfig, GraphStore, Neo4jGraph,
    QueryExecutor,
};

fn test_config() -> GraphConfig {
    let mut config = GraphConfig::default();
    if let Ok(uri) = std::env::var("GRAPHLENS_TEST_NEO4J_URI") {
        config.uri = uri;
    }
    if let Ok(password) = std::env::var("GRAPHLENS_TEST_NEO4J_PASSWORD") {
        config.password = password;
    }
    config
}

async fn connect_or_skip() -> Option<GraphClient> {
    match GraphClient::connect(&test_config()).await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test (Neo4j not available): {e}");
            None
        }
    }
}

/// Random id prefix so concurrent runs never touch each other's nodes.
fn unique_prefix() -> String {
    format!("it-{}-", uuid::Uuid::new_v4())
}

async fn cleanup(client: &GraphClient, prefix: &str) {
    let mut params = Params::new();
    params.insert("prefix".into(), json!(prefix));
    let _ = client
        .execute(
            "MATCH (n) WHERE n.id STARTS WITH $prefix DETACH DELETE n",
            params,
        )
        .await;
}

fn data_param(rows: Value) -> Params {
    let mut params = Params::new();
    params.insert("data".into(), rows);
    params
}

async fn single_count(client: &GraphClient, query: &str, prefix: &str) -> i64 {
    let mut params = Params::new();
    params.insert("prefix".into(), json!(prefix));
    let records = client.execute(query, params).await.unwrap();
    records[0]["c"].as_i64().unwrap()
}

#[tokio::test]
#[ignore = "requires live Neo4j with APOC"]
async fn test_common_label_node_import_is_idempotent() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let prefix = unique_prefix();
    cleanup(&client, &prefix).await;

    let id = format!("{prefix}n1");
    let rows = json!([{"id": id, "type": "Person", "properties": {"name": "Ann"}}]);
    let query = node_import_query(true, false);

    client.execute(&query, data_param(rows.clone())).await.unwrap();
    client.execute(&query, data_param(rows)).await.unwrap();

    let count = single_count(
        &client,
        "MATCH (n:`__Entity__`:Person) WHERE n.id STARTS WITH $prefix RETURN count(n) AS c",
        &prefix,
    )
    .await;
    assert_eq!(count, 1);

    let mut params = Params::new();
    params.insert("id".into(), json!(id));
    let records = client
        .execute("MATCH (n {id: $id}) RETURN n.name AS name", params)
        .await
        .unwrap();
    assert_eq!(records[0]["name"], json!("Ann"));

    cleanup(&client, &prefix).await;
}

#[tokio::test]
#[ignore = "requires live Neo4j with APOC"]
async fn test_own_label_import_with_relationships_is_idempotent() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let prefix = unique_prefix();
    cleanup(&client, &prefix).await;

    let nodes = json!([
        {"id": format!("{prefix}a"), "type": "Person", "properties": {"name": "Ann"}},
        {"id": format!("{prefix}b"), "type": "City", "properties": {"name": "Oslo"}}
    ]);
    let rels = json!([{
        "source": format!("{prefix}a"),
        "source_label": "Person",
        "target": format!("{prefix}b"),
        "target_label": "City",
        "type": "LIVES_IN",
        "properties": {"since": 2020}
    }]);

    for _ in 0..2 {
        client
            .execute(&node_import_query(false, false), data_param(nodes.clone()))
            .await
            .unwrap();
        client
            .execute(&rel_import_query(false), data_param(rels.clone()))
            .await
            .unwrap();
    }

    let nodes = single_count(
        &client,
        "MATCH (n) WHERE n.id STARTS WITH $prefix RETURN count(n) AS c",
        &prefix,
    )
    .await;
    assert_eq!(nodes, 2);
    let rels = single_count(
        &client,
        "MATCH (a)-[r:LIVES_IN]->(b) WHERE a.id STARTS WITH $prefix RETURN count(r) AS c",
        &prefix,
    )
    .await;
    assert_eq!(rels, 1);

    let entities = single_count(
        &client,
        "MATCH (n:`__Entity__`) WHERE n.id STARTS WITH $prefix RETURN count(n) AS c",
        &prefix,
    )
    .await;
    assert_eq!(entities, 0);

    cleanup(&client, &prefix).await;
}

#[tokio::test]
#[ignore = "requires live Neo4j with APOC"]
async fn test_import_then_refresh_shows_schema() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let prefix = unique_prefix();
    cleanup(&client, &prefix).await;

    let config = SchemaConfig {
        enhanced_schema: true,
        ..SchemaConfig::default()
    };
    let store = Neo4jGraph::new(client.clone(), config);

    let mut properties = Map::new();
    properties.insert("name".into(), json!("Ann"));
    let document = GraphDocument {
        nodes: vec![GraphNode {
            id: format!("{prefix}ann"),
            node_type: "IntegrationPerson".to_string(),
            properties,
        }],
        relationships: vec![],
        source: SourceDocument {
            page_content: format!("{prefix} Ann is a person."),
            metadata: Map::new(),
        },
    };

    let summary = store
        .add_graph_documents(&[document], true, true)
        .await
        .unwrap();
    assert_eq!(summary.nodes, 1);

    store.refresh_schema().await.unwrap();
    let structured = store.structured_schema();
    assert!(structured.node_props.contains_key("IntegrationPerson"));
    assert!(!structured.node_props.contains_key("__Entity__"));
    assert!(store.schema().contains("**IntegrationPerson**"));
    assert!(structured
        .relationships
        .iter()
        .any(|r| r.start == "Document" && r.rel_type == "MENTIONS"));

    let mut params = Params::new();
    params.insert("prefix".into(), json!(prefix));
    let _ = client
        .execute(
            "MATCH (d:Document) WHERE d.text STARTS WITH $prefix DETACH DELETE d",
            params,
        )
        .await;
    cleanup(&client, &prefix).await;
    store.close();
}
