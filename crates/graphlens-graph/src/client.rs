//! Neo4j connection management and the neo4rs-backed query executor.

use std::time::Duration;

use async_trait::async_trait;
use neo4rs::{BoltList, BoltMap, BoltNull, BoltString, BoltType, ConfigBuilder, Graph, Query};
use serde::Deserialize;
use serde_json::Value;

use graphlens_core::{Params, Record};

use crate::executor::{ExecutorError, QueryExecutor};

/// Errors from graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Could not connect to Neo4j database: {0}")]
    Connection(String),

    #[error(transparent)]
    Query(#[from] ExecutorError),

    #[error("Could not use {procedure} procedures. {hint}")]
    MissingCapability { procedure: String, hint: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Configuration for connecting to Neo4j.
///
/// Loaded from the `[neo4j]` section of `graphlens.toml`. An empty user and
/// password means authentication is disabled on the server.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// Database name; the server default when unset.
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,
    /// Client-side timeout applied to every query.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_user() -> String {
    "neo4j".to_string()
}

fn default_max_connections() -> u32 {
    16
}

fn default_fetch_size() -> usize {
    256
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            user: default_user(),
            password: String::new(),
            database: None,
            max_connections: default_max_connections(),
            fetch_size: default_fetch_size(),
            timeout_secs: None,
        }
    }
}

/// Thread-safe Neo4j client with connection pooling.
///
/// Dropping the last clone releases the pool. Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
    timeout: Option<Duration>,
}

impl GraphClient {
    /// Connect to Neo4j and verify the server answers queries.
    pub async fn connect(config: &GraphConfig) -> Result<Self, GraphError> {
        let mut builder = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections as usize)
            .fetch_size(config.fetch_size);
        if let Some(db) = &config.database {
            builder = builder.db(db.as_str());
        }
        let neo_config = builder.build().map_err(|e| {
            GraphError::Connection(format!(
                "{e}. Please ensure that the driver config is correct"
            ))
        })?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(connection_error)?;

        // The pool is lazy; force a real handshake so bad urls and
        // credentials fail here rather than on first use.
        graph
            .run(Query::new("RETURN 1".to_string()))
            .await
            .map_err(connection_error)?;

        tracing::info!(uri = %config.uri, "Connected to Neo4j");
        Ok(Self {
            graph,
            timeout: config.timeout_secs.map(Duration::from_secs),
        })
    }

    async fn fetch_all(&self, query: Query) -> Result<Vec<Record>, ExecutorError> {
        let mut stream = self.graph.execute(query).await.map_err(classify)?;
        let mut records = Vec::new();
        while let Some(row) = stream.next().await.map_err(classify)? {
            let record: Record = row
                .to()
                .map_err(|e| ExecutorError::Other(format!("Failed to decode row: {e}")))?;
            records.push(record);
        }
        Ok(records)
    }
}

#[async_trait]
impl QueryExecutor for GraphClient {
    async fn execute(&self, query: &str, params: Params) -> Result<Vec<Record>, ExecutorError> {
        let mut q = Query::new(query.to_string());
        for (key, value) in params {
            q = q.param(&key, json_to_bolt(value));
        }

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.fetch_all(q))
                .await
                .map_err(|_| ExecutorError::Timeout(limit))?,
            None => self.fetch_all(q).await,
        }
    }
}

/// Convert a JSON parameter value into its Bolt representation.
pub fn json_to_bolt(value: Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => BoltType::from(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => BoltType::from(i),
            None => BoltType::from(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => BoltType::from(s),
        Value::Array(items) => {
            let mut list = BoltList::with_capacity(items.len());
            for item in items {
                list.push(json_to_bolt(item));
            }
            BoltType::List(list)
        }
        Value::Object(map) => {
            let mut bolt = BoltMap::with_capacity(map.len());
            for (k, v) in map {
                bolt.put(BoltString::from(k), json_to_bolt(v));
            }
            BoltType::Map(bolt)
        }
    }
}

fn connection_error(err: neo4rs::Error) -> GraphError {
    let hint = match &err {
        neo4rs::Error::AuthenticationError(_) => {
            "Please ensure that the username and password are correct"
        }
        neo4rs::Error::InvalidConfig | neo4rs::Error::UrlParseError(_) => {
            "Please ensure that the driver config is correct"
        }
        _ => "Please ensure that the url is correct",
    };
    GraphError::Connection(format!("{err}. {hint}"))
}

/// Map a neo4rs error onto the executor taxonomy.
fn classify(err: neo4rs::Error) -> ExecutorError {
    match err {
        neo4rs::Error::ConnectionError | neo4rs::Error::IOError { .. } => {
            ExecutorError::Connection(err.to_string())
        }
        neo4rs::Error::AuthenticationError(msg) => ExecutorError::Connection(msg),
        neo4rs::Error::Neo4j(e) => ExecutorError::from_status(e.code(), e.message()),
        // Failures reported on PULL arrive as unparsed server messages.
        neo4rs::Error::UnexpectedMessage(msg) => match status_code(&msg) {
            Some(code) => ExecutorError::from_status(code, &msg),
            None => ExecutorError::Other(msg),
        },
        other => ExecutorError::Other(other.to_string()),
    }
}

/// Extract a `Neo.<Classification>.<Category>.<Title>` status code from an
/// error description.
fn status_code(text: &str) -> Option<&str> {
    let start = text.find("Neo.")?;
    let rest = &text[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '.'))
        .unwrap_or(rest.len());
    let code = rest[..end].trim_end_matches('.');
    (code.split('.').count() == 4).then_some(code)
}
