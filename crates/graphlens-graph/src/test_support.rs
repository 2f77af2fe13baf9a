//! Scripted query executor for unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use graphlens_core::{Params, Record};

use crate::executor::{ExecutorError, QueryExecutor};

type Reply = Result<Vec<Record>, ExecutorError>;

/// Answers queries from a list of `(fragment, reply)` rules. The first rule
/// whose fragment occurs in the query wins; unmatched queries return no
/// records. Every call is recorded.
#[derive(Default)]
pub struct ScriptedExecutor {
    rules: Vec<(String, Reply)>,
    calls: Mutex<Vec<(String, Params)>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, fragment: &str, records: Vec<Record>) -> Self {
        self.rules.push((fragment.to_string(), Ok(records)));
        self
    }

    pub fn fail(mut self, fragment: &str, err: ExecutorError) -> Self {
        self.rules.push((fragment.to_string(), Err(err)));
        self
    }

    pub fn calls(&self) -> Vec<(String, Params)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn queries_containing(&self, fragment: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|(q, _)| q)
            .filter(|q| q.contains(fragment))
            .collect()
    }
}

#[async_trait]
impl QueryExecutor for ScriptedExecutor {
    async fn execute(&self, query: &str, params: Params) -> Result<Vec<Record>, ExecutorError> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), params));
        self.rules
            .iter()
            .find(|(fragment, _)| query.contains(fragment.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// A record with a single `output` column.
pub fn output(value: Value) -> Record {
    record(serde_json::json!({ "output": value }))
}

/// A record from a JSON object literal.
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("record must be a JSON object, got {other}"),
    }
}
