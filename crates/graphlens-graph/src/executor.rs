//! The query executor seam: submit a parameterized query, get records back.

use std::time::Duration;

use async_trait::async_trait;

use graphlens_core::{Params, Record};

/// Errors reported by a query executor, classified by what the caller can
/// do about them.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecutorError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Procedure not found: {0}")]
    ProcedureNotFound(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Query cannot run in this transaction mode: {0}")]
    TransactionShape(String),

    #[error("Neo4j connection error: {0}")]
    Connection(String),

    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Neo4j query error: {0}")]
    Other(String),
}

impl ExecutorError {
    /// Classify a server failure from its status code and message.
    pub fn from_status(code: &str, message: &str) -> Self {
        let detail = format!("{code}: {message}");
        match code {
            "Neo.ClientError.Security.Unauthorized"
            | "Neo.ClientError.Security.AuthenticationRateLimit" => Self::Connection(detail),
            c if c.starts_with("Neo.ClientError.Security.") => Self::PermissionDenied(detail),
            "Neo.ClientError.Procedure.ProcedureNotFound" => Self::ProcedureNotFound(detail),
            "Neo.ClientError.Statement.TypeError" => Self::TypeMismatch(detail),
            "Neo.DatabaseError.Statement.ExecutionFailed"
            | "Neo.DatabaseError.Transaction.TransactionStartFailed"
                if message.contains("in an implicit transaction") =>
            {
                Self::TransactionShape(detail)
            }
            "Neo.ClientError.Statement.SemanticError"
                if message.contains("in an open transaction is not possible")
                    || message.contains("tried to execute in an explicit transaction") =>
            {
                Self::TransactionShape(detail)
            }
            _ => Self::Other(detail),
        }
    }

    /// Failures that invalidate the whole session, not just one query.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }
}

/// Anything that can run a parameterized Cypher query.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run `query` with `params` and collect every record.
    async fn execute(&self, query: &str, params: Params) -> Result<Vec<Record>, ExecutorError>;
}

#[async_trait]
impl<T: QueryExecutor + ?Sized> QueryExecutor for std::sync::Arc<T> {
    async fn execute(&self, query: &str, params: Params) -> Result<Vec<Record>, ExecutorError> {
        (**self).execute(query, params).await
    }
}

/// Build a parameter map from `(name, value)` pairs.
pub fn params<I, K>(pairs: I) -> Params
where
    I: IntoIterator<Item = (K, serde_json::Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_permission_errors() {
        let err = ExecutorError::from_status(
            "Neo.ClientError.Security.Forbidden",
            "Schema operations are not allowed for user 'reader'",
        );
        assert!(matches!(err, ExecutorError::PermissionDenied(_)));
        assert!(!err.is_fatal());

        let err = ExecutorError::from_status("Neo.ClientError.Security.Unauthorized", "bad auth");
        assert!(matches!(err, ExecutorError::Connection(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_classify_procedure_and_type_errors() {
        let err = ExecutorError::from_status(
            "Neo.ClientError.Procedure.ProcedureNotFound",
            "There is no procedure with the name `apoc.meta.data`",
        );
        assert!(matches!(err, ExecutorError::ProcedureNotFound(_)));

        let err = ExecutorError::from_status(
            "Neo.ClientError.Statement.TypeError",
            "Can't coerce `Long(1)` to String",
        );
        assert!(matches!(err, ExecutorError::TypeMismatch(_)));
    }

    #[test]
    fn test_classify_transaction_shape() {
        let err = ExecutorError::from_status(
            "Neo.DatabaseError.Statement.ExecutionFailed",
            "CALL { ... } IN TRANSACTIONS can only be executed in an implicit transaction",
        );
        assert!(matches!(err, ExecutorError::TransactionShape(_)));

        let err = ExecutorError::from_status(
            "Neo.ClientError.Statement.SemanticError",
            "Executing queries that use periodic commit in an open transaction is not possible.",
        );
        assert!(matches!(err, ExecutorError::TransactionShape(_)));

        let err = ExecutorError::from_status(
            "Neo.DatabaseError.Statement.ExecutionFailed",
            "something else",
        );
        assert!(matches!(err, ExecutorError::Other(_)));
    }

    #[test]
    fn test_params_builder() {
        let p = params([("label", serde_json::json!("Person"))]);
        assert_eq!(p.get("label"), Some(&serde_json::json!("Person")));
    }
}
