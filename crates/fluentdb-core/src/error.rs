//! Error types for compiling and executing requests.

use std::time::Duration;

use fluentdb_model::{DynamoDBError, DynamoDBOperation};
use serde::Serialize;

/// Errors surfaced by the client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// An attribute path string could not be parsed.
    #[error("malformed attribute path `{path}`: {reason}")]
    MalformedPath {
        /// The offending path.
        path: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The request description is invalid and was never sent.
    #[error("validation error: {0}")]
    Validation(String),

    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A single attempt ran past its deadline.
    #[error("attempt deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// The request never reached the provider or its response was lost.
    #[error("transport error: {0}")]
    Transport(#[from] anyhow::Error),

    /// The provider rejected the request.
    #[error(transparent)]
    Service(#[from] DynamoDBError),

    /// A batch still had unprocessed entries when the retry budget ran out.
    #[error("{operation} left {remaining} unprocessed entries after {attempts} attempts")]
    UnprocessedRemainder {
        /// The batch operation.
        operation: DynamoDBOperation,
        /// Entries the provider never completed.
        remaining: usize,
        /// Submissions made for the chunk.
        attempts: u32,
    },

    /// An execution error annotated with the wire request that triggered it.
    #[error("{operation} request failed: {source}")]
    Request {
        /// The operation being executed.
        operation: DynamoDBOperation,
        /// The JSON-encoded wire request.
        request: String,
        /// The underlying failure.
        #[source]
        source: Box<ClientError>,
    },
}

/// Convenience result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    /// Shorthand for a [`ClientError::MalformedPath`].
    pub(crate) fn malformed_path(path: &str, reason: impl Into<String>) -> Self {
        Self::MalformedPath {
            path: path.to_owned(),
            reason: reason.into(),
        }
    }

    /// Whether another attempt may succeed.
    ///
    /// Deadlines, transport failures, provider internal errors and
    /// throttling are retryable. Everything else is terminal.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::DeadlineExceeded(_) | Self::Transport(_) => true,
            Self::Service(err) => err.is_transient(),
            Self::Request { source, .. } => source.is_retryable(),
            Self::MalformedPath { .. }
            | Self::Validation(_)
            | Self::Config(_)
            | Self::UnprocessedRemainder { .. } => false,
        }
    }

    /// The provider error behind this failure, if any.
    #[must_use]
    pub fn service_error(&self) -> Option<&DynamoDBError> {
        match self {
            Self::Service(err) => Some(err),
            Self::Request { source, .. } => source.service_error(),
            _ => None,
        }
    }

    /// Attach the wire request that produced this error.
    ///
    /// Errors that already carry a request are returned unchanged.
    #[must_use]
    pub fn with_request<T: Serialize>(self, operation: DynamoDBOperation, request: &T) -> Self {
        if matches!(self, Self::Request { .. }) {
            return self;
        }
        let request = serde_json::to_string(request)
            .unwrap_or_else(|e| format!("<request not serializable: {e}>"));
        Self::Request {
            operation,
            request,
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use fluentdb_model::{DynamoDBError, dynamodb_error};
    use serde_json::json;

    use super::*;

    #[test]
    fn test_should_classify_throttling_as_retryable() {
        let err = ClientError::from(DynamoDBError::throughput_exceeded("slow down"));
        assert!(err.is_retryable());
        let err = ClientError::from(dynamodb_error!(RequestLimitExceeded));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_should_classify_internal_and_transport_as_retryable() {
        assert!(ClientError::from(DynamoDBError::internal_error("boom")).is_retryable());
        assert!(ClientError::from(anyhow::anyhow!("connection reset")).is_retryable());
        assert!(ClientError::DeadlineExceeded(Duration::from_secs(1)).is_retryable());
    }

    #[test]
    fn test_should_classify_caller_errors_as_terminal() {
        let err = ClientError::from(DynamoDBError::conditional_check_failed("taken"));
        assert!(!err.is_retryable());
        assert!(!ClientError::from(DynamoDBError::validation("bad input")).is_retryable());
        assert!(!ClientError::Validation("bad key".to_owned()).is_retryable());
        assert!(!ClientError::malformed_path("a..b", "empty segment").is_retryable());
    }

    #[test]
    fn test_should_attach_request_once() {
        let err = ClientError::from(dynamodb_error!(ThrottlingException))
            .with_request(DynamoDBOperation::Scan, &json!({"TableName": "t"}))
            .with_request(DynamoDBOperation::Query, &json!({"TableName": "other"}));
        match &err {
            ClientError::Request {
                operation, request, ..
            } => {
                assert_eq!(*operation, DynamoDBOperation::Scan);
                assert_eq!(request, r#"{"TableName":"t"}"#);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_retryable());
        assert!(err.service_error().is_some());
    }
}
