//! Provider error taxonomy.
//!
//! The service reports failures as a JSON body whose `__type` field carries a
//! fully-qualified error name such as
//! `com.amazonaws.dynamodb.v20120810#ProvisionedThroughputExceededException`.
//! The client side only needs the short code and the HTTP status to decide
//! whether a failure is worth retrying.

use std::fmt;

use serde::Deserialize;

/// Well-known provider error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum DynamoDBErrorCode {
    /// Table or index not found.
    ResourceNotFoundException,
    /// Condition expression evaluated to false.
    ConditionalCheckFailedException,
    /// Transaction canceled.
    TransactionCanceledException,
    /// Transaction conflict.
    TransactionConflictException,
    /// Transaction in progress.
    TransactionInProgressException,
    /// Item collection too large.
    ItemCollectionSizeLimitExceededException,
    /// Provisioned throughput exceeded.
    ProvisionedThroughputExceededException,
    /// Account-level request rate exceeded.
    RequestLimitExceeded,
    /// Generic throttling.
    ThrottlingException,
    /// Request failed validation.
    #[default]
    ValidationException,
    /// Malformed request body.
    SerializationException,
    /// Server-side failure.
    InternalServerError,
    /// Service temporarily unavailable.
    ServiceUnavailable,
    /// Credentials rejected.
    AccessDeniedException,
    /// Unknown operation or client.
    UnrecognizedClientException,
    /// Any code this crate does not know about.
    Unknown,
}

impl DynamoDBErrorCode {
    /// Returns the short error code string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResourceNotFoundException => "ResourceNotFoundException",
            Self::ConditionalCheckFailedException => "ConditionalCheckFailedException",
            Self::TransactionCanceledException => "TransactionCanceledException",
            Self::TransactionConflictException => "TransactionConflictException",
            Self::TransactionInProgressException => "TransactionInProgressException",
            Self::ItemCollectionSizeLimitExceededException => {
                "ItemCollectionSizeLimitExceededException"
            }
            Self::ProvisionedThroughputExceededException => {
                "ProvisionedThroughputExceededException"
            }
            Self::RequestLimitExceeded => "RequestLimitExceeded",
            Self::ThrottlingException => "ThrottlingException",
            Self::ValidationException => "ValidationException",
            Self::SerializationException => "SerializationException",
            Self::InternalServerError => "InternalServerError",
            Self::ServiceUnavailable => "ServiceUnavailable",
            Self::AccessDeniedException => "AccessDeniedException",
            Self::UnrecognizedClientException => "UnrecognizedClientException",
            Self::Unknown => "Unknown",
        }
    }

    /// Parse a `__type` value, with or without its namespace prefix.
    #[must_use]
    pub fn from_type(error_type: &str) -> Self {
        let short = error_type
            .rsplit_once('#')
            .map_or(error_type, |(_, name)| name);
        match short {
            "ResourceNotFoundException" => Self::ResourceNotFoundException,
            "ConditionalCheckFailedException" => Self::ConditionalCheckFailedException,
            "TransactionCanceledException" => Self::TransactionCanceledException,
            "TransactionConflictException" => Self::TransactionConflictException,
            "TransactionInProgressException" => Self::TransactionInProgressException,
            "ItemCollectionSizeLimitExceededException" => {
                Self::ItemCollectionSizeLimitExceededException
            }
            "ProvisionedThroughputExceededException" => {
                Self::ProvisionedThroughputExceededException
            }
            "RequestLimitExceeded" => Self::RequestLimitExceeded,
            "ThrottlingException" => Self::ThrottlingException,
            "ValidationException" => Self::ValidationException,
            "SerializationException" => Self::SerializationException,
            "InternalServerError" | "InternalFailure" => Self::InternalServerError,
            "ServiceUnavailable" | "ServiceUnavailableException" => Self::ServiceUnavailable,
            "AccessDeniedException" => Self::AccessDeniedException,
            "UnrecognizedClientException" => Self::UnrecognizedClientException,
            _ => Self::Unknown,
        }
    }

    /// Throughput and rate-limit rejections.
    #[must_use]
    pub fn is_throttling(&self) -> bool {
        matches!(
            self,
            Self::ProvisionedThroughputExceededException
                | Self::RequestLimitExceeded
                | Self::ThrottlingException
        )
    }

    /// Failures on the provider side rather than in the request.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::InternalServerError | Self::ServiceUnavailable)
    }
}

impl fmt::Display for DynamoDBErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error reported by the provider.
#[derive(Debug, Clone)]
pub struct DynamoDBError {
    /// The error code.
    pub code: DynamoDBErrorCode,
    /// A human-readable error message.
    pub message: String,
    /// The HTTP status code of the response.
    pub status_code: http::StatusCode,
}

impl fmt::Display for DynamoDBError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.status_code, self.message)
    }
}

impl std::error::Error for DynamoDBError {}

/// The JSON error body returned by the service.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type", default)]
    error_type: String,
    #[serde(alias = "Message", default)]
    message: String,
}

impl DynamoDBError {
    /// Create an error with a custom message and the code's usual status.
    #[must_use]
    pub fn new(code: DynamoDBErrorCode, message: impl Into<String>) -> Self {
        let status_code = if code.is_internal() {
            http::StatusCode::INTERNAL_SERVER_ERROR
        } else {
            http::StatusCode::BAD_REQUEST
        };
        Self {
            code,
            message: message.into(),
            status_code,
        }
    }

    /// Override the HTTP status code.
    #[must_use]
    pub fn with_status(mut self, status_code: http::StatusCode) -> Self {
        self.status_code = status_code;
        self
    }

    /// Decode an error response body.
    ///
    /// Bodies that are not valid JSON become an `Unknown` error carrying the
    /// raw text, so the status code still drives classification.
    #[must_use]
    pub fn from_response(status_code: http::StatusCode, body: &[u8]) -> Self {
        match serde_json::from_slice::<ErrorBody>(body) {
            Ok(parsed) => Self {
                code: DynamoDBErrorCode::from_type(&parsed.error_type),
                message: parsed.message,
                status_code,
            },
            Err(_) => Self {
                code: DynamoDBErrorCode::Unknown,
                message: String::from_utf8_lossy(body).into_owned(),
                status_code,
            },
        }
    }

    /// Provider-side or throttling failure that a later attempt may not hit.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.code.is_throttling() || self.code.is_internal() || self.status_code.is_server_error()
    }

    /// Condition expression evaluated to false.
    #[must_use]
    pub fn conditional_check_failed(message: impl Into<String>) -> Self {
        Self::new(DynamoDBErrorCode::ConditionalCheckFailedException, message)
    }

    /// Request rejected as invalid.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(DynamoDBErrorCode::ValidationException, message)
    }

    /// Throughput exceeded.
    #[must_use]
    pub fn throughput_exceeded(message: impl Into<String>) -> Self {
        Self::new(DynamoDBErrorCode::ProvisionedThroughputExceededException, message)
    }

    /// Internal server error.
    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(DynamoDBErrorCode::InternalServerError, message)
    }
}

/// Create a `DynamoDBError` from an error code name.
///
/// # Examples
///
/// ```
/// use fluentdb_model::dynamodb_error;
/// use fluentdb_model::error::DynamoDBErrorCode;
///
/// let err = dynamodb_error!(ThrottlingException);
/// assert_eq!(err.code, DynamoDBErrorCode::ThrottlingException);
///
/// let err = dynamodb_error!(ResourceNotFoundException, "no such table");
/// assert_eq!(err.message, "no such table");
/// ```
#[macro_export]
macro_rules! dynamodb_error {
    ($code:ident) => {
        $crate::error::DynamoDBError::new(
            $crate::error::DynamoDBErrorCode::$code,
            $crate::error::DynamoDBErrorCode::$code.as_str(),
        )
    };
    ($code:ident, $msg:expr) => {
        $crate::error::DynamoDBError::new($crate::error::DynamoDBErrorCode::$code, $msg)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_qualified_error_type() {
        let code = DynamoDBErrorCode::from_type(
            "com.amazonaws.dynamodb.v20120810#ProvisionedThroughputExceededException",
        );
        assert_eq!(code, DynamoDBErrorCode::ProvisionedThroughputExceededException);
        assert!(code.is_throttling());
    }

    #[test]
    fn test_should_parse_bare_error_type() {
        assert_eq!(
            DynamoDBErrorCode::from_type("ValidationException"),
            DynamoDBErrorCode::ValidationException
        );
        assert_eq!(
            DynamoDBErrorCode::from_type("SomethingNew"),
            DynamoDBErrorCode::Unknown
        );
    }

    #[test]
    fn test_should_decode_error_body() {
        let body = br#"{"__type":"com.amazon.coral.service#InternalFailure","message":"boom"}"#;
        let err = DynamoDBError::from_response(http::StatusCode::INTERNAL_SERVER_ERROR, body);
        assert_eq!(err.code, DynamoDBErrorCode::InternalServerError);
        assert_eq!(err.message, "boom");
        assert!(err.is_transient());
    }

    #[test]
    fn test_should_treat_unknown_5xx_as_transient() {
        let err = DynamoDBError::from_response(http::StatusCode::BAD_GATEWAY, b"<html>");
        assert_eq!(err.code, DynamoDBErrorCode::Unknown);
        assert!(err.is_transient());
    }

    #[test]
    fn test_should_pick_status_from_code() {
        let err = DynamoDBError::internal_error("boom");
        assert_eq!(err.code, DynamoDBErrorCode::InternalServerError);
        assert_eq!(err.status_code, http::StatusCode::INTERNAL_SERVER_ERROR);

        let err = DynamoDBError::validation("bad key");
        assert_eq!(err.code, DynamoDBErrorCode::ValidationException);
        assert_eq!(err.status_code, http::StatusCode::BAD_REQUEST);
        assert!(!err.is_transient());

        let err = DynamoDBError::throughput_exceeded("slow down");
        assert!(err.is_transient());
    }

    #[test]
    fn test_should_classify_overridden_5xx_as_transient() {
        let err = DynamoDBError::conditional_check_failed("taken")
            .with_status(http::StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code, DynamoDBErrorCode::ConditionalCheckFailedException);
        assert!(err.is_transient());
    }

    #[test]
    fn test_should_not_treat_conditional_failure_as_transient() {
        let err = dynamodb_error!(ConditionalCheckFailedException);
        assert!(!err.is_transient());
        assert_eq!(err.status_code, http::StatusCode::BAD_REQUEST);
    }
}
