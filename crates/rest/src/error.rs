//! Error types for the REST adapter.
//!
//! # Status Mapping
//!
//! Non-success responses are mapped to typed errors by
//! [`AdapterError::from_status`]:
//!
//! | HTTP Status | Error |
//! |-------------|-------|
//! | 3xx | `Redirection` |
//! | 400 | `BadRequest` |
//! | 401 | `Unauthorized` |
//! | 403 | `Forbidden` |
//! | 404 | `NotFound` |
//! | 405 | `MethodNotAllowed` |
//! | 409 | `Conflict` |
//! | 422 | `ResourceInvalid` |
//! | other 4xx | `ClientError` |
//! | 5xx | `Server` |
//! | anything else | `UnexpectedStatus` |

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use http::StatusCode;
use thiserror::Error;

/// The primary error type for adapter operations.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// A query predicate or ordering is not valid for the model.
    #[error("invalid query for {resource}: {message}")]
    InvalidQuery { resource: String, message: String },

    /// A record does not conform to the model.
    #[error("invalid record for {resource}: {message}")]
    InvalidRecord { resource: String, message: String },

    /// The endpoint URI could not be used.
    #[error("invalid endpoint: {message}")]
    InvalidEndpoint { message: String },

    /// The server redirected the request.
    #[error("redirected with status {status}{}", .location.as_deref().map(|l| format!(" to {}", l)).unwrap_or_default())]
    Redirection {
        status: u16,
        location: Option<String>,
    },

    #[error("bad request: {message}")]
    BadRequest { message: String },

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    /// The resource or collection does not exist (HTTP 404).
    #[error("resource not found")]
    NotFound,

    #[error("method not allowed{}", .allow.as_deref().map(|a| format!(" (allowed: {})", a)).unwrap_or_default())]
    MethodNotAllowed { allow: Option<String> },

    /// The request conflicts with the current state of the resource (HTTP 409).
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// The server rejected the record (HTTP 422).
    #[error("resource invalid: {}", .errors.join(", "))]
    ResourceInvalid { errors: Vec<String> },

    #[error("client error {status}: {message}")]
    ClientError { status: u16, message: String },

    /// The server failed to handle the request (HTTP 5xx).
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("unexpected response status {status}")]
    UnexpectedStatus { status: u16 },

    /// The response body exceeded the configured limit.
    #[error("response body of {size} bytes exceeds limit of {limit} bytes")]
    ResponseTooLarge { size: usize, limit: usize },

    /// The body could not be encoded or decoded.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// The transport failed before a response was received.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A request could not be assembled.
    #[error("failed to build request: {0}")]
    Request(#[from] http::Error),
}

impl AdapterError {
    /// Maps a non-success status to its typed error.
    ///
    /// `message` is the decoded response body text and `errors` the messages
    /// extracted from it, used for the variants that carry details.
    /// Returns `None` for 2xx statuses.
    pub fn from_status(
        status: StatusCode,
        location: Option<String>,
        allow: Option<String>,
        message: String,
        errors: Vec<String>,
    ) -> Option<Self> {
        let code = status.as_u16();
        let err = match code {
            200..=299 => return None,
            300..=399 => AdapterError::Redirection {
                status: code,
                location,
            },
            400 => AdapterError::BadRequest { message },
            401 => AdapterError::Unauthorized,
            403 => AdapterError::Forbidden,
            404 => AdapterError::NotFound,
            405 => AdapterError::MethodNotAllowed { allow },
            409 => AdapterError::Conflict { message },
            422 => AdapterError::ResourceInvalid {
                errors: if errors.is_empty() && !message.is_empty() {
                    vec![message]
                } else {
                    errors
                },
            },
            401..=499 => AdapterError::ClientError {
                status: code,
                message,
            },
            500..=599 => AdapterError::Server {
                status: code,
                message,
            },
            _ => AdapterError::UnexpectedStatus { status: code },
        };
        Some(err)
    }

    /// Returns true for [`AdapterError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, AdapterError::NotFound)
    }

    /// Returns the HTTP status the error was mapped from, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            AdapterError::Redirection { status, .. }
            | AdapterError::ClientError { status, .. }
            | AdapterError::Server { status, .. }
            | AdapterError::UnexpectedStatus { status } => Some(*status),
            AdapterError::BadRequest { .. } => Some(400),
            AdapterError::Unauthorized => Some(401),
            AdapterError::Forbidden => Some(403),
            AdapterError::NotFound => Some(404),
            AdapterError::MethodNotAllowed { .. } => Some(405),
            AdapterError::Conflict { .. } => Some(409),
            AdapterError::ResourceInvalid { .. } => Some(422),
            _ => None,
        }
    }
}

/// Errors encoding or decoding record bodies.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(String),

    /// A field value could not be read as the declared kind.
    #[error("field '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// The document is not a record or a collection of records.
    #[error("unexpected document shape: {0}")]
    UnexpectedShape(String),

    /// Floats such as NaN have no JSON representation.
    #[error("field '{field}' holds a non-finite float")]
    NonFiniteFloat { field: String },
}

/// Errors raised by a [`Transport`](crate::transport::Transport).
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("response body of at least {size} bytes exceeds limit of {limit} bytes")]
    BodyTooLarge { size: usize, limit: usize },

    #[error("transport error: {0}")]
    Other(String),
}

/// Errors in resource model definitions.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("invalid resource name: '{name}'")]
    InvalidName { name: String },

    #[error("invalid field name '{field}' on {model}")]
    InvalidField { model: String, field: String },

    #[error("duplicate field '{field}' on {model}")]
    DuplicateField { model: String, field: String },

    #[error("key field '{key}' is not declared on {model}")]
    MissingKey { model: String, key: String },
}

/// Result type alias for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn map(status: u16) -> Option<AdapterError> {
        AdapterError::from_status(
            StatusCode::from_u16(status).unwrap(),
            None,
            None,
            "body".to_string(),
            Vec::new(),
        )
    }

    #[test]
    fn test_success_maps_to_none() {
        assert!(map(200).is_none());
        assert!(map(201).is_none());
        assert!(map(204).is_none());
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(map(404), Some(AdapterError::NotFound)));
        assert!(matches!(map(409), Some(AdapterError::Conflict { .. })));
        assert!(matches!(
            map(500),
            Some(AdapterError::Server { status: 500, .. })
        ));
        assert!(matches!(
            map(503),
            Some(AdapterError::Server { status: 503, .. })
        ));
        assert!(matches!(map(401), Some(AdapterError::Unauthorized)));
        assert!(matches!(map(403), Some(AdapterError::Forbidden)));
        assert!(matches!(
            map(418),
            Some(AdapterError::ClientError { status: 418, .. })
        ));
        assert!(matches!(
            map(302),
            Some(AdapterError::Redirection { status: 302, .. })
        ));
        assert!(matches!(
            map(101),
            Some(AdapterError::UnexpectedStatus { status: 101 })
        ));
    }

    #[test]
    fn test_resource_invalid_falls_back_to_body() {
        match map(422) {
            Some(AdapterError::ResourceInvalid { errors }) => {
                assert_eq!(errors, vec!["body".to_string()])
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_display() {
        let err = AdapterError::Redirection {
            status: 301,
            location: Some("http://elsewhere/books.xml".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "redirected with status 301 to http://elsewhere/books.xml"
        );
        assert_eq!(AdapterError::NotFound.status(), Some(404));
        assert!(AdapterError::NotFound.is_not_found());
    }
}
