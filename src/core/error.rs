//! # Error Handling Module
//!
//! Error taxonomy for the catalog gateway with proper HTTP status code
//! mappings for client responses. Only genuinely unrecoverable conditions
//! (an upstream 4xx/5xx with no usable fallback) reach the HTTP layer as an
//! error; cache failures and category-lookup failures are recovered locally
//! by the components that encounter them.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Main result type used throughout the gateway.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Error types for the catalog gateway.
#[derive(Debug, Error, Clone)]
pub enum CatalogError {
    /// Configuration-related errors (invalid config, missing files, etc.)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The upstream commerce API answered with an error status.
    /// The original status code is preserved for passthrough.
    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// The upstream commerce API could not be reached at all.
    #[error("Upstream unavailable: {message}")]
    UpstreamUnavailable { message: String },

    /// An upstream call exceeded its deadline.
    #[error("Upstream timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Request validation errors (malformed filters, bad parameters).
    #[error("Request validation failed: {field} - {reason}")]
    RequestValidation { field: String, reason: String },

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {message}")]
    Json { message: String },

    /// Internal errors for unexpected failures.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CatalogError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an upstream error preserving the upstream status code
    pub fn upstream<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }

    /// Create an upstream-unavailable error with a custom message
    pub fn unavailable<S: Into<String>>(message: S) -> Self {
        Self::UpstreamUnavailable {
            message: message.into(),
        }
    }

    /// Create a validation error for a specific field
    pub fn validation<S: Into<String>>(field: S, reason: S) -> Self {
        Self::RequestValidation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error with a custom message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the appropriate HTTP status code for this error
    ///
    /// Upstream errors pass the original status through so callers can
    /// distinguish a 404 catalog from a 503 outage.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::RequestValidation { .. } => StatusCode::BAD_REQUEST,
            Self::Json { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout { timeout_ms: 0 };
        }
        if let Some(status) = err.status() {
            return Self::Upstream {
                status: status.as_u16(),
                message: err.to_string(),
            };
        }
        Self::UpstreamUnavailable {
            message: err.to_string(),
        }
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::Upstream { .. } => "upstream request failed",
            Self::UpstreamUnavailable { .. } => "upstream unavailable",
            Self::Timeout { .. } => "upstream timeout",
            Self::RequestValidation { .. } => "invalid request",
            _ => "internal error",
        };

        let body = Json(json!({
            "message": message,
            "details": self.to_string(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_status_passthrough() {
        let err = CatalogError::upstream(503, "maintenance");
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let err = CatalogError::upstream(404, "no such route");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_invalid_upstream_status_falls_back_to_bad_gateway() {
        let err = CatalogError::upstream(42, "nonsense");
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_timeout_maps_to_gateway_timeout() {
        let err = CatalogError::Timeout { timeout_ms: 20_000 };
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }
}
