// src/error.rs
//! Error taxonomy shared by the provider, store, service and HTTP layers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DigestError {
    /// Missing credential or invalid policy. Fatal for the request, never retried.
    #[error("Server configuration error: {0}")]
    Configuration(String),

    /// Provider call failed or answered with a non-success status.
    #[error("Failed to fetch from upstream AI provider")]
    Upstream {
        status: Option<u16>,
        details: String,
    },

    /// Provider answered, but the payload was not the expected record shape.
    #[error("Failed to parse upstream AI provider response: {0}")]
    Parse(String),

    /// Unreadable or unwritable cached payload. Callers treat it as a miss.
    #[error("Digest cache error: {0}")]
    Cache(String),

    #[error("Unknown region '{0}'")]
    InvalidRegion(String),
}

impl DigestError {
    pub fn upstream(status: Option<u16>, details: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            details: details.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            DigestError::Configuration(_) | DigestError::Cache(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            DigestError::Upstream { .. } | DigestError::Parse(_) => StatusCode::BAD_GATEWAY,
            DigestError::InvalidRegion(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Whether a manual retry (`refresh=1`) can reasonably succeed.
    pub fn retryable(&self) -> bool {
        matches!(self, DigestError::Upstream { .. } | DigestError::Parse(_))
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DigestError::Configuration(_) => "configuration",
            DigestError::Upstream { .. } => "upstream",
            DigestError::Parse(_) => "parse",
            DigestError::Cache(_) => "cache",
            DigestError::InvalidRegion(_) => "invalid_region",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    retryable: bool,
}

impl IntoResponse for DigestError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let details = match &self {
            DigestError::Upstream { details, .. } if !details.is_empty() => Some(details.clone()),
            _ => None,
        };
        if status.is_server_error() {
            tracing::warn!(target: "api", kind = self.kind(), error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.to_string(),
            details,
            retryable: self.retryable(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            DigestError::Configuration("API_KEY missing".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            DigestError::upstream(Some(429), "quota").status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            DigestError::InvalidRegion("Mars".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn parse_and_upstream_messages_differ() {
        let up = DigestError::upstream(Some(500), "boom").to_string();
        let parse = DigestError::Parse("missing candidates".into()).to_string();
        assert_ne!(up, parse);
        assert!(parse.contains("parse"));
        assert!(!DigestError::Configuration("x".into()).retryable());
    }
}
