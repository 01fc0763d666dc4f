//! Error types for the gateway.
//!
//! Every failure that can reach an HTTP caller is rendered as an OpenAI-style
//! `{"detail": "..."}` body with a status code derived from the variant.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GatewayError {
    /// The inbound request body was malformed or carried a field of the wrong type.
    #[error("{message}")]
    Validation { message: String },

    /// No usable IAM bearer token could be obtained.
    #[error("Error fetching IAM token: {message}")]
    Auth { message: String },

    /// watsonx.ai answered with a non-success status; `body` is kept verbatim.
    #[error("Error from Watsonx.ai: {body}")]
    Upstream { status: u16, body: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Error calling Watsonx.ai: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl GatewayError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth {
            message: msg.into(),
        }
    }

    pub fn upstream(status: u16, body: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            body: body.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// HTTP status this error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::Auth { .. }
            | Self::Config { .. }
            | Self::Http(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Toml(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Body shape of every error the gateway returns.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            GatewayError::validation("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::auth("down").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GatewayError::not_found("nope").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatewayError::upstream(429, "slow down").status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_upstream_detail_embeds_body() {
        let err = GatewayError::upstream(400, r#"{"errors":[{"code":"invalid_model"}]}"#);
        assert_eq!(
            err.to_string(),
            r#"Error from Watsonx.ai: {"errors":[{"code":"invalid_model"}]}"#
        );
    }

    #[test]
    fn test_out_of_range_upstream_status_falls_back() {
        assert_eq!(
            GatewayError::upstream(42, "").status_code(),
            StatusCode::BAD_GATEWAY
        );
    }
}
