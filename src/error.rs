//! Error type returned by the proxy handlers.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::models::ErrorBody;

#[derive(Error, Debug)]
pub enum GatewayError {
    /// Backend could not be reached (connect failure, timeout)
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Backend answered with something we could not use
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            GatewayError::BackendUnavailable(e.to_string())
        } else {
            GatewayError::Backend(e.to_string())
        }
    }
}

impl From<prometheus::Error> for GatewayError {
    fn from(e: prometheus::Error) -> Self {
        GatewayError::Internal(e.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            GatewayError::NotFound => (StatusCode::NOT_FOUND, "Not found"),
            GatewayError::BackendUnavailable(_)
            | GatewayError::Backend(_)
            | GatewayError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        (
            status,
            Json(ErrorBody {
                error: message.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (GatewayError::BackendUnavailable("refused".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (GatewayError::Backend("bad json".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (GatewayError::NotFound, StatusCode::NOT_FOUND),
            (GatewayError::Internal("oops".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
