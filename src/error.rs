use axum::{ http::StatusCode, response::{ IntoResponse, Response } };
use log::{ error, warn };
use thiserror::Error;

/// Body returned to callers for any completion service failure.
pub const UPSTREAM_FAILURE_MESSAGE: &str = "completion service request failed";

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("invalid chat request: {0}")]
    InvalidRequest(String),

    #[error("no completion service credential configured")]
    MissingCredential,

    #[error("completion service returned {status}: {body}")]
    Upstream {
        status: u16,
        body: String,
    },

    #[error("completion service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion stream interrupted: {0}")]
    Stream(String),

    #[error("chat store error: {0}")]
    Storage(String),
}

impl From<redis::RedisError> for RelayError {
    fn from(e: redis::RedisError) -> Self {
        RelayError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Storage(e.to_string())
    }
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::Unauthorized => StatusCode::UNAUTHORIZED,
            RelayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::Upstream { .. } | RelayError::Http(_) | RelayError::Stream(_) =>
                StatusCode::BAD_GATEWAY,
            RelayError::MissingCredential | RelayError::Storage(_) =>
                StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            RelayError::Unauthorized => (status, "Unauthorized").into_response(),
            RelayError::InvalidRequest(_) => {
                warn!("Rejected chat request: {}", self);
                (status, self.to_string()).into_response()
            }
            // Upstream detail (error bodies, URLs) stays in the log.
            RelayError::Upstream { .. } | RelayError::Http(_) | RelayError::Stream(_) => {
                error!("Chat relay failed: {}", self);
                (status, UPSTREAM_FAILURE_MESSAGE).into_response()
            }
            RelayError::MissingCredential | RelayError::Storage(_) => {
                error!("Chat relay failed: {}", self);
                (status, self.to_string()).into_response()
            }
        }
    }
}
