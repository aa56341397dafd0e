//! Error type for the HTTP content handler.
//!
//! Per-crate errors from `toniecontent`/`tafcodec` are folded into one enum
//! that implements `IntoResponse` directly, rather than the teacher's
//! string-matching dispatch in its HTTP error paths — with a fixed, small
//! set of upstream error types this stays exhaustive without needing to
//! parse error text back into a status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    InvalidPath(#[from] toniecontent::StoreError),

    #[error(transparent)]
    Codec(#[from] tafcodec::CodecError),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let status = match &self {
            HandlerError::NotFound(_) => StatusCode::NOT_FOUND,
            HandlerError::InvalidPath(toniecontent::StoreError::InvalidPath(_)) => StatusCode::BAD_REQUEST,
            HandlerError::InvalidPath(toniecontent::StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!(error = %self, status = %status, "content handler error");
        (status, self.to_string()).into_response()
    }
}
