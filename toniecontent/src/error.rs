//! Error types for the content store.

use std::io;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An rUID was not 16 hex digits, or would otherwise escape the content
    /// root.
    #[error("invalid rUID: {0}")]
    InvalidPath(String),

    /// No file (data or descriptor) exists at the resolved path.
    #[error("content not found: {0}")]
    NotFound(String),

    /// The sidecar descriptor failed to parse as JSON.
    #[error("malformed descriptor for {ruid}: {source}")]
    MalformedDescriptor { ruid: String, source: serde_json::Error },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
