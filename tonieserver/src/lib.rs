//! HTTP content handler (C8): serves TAF files over Range-aware GET routes,
//! tail-follows in-progress live recordings, proxies missing content from a
//! configured cloud source, and drives the transcoding orchestrator (C9) to
//! convert or live-stream arbitrary user audio into the store, either from
//! source URIs or from a direct raw-PCM multipart upload.

pub mod error;
pub mod handlers;
pub mod range;
pub mod routes;
pub mod state;
pub mod transcode;

pub use error::HandlerError;
pub use routes::router;
pub use state::AppState;
