//! Route table for the content handler.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{convert_audio, get_content, get_content_download, get_content_v1, pcm_upload};
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/content/{ruid}", get(get_content_v1))
        .route("/v2/content/{ruid}", get(get_content))
        .route("/content/download/{a}/{b}", get(get_content_download))
        .route("/api/content/{ruid}/convert", post(convert_audio))
        .route("/api/pcmUpload", post(pcm_upload))
        .with_state(state)
}
