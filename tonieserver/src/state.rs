//! Shared state for the content handler routes.

use std::path::PathBuf;
use std::sync::Arc;

use tonieconfig::Settings;
use toniecontent::ToniesCatalog;

/// Dependencies the HTTP routes need, handed in explicitly rather than
/// reached for through a global — see `CoreContext` in `tonieapp`, which is
/// what actually constructs one of these.
pub struct AppState {
    pub content_dir: PathBuf,
    pub settings: Arc<Settings>,
    pub catalog: Arc<dyn ToniesCatalog>,
    pub http_client: reqwest::Client,
}
