//! `CoreContext`: the application's dependencies, built once at startup and
//! passed down explicitly.
//!
//! The teacher reaches for a `lazy_static` singleton (see `pmoconfig::get_config`)
//! for this kind of shared state. We deliberately don't: a global makes it
//! impossible to run two independent instances in one process (as the test
//! suite does, spinning up a fresh content root per test) and hides the
//! dependency from function signatures. `CoreContext` is built once in
//! `main` and handed to the router as `Arc<AppState>` instead.

use std::path::PathBuf;
use std::sync::Arc;

use tonieconfig::Settings;
use toniecontent::{NullCatalog, ToniesCatalog};

pub struct CoreContext {
    pub settings: Arc<Settings>,
    pub catalog: Arc<dyn ToniesCatalog>,
    pub content_dir: PathBuf,
}

impl CoreContext {
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        let settings = Arc::new(settings);
        let content_dir = PathBuf::from(settings.content_dir_full()?);
        Ok(Self { settings, catalog: Arc::new(NullCatalog), content_dir })
    }

    pub fn into_app_state(self, http_client: reqwest::Client) -> tonieserver::AppState {
        tonieserver::AppState {
            content_dir: self.content_dir,
            settings: self.settings,
            catalog: self.catalog,
            http_client,
        }
    }
}
