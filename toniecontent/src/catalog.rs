//! Tonies catalog lookup (data-model expansion): resolves an audio_id to the
//! human-readable metadata a library UI would want (title, series, episode),
//! independent of whether that audio_id has ever been cached locally.
//!
//! The teacher's media-server crates each front a specific external catalog
//! (Qobuz, RadioFrance, ...) behind a small trait so the HTTP layer doesn't
//! care which backend answers it; `ToniesCatalog` plays the same role here.
//! [`NullCatalog`] is the zero-dependency default so a standalone deployment
//! never needs network access just to serve cached audio.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Metadata about a registered Tonie audio_id, as looked up from a catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToniesAudioIdInfo {
    pub audio_id: u32,
    pub title: String,
    pub series: Option<String>,
    pub episode: Option<String>,
    pub picture_url: Option<String>,
}

/// Looks up display metadata for audio IDs. Keyed on audio_id *and* the
/// payload hash/tonie_model, not audio_id alone: many custom recordings
/// share the same placeholder audio_id, so only the combination identifies
/// one specific piece of content.
#[async_trait]
pub trait ToniesCatalog: Send + Sync {
    async fn lookup(&self, audio_id: u32, hash: &[u8], model: &str) -> Option<ToniesAudioIdInfo>;
}

/// A catalog that never has anything to say. The content store and HTTP
/// handler work fully offline against this; a network-backed catalog can be
/// plugged in later without changing either.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCatalog;

#[async_trait]
impl ToniesCatalog for NullCatalog {
    async fn lookup(&self, _audio_id: u32, _hash: &[u8], _model: &str) -> Option<ToniesAudioIdInfo> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_catalog_always_returns_none() {
        let catalog = NullCatalog;
        assert!(catalog.lookup(1234, &[0u8; 20], "ov-model").await.is_none());
    }
}
