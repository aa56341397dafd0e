//! Sidecar JSON descriptor read/write (atomic temp-file-then-rename).

use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// Per-rUID metadata stored alongside the TAF data file.
///
/// Unknown keys round-trip via `extra` so a descriptor hand-edited by the
/// user, or written by a newer version of this store, never loses fields it
/// doesn't itself understand.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContentDescriptor {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub tonie_model: Option<String>,
    #[serde(default)]
    pub live: bool,
    #[serde(default)]
    pub nocloud: bool,
    #[serde(default, with = "hex_auth_opt")]
    pub cloud_auth: Option<[u8; 32]>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ContentDescriptor {
    /// Whether a bearer token is available to proxy this rUID from the
    /// upstream cloud, per the C8 decision table.
    pub fn has_cloud_auth(&self) -> bool {
        self.cloud_auth.is_some()
    }

    /// A descriptor is servable on its own (without falling through to the
    /// cloud) once it names a local source.
    pub fn has_local_source(&self) -> bool {
        self.source.is_some()
    }
}

/// Reads and parses the descriptor at `path`.
pub async fn read_descriptor(path: &Path) -> Result<ContentDescriptor> {
    let bytes = tokio::fs::read(path).await?;
    serde_json::from_slice(&bytes).map_err(|source| StoreError::MalformedDescriptor {
        ruid: path.display().to_string(),
        source,
    })
}

/// Serializes `descriptor` and writes it to `path` atomically: write to a
/// sibling temp file, then rename over the final path.
pub async fn write_descriptor(path: &Path, descriptor: &ContentDescriptor) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(descriptor).map_err(|source| {
        StoreError::MalformedDescriptor { ruid: path.display().to_string(), source }
    })?;

    let temp_name = format!(
        ".{}.tmp-{}",
        path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
        Uuid::new_v4()
    );
    let temp_path = path.with_file_name(temp_name);

    tokio::fs::write(&temp_path, &json).await?;
    tokio::fs::rename(&temp_path, path).await?;
    Ok(())
}

mod hex_auth_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<[u8; 32]>, ser: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => ser.serialize_str(&hex::encode(bytes)),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<[u8; 32]>, D::Error> {
        let opt: Option<String> = Option::deserialize(de)?;
        match opt {
            None => Ok(None),
            Some(s) => {
                let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
                let arr: [u8; 32] =
                    bytes.try_into().map_err(|_| serde::de::Error::custom("cloud_auth must be 32 bytes"))?;
                Ok(Some(arr))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("AABBCCDD").join("EEFF0011.json");

        let mut descriptor = ContentDescriptor {
            source: Some("custom-upload".into()),
            tonie_model: Some("10000080".into()),
            live: false,
            nocloud: true,
            cloud_auth: Some([7u8; 32]),
            extra: serde_json::Map::new(),
        };
        descriptor.extra.insert("future_field".into(), serde_json::json!(42));

        write_descriptor(&path, &descriptor).await.unwrap();
        let loaded = read_descriptor(&path).await.unwrap();

        assert_eq!(loaded.source, descriptor.source);
        assert_eq!(loaded.cloud_auth, descriptor.cloud_auth);
        assert!(loaded.has_cloud_auth());
        assert_eq!(loaded.extra.get("future_field"), Some(&serde_json::json!(42)));
    }

    #[tokio::test]
    async fn no_temp_file_left_behind_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.json");
        write_descriptor(&path, &ContentDescriptor::default()).await.unwrap();

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(e) = entries.next_entry().await.unwrap() {
            names.push(e.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["d.json"]);
    }
}
