//! Lazy walk over a content root, yielding the rUIDs that have a sidecar
//! descriptor present.

use std::path::Path;

use crate::error::Result;
use crate::ruid::from_halves;

/// Entry discovered by [`walk`]: a valid rUID whose `.json` sidecar is
/// present next to its data file.
#[derive(Debug, Clone)]
pub struct ContentEntry {
    pub ruid: String,
}

/// Walks `root/<8hex>/<8hex>.json`, skipping anything that doesn't match the
/// two-level uppercase-hex naming (hidden directories, in-progress `.tmp-*`
/// writes, stray non-content entries) rather than failing the whole walk.
pub async fn walk(root: &Path) -> Result<Vec<ContentEntry>> {
    let mut entries = Vec::new();
    let mut top = match tokio::fs::read_dir(root).await {
        Ok(rd) => rd,
        Err(_) => return Ok(entries),
    };

    while let Some(top_entry) = top.next_entry().await? {
        if !top_entry.file_type().await?.is_dir() {
            continue;
        }
        let Some(a) = top_entry.file_name().to_str().map(str::to_string) else { continue };
        if a.len() != 8 || !a.bytes().all(|b| b.is_ascii_hexdigit()) {
            continue;
        }

        let mut inner = tokio::fs::read_dir(top_entry.path()).await?;
        while let Some(inner_entry) = inner.next_entry().await? {
            if !inner_entry.file_type().await?.is_file() {
                continue;
            }
            let Some(name) = inner_entry.file_name().to_str().map(str::to_string) else { continue };
            let Some(b) = name.strip_suffix(".json") else { continue };
            if b.len() != 8 || !b.bytes().all(|c| c.is_ascii_hexdigit()) {
                continue;
            }
            if let Ok(ruid) = from_halves(&a, b) {
                entries.push(ContentEntry { ruid });
            }
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finds_only_well_formed_entries() {
        let dir = tempfile::tempdir().unwrap();
        let top_dir = dir.path().join("AABBCCDD");
        tokio::fs::create_dir_all(&top_dir).await.unwrap();
        tokio::fs::write(top_dir.join("EEFF0011.json"), b"{}").await.unwrap();
        tokio::fs::write(top_dir.join("EEFF0011"), b"taf-bytes").await.unwrap();

        // no sidecar for this one, must be skipped
        tokio::fs::write(top_dir.join("11223344"), b"taf-bytes").await.unwrap();

        let junk_dir = dir.path().join("not-hex!!");
        tokio::fs::create_dir_all(&junk_dir).await.unwrap();

        let entries = walk(dir.path()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].ruid, "AABBCCDDEEFF0011");
    }

    #[tokio::test]
    async fn missing_root_yields_empty() {
        let entries = walk(Path::new("/nonexistent/path/for/test")).await.unwrap();
        assert!(entries.is_empty());
    }
}
