//! rUID validation and on-disk path resolution.
//!
//! A rUID is a 16-hex-digit content identifier. On disk it is split into two
//! uppercase 8-character halves: the first names a directory, the second
//! names the `.taf` file inside it (with a `.json` sidecar alongside), the
//! same layout the original firmware's content server uses — a rUID
//! `aabbccddeeff0011` is the file `<root>/AABBCCDD/EEFF0011`, with its
//! descriptor at `<root>/AABBCCDD/EEFF0011.json`.

use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};

pub const RUID_LEN: usize = 16;

/// Validates `ruid` and returns its canonical uppercase form.
pub fn normalize(ruid: &str) -> Result<String> {
    if ruid.len() != RUID_LEN || !ruid.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(StoreError::InvalidPath(ruid.to_string()));
    }
    Ok(ruid.to_ascii_uppercase())
}

/// Resolves the on-disk `.taf` data file path for `ruid` under `root`,
/// rejecting anything that isn't a well-formed rUID before it ever touches
/// the filesystem. Because the two path components are guaranteed to be 8
/// hex characters each, `..`/`/` traversal is structurally impossible; we
/// still canonicalize-check containment as a second line of defense in case
/// a future caller relaxes `normalize`.
pub fn resolve_path(root: &Path, ruid: &str) -> Result<PathBuf> {
    let upper = normalize(ruid)?;
    let (a, b) = upper.split_at(8);
    let path = root.join(a).join(b);

    if let Ok(canonical_root) = root.canonicalize() {
        if let Ok(canonical_path) = path.canonicalize() {
            if !canonical_path.starts_with(&canonical_root) {
                return Err(StoreError::InvalidPath(ruid.to_string()));
            }
        }
    }

    Ok(path)
}

/// The `.taf` data file path for `ruid` under `root`.
pub fn data_path(root: &Path, ruid: &str) -> Result<PathBuf> {
    resolve_path(root, ruid)
}

/// The sidecar JSON descriptor path for `ruid` under `root`, a `.json`
/// sibling of the data file.
pub fn descriptor_path(root: &Path, ruid: &str) -> Result<PathBuf> {
    Ok(resolve_path(root, ruid)?.with_extension("json"))
}

/// Splits a download-style `<8hex>/<8hex>` pair back into a single 16-hex
/// rUID, as used by the legacy `/content/download/<a>/<b>` URL rewrite.
pub fn from_halves(a: &str, b: &str) -> Result<String> {
    if a.len() != 8 || b.len() != 8 {
        return Err(StoreError::InvalidPath(format!("{a}/{b}")));
    }
    normalize(&format!("{a}{b}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_uppercases_valid_ruid() {
        assert_eq!(normalize("aabbccddeeff0011").unwrap(), "AABBCCDDEEFF0011");
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(normalize("aabb").is_err());
    }

    #[test]
    fn rejects_non_hex() {
        assert!(normalize("zzbbccddeeff0011").is_err());
    }

    #[test]
    fn resolve_path_splits_into_two_components() {
        let root = Path::new("/content");
        let path = resolve_path(root, "aabbccddeeff0011").unwrap();
        assert_eq!(path, Path::new("/content/AABBCCDD/EEFF0011"));
    }

    #[test]
    fn descriptor_path_is_json_sibling_of_data_path() {
        let root = Path::new("/content");
        let data = data_path(root, "aabbccddeeff0011").unwrap();
        let desc = descriptor_path(root, "aabbccddeeff0011").unwrap();
        assert_eq!(data, Path::new("/content/AABBCCDD/EEFF0011"));
        assert_eq!(desc, Path::new("/content/AABBCCDD/EEFF0011.json"));
    }

    #[test]
    fn from_halves_roundtrips() {
        let ruid = from_halves("aabbccdd", "eeff0011").unwrap();
        assert_eq!(ruid, "AABBCCDDEEFF0011");
    }
}
