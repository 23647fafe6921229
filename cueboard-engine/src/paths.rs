//! Asset path resolution
//!
//! A preload names its audio either as a path relative to the application's
//! base directory or as a `file://` URL. Resolution verifies the file exists
//! before any decoding starts; a missing or unreadable file is the caller's
//! error, not a degraded engine.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use url::Url;

/// Resolve an asset path against the base directory, or parse it as a URL
///
/// Returns the on-disk path when the file exists, `AssetPathInvalid`
/// otherwise. An absolute `asset_path` bypasses the base directory.
pub fn resolve_asset_path(base_dir: &Path, asset_path: &str, is_url: bool) -> Result<PathBuf> {
    let resolved = if is_url {
        let url = Url::parse(asset_path)
            .map_err(|_| Error::AssetPathInvalid(asset_path.to_string()))?;
        url.to_file_path()
            .map_err(|_| Error::AssetPathInvalid(asset_path.to_string()))?
    } else {
        // PathBuf::join replaces the base when asset_path is absolute
        base_dir.join(asset_path)
    };

    if resolved.is_file() {
        Ok(resolved)
    } else {
        Err(Error::AssetPathInvalid(asset_path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_relative_path_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("boom.wav");
        std::fs::File::create(&file_path)
            .unwrap()
            .write_all(b"data")
            .unwrap();

        let resolved = resolve_asset_path(dir.path(), "boom.wav", false).unwrap();
        assert_eq!(resolved, file_path);
    }

    #[test]
    fn test_absolute_path_bypasses_base() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("boom.wav");
        std::fs::File::create(&file_path).unwrap();

        let resolved =
            resolve_asset_path(Path::new("/nonexistent"), file_path.to_str().unwrap(), false)
                .unwrap();
        assert_eq!(resolved, file_path);
    }

    #[test]
    fn test_missing_file_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_asset_path(dir.path(), "absent.wav", false).unwrap_err();
        assert!(matches!(err, Error::AssetPathInvalid(_)));
    }

    #[test]
    fn test_file_url_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("track.wav");
        std::fs::File::create(&file_path).unwrap();

        let url = Url::from_file_path(&file_path).unwrap();
        let resolved = resolve_asset_path(dir.path(), url.as_str(), true).unwrap();
        assert_eq!(resolved, file_path);
    }

    #[test]
    fn test_bad_url_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_asset_path(dir.path(), "not a url", true).unwrap_err();
        assert!(matches!(err, Error::AssetPathInvalid(_)));

        let err = resolve_asset_path(dir.path(), "https://example.com/a.wav", true).unwrap_err();
        assert!(matches!(err, Error::AssetPathInvalid(_)));
    }
}
