//! Content fingerprints for change detection.
//!
//! A fingerprint is a SHA-256 digest over every regular file below a path,
//! visited in sorted relative-path order so the result does not depend on
//! directory iteration order. It is a cache key, nothing more: callers only
//! compare two fingerprints for equality.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{DeployError, DeployResult};
use crate::types::Fingerprint;

const DELIMITER: &[u8] = b"\x00";

/// Compute the fingerprint of a file or directory tree.
///
/// Fails with [`DeployError::Hash`] if the path or anything below it cannot
/// be read.
pub fn fingerprint(path: &Path) -> DeployResult<Fingerprint> {
    let metadata = fs::metadata(path).map_err(|e| DeployError::hash(path, e))?;

    let mut hasher = Sha256::new();
    if metadata.is_dir() {
        let mut entries = Vec::new();
        collect_entries(path, Path::new(""), &mut entries)?;
        entries.sort();

        for entry in &entries {
            hash_entry(&mut hasher, path, entry)?;
        }
        debug!(path = %path.display(), entries = entries.len(), "fingerprinted directory");
    } else {
        hash_file(&mut hasher, path)?;
    }

    Ok(Fingerprint::new(hex::encode(hasher.finalize())))
}

/// Compute a fingerprint on the blocking thread pool.
pub async fn fingerprint_blocking(path: PathBuf) -> DeployResult<Fingerprint> {
    tokio::task::spawn_blocking(move || fingerprint(&path))
        .await
        .map_err(|e| DeployError::internal(format!("fingerprint task failed: {e}")))?
}

/// Relative entry below the fingerprint root.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Entry {
    Dir(String),
    File(String),
}

fn collect_entries(root: &Path, relative: &Path, out: &mut Vec<Entry>) -> DeployResult<()> {
    let dir = root.join(relative);
    let read_dir = fs::read_dir(&dir).map_err(|e| DeployError::hash(&dir, e))?;

    for item in read_dir {
        let item = item.map_err(|e| DeployError::hash(&dir, e))?;
        let child = relative.join(item.file_name());
        let child_path = root.join(&child);
        let metadata = fs::metadata(&child_path).map_err(|e| DeployError::hash(&child_path, e))?;

        if metadata.is_dir() {
            out.push(Entry::Dir(portable(&child)));
            collect_entries(root, &child, out)?;
        } else {
            out.push(Entry::File(portable(&child)));
        }
    }

    Ok(())
}

/// Path with `/` separators so digests match across platforms.
fn portable(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn hash_entry(hasher: &mut Sha256, root: &Path, entry: &Entry) -> DeployResult<()> {
    match entry {
        Entry::Dir(name) => {
            hasher.update(b"d");
            hasher.update(name.as_bytes());
            hasher.update(DELIMITER);
        }
        Entry::File(name) => {
            hasher.update(b"f");
            hasher.update(name.as_bytes());
            hasher.update(DELIMITER);
            hash_file(hasher, &root.join(name))?;
        }
    }
    Ok(())
}

fn hash_file(hasher: &mut Sha256, path: &Path) -> DeployResult<()> {
    let data = fs::read(path).map_err(|e| DeployError::hash(path, e))?;
    hasher.update(data.len().to_le_bytes());
    hasher.update(&data);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/handlers")).unwrap();
        fs::write(dir.path().join("package.json"), br#"{"name":"app"}"#).unwrap();
        fs::write(dir.path().join("src/index.js"), b"exports.handler = () => {};").unwrap();
        fs::write(dir.path().join("src/handlers/launch.js"), b"module.exports = 1;").unwrap();
        dir
    }

    #[test]
    fn unchanged_tree_is_stable() {
        let dir = tree();
        let first = fingerprint(dir.path()).unwrap();
        let second = fingerprint(dir.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), 64);
    }

    #[test]
    fn single_byte_change_changes_digest() {
        let dir = tree();
        let before = fingerprint(dir.path()).unwrap();
        fs::write(dir.path().join("src/handlers/launch.js"), b"module.exports = 2;").unwrap();
        assert_ne!(before, fingerprint(dir.path()).unwrap());
    }

    #[test]
    fn renaming_a_file_changes_digest() {
        let dir = tree();
        let before = fingerprint(dir.path()).unwrap();
        fs::rename(dir.path().join("src/index.js"), dir.path().join("src/main.js")).unwrap();
        assert_ne!(before, fingerprint(dir.path()).unwrap());
    }

    #[test]
    fn adding_an_empty_directory_changes_digest() {
        let dir = tree();
        let before = fingerprint(dir.path()).unwrap();
        fs::create_dir(dir.path().join("assets")).unwrap();
        assert_ne!(before, fingerprint(dir.path()).unwrap());
    }

    #[test]
    fn identical_trees_in_different_locations_match() {
        let a = tree();
        let b = tree();
        assert_eq!(fingerprint(a.path()).unwrap(), fingerprint(b.path()).unwrap());
    }

    #[test]
    fn single_file_can_be_fingerprinted() {
        let dir = tree();
        let file = dir.path().join("package.json");
        assert_eq!(fingerprint(&file).unwrap(), fingerprint(&file).unwrap());
    }

    #[test]
    fn missing_path_is_a_hash_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = fingerprint(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, DeployError::Hash { .. }));
    }

    #[tokio::test]
    async fn blocking_variant_matches() {
        let dir = tree();
        let sync = fingerprint(dir.path()).unwrap();
        let blocking = fingerprint_blocking(dir.path().to_path_buf()).await.unwrap();
        assert_eq!(sync, blocking);
    }
}
