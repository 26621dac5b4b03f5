//! JSON file-based snapshot storage.
//!
//! Each location is a file directly under the base directory:
//! `"consul_kv_diff.json"` -> `<base>/consul_kv_diff.json`.

use crate::{parse, render, validate_location, SnapshotStore, StoreError, StoreResult};
use async_trait::async_trait;
use consuldiff_snapshot::{Encoding, Snapshot};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// JSON file-based snapshot storage.
#[derive(Debug, Clone)]
pub struct JsonSnapshotStore {
    base_path: PathBuf,
}

impl JsonSnapshotStore {
    /// Create a new JSON store rooted at the given directory.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get the file path for a location.
    pub fn path_for(&self, location: &str) -> StoreResult<PathBuf> {
        validate_location(location)?;
        Ok(self.base_path.join(location))
    }
}

#[async_trait]
impl SnapshotStore for JsonSnapshotStore {
    async fn read<E: Encoding>(&self, location: &str) -> StoreResult<Option<Snapshot<E>>> {
        let path = self.path_for(location)?;
        debug!(path = %path.display(), encoding = E::NAME, "Reading snapshot");

        match fs::read_to_string(&path).await {
            Ok(content) => parse(location, &content).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn write<E: Encoding>(&self, location: &str, snapshot: &Snapshot<E>) -> StoreResult<()> {
        let path = self.path_for(location)?;
        debug!(
            path = %path.display(),
            encoding = E::NAME,
            keys = snapshot.len(),
            "Writing snapshot"
        );

        fs::create_dir_all(&self.base_path).await?;

        let content = render(snapshot)?;

        // Write atomically (write to temp file, then rename)
        let temp_path = self.base_path.join(format!("{location}.tmp"));
        let replaced: std::io::Result<()> = async {
            fs::write(&temp_path, &content).await?;
            fs::rename(&temp_path, &path).await
        }
        .await;

        if let Err(e) = replaced {
            if let Err(cleanup) = fs::remove_file(&temp_path).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %temp_path.display(), error = %cleanup, "Failed to remove temp file");
                }
            }
            return Err(StoreError::Io(e));
        }

        Ok(())
    }

    async fn exists(&self, location: &str) -> StoreResult<bool> {
        let path = self.path_for(location)?;
        Ok(fs::try_exists(&path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consuldiff_snapshot::{Base64, Raw};
    use tempfile::tempdir;

    fn sample() -> Snapshot<Raw> {
        [("app/db/host", "db.internal"), ("app/empty", ""), ("app/name", "héllo")]
            .into_iter()
            .collect()
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let dir = tempdir().unwrap();
        let store = JsonSnapshotStore::new(dir.path());

        store.write("state.json", &sample()).await.unwrap();

        let read: Option<Snapshot<Raw>> = store.read("state.json").await.unwrap();
        assert_eq!(read, Some(sample()));
    }

    #[tokio::test]
    async fn test_round_trip_keeps_empty_string_value() {
        let dir = tempdir().unwrap();
        let store = JsonSnapshotStore::new(dir.path());

        store.write("state.json", &sample()).await.unwrap();
        let read: Snapshot<Raw> = store.read("state.json").await.unwrap().unwrap();

        assert!(read.contains_key("app/empty"));
        assert_eq!(read.get("app/empty"), Some(""));
    }

    #[tokio::test]
    async fn test_round_trip_empty_snapshot() {
        let dir = tempdir().unwrap();
        let store = JsonSnapshotStore::new(dir.path());

        store.write("state.json", &Snapshot::<Raw>::new()).await.unwrap();
        let read: Option<Snapshot<Raw>> = store.read("state.json").await.unwrap();
        assert_eq!(read, Some(Snapshot::new()));
    }

    #[tokio::test]
    async fn test_read_not_found() {
        let dir = tempdir().unwrap();
        let store = JsonSnapshotStore::new(dir.path());

        let read: Option<Snapshot<Raw>> = store.read("missing.json").await.unwrap();
        assert_eq!(read, None);
    }

    #[tokio::test]
    async fn test_read_corrupt_is_not_none() {
        let dir = tempdir().unwrap();
        let store = JsonSnapshotStore::new(dir.path());
        std::fs::write(dir.path().join("state.json"), "{\"a\": \"1\",").unwrap();

        let err = store.read::<Raw>("state.json").await.unwrap_err();
        assert!(err.is_corrupt());
    }

    #[tokio::test]
    async fn test_file_layout_is_human_diffable() {
        let dir = tempdir().unwrap();
        let store = JsonSnapshotStore::new(dir.path());
        let snapshot: Snapshot<Raw> = [("b", "2"), ("a", "1")].into_iter().collect();

        store.write("state.json", &snapshot).await.unwrap();

        let content = std::fs::read_to_string(dir.path().join("state.json")).unwrap();
        assert_eq!(content, "{\n  \"a\": \"1\",\n  \"b\": \"2\"\n}\n");
    }

    #[tokio::test]
    async fn test_overwrite_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let store = JsonSnapshotStore::new(dir.path());

        store.write("state.json", &sample()).await.unwrap();
        let smaller: Snapshot<Raw> = [("only", "one")].into_iter().collect();
        store.write("state.json", &smaller).await.unwrap();

        let read: Snapshot<Raw> = store.read("state.json").await.unwrap().unwrap();
        assert_eq!(read, smaller);
        assert!(!dir.path().join("state.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_failed_replace_removes_temp_file() {
        let dir = tempdir().unwrap();
        let store = JsonSnapshotStore::new(dir.path());
        // A non-empty directory where the snapshot should go cannot be replaced.
        let blocker = dir.path().join("state.json");
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("keep"), "x").unwrap();

        let err = store.write("state.json", &sample()).await.unwrap_err();

        assert!(matches!(err, StoreError::Io(_)));
        assert!(!dir.path().join("state.json.tmp").exists());
        assert!(blocker.join("keep").exists());
    }

    #[tokio::test]
    async fn test_base64_sibling_decodes_to_original() {
        let dir = tempdir().unwrap();
        let store = JsonSnapshotStore::new(dir.path());
        let pairs = [consuldiff_snapshot::KvPair::new("x", "héllo".as_bytes())];

        store
            .write("state.json.b64", &Snapshot::<Base64>::from_pairs(&pairs))
            .await
            .unwrap();

        let read: Snapshot<Base64> = store.read("state.json.b64").await.unwrap().unwrap();
        let decoded = Base64::decode(read.get("x").unwrap()).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "héllo");
    }

    #[tokio::test]
    async fn test_creates_missing_base_directory() {
        let dir = tempdir().unwrap();
        let store = JsonSnapshotStore::new(dir.path().join("nested").join("repo"));

        store.write("state.json", &sample()).await.unwrap();
        assert!(store.exists("state.json").await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_location() {
        let dir = tempdir().unwrap();
        let store = JsonSnapshotStore::new(dir.path());

        assert!(store.write("", &sample()).await.is_err());
        assert!(store.write("../escape.json", &sample()).await.is_err());
        assert!(store.read::<Raw>("..").await.is_err());
    }
}
