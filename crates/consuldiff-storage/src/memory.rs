//! In-memory snapshot storage for testing.

use crate::{parse, render, validate_location, SnapshotStore, StoreError, StoreResult};
use async_trait::async_trait;
use consuldiff_snapshot::{Encoding, Snapshot};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// In-memory snapshot storage.
///
/// Holds the same serialized text a file backend would, so corrupt content
/// can be injected with [`MemorySnapshotStore::put_text`].
pub struct MemorySnapshotStore {
    data: RwLock<HashMap<String, String>>,
    read_only: AtomicBool,
}

impl MemorySnapshotStore {
    /// Create a new in-memory store.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            read_only: AtomicBool::new(false),
        }
    }

    /// Store arbitrary text at a location, bypassing serialization.
    pub fn put_text(&self, location: &str, text: impl Into<String>) -> StoreResult<()> {
        let mut data = self
            .data
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        data.insert(location.to_string(), text.into());
        Ok(())
    }

    /// The raw stored text at a location.
    pub fn text(&self, location: &str) -> Option<String> {
        self.data.read().ok()?.get(location).cloned()
    }

    /// Make subsequent writes fail with [`StoreError::ReadOnly`].
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }
}

impl Default for MemorySnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn read<E: Encoding>(&self, location: &str) -> StoreResult<Option<Snapshot<E>>> {
        validate_location(location)?;
        let data = self
            .data
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;

        match data.get(location) {
            Some(text) => parse(location, text).map(Some),
            None => Ok(None),
        }
    }

    async fn write<E: Encoding>(&self, location: &str, snapshot: &Snapshot<E>) -> StoreResult<()> {
        validate_location(location)?;
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StoreError::ReadOnly);
        }
        let text = render(snapshot)?;
        self.put_text(location, text)
    }

    async fn exists(&self, location: &str) -> StoreResult<bool> {
        validate_location(location)?;
        let data = self
            .data
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        Ok(data.contains_key(location))
    }
}
