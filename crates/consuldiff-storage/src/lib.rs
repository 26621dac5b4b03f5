//! Snapshot persistence for consuldiff.
//!
//! A store maps a *location* (a plain file name) to one serialized
//! [`Snapshot`]. Backends:
//! - JSON files in a directory (default, see [`json::JsonSnapshotStore`])
//! - In-memory (for testing, see [`memory::MemorySnapshotStore`])

pub mod error;
pub mod json;
pub mod memory;

pub use error::{StoreError, StoreResult};
pub use json::JsonSnapshotStore;
pub use memory::MemorySnapshotStore;

use async_trait::async_trait;
use consuldiff_snapshot::{Encoding, Snapshot};

/// A trait for snapshot storage backends.
///
/// Writes are whole-snapshot: a reader observes either the previous complete
/// snapshot or the new one, never a mix.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Read the snapshot at a location.
    ///
    /// Returns `None` if nothing has been stored there yet. Content that
    /// cannot be parsed is [`StoreError::Corrupt`], never `None`.
    async fn read<E: Encoding>(&self, location: &str) -> StoreResult<Option<Snapshot<E>>>;

    /// Replace the snapshot at a location.
    async fn write<E: Encoding>(&self, location: &str, snapshot: &Snapshot<E>) -> StoreResult<()>;

    /// Check if a location holds a snapshot.
    async fn exists(&self, location: &str) -> StoreResult<bool>;
}

/// Serialize a snapshot the way every backend persists it: a JSON object
/// with sorted keys, two-space indentation and a trailing newline.
pub fn render<E: Encoding>(snapshot: &Snapshot<E>) -> StoreResult<String> {
    let mut content = serde_json::to_string_pretty(snapshot)?;
    content.push('\n');
    Ok(content)
}

/// Parse persisted snapshot text, mapping failures to [`StoreError::Corrupt`].
pub fn parse<E: Encoding>(location: &str, content: &str) -> StoreResult<Snapshot<E>> {
    serde_json::from_str(content).map_err(|source| StoreError::Corrupt {
        location: location.to_string(),
        source,
    })
}

/// Validate a location: a single non-empty file name.
pub(crate) fn validate_location(location: &str) -> StoreResult<()> {
    if location.is_empty()
        || location.contains('/')
        || location.contains('\\')
        || location == "."
        || location == ".."
    {
        return Err(StoreError::invalid_location(location));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use consuldiff_snapshot::Raw;

    #[test]
    fn test_render_is_sorted_and_indented() {
        let snapshot: Snapshot<Raw> = [("b", "2"), ("a", "1")].into_iter().collect();
        assert_eq!(
            render(&snapshot).unwrap(),
            "{\n  \"a\": \"1\",\n  \"b\": \"2\"\n}\n"
        );
    }

    #[test]
    fn test_render_empty_snapshot() {
        assert_eq!(render(&Snapshot::<Raw>::new()).unwrap(), "{}\n");
    }

    #[test]
    fn test_parse_reports_corruption_with_location() {
        let err = parse::<Raw>("state.json", "{\"a\": ").unwrap_err();
        assert!(err.is_corrupt());
        assert!(err.to_string().contains("state.json"));
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(parse::<Raw>("state.json", "null").unwrap_err().is_corrupt());
        assert!(parse::<Raw>("state.json", "[]").unwrap_err().is_corrupt());
    }

    #[test]
    fn test_validate_location() {
        assert!(validate_location("consul_kv_diff.json").is_ok());
        assert!(validate_location("consul_kv_diff.json.b64").is_ok());
        assert!(validate_location("").is_err());
        assert!(validate_location("..").is_err());
        assert!(validate_location("dir/file.json").is_err());
        assert!(validate_location("dir\\file.json").is_err());
    }
}
