//! Snapshot data structures.

use crate::Encoding;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

/// One key as returned by the KV store, before encoding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KvPair {
    /// Full key path.
    pub key: String,
    /// Opaque client flags stored alongside the value.
    pub flags: u64,
    /// Value bytes. `None` when the key exists with a null value.
    pub value: Option<Vec<u8>>,
}

impl KvPair {
    /// Create a pair with a value and no flags.
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            flags: 0,
            value: Some(value.into()),
        }
    }

    /// Set the flags for this pair.
    pub fn with_flags(mut self, flags: u64) -> Self {
        self.flags = flags;
        self
    }
}

/// All keys under a prefix at one point in time, with values rendered in
/// encoding `E`.
///
/// Keys are unique. A missing key means the key does not exist; an empty
/// string is a real value. Per-key flags are carried for inspection but take
/// no part in equality, diffing or persistence.
pub struct Snapshot<E: Encoding> {
    values: BTreeMap<String, String>,
    flags: BTreeMap<String, u64>,
    _encoding: PhantomData<E>,
}

impl<E: Encoding> Snapshot<E> {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::from_values(BTreeMap::new())
    }

    /// Create a snapshot from an already-encoded key/value mapping.
    pub fn from_values(values: BTreeMap<String, String>) -> Self {
        Self {
            values,
            flags: BTreeMap::new(),
            _encoding: PhantomData,
        }
    }

    /// Encode a fetched key set. A later duplicate key replaces an earlier one.
    pub fn from_pairs(pairs: &[KvPair]) -> Self {
        let mut snapshot = Self::new();
        for pair in pairs {
            let value = pair.value.as_deref().map(E::encode).unwrap_or_default();
            snapshot.values.insert(pair.key.clone(), value);
            if pair.flags != 0 {
                snapshot.flags.insert(pair.key.clone(), pair.flags);
            } else {
                snapshot.flags.remove(&pair.key);
            }
        }
        snapshot
    }

    /// Insert or replace an encoded value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Flags recorded for a key (zero when absent or unset).
    pub fn flags(&self, key: &str) -> u64 {
        self.flags.get(key).copied().unwrap_or(0)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The encoded key/value mapping.
    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn into_values(self) -> BTreeMap<String, String> {
        self.values
    }

    /// Name of this snapshot's encoding.
    pub fn encoding(&self) -> &'static str {
        E::NAME
    }
}

impl<E: Encoding> Default for Snapshot<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Encoding> Clone for Snapshot<E> {
    fn clone(&self) -> Self {
        Self {
            values: self.values.clone(),
            flags: self.flags.clone(),
            _encoding: PhantomData,
        }
    }
}

impl<E: Encoding> fmt::Debug for Snapshot<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("encoding", &E::NAME)
            .field("values", &self.values)
            .finish()
    }
}

impl<E: Encoding> PartialEq for Snapshot<E> {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl<E: Encoding> Eq for Snapshot<E> {}

impl<E: Encoding, K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Snapshot<E> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_values(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<E: Encoding> Serialize for Snapshot<E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.values.serialize(serializer)
    }
}

impl<'de, E: Encoding> Deserialize<'de> for Snapshot<E> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        BTreeMap::<String, String>::deserialize(deserializer).map(Self::from_values)
    }
}
