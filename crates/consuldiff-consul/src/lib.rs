//! Consul KV access for consuldiff.
//!
//! [`KvSource`] is the seam the cycle controller fetches through;
//! [`ConsulClient`] implements it over the Consul HTTP API.

mod client;
mod error;

pub use client::{parse_address, ConsulClient, ConsulConfig};
pub use error::{ConsulError, ConsulResult};

use async_trait::async_trait;
use consuldiff_snapshot::KvPair;

/// A source of complete key sets.
#[async_trait]
pub trait KvSource: Send + Sync {
    /// Fetch every key under `prefix` as one consistent set.
    ///
    /// An absent prefix is an empty set, not an error.
    async fn fetch(&self, prefix: &str) -> ConsulResult<Vec<KvPair>>;
}
