//! Test doubles for the cycle controller.

#![allow(dead_code)]

use async_trait::async_trait;
use consuldiff_consul::{parse_address, ConsulConfig, ConsulError, ConsulResult, KvSource};
use consuldiff_core::Config;
use consuldiff_git::{GitError, GitResult, PublishOutcome, Publisher};
use consuldiff_snapshot::{Encoding, KvPair, Snapshot};
use consuldiff_storage::{MemorySnapshotStore, SnapshotStore, StoreError, StoreResult};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A KV source that replays scripted responses.
///
/// Each fetch takes the next queued response. Once the queue is empty the
/// last successful state is served again.
#[derive(Clone, Default)]
pub struct MockKvSource {
    responses: Arc<Mutex<VecDeque<Result<Vec<KvPair>, String>>>>,
    last: Arc<Mutex<Vec<KvPair>>>,
    prefixes: Arc<Mutex<Vec<String>>>,
}

impl MockKvSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful fetch returning these pairs.
    pub fn with_state(self, pairs: &[(&str, &str)]) -> Self {
        let pairs = pairs.iter().map(|(k, v)| KvPair::new(*k, *v)).collect();
        self.with_pairs(pairs)
    }

    pub fn with_pairs(self, pairs: Vec<KvPair>) -> Self {
        self.responses.lock().unwrap().push_back(Ok(pairs));
        self
    }

    /// Queue a failed fetch.
    pub fn with_failure(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    /// Prefixes passed to every fetch so far.
    pub fn prefixes(&self) -> Vec<String> {
        self.prefixes.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.prefixes.lock().unwrap().len()
    }
}

#[async_trait]
impl KvSource for MockKvSource {
    async fn fetch(&self, prefix: &str) -> ConsulResult<Vec<KvPair>> {
        self.prefixes.lock().unwrap().push(prefix.to_string());
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Ok(pairs)) => {
                *self.last.lock().unwrap() = pairs.clone();
                Ok(pairs)
            }
            Some(Err(message)) => Err(ConsulError::Api {
                status: 503,
                message,
            }),
            None => Ok(self.last.lock().unwrap().clone()),
        }
    }
}

/// A publisher that records the paths it was asked to publish.
#[derive(Clone, Default)]
pub struct MockPublisher {
    calls: Arc<Mutex<Vec<Vec<PathBuf>>>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every publish fail with a rejected push.
    pub fn failing(self, message: &str) -> Self {
        *self.failure.lock().unwrap() = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Vec<PathBuf>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn publish(&self, paths: &[PathBuf]) -> GitResult<PublishOutcome> {
        self.calls.lock().unwrap().push(paths.to_vec());
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(GitError::PushRejected {
                reference: "refs/heads/main".to_string(),
                message,
            });
        }
        Ok(PublishOutcome {
            commit: Some("abc1234".to_string()),
            pushed: true,
        })
    }
}

/// A memory store whose writes fail for locations ending in a suffix.
#[derive(Default)]
pub struct SelectiveStore {
    inner: MemorySnapshotStore,
    failing_suffix: Mutex<Option<String>>,
}

impl SelectiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail writes to locations ending in `suffix`; `None` clears it.
    pub fn fail_writes_ending_with(&self, suffix: Option<&str>) {
        *self.failing_suffix.lock().unwrap() = suffix.map(str::to_string);
    }
}

#[async_trait]
impl SnapshotStore for SelectiveStore {
    async fn read<E: Encoding>(&self, location: &str) -> StoreResult<Option<Snapshot<E>>> {
        self.inner.read(location).await
    }

    async fn write<E: Encoding>(&self, location: &str, snapshot: &Snapshot<E>) -> StoreResult<()> {
        let failing = self
            .failing_suffix
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|suffix| location.ends_with(suffix));
        if failing {
            return Err(StoreError::ReadOnly);
        }
        self.inner.write(location, snapshot).await
    }

    async fn exists(&self, location: &str) -> StoreResult<bool> {
        self.inner.exists(location).await
    }
}

/// A configuration pointing at `dir` with a short poll interval.
pub fn test_config(dir: &Path) -> Config {
    let address = parse_address("127.0.0.1:8500", false).unwrap();
    Config::new(ConsulConfig::new(address), dir)
        .with_prefix("app/")
        .with_poll_interval(Duration::from_millis(20))
}
