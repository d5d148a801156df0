//! Read-state store: cached, validated access to visit records plus change broadcast.
//!
//! Cache policy: a bucket enters the cache after a successful backend read or after a
//! successful backend write, never before. A failed write leaves the cache untouched.
//! Cross-tab doorbells invalidate cached buckets; they are never merged as data.

mod backend;
mod bucket;
mod sync;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

pub use backend::{FileBackend, MemoryBackend, PersistenceBackend};
pub use bucket::Bucket;
pub use sync::{StorageEvent, SyncBus, SyncListener, SyncPort};

use crate::constants::SYNC_EVENT_KEY;
use crate::error::Result;
use crate::keys::derive_key;
use crate::types::{KeyScheme, ReadRecord, SyncSignal};

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

fn system_clock() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Per-tab store over a shared persistence backend.
pub struct ReadStore<B> {
    backend: B,
    scheme: KeyScheme,
    cache: Mutex<HashMap<String, Bucket>>,
    write_gate: tokio::sync::Mutex<()>,
    port: Option<SyncPort>,
    clock: Clock,
}

impl<B> ReadStore<B> {
    fn cache(&self) -> std::sync::MutexGuard<'_, HashMap<String, Bucket>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache().len()
    }
}

impl<B> std::fmt::Debug for ReadStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadStore")
            .field("scheme", &self.scheme)
            .field("cached_buckets", &self.cached_len())
            .field("broadcasts", &self.port.is_some())
            .finish_non_exhaustive()
    }
}

impl<B: PersistenceBackend> ReadStore<B> {
    #[must_use]
    pub fn new(backend: B, scheme: KeyScheme) -> Self {
        Self {
            backend,
            scheme,
            cache: Mutex::new(HashMap::new()),
            write_gate: tokio::sync::Mutex::new(()),
            port: None,
            clock: Arc::new(system_clock),
        }
    }

    /// Publish a doorbell on `port` after every successful write.
    #[must_use]
    pub fn with_sync_port(mut self, port: SyncPort) -> Self {
        self.port = Some(port);
        self
    }

    /// Replace the wall clock (epoch milliseconds) used to stamp writes.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    #[must_use]
    pub fn scheme(&self) -> KeyScheme {
        self.scheme
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub fn now(&self) -> i64 {
        (self.clock)()
    }

    #[must_use]
    pub fn key_for(&self, url: &str) -> String {
        derive_key(url, self.scheme)
    }

    /// Record for `url`, cache first.
    ///
    /// Invalid persisted values read as `Ok(None)`; only backend I/O failures are errors,
    /// and those are not cached.
    pub async fn get(&self, url: &str) -> Result<Option<ReadRecord>> {
        let key = self.key_for(url);
        let cached = self
            .cache()
            .get(&key)
            .map(|bucket| bucket.lookup(url).cloned());
        if let Some(found) = cached {
            return Ok(found);
        }

        let raw = self.backend.load(&key).await?;
        let bucket = Bucket::decode(self.scheme, &key, raw.as_deref());
        let mut cache = self.cache();
        // A write that finished while we were loading is fresher than what we read.
        let cached = cache.entry(key).or_insert(bucket);
        Ok(cached.lookup(url).cloned())
    }

    /// Persist a visit for `url`, returning the record as stored.
    ///
    /// `record.url` is replaced by `url` and `visited_at` is stamped now (kept strictly
    /// above any earlier stamp for the same URL). The bucket is re-read from the backend
    /// so a domain-sharded write keeps siblings written by other tabs.
    pub async fn set(&self, url: &str, record: ReadRecord) -> Result<ReadRecord> {
        let _gate = self.write_gate.lock().await;
        let key = self.key_for(url);

        let raw = self.backend.load(&key).await?;
        let current = Bucket::decode(self.scheme, &key, raw.as_deref());

        let now = self.now();
        let visited_at = current
            .lookup(url)
            .map_or(now, |previous| now.max(previous.visited_at.saturating_add(1)));
        let stamped = ReadRecord {
            url: url.to_string(),
            visited_at,
            ..record
        };
        let merged = current.merged(stamped.clone(), self.scheme);
        let encoded = merged.encode()?;

        if let Err(err) = self.backend.store(&key, encoded).await {
            tracing::warn!(store.key = %key, error = %err, "persist failed; cache unchanged");
            return Err(err);
        }
        self.cache().insert(key.clone(), merged);
        tracing::debug!(store.key = %key, store.visited_at = visited_at, "record persisted");

        if let Some(port) = &self.port {
            match serde_json::to_string(&SyncSignal::new(key.as_str(), now)) {
                Ok(envelope) => port.publish(SYNC_EVENT_KEY, Some(envelope)),
                Err(err) => tracing::warn!(error = %err, "sync envelope encode failed"),
            }
        }
        Ok(stamped)
    }

    /// Drop one cached bucket so the next `get` re-reads the backend.
    pub fn invalidate(&self, key: &str) {
        self.cache().remove(key);
    }

    pub fn invalidate_all(&self) {
        self.cache().clear();
    }

    /// React to a doorbell: drop the bucket it names, or everything if it is unreadable.
    pub fn invalidate_from_signal(&self, raw: Option<&str>) {
        match raw.and_then(SyncSignal::parse) {
            Some(signal) => {
                tracing::debug!(store.key = %signal.key, "invalidating bucket from sync signal");
                self.invalidate(&signal.key);
            }
            None => {
                tracing::debug!("unreadable sync signal; invalidating whole cache");
                self.invalidate_all();
            }
        }
    }
}
