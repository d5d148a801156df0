//! Persistence backends: an async key to string primitive.
//!
//! Backends are assumed atomic per key. Nothing here validates values; decoding is the
//! store's job.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use atomic_write_file::AtomicWriteFile;
use fs2::FileExt;

use crate::error::{Result, TrailError};

/// Asynchronous key-value persistence scoped to one install.
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Raw value under `key`, `None` when absent.
    async fn load(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value under `key`.
    async fn store(&self, key: &str, value: String) -> Result<()>;
}

#[async_trait]
impl<B: PersistenceBackend + ?Sized> PersistenceBackend for Arc<B> {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        (**self).load(key).await
    }

    async fn store(&self, key: &str, value: String) -> Result<()> {
        (**self).store(key, value).await
    }
}

/// Shared in-memory backend. Clones share the same map, like tabs sharing one profile.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    values: Arc<Mutex<HashMap<String, String>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or overwrite a raw value, bypassing any store.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Make subsequent loads fail, simulating an unavailable backend.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent stores fail, simulating a rejected write.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PersistenceBackend for MemoryBackend {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(TrailError::Backend {
                key: key.to_string(),
                reason: "backend unavailable".into(),
            });
        }
        Ok(self.raw(key))
    }

    async fn store(&self, key: &str, value: String) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TrailError::Backend {
                key: key.to_string(),
                reason: "write rejected".into(),
            });
        }
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(())
    }
}

/// All keys in one JSON object file, replaced atomically on every store.
///
/// Writers take an exclusive lock on a sibling `.lock` file around read-modify-write, so
/// several processes sharing the file never lose each other's keys.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data dir>/read-trail/store.json`, when the platform has a data dir.
    #[must_use]
    pub fn default_location() -> Option<PathBuf> {
        dirs_next::data_dir().map(|dir| dir.join("read-trail").join("store.json"))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn read_map(path: &Path) -> Result<BTreeMap<String, String>> {
        let text = match fs_err::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_str(&text) {
            Ok(map) => Ok(map),
            Err(err) => {
                tracing::warn!(store.path = %path.display(), error = %err, "store file is not a string map; treating as empty");
                Ok(BTreeMap::new())
            }
        }
    }

    fn store_blocking(&self, key: &str, value: String) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs_err::create_dir_all(parent)?;
            }
        }
        let lock = fs_err::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        lock.file().lock_exclusive()?;

        let result = (|| -> Result<()> {
            let mut map = Self::read_map(&self.path)?;
            map.insert(key.to_string(), value);
            let encoded = serde_json::to_vec(&map)?;
            let mut file = AtomicWriteFile::open(&self.path)?;
            file.write_all(&encoded)?;
            file.commit()?;
            Ok(())
        })();

        if let Err(err) = FileExt::unlock(lock.file()) {
            tracing::warn!(store.path = %self.path.display(), error = %err, "store lock release failed");
        }
        result
    }
}

#[async_trait]
impl PersistenceBackend for FileBackend {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            Self::read_map(&path).map(|mut map| map.remove(&key))
        })
        .await
        .map_err(|err| TrailError::TaskJoin {
            reason: err.to_string(),
        })?
    }

    async fn store(&self, key: &str, value: String) -> Result<()> {
        let backend = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || backend.store_blocking(&key, value))
            .await
            .map_err(|err| TrailError::TaskJoin {
                reason: err.to_string(),
            })?
    }
}
