use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use static_assertions::{assert_impl_all, assert_obj_safe};
use tracing::{debug, warn};

use crate::common::collections::BTreeMap;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("storage quota exceeded ({needed} bytes needed, limit {limit})")]
    QuotaExceeded { needed: usize, limit: usize },
    #[error("state file i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("state file encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// String key/value storage. Values are opaque to the store.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Returns whether the key existed.
    fn remove(&self, key: &str) -> Result<bool, StoreError>;
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

assert_obj_safe!(KvStore);

/// In-memory store. Clones share contents. An optional byte quota makes
/// writes fail once the total size of keys and values would exceed it.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
    quota: Option<usize>,
}

assert_impl_all!(MemoryStore: Send, Sync, Clone);

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn with_quota(limit: usize) -> Self {
        Self { quota: Some(limit), ..Self::default() }
    }

    pub fn len(&self) -> usize { self.entries.lock().len() }

    pub fn is_empty(&self) -> bool { self.entries.lock().is_empty() }
}

fn used_bytes(entries: &BTreeMap<String, String>) -> usize {
    entries.iter().map(|(k, v)| k.len() + v.len()).sum()
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        if let Some(limit) = self.quota {
            let existing = entries.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
            let needed = used_bytes(&entries) - existing + key.len() + value.len();
            if needed > limit {
                return Err(StoreError::QuotaExceeded { needed, limit });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.lock().remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.lock().keys().cloned().collect())
    }
}

/// One JSON object per file. The whole map is rewritten through a temporary
/// file and renamed into place, so readers never see a half-written file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<Option<BTreeMap<String, String>>>,
}

assert_impl_all!(FileStore: Send, Sync);

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), entries: Mutex::new(None) }
    }

    pub fn path(&self) -> &Path { &self.path }

    fn load(path: &Path) -> Result<BTreeMap<String, String>, StoreError> {
        match std::fs::read_to_string(path) {
            Ok(buf) => match serde_json::from_str(&buf) {
                Ok(map) => Ok(map),
                Err(e) => {
                    warn!(path = %path.display(), %e, "state file is corrupt, starting empty");
                    Ok(BTreeMap::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>) -> T,
    ) -> Result<T, StoreError> {
        let mut guard = self.entries.lock();
        if guard.is_none() {
            *guard = Some(Self::load(&self.path)?);
        }
        Ok(f(guard.get_or_insert_with(BTreeMap::new)))
    }

    /// Runs `f` on a copy of the entries. When it reports a change the copy is
    /// written out, and only replaces the cached map once the write succeeded.
    fn commit<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>) -> (T, bool),
    ) -> Result<T, StoreError> {
        let mut guard = self.entries.lock();
        let mut next = match guard.as_ref() {
            Some(entries) => entries.clone(),
            None => Self::load(&self.path)?,
        };
        let (out, changed) = f(&mut next);
        if changed {
            self.flush(&next)?;
        }
        *guard = Some(next);
        Ok(out)
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), entries = entries.len(), "wrote state file");
        Ok(())
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.with_entries(|e| e.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.commit(|e| {
            e.insert(key.to_string(), value.to_string());
            ((), true)
        })
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        self.commit(|e| {
            let removed = e.remove(key).is_some();
            (removed, removed)
        })
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        self.with_entries(|e| e.keys().cloned().collect())
    }
}
