//! Cache storage implementations.
//!
//! Every backend stores a collection's hydrated array as JSON text under the
//! collection name and reports unreadable entries as absent.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use lru::LruCache;
use serde_json::Value;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, warn};

use super::config::{CacheBackend, CacheConfig};
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to encode cache entry `{key}`: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write cache entry `{key}`: {source}")]
    Write {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to open cache session directory: {0}")]
    Session(#[source] io::Error),
}

/// Session-scoped key → JSON storage.
///
/// Reads never fail: a missing, truncated, or otherwise unparsable entry comes
/// back as `None`, which callers treat as a miss.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: &Value) -> Result<(), CacheError>;

    /// Remove one entry, or every entry when `key` is `None`.
    fn clear(&self, key: Option<&str>);
}

/// Build the store selected by configuration.
pub fn build_store(config: &CacheConfig) -> Result<Arc<dyn CacheStore>, CacheError> {
    if !config.enabled {
        return Ok(Arc::new(DisabledStore));
    }
    match config.backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryStore::new(config))),
        CacheBackend::SessionDir => Ok(Arc::new(SessionDirStore::new()?)),
    }
}

fn decode(key: &str, text: &str) -> Option<Value> {
    match serde_json::from_str(text) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(
                key,
                error = %err,
                target_module = SOURCE,
                "Discarding unreadable cache entry"
            );
            None
        }
    }
}

fn encode(key: &str, value: &Value) -> Result<String, CacheError> {
    serde_json::to_string(value).map_err(|source| CacheError::Encode {
        key: key.to_owned(),
        source,
    })
}

// ============================================================================
// Memory store
// ============================================================================

/// In-process store holding serialized entries under LRU eviction.
pub struct MemoryStore {
    entries: RwLock<LruCache<String, String>>,
}

impl MemoryStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.max_collections_non_zero())),
        }
    }

    /// Number of cached collections.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "memory_len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn put_text(&self, key: &str, text: &str) {
        rw_write(&self.entries, SOURCE, "memory_put_text").put(key.to_owned(), text.to_owned());
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        let text = rw_write(&self.entries, SOURCE, "memory_get")
            .get(key)
            .cloned()?;
        decode(key, &text)
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), CacheError> {
        let text = encode(key, value)?;
        let evicted = rw_write(&self.entries, SOURCE, "memory_set").push(key.to_owned(), text);
        if let Some((evicted_key, _)) = evicted
            && evicted_key != key
        {
            debug!(key = %evicted_key, "Evicted cached collection");
        }
        Ok(())
    }

    fn clear(&self, key: Option<&str>) {
        let mut entries = rw_write(&self.entries, SOURCE, "memory_clear");
        match key {
            Some(key) => {
                entries.pop(key);
            }
            None => entries.clear(),
        }
    }
}

// ============================================================================
// Session directory store
// ============================================================================

/// File-backed store living in a private temporary directory.
///
/// The directory and every entry in it are removed when the store is dropped,
/// which ends the cache session.
pub struct SessionDirStore {
    dir: TempDir,
}

impl SessionDirStore {
    pub fn new() -> Result<Self, CacheError> {
        let dir = tempfile::Builder::new()
            .prefix("omnia-session-")
            .tempdir()
            .map_err(CacheError::Session)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Map a key to its file. Bytes outside `[A-Za-z0-9-]` become `_` plus
    /// their hex value, so distinct keys never share a file.
    fn entry_path(&self, key: &str) -> PathBuf {
        let mut file = String::with_capacity(key.len());
        for c in key.chars() {
            if c.is_ascii_alphanumeric() || c == '-' {
                file.push(c);
            } else {
                let mut utf8 = [0_u8; 4];
                for byte in c.encode_utf8(&mut utf8).bytes() {
                    file.push('_');
                    file.push_str(&hex::encode([byte]));
                }
            }
        }
        self.dir.path().join(format!("{file}.json"))
    }
}

impl CacheStore for SessionDirStore {
    fn get(&self, key: &str) -> Option<Value> {
        let path = self.entry_path(key);
        match fs::read_to_string(&path) {
            Ok(text) => decode(key, &text),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                warn!(key, path = %path.display(), error = %err, "Failed to read cache entry");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), CacheError> {
        let text = encode(key, value)?;
        let path = self.entry_path(key);
        let staging = path.with_extension("json.tmp");
        let write_err = |source| CacheError::Write {
            key: key.to_owned(),
            source,
        };
        fs::write(&staging, text).map_err(write_err)?;
        fs::rename(&staging, &path).map_err(write_err)
    }

    fn clear(&self, key: Option<&str>) {
        let targets: Vec<PathBuf> = match key {
            Some(key) => vec![self.entry_path(key)],
            None => match fs::read_dir(self.dir.path()) {
                Ok(entries) => entries
                    .filter_map(Result::ok)
                    .map(|entry| entry.path())
                    .collect(),
                Err(err) => {
                    warn!(error = %err, "Failed to list cache session directory");
                    return;
                }
            },
        };

        for path in targets {
            if let Err(err) = fs::remove_file(&path)
                && err.kind() != io::ErrorKind::NotFound
            {
                warn!(path = %path.display(), error = %err, "Failed to remove cache entry");
            }
        }
    }
}

// ============================================================================
// Disabled store
// ============================================================================

/// Store used when caching is switched off: always empty, accepts and drops writes.
pub struct DisabledStore;

impl CacheStore for DisabledStore {
    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    fn set(&self, _key: &str, _value: &Value) -> Result<(), CacheError> {
        Ok(())
    }

    fn clear(&self, _key: Option<&str>) {}
}
