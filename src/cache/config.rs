//! Cache configuration.
//!
//! Resolved from the `[cache]` section of `omnia.toml`.

use std::num::NonZeroUsize;

const DEFAULT_MAX_COLLECTIONS: usize = 128;

/// Storage medium backing the session cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheBackend {
    /// Serialized entries kept in process memory.
    #[default]
    Memory,
    /// One JSON file per collection in a private directory removed on drop.
    SessionDir,
}

impl CacheBackend {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" => Some(Self::Memory),
            "session_dir" | "session-dir" => Some(Self::SessionDir),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When false every read misses and nothing is written.
    pub enabled: bool,
    pub backend: CacheBackend,
    /// Upper bound on collections held by the memory backend.
    pub max_collections: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::Memory,
            max_collections: DEFAULT_MAX_COLLECTIONS,
        }
    }
}

impl CacheConfig {
    /// Returns the collection bound as NonZeroUsize, clamping to 1 if zero.
    pub fn max_collections_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_collections).unwrap_or(NonZeroUsize::MIN)
    }
}
