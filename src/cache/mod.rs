//! Omnia Cache
//!
//! Session-scoped storage for hydrated collections. One entry per collection,
//! keyed by the collection name, holding the full hydrated array as JSON.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! backend = "memory"      # or "session_dir"
//! max_collections = 128
//! ```
//!
//! Entries have no expiry. They live until cleared explicitly or until the
//! store (the session) is dropped.

mod config;
mod lock;
mod store;

pub use config::{CacheBackend, CacheConfig};
pub use store::{CacheError, CacheStore, DisabledStore, MemoryStore, SessionDirStore, build_store};
