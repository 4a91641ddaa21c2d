//! Local secret cache
//!
//! A single snapshot of every secret in one project, kept on disk with a
//! fetch timestamp and expired lazily once it is older than the TTL.

pub mod lock;
pub mod manager;
pub mod status;
pub mod store;

/// Snapshot file name inside the cache directory
pub const SNAPSHOT_FILE: &str = "secrets.json";

/// Metadata file name inside the cache directory
pub const METADATA_FILE: &str = "metadata.json";

/// Cross-process refresh lock file name
pub const LOCK_FILE: &str = "refresh.lock";

// Re-export main types
pub use manager::{CacheManager, RefreshOutcome, RefreshReport};
pub use status::{CacheStatus, KeyPresence};
pub use store::{AGE_UNKNOWN, CacheSnapshot, CacheStore};
