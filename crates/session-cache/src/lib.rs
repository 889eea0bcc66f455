//! Session state cache.
//!
//! Provides:
//! - [`SessionCache`]: get/put/lock/clear over `(client_id, fingerprint)` keys
//! - [`MemCache`]: in-process, bounded by entry count
//! - [`RedisCache`]: shared between processes, TTL based, lease locks

pub mod cache;
pub mod config;
pub mod error;
pub mod mem;
pub mod redis;

pub use cache::{session_key, SessionCache, SessionLock};
pub use config::{CacheConfig, CacheKind};
pub use error::{CacheError, Result};
pub use mem::MemCache;
pub use redis::RedisCache;

use std::sync::Arc;

/// Builds the cache backend selected in the configuration.
pub async fn from_config(config: &CacheConfig) -> Result<Arc<dyn SessionCache>> {
    match config.kind {
        CacheKind::Memory => Ok(Arc::new(MemCache::new(config.max_sessions))),
        CacheKind::Redis => Ok(Arc::new(RedisCache::connect(config).await?)),
    }
}
