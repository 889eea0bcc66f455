//! Cache backend configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which backend holds session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub kind: CacheKind,

    /// Entry bound for the in-process cache
    #[serde(default = "default_max_sessions")]
    pub max_sessions: u64,

    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Prefix for all keys written to Redis
    #[serde(default)]
    pub key_prefix: String,

    /// Time a cached session survives in Redis
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// Lease of a Redis lock; released early on unlock
    #[serde(default = "default_lock_expiry_ms")]
    pub lock_expiry_ms: u64,

    #[serde(default = "default_lock_retries")]
    pub lock_retries: u32,

    #[serde(default = "default_lock_retry_delay_ms")]
    pub lock_retry_delay_ms: u64,
}

fn default_max_sessions() -> u64 {
    10_000
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_session_ttl_secs() -> u64 {
    // a bit more than the default maximum session age
    60 * 60
}

fn default_lock_expiry_ms() -> u64 {
    5_000
}

fn default_lock_retries() -> u32 {
    50
}

fn default_lock_retry_delay_ms() -> u64 {
    20
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            kind: CacheKind::default(),
            max_sessions: default_max_sessions(),
            redis_url: default_redis_url(),
            key_prefix: String::new(),
            session_ttl_secs: default_session_ttl_secs(),
            lock_expiry_ms: default_lock_expiry_ms(),
            lock_retries: default_lock_retries(),
            lock_retry_delay_ms: default_lock_retry_delay_ms(),
        }
    }
}

impl CacheConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs.max(1))
    }

    pub fn lock_expiry(&self) -> Duration {
        Duration::from_millis(self.lock_expiry_ms.max(1))
    }

    pub fn lock_retry_delay(&self) -> Duration {
        Duration::from_millis(self.lock_retry_delay_ms)
    }
}
