//! The cache capability shared by all backends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engine_core::Session;

use crate::error::Result;

/// Keyed store of in-flight sessions with per-key mutual exclusion.
///
/// The cache performs no compare-and-swap. Callers serialize the
/// read-modify-write of a key by holding the lock returned from
/// [`SessionCache::lock`] across `get` and `put`.
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Returns the session for the key if it was touched at or after `not_older_than`.
    ///
    /// Backend failures are logged and reported as a miss.
    async fn get(
        &self,
        client_id: u64,
        fingerprint: u64,
        not_older_than: DateTime<Utc>,
    ) -> Option<Session>;

    /// Upserts the session for the key. Failures are logged and swallowed.
    async fn put(&self, client_id: u64, fingerprint: u64, session: &Session);

    /// Waits for the exclusive lock on the key.
    async fn lock(&self, client_id: u64, fingerprint: u64) -> Result<Box<dyn SessionLock>>;

    /// Drops all entries.
    async fn clear(&self);
}

/// A held per-key lock.
#[async_trait]
pub trait SessionLock: Send {
    async fn unlock(self: Box<Self>);
}

/// Cache key for a tenant and fingerprint.
pub fn session_key(client_id: u64, fingerprint: u64) -> String {
    format!("{client_id}_{fingerprint}")
}
