//! In-process session cache.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engine_core::Session;
use moka::future::Cache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

use crate::cache::{session_key, SessionCache, SessionLock};
use crate::error::Result;

type KeyMutex = Arc<tokio::sync::Mutex<()>>;

struct Entry {
    mutex: KeyMutex,
    /// Holders and waiters
    users: usize,
}

/// Per-key async mutexes, created on demand and dropped once unused.
#[derive(Default)]
struct LockTable {
    locks: Mutex<HashMap<String, Entry>>,
}

impl LockTable {
    fn checkout(self: &Arc<Self>, key: String) -> (KeyMutex, Checkout) {
        let mutex = {
            let mut locks = self.locks.lock();
            let entry = locks.entry(key.clone()).or_insert_with(|| Entry {
                mutex: KeyMutex::default(),
                users: 0,
            });
            entry.users += 1;
            entry.mutex.clone()
        };

        (
            mutex,
            Checkout {
                key,
                table: self.clone(),
            },
        )
    }

    fn release(&self, key: &str) {
        let mut locks = self.locks.lock();

        if let Some(entry) = locks.get_mut(key) {
            entry.users = entry.users.saturating_sub(1);

            if entry.users == 0 {
                locks.remove(key);
            }
        }
    }

    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

/// Interest in a key's mutex. Dropping it gives the table entry back, also
/// when a waiting `lock()` future is cancelled.
struct Checkout {
    key: String,
    table: Arc<LockTable>,
}

impl Drop for Checkout {
    fn drop(&mut self) {
        self.table.release(&self.key);
    }
}

/// Session cache for a single node.
///
/// Entries are bounded by `max_sessions`; which entries go first is left to
/// moka's eviction policy.
/// Locks are plain tokio mutexes and only exclude callers in this process.
pub struct MemCache {
    sessions: Cache<String, Session>,
    locks: Arc<LockTable>,
}

impl MemCache {
    pub fn new(max_sessions: u64) -> Self {
        Self {
            sessions: Cache::builder().max_capacity(max_sessions.max(1)).build(),
            locks: Arc::new(LockTable::default()),
        }
    }

    /// Number of keys with a held or awaited lock.
    pub fn active_locks(&self) -> usize {
        self.locks.len()
    }

    /// Approximate number of cached sessions.
    pub fn entry_count(&self) -> u64 {
        self.sessions.entry_count()
    }
}

#[async_trait]
impl SessionCache for MemCache {
    async fn get(
        &self,
        client_id: u64,
        fingerprint: u64,
        not_older_than: DateTime<Utc>,
    ) -> Option<Session> {
        self.sessions
            .get(&session_key(client_id, fingerprint))
            .await
            .filter(|s| s.is_active_since(not_older_than))
    }

    async fn put(&self, client_id: u64, fingerprint: u64, session: &Session) {
        self.sessions
            .insert(session_key(client_id, fingerprint), session.clone())
            .await;
    }

    async fn lock(&self, client_id: u64, fingerprint: u64) -> Result<Box<dyn SessionLock>> {
        let (mutex, checkout) = self.locks.checkout(session_key(client_id, fingerprint));
        let guard = mutex.lock_owned().await;

        Ok(Box::new(MemLock {
            _guard: guard,
            _checkout: checkout,
        }))
    }

    async fn clear(&self) {
        self.sessions.invalidate_all();
        self.sessions.run_pending_tasks().await;
    }
}

/// Released on drop as well as on `unlock`. Fields drop in order, so the
/// mutex is unlocked before the table entry is given back.
struct MemLock {
    _guard: OwnedMutexGuard<()>,
    _checkout: Checkout,
}

#[async_trait]
impl SessionLock for MemLock {
    async fn unlock(self: Box<Self>) {
        drop(self);
    }
}
