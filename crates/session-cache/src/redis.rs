//! Redis backed session cache.
//!
//! Sessions are stored as JSON with an expiry. Locks are leases taken with
//! `SET key token NX PX expiry` and released by a script that deletes the
//! key only while it still holds the caller's token, so an expired lease
//! taken over by another process is never released by the previous holder.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engine_core::Session;
use redis::aio::ConnectionManager;
use redis::Script;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache::{session_key, SessionCache, SessionLock};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

static UNLOCK_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(include_str!("unlock.lua")));

pub struct RedisCache {
    conn: ConnectionManager,
    prefix: String,
    ttl: Duration,
    lock_expiry: Duration,
    lock_retries: u32,
    lock_retry_delay: Duration,
}

impl RedisCache {
    /// Connects to the configured Redis server.
    pub async fn connect(config: &CacheConfig) -> Result<Self> {
        if config.redis_url.is_empty() {
            return Err(CacheError::Config("redis_url is empty".into()));
        }

        let client = redis::Client::open(config.redis_url.as_str())?;
        let conn = ConnectionManager::new(client).await?;

        debug!(url = %config.redis_url, "Connected session cache to Redis");

        Ok(Self {
            conn,
            prefix: config.key_prefix.clone(),
            ttl: config.session_ttl(),
            lock_expiry: config.lock_expiry(),
            lock_retries: config.lock_retries.max(1),
            lock_retry_delay: config.lock_retry_delay(),
        })
    }

    fn session_key(&self, client_id: u64, fingerprint: u64) -> String {
        format!("{}session_{}", self.prefix, session_key(client_id, fingerprint))
    }

    fn lock_key(&self, client_id: u64, fingerprint: u64) -> String {
        format!("{}lock_{}", self.prefix, session_key(client_id, fingerprint))
    }

    async fn try_get(&self, key: &str) -> Result<Option<Session>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn try_put(&self, key: &str, session: &Session) -> Result<()> {
        let value = serde_json::to_string(session)?;
        let mut conn = self.conn.clone();
        let () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(self.ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    /// Checks that the server answers.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionCache for RedisCache {
    async fn get(
        &self,
        client_id: u64,
        fingerprint: u64,
        not_older_than: DateTime<Utc>,
    ) -> Option<Session> {
        let key = self.session_key(client_id, fingerprint);

        match self.try_get(&key).await {
            Ok(session) => session.filter(|s| s.is_active_since(not_older_than)),
            Err(e) => {
                warn!(key = %key, error = %e, "Session cache read failed, treating as miss");
                None
            }
        }
    }

    async fn put(&self, client_id: u64, fingerprint: u64, session: &Session) {
        let key = self.session_key(client_id, fingerprint);

        if let Err(e) = self.try_put(&key, session).await {
            warn!(key = %key, error = %e, "Session cache write failed");
        }
    }

    async fn lock(&self, client_id: u64, fingerprint: u64) -> Result<Box<dyn SessionLock>> {
        let key = self.lock_key(client_id, fingerprint);
        let token = uuid::Uuid::new_v4().to_string();
        let expiry_ms = self.lock_expiry.as_millis() as u64;
        let mut conn = self.conn.clone();

        for attempt in 1..=self.lock_retries {
            let acquired: Option<String> = redis::cmd("SET")
                .arg(&key)
                .arg(&token)
                .arg("NX")
                .arg("PX")
                .arg(expiry_ms)
                .query_async(&mut conn)
                .await?;

            if acquired.is_some() {
                return Ok(Box::new(RedisLock {
                    conn: conn.clone(),
                    key,
                    token,
                }));
            }

            if attempt < self.lock_retries {
                tokio::time::sleep(self.lock_retry_delay).await;
            }
        }

        Err(CacheError::LockTimeout {
            key,
            attempts: self.lock_retries,
        })
    }

    async fn clear(&self) {
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<()> = redis::cmd("FLUSHDB").query_async(&mut conn).await;

        if let Err(e) = result {
            warn!(error = %e, "Failed to clear session cache");
        }
    }
}

struct RedisLock {
    conn: ConnectionManager,
    key: String,
    token: String,
}

#[async_trait]
impl SessionLock for RedisLock {
    async fn unlock(self: Box<Self>) {
        let RedisLock {
            mut conn,
            key,
            token,
        } = *self;

        let result: redis::RedisResult<i64> = UNLOCK_SCRIPT
            .key(&key)
            .arg(&token)
            .invoke_async(&mut conn)
            .await;

        match result {
            Ok(0) => debug!(key = %key, "Lock lease expired before unlock"),
            Ok(_) => {}
            Err(e) => warn!(key = %key, error = %e, "Failed to release lock, lease will expire"),
        }
    }
}
