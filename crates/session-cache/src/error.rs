//! Session cache errors.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("failed to decode cached session: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("lock on {key} not acquired after {attempts} attempts")]
    LockTimeout { key: String, attempts: u32 },

    #[error("invalid cache configuration: {0}")]
    Config(String),
}
