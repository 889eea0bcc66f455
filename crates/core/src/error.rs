//! Unified error types for the session engine.
//!
//! Error codes:
//! - DB_001-003: Storage backend errors
//! - VALID_001: Validation errors

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Storage backend error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorCode {
    /// DB_001: Failed to store rows
    StoreFailed,
    /// DB_002: Failed to create or migrate tables
    SchemaFailed,
    /// DB_003: Backend unreachable
    ConnectionFailed,
}

impl DbErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::StoreFailed => "DB_001",
            Self::SchemaFailed => "DB_002",
            Self::ConnectionFailed => "DB_003",
        }
    }
}

/// Unified error type for the session engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage error with code.
    #[error("[{code}] {message}")]
    Database { code: &'static str, message: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a storage error.
    pub fn database(code: DbErrorCode, msg: impl Into<String>) -> Self {
        Self::Database {
            code: code.code(),
            message: msg.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Database { .. } => 500,
            Self::Validation(_) => 400,
            Self::Serialization(_) => 400,
            Self::Config(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::Database { code, .. } => Some(code),
            Self::Validation(_) => Some("VALID_001"),
            _ => None,
        }
    }
}
