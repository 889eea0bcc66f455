//! Telemetry for the session engine.
//!
//! Structured logging setup, an in-process metrics registry and the
//! component health registry served by the API.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
