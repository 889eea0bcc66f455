//! ClickHouse storage backend for the session engine.
//!
//! Sessions go to a `CollapsingMergeTree(sign)` table so that cancel and
//! state rows collapse on merge. Page views, events and diagnostic requests
//! are plain append-only `MergeTree` tables.

pub mod client;
pub mod config;
pub mod health;
pub mod insert;
pub mod schema;

pub use client::*;
pub use config::*;
pub use health::{check_connection, init_schema};
