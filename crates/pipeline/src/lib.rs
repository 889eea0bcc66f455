//! Emission pipeline.
//!
//! Producers hand a [`Bundle`] per tracked request to the [`Pipeline`]. A
//! fixed pool of workers pulls bundles from a bounded channel, accumulates
//! them per entity type and writes them to the [`engine_core::Store`] when a
//! batch is full, when the worker was idle for the configured timeout, or
//! when the pipeline is drained.

pub mod batch;
pub mod bundle;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod worker;

pub use batch::Batches;
pub use bundle::Bundle;
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, Slot};
