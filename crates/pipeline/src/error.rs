//! Pipeline errors.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Primary rows could not be written; the pipeline stops.
    #[error("failed to save {entity} after {attempts} attempts: {source}")]
    Store {
        entity: &'static str,
        attempts: u32,
        #[source]
        source: engine_core::Error,
    },

    #[error("pipeline is stopped")]
    Stopped,
}
