//! Pipeline configuration.

use std::time::Duration;

/// Upper bound for the idle flush timeout.
pub const MAX_WORKER_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of workers
    pub workers: usize,
    /// Channel capacity and batch threshold
    pub buffer_size: usize,
    /// Idle time after which a worker writes what it has
    pub timeout: Duration,
    /// Retries for primary rows before the pipeline gives up
    pub store_retries: u32,
    /// Linear backoff step between retries
    pub retry_backoff: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            buffer_size: 500,
            timeout: Duration::from_secs(5),
            store_retries: 5,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

impl PipelineConfig {
    /// Clamps values into their usable range.
    pub fn normalized(mut self) -> Self {
        self.workers = self.workers.max(1);
        self.buffer_size = self.buffer_size.max(1);

        if self.timeout.is_zero() {
            self.timeout = PipelineConfig::default().timeout;
        }

        self.timeout = self.timeout.min(MAX_WORKER_TIMEOUT);
        self
    }
}
