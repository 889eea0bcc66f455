//! Worker loop and store writes.

use engine_core::Store;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry::metrics;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::batch::Batches;
use crate::bundle::Bundle;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};

pub(crate) type SharedReceiver = Arc<Mutex<mpsc::Receiver<Bundle>>>;

/// Writes batches to the store.
#[derive(Clone)]
pub(crate) struct Writer {
    store: Arc<dyn Store>,
    retries: u32,
    backoff: Duration,
}

impl Writer {
    pub(crate) fn new(store: Arc<dyn Store>, config: &PipelineConfig) -> Self {
        Self {
            store,
            retries: config.store_retries,
            backoff: config.retry_backoff,
        }
    }

    /// Writes all batches, sessions first.
    ///
    /// Errors for primary rows are returned after all retries failed.
    /// Diagnostic rows are written once and dropped on failure.
    pub(crate) async fn write(&self, batches: Batches) -> Result<()> {
        if batches.is_empty() {
            return Ok(());
        }

        let started = Instant::now();
        let Batches {
            sessions,
            page_views,
            events,
            requests,
        } = batches;

        if !sessions.is_empty() {
            self.with_retry("sessions", || self.store.save_sessions(&sessions))
                .await?;
            metrics().sessions_saved.inc_by(sessions.len() as u64);
        }

        if !page_views.is_empty() {
            self.with_retry("page_views", || self.store.save_page_views(&page_views))
                .await?;
            metrics().page_views_saved.inc_by(page_views.len() as u64);
        }

        if !events.is_empty() {
            self.with_retry("events", || self.store.save_events(&events))
                .await?;
            metrics().events_saved.inc_by(events.len() as u64);
        }

        if !requests.is_empty() {
            match self.store.save_requests(&requests).await {
                Ok(()) => metrics().requests_saved.inc_by(requests.len() as u64),
                Err(e) => {
                    metrics().diagnostic_errors.inc();
                    warn!(count = requests.len(), error = %e, "Dropping diagnostic requests");
                }
            }
        }

        metrics()
            .store_latency_ms
            .observe(started.elapsed().as_millis() as u64);
        Ok(())
    }

    async fn with_retry<F, Fut>(&self, entity: &'static str, mut save: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = engine_core::Result<()>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.retries {
            if attempt > 0 {
                let backoff = self.backoff * attempt;
                metrics().store_retries.inc();
                warn!(
                    entity = entity,
                    attempt = attempt,
                    backoff_ms = %backoff.as_millis(),
                    "Retrying store write"
                );
                tokio::time::sleep(backoff).await;
            }

            match save().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    metrics().store_errors.inc();
                    last_error = Some(e);
                }
            }
        }

        Err(PipelineError::Store {
            entity,
            attempts: self.retries + 1,
            source: last_error
                .unwrap_or_else(|| engine_core::Error::internal("store write failed")),
        })
    }
}

/// One consumer of the shared channel.
pub(crate) struct Worker {
    pub(crate) id: usize,
    pub(crate) receiver: SharedReceiver,
    pub(crate) writer: Writer,
    pub(crate) buffer_size: usize,
    pub(crate) timeout: Duration,
    pub(crate) stopped: Arc<AtomicBool>,
}

impl Worker {
    /// Runs until cancelled, the channel closes, or a write fails fatally.
    pub(crate) async fn run(self, cancel: CancellationToken) {
        metrics().active_workers.inc();
        let mut batches = Batches::with_capacity(self.buffer_size);
        let idle = tokio::time::sleep(self.timeout);
        tokio::pin!(idle);

        let outcome = loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    break self.writer.write(batches.take()).await;
                }
                bundle = recv(&self.receiver) => {
                    let Some(bundle) = bundle else {
                        break self.writer.write(batches.take()).await;
                    };

                    batches.push(bundle);

                    if batches.is_full(self.buffer_size) {
                        if let Err(e) = self.writer.write(batches.take()).await {
                            break Err(e);
                        }
                    }

                    idle.as_mut().reset(tokio::time::Instant::now() + self.timeout);
                }
                _ = &mut idle => {
                    if !batches.is_empty() {
                        debug!(worker = self.id, count = batches.len(), "Idle flush");

                        if let Err(e) = self.writer.write(batches.take()).await {
                            break Err(e);
                        }
                    }

                    idle.as_mut().reset(tokio::time::Instant::now() + self.timeout);
                }
            }
        };

        metrics().active_workers.dec();

        if let Err(e) = outcome {
            error!(worker = self.id, error = %e, "Store write failed, stopping pipeline");
            self.stopped.store(true, Ordering::SeqCst);
            telemetry::health().pipeline.set_unhealthy(e.to_string());

            // Wake producers blocked on a full channel.
            self.receiver.lock().await.close();
        }
    }
}

async fn recv(receiver: &SharedReceiver) -> Option<Bundle> {
    receiver.lock().await.recv().await
}
