//! Worker pool lifecycle.

use engine_core::Store;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use telemetry::{health, metrics};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::batch::Batches;
use crate::bundle::Bundle;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::worker::{SharedReceiver, Worker, Writer};

struct WorkerPool {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

/// Bounded batching writer in front of a [`Store`].
///
/// [`Pipeline::send`] applies backpressure once the channel is full.
/// [`Pipeline::flush`] drains everything and restarts the workers,
/// [`Pipeline::stop`] drains everything and refuses further bundles.
pub struct Pipeline {
    config: PipelineConfig,
    sender: mpsc::Sender<Bundle>,
    receiver: SharedReceiver,
    writer: Writer,
    stopped: Arc<AtomicBool>,
    pool: Mutex<Option<WorkerPool>>,
}

impl Pipeline {
    /// Creates the channel and spawns the workers. Must be called inside a
    /// tokio runtime.
    pub fn start(store: Arc<dyn Store>, config: PipelineConfig) -> Self {
        let config = config.normalized();
        let (sender, receiver) = mpsc::channel(config.buffer_size);
        let receiver = Arc::new(Mutex::new(receiver));
        let writer = Writer::new(store, &config);
        let stopped = Arc::new(AtomicBool::new(false));
        let pool = spawn_workers(&config, &receiver, &writer, &stopped);

        let pipeline = Self {
            pool: Mutex::new(Some(pool)),
            config,
            sender,
            receiver,
            writer,
            stopped,
        };

        info!(
            workers = pipeline.config.workers,
            buffer_size = pipeline.config.buffer_size,
            timeout_ms = pipeline.config.timeout.as_millis() as u64,
            "Pipeline started"
        );
        health().pipeline.set_healthy();
        pipeline
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// True once the pipeline was stopped or a fatal store error occurred.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Enqueues a bundle, waiting while the channel is full.
    ///
    /// Returns false if the bundle was dropped because the pipeline is
    /// stopped.
    pub async fn send(&self, bundle: Bundle) -> bool {
        if bundle.is_empty() {
            return true;
        }

        match self.reserve().await {
            Some(slot) => {
                slot.send(bundle);
                true
            }
            None => false,
        }
    }

    /// Waits for room in the channel and holds it until [`Slot::send`].
    ///
    /// Nothing is enqueued if the slot is dropped, so a caller can reserve
    /// before committing state elsewhere. Returns `None` if the pipeline is
    /// stopped.
    pub async fn reserve(&self) -> Option<Slot<'_>> {
        if self.is_stopped() {
            metrics().bundles_dropped.inc();
            return None;
        }

        match self.sender.reserve().await {
            Ok(permit) => Some(Slot {
                permit,
                sender: &self.sender,
            }),
            Err(_) => {
                metrics().bundles_dropped.inc();
                debug!("Pipeline closed, bundle dropped");
                None
            }
        }
    }

    /// Writes everything buffered so far, then resumes with fresh workers.
    pub async fn flush(&self) -> Result<()> {
        let mut pool = self.pool.lock().await;

        if self.is_stopped() {
            return Err(PipelineError::Stopped);
        }

        if let Some(pool) = pool.take() {
            Self::shutdown(pool).await;
        }

        let drained = self.drain().await;
        metrics().flushes.inc();

        if let Err(e) = drained {
            self.fail(&e);
            return Err(e);
        }

        // A worker may have failed while being shut down.
        if self.is_stopped() {
            return Err(PipelineError::Stopped);
        }

        *pool = Some(spawn_workers(
            &self.config,
            &self.receiver,
            &self.writer,
            &self.stopped,
        ));
        Ok(())
    }

    /// Drains all workers and the channel and stops accepting bundles.
    ///
    /// Calling it again is a no-op.
    pub async fn stop(&self) -> Result<()> {
        let mut pool = self.pool.lock().await;
        let was_stopped = self.stopped.swap(true, Ordering::SeqCst);

        if let Some(pool) = pool.take() {
            Self::shutdown(pool).await;
        }

        let mut result = self.drain().await;
        self.receiver.lock().await.close();

        // Bundles that made it in before the channel closed.
        if result.is_ok() {
            result = self.drain().await;
        }

        if let Err(e) = &result {
            self.fail(e);
        } else if !was_stopped {
            health().pipeline.set_unhealthy("stopped");
            info!("Pipeline stopped");
        }

        result
    }

    async fn shutdown(pool: WorkerPool) {
        pool.cancel.cancel();

        for handle in pool.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Pipeline worker panicked");
            }
        }
    }

    /// Writes whatever is left in the channel from the calling task.
    async fn drain(&self) -> Result<()> {
        let mut batches = Batches::with_capacity(self.config.buffer_size);
        let mut receiver = self.receiver.lock().await;

        while let Ok(bundle) = receiver.try_recv() {
            batches.push(bundle);

            if batches.is_full(self.config.buffer_size) {
                self.writer.write(batches.take()).await?;
            }
        }

        drop(receiver);
        metrics().queue_depth.set(0);
        self.writer.write(batches).await
    }

    fn fail(&self, e: &PipelineError) {
        self.stopped.store(true, Ordering::SeqCst);
        health().pipeline.set_unhealthy(e.to_string());
    }
}

/// Reserved channel capacity for one bundle.
pub struct Slot<'a> {
    permit: mpsc::Permit<'a, Bundle>,
    sender: &'a mpsc::Sender<Bundle>,
}

impl Slot<'_> {
    pub fn send(self, bundle: Bundle) {
        self.permit.send(bundle);
        metrics().bundles_enqueued.inc();
        metrics()
            .queue_depth
            .set((self.sender.max_capacity() - self.sender.capacity()) as u64);
    }
}

fn spawn_workers(
    config: &PipelineConfig,
    receiver: &SharedReceiver,
    writer: &Writer,
    stopped: &Arc<AtomicBool>,
) -> WorkerPool {
    let cancel = CancellationToken::new();
    let handles = (0..config.workers)
        .map(|id| {
            let worker = Worker {
                id,
                receiver: receiver.clone(),
                writer: writer.clone(),
                buffer_size: config.buffer_size,
                timeout: config.timeout,
                stopped: stopped.clone(),
            };
            tokio::spawn(worker.run(cancel.clone()))
        })
        .collect();

    WorkerPool { cancel, handles }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.get_mut().take() {
            pool.cancel.cancel();
        }
    }
}
