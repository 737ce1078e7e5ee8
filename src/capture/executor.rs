use super::routine::CaptureCallbacks;
use super::stats::{CaptureCounters, CaptureStats};
use crate::camera::CaptureEndpoint;
use crate::error::CaptureError;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A still capture waiting for the worker
pub struct CaptureJob {
    pub id: Uuid,
    pub endpoint: Arc<dyn CaptureEndpoint>,
    pub output: PathBuf,
    pub callbacks: CaptureCallbacks,
    pub submitted_at: Instant,
}

const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Single-worker background queue. Jobs run strictly in submission order.
pub struct CaptureExecutor {
    queue_tx: Mutex<Option<mpsc::UnboundedSender<CaptureJob>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    running: Arc<Mutex<Option<AbortHandle>>>,
    counters: Arc<CaptureCounters>,
    drain_timeout: Duration,
}

impl CaptureExecutor {
    /// Spawn the worker on the current runtime
    pub fn new() -> Self {
        Self::with_drain_timeout(DEFAULT_DRAIN_TIMEOUT)
    }

    /// Like `new`, but `shutdown` abandons captures still running after `drain_timeout`
    pub fn with_drain_timeout(drain_timeout: Duration) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let counters = Arc::new(CaptureCounters::default());
        let running = Arc::new(Mutex::new(None));
        let worker = tokio::spawn(capture_worker(
            queue_rx,
            Arc::clone(&counters),
            Arc::clone(&running),
        ));

        Self {
            queue_tx: Mutex::new(Some(queue_tx)),
            worker: Mutex::new(Some(worker)),
            running,
            counters,
            drain_timeout,
        }
    }

    /// Queue a job. A closed executor fails the job through its error callback.
    pub fn execute(&self, job: CaptureJob) {
        let queue_tx = self.queue_tx.lock().clone();
        let Some(queue_tx) = queue_tx else {
            warn!("Capture {} rejected: executor is shut down", job.id);
            job.callbacks.complete(Err(CaptureError::ExecutorClosed));
            return;
        };

        self.counters.record_submitted();
        if let Err(mpsc::error::SendError(job)) = queue_tx.send(job) {
            error!("Capture {} rejected: worker is gone", job.id);
            self.counters.record_outcome(false);
            job.callbacks.complete(Err(CaptureError::ExecutorClosed));
        }
    }

    pub fn is_closed(&self) -> bool {
        self.queue_tx.lock().is_none()
    }

    pub fn stats(&self) -> CaptureStats {
        self.counters.snapshot()
    }

    /// Stop accepting jobs and wait for the queued ones to finish. Jobs still
    /// unfinished after the drain timeout are aborted and report `Aborted`.
    pub async fn shutdown(&self) {
        // Dropping the sender ends the worker loop once the queue is empty
        if self.queue_tx.lock().take().is_none() {
            debug!("Capture executor already shut down");
            return;
        }

        let worker = self.worker.lock().take();
        let Some(mut worker) = worker else {
            return;
        };

        info!(
            "Draining capture executor ({} pending)",
            self.stats().pending()
        );
        match tokio::time::timeout(self.drain_timeout, &mut worker).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Capture worker failed: {}", e),
            Err(_) => {
                warn!(
                    "Capture worker did not drain within {:?}, abandoning {} capture(s)",
                    self.drain_timeout,
                    self.stats().pending()
                );

                // Stop the worker, then its running capture; dropped callbacks report Aborted
                worker.abort();
                if let Some(running) = self.running.lock().take() {
                    running.abort();
                }
                let _ = worker.await;
                self.counters.record_abandoned();
            }
        }
    }
}

impl Default for CaptureExecutor {
    fn default() -> Self {
        Self::new()
    }
}

async fn capture_worker(
    mut queue_rx: mpsc::UnboundedReceiver<CaptureJob>,
    counters: Arc<CaptureCounters>,
    running: Arc<Mutex<Option<AbortHandle>>>,
) {
    info!("Capture worker started");

    // One job at a time; the queue closes when the executor shuts down
    while let Some(job) = queue_rx.recv().await {
        let CaptureJob {
            id,
            endpoint,
            output,
            callbacks,
            submitted_at,
        } = job;

        debug!("Running capture {} -> {}", id, output.display());

        // A panicking endpoint must not take the worker down with it
        let task = tokio::spawn(async move { endpoint.take_picture(&output).await });
        *running.lock() = Some(task.abort_handle());
        let result = task.await;
        running.lock().take();

        let result = result.unwrap_or_else(|e| {
            Err(CaptureError::Aborted {
                details: e.to_string(),
            })
        });

        // Record, log, then hand the result to the caller
        counters.record_outcome(result.is_ok());
        match &result {
            Ok(path) => info!(
                "Capture {} saved to {} in {:?}",
                id,
                path.display(),
                submitted_at.elapsed()
            ),
            Err(e) => error!("Capture {} failed: {}", id, e),
        }

        callbacks.complete(result);
    }

    info!("Capture worker stopped");
}
