use super::executor::{CaptureExecutor, CaptureJob};
use super::naming::PhotoNaming;
use crate::camera::CaptureEndpoint;
use crate::error::CaptureError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};
use uuid::Uuid;

type CapturedCallback = Box<dyn FnOnce(PathBuf) + Send + 'static>;
type ErrorCallback = Box<dyn FnOnce(CaptureError) + Send + 'static>;

/// The success/failure pair of one capture request. Exactly one of them runs:
/// `complete` consumes the pair, and dropping it unfinished reports an abort.
pub struct CaptureCallbacks {
    pending: Option<(CapturedCallback, ErrorCallback)>,
}

impl CaptureCallbacks {
    pub fn new<S, E>(on_captured: S, on_error: E) -> Self
    where
        S: FnOnce(PathBuf) + Send + 'static,
        E: FnOnce(CaptureError) + Send + 'static,
    {
        Self {
            pending: Some((Box::new(on_captured), Box::new(on_error))),
        }
    }

    pub fn complete(mut self, result: Result<PathBuf, CaptureError>) {
        if let Some((on_captured, on_error)) = self.pending.take() {
            match result {
                Ok(path) => on_captured(path),
                Err(e) => on_error(e),
            }
        }
    }
}

impl Drop for CaptureCallbacks {
    fn drop(&mut self) {
        if let Some((_, on_error)) = self.pending.take() {
            on_error(CaptureError::Aborted {
                details: "capture request dropped before completion".to_string(),
            });
        }
    }
}

/// Name a photo after the current time and capture it into `output_directory`
/// on the executor. Returns the request id used in logs.
pub fn take_photo<S, E>(
    naming: &PhotoNaming,
    endpoint: Arc<dyn CaptureEndpoint>,
    output_directory: &Path,
    executor: &CaptureExecutor,
    on_captured: S,
    on_error: E,
) -> Uuid
where
    S: FnOnce(PathBuf) + Send + 'static,
    E: FnOnce(CaptureError) + Send + 'static,
{
    let id = Uuid::new_v4();
    let callbacks = CaptureCallbacks::new(on_captured, on_error);

    let file_name = match naming.file_name() {
        Ok(file_name) => file_name,
        Err(e) => {
            error!("Capture {} not started: {}", id, e);
            callbacks.complete(Err(e));
            return id;
        }
    };

    let output = output_directory.join(file_name);
    debug!("Queueing capture {} -> {}", id, output.display());

    executor.execute(CaptureJob {
        id,
        endpoint,
        output,
        callbacks,
        submitted_at: Instant::now(),
    });

    id
}
