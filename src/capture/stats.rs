use std::sync::atomic::{AtomicU64, Ordering};

/// Counters kept by the capture executor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl CaptureStats {
    /// Requests accepted but not yet finished
    pub fn pending(&self) -> u64 {
        self.submitted.saturating_sub(self.succeeded + self.failed)
    }
}

#[derive(Debug, Default)]
pub(crate) struct CaptureCounters {
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl CaptureCounters {
    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_outcome(&self, success: bool) {
        if success {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Count every unfinished request as failed
    pub(crate) fn record_abandoned(&self) {
        let snapshot = self.snapshot();
        self.failed.fetch_add(snapshot.pending(), Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CaptureStats {
        CaptureStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
