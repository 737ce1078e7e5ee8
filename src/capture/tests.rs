use super::*;
use crate::camera::CaptureEndpoint;
use crate::config::CaptureConfig;
use crate::error::CaptureError;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

fn noon_2024() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

fn utc_naming(clock: Arc<FixedClock>) -> PhotoNaming {
    PhotoNaming::from_config(&CaptureConfig {
        timestamp_timezone: "UTC".to_string(),
        ..CaptureConfig::default()
    })
    .with_clock(clock)
}

/// Writes a tiny JPEG marker after an optional delay
struct FileEndpoint {
    delay: Duration,
    calls: Mutex<Vec<PathBuf>>,
}

impl FileEndpoint {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl CaptureEndpoint for FileEndpoint {
    async fn take_picture(&self, output: &Path) -> Result<PathBuf, CaptureError> {
        self.calls.lock().push(output.to_path_buf());
        tokio::time::sleep(self.delay).await;
        tokio::fs::write(output, [0xFF, 0xD8, 0xFF, 0xD9])
            .await
            .map_err(|source| CaptureError::Io {
                path: output.to_path_buf(),
                source,
            })?;
        Ok(output.to_path_buf())
    }
}

struct DetachedEndpoint;

#[async_trait]
impl CaptureEndpoint for DetachedEndpoint {
    async fn take_picture(&self, _output: &Path) -> Result<PathBuf, CaptureError> {
        Err(CaptureError::EndpointDetached)
    }
}

struct PanickingEndpoint;

#[async_trait]
impl CaptureEndpoint for PanickingEndpoint {
    async fn take_picture(&self, _output: &Path) -> Result<PathBuf, CaptureError> {
        panic!("sensor exploded");
    }
}

/// Never finishes a picture
struct StuckEndpoint;

#[async_trait]
impl CaptureEndpoint for StuckEndpoint {
    async fn take_picture(&self, _output: &Path) -> Result<PathBuf, CaptureError> {
        std::future::pending().await
    }
}

#[derive(Debug)]
enum Outcome {
    Captured(PathBuf),
    Failed(CaptureError),
}

/// Callbacks that report into a channel and count invocations
fn reporting_callbacks(
    tx: mpsc::UnboundedSender<Outcome>,
    calls: Arc<AtomicUsize>,
) -> (
    impl FnOnce(PathBuf) + Send + 'static,
    impl FnOnce(CaptureError) + Send + 'static,
) {
    let ok_tx = tx.clone();
    let ok_calls = Arc::clone(&calls);
    (
        move |path| {
            ok_calls.fetch_add(1, Ordering::SeqCst);
            let _ = ok_tx.send(Outcome::Captured(path));
        },
        move |e| {
            calls.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(Outcome::Failed(e));
        },
    )
}

async fn next_outcome(rx: &mut mpsc::UnboundedReceiver<Outcome>) -> Outcome {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("capture callback never fired")
        .expect("outcome channel closed")
}

#[test]
fn test_deterministic_file_name() {
    let naming = utc_naming(Arc::new(FixedClock::new(noon_2024())));
    assert_eq!(naming.file_name().unwrap(), "2024-01-01-12-00-00-000.jpg");
}

#[test]
fn test_file_name_follows_clock_and_zone() {
    let clock = Arc::new(FixedClock::new(noon_2024()));
    let naming = PhotoNaming::new(
        "%Y%m%d_%H%M%S_%3f",
        TimestampZone::resolve("Asia/Tokyo"),
    )
    .with_clock(clock.clone());

    assert_eq!(naming.file_name().unwrap(), "20240101_210000_000.jpg");

    clock.advance(chrono::Duration::milliseconds(1234));
    assert_eq!(naming.file_name().unwrap(), "20240101_210001_234.jpg");
}

#[test]
fn test_timezone_resolution() {
    assert_eq!(TimestampZone::resolve("local"), TimestampZone::Local);
    assert_eq!(TimestampZone::resolve("LOCAL"), TimestampZone::Local);
    assert_eq!(
        TimestampZone::resolve("UTC"),
        TimestampZone::Named(chrono_tz::UTC)
    );
    assert_eq!(TimestampZone::resolve("Mars/Olympus"), TimestampZone::Local);
}

#[test]
fn test_invalid_format_rejected() {
    let clock = Arc::new(FixedClock::new(noon_2024()));

    for format in ["%Y-%", "%D", ""] {
        let naming =
            PhotoNaming::new(format, TimestampZone::Named(chrono_tz::UTC)).with_clock(clock.clone());
        assert!(
            matches!(
                naming.file_name(),
                Err(CaptureError::InvalidFilenameFormat { .. })
            ),
            "format {:?} should be rejected",
            format
        );
    }
}

#[test]
fn test_dropped_callbacks_report_abort() {
    let fired = Arc::new(Mutex::new(None));
    let on_error_slot = Arc::clone(&fired);

    let callbacks = CaptureCallbacks::new(
        |_| panic!("success must not fire"),
        move |e| *on_error_slot.lock() = Some(e),
    );
    drop(callbacks);

    assert!(matches!(
        fired.lock().take(),
        Some(CaptureError::Aborted { .. })
    ));
}

#[tokio::test]
async fn test_take_photo_success() {
    let temp = TempDir::new().unwrap();
    let executor = CaptureExecutor::new();
    let endpoint = FileEndpoint::new(Duration::ZERO);
    let naming = utc_naming(Arc::new(FixedClock::new(noon_2024())));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let calls = Arc::new(AtomicUsize::new(0));
    let (on_captured, on_error) = reporting_callbacks(tx, calls.clone());

    take_photo(
        &naming,
        endpoint.clone(),
        temp.path(),
        &executor,
        on_captured,
        on_error,
    );

    let expected = temp.path().join("2024-01-01-12-00-00-000.jpg");
    match next_outcome(&mut rx).await {
        Outcome::Captured(path) => assert_eq!(path, expected),
        Outcome::Failed(e) => panic!("unexpected failure: {}", e),
    }
    assert!(expected.exists());

    executor.shutdown().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(rx.try_recv().is_err());
    assert_eq!(
        executor.stats(),
        CaptureStats {
            submitted: 1,
            succeeded: 1,
            failed: 0
        }
    );
}

#[tokio::test]
async fn test_take_photo_detached_endpoint() {
    let temp = TempDir::new().unwrap();
    let executor = CaptureExecutor::new();
    let naming = utc_naming(Arc::new(FixedClock::new(noon_2024())));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let calls = Arc::new(AtomicUsize::new(0));
    let (on_captured, on_error) = reporting_callbacks(tx, calls.clone());

    take_photo(
        &naming,
        Arc::new(DetachedEndpoint),
        temp.path(),
        &executor,
        on_captured,
        on_error,
    );

    assert!(matches!(
        next_outcome(&mut rx).await,
        Outcome::Failed(CaptureError::EndpointDetached)
    ));

    executor.shutdown().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(executor.stats().failed, 1);
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_take_photo_panicking_endpoint() {
    let temp = TempDir::new().unwrap();
    let executor = CaptureExecutor::new();
    let naming = utc_naming(Arc::new(FixedClock::new(noon_2024())));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let calls = Arc::new(AtomicUsize::new(0));

    let (on_captured, on_error) = reporting_callbacks(tx.clone(), calls.clone());
    take_photo(
        &naming,
        Arc::new(PanickingEndpoint),
        temp.path(),
        &executor,
        on_captured,
        on_error,
    );
    assert!(matches!(
        next_outcome(&mut rx).await,
        Outcome::Failed(CaptureError::Aborted { .. })
    ));

    // The worker survives and keeps serving
    let (on_captured, on_error) = reporting_callbacks(tx, calls.clone());
    take_photo(
        &naming,
        FileEndpoint::new(Duration::ZERO),
        temp.path(),
        &executor,
        on_captured,
        on_error,
    );
    assert!(matches!(
        next_outcome(&mut rx).await,
        Outcome::Captured(_)
    ));

    executor.shutdown().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_take_photo_invalid_format() {
    let temp = TempDir::new().unwrap();
    let executor = CaptureExecutor::new();
    let endpoint = FileEndpoint::new(Duration::ZERO);
    let naming = PhotoNaming::new("%Y-%", TimestampZone::Local);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let calls = Arc::new(AtomicUsize::new(0));
    let (on_captured, on_error) = reporting_callbacks(tx, calls.clone());

    take_photo(
        &naming,
        endpoint.clone(),
        temp.path(),
        &executor,
        on_captured,
        on_error,
    );

    assert!(matches!(
        next_outcome(&mut rx).await,
        Outcome::Failed(CaptureError::InvalidFilenameFormat { .. })
    ));
    assert!(endpoint.calls.lock().is_empty());

    executor.shutdown().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(executor.stats().submitted, 0);
}

#[tokio::test]
async fn test_take_photo_after_shutdown() {
    let temp = TempDir::new().unwrap();
    let executor = CaptureExecutor::new();
    executor.shutdown().await;
    assert!(executor.is_closed());

    let naming = utc_naming(Arc::new(FixedClock::new(noon_2024())));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let calls = Arc::new(AtomicUsize::new(0));
    let (on_captured, on_error) = reporting_callbacks(tx, calls.clone());

    take_photo(
        &naming,
        FileEndpoint::new(Duration::ZERO),
        temp.path(),
        &executor,
        on_captured,
        on_error,
    );

    assert!(matches!(
        next_outcome(&mut rx).await,
        Outcome::Failed(CaptureError::ExecutorClosed)
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Second shutdown is harmless
    executor.shutdown().await;
}

#[tokio::test]
async fn test_overlapping_captures_are_serialized() {
    let temp = TempDir::new().unwrap();
    let executor = CaptureExecutor::new();
    let endpoint = FileEndpoint::new(Duration::from_millis(20));
    let clock = Arc::new(FixedClock::new(noon_2024()));
    let naming = utc_naming(clock.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let calls = Arc::new(AtomicUsize::new(0));

    let mut expected = Vec::new();
    for _ in 0..5 {
        expected.push(temp.path().join(naming.file_name().unwrap()));
        let (on_captured, on_error) = reporting_callbacks(tx.clone(), calls.clone());
        take_photo(
            &naming,
            endpoint.clone(),
            temp.path(),
            &executor,
            on_captured,
            on_error,
        );
        clock.advance(chrono::Duration::milliseconds(1));
    }

    let mut completed = Vec::new();
    for _ in 0..5 {
        match next_outcome(&mut rx).await {
            Outcome::Captured(path) => completed.push(path),
            Outcome::Failed(e) => panic!("unexpected failure: {}", e),
        }
    }

    assert_eq!(completed, expected);
    assert_eq!(*endpoint.calls.lock(), expected);

    executor.shutdown().await;
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_same_millisecond_overwrites() {
    let temp = TempDir::new().unwrap();
    let executor = CaptureExecutor::new();
    let endpoint = FileEndpoint::new(Duration::ZERO);
    let naming = utc_naming(Arc::new(FixedClock::new(noon_2024())));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let (on_captured, on_error) = reporting_callbacks(tx.clone(), calls.clone());
        take_photo(
            &naming,
            endpoint.clone(),
            temp.path(),
            &executor,
            on_captured,
            on_error,
        );
    }

    for _ in 0..2 {
        assert!(matches!(next_outcome(&mut rx).await, Outcome::Captured(_)));
    }

    executor.shutdown().await;
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn test_shutdown_drains_queue() {
    let temp = TempDir::new().unwrap();
    let executor = CaptureExecutor::new();
    let endpoint = FileEndpoint::new(Duration::from_millis(30));
    let clock = Arc::new(FixedClock::new(noon_2024()));
    let naming = utc_naming(clock.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let (on_captured, on_error) = reporting_callbacks(tx.clone(), calls.clone());
        take_photo(
            &naming,
            endpoint.clone(),
            temp.path(),
            &executor,
            on_captured,
            on_error,
        );
        clock.advance(chrono::Duration::milliseconds(1));
    }

    executor.shutdown().await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(executor.stats().pending(), 0);
    for _ in 0..3 {
        assert!(matches!(rx.try_recv(), Ok(Outcome::Captured(_))));
    }
}

#[tokio::test]
async fn test_shutdown_abandons_stuck_capture() {
    let temp = TempDir::new().unwrap();
    let executor = CaptureExecutor::with_drain_timeout(Duration::from_millis(50));
    let naming = utc_naming(Arc::new(FixedClock::new(noon_2024())));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let calls = Arc::new(AtomicUsize::new(0));

    // One stuck job at the head, one queued behind it
    for endpoint in [
        Arc::new(StuckEndpoint) as Arc<dyn CaptureEndpoint>,
        FileEndpoint::new(Duration::ZERO) as Arc<dyn CaptureEndpoint>,
    ] {
        let (on_captured, on_error) = reporting_callbacks(tx.clone(), calls.clone());
        take_photo(&naming, endpoint, temp.path(), &executor, on_captured, on_error);
    }

    tokio::time::timeout(Duration::from_secs(5), executor.shutdown())
        .await
        .expect("shutdown hung on a stuck capture");

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    for _ in 0..2 {
        assert!(matches!(
            rx.try_recv(),
            Ok(Outcome::Failed(CaptureError::Aborted { .. }))
        ));
    }
    assert_eq!(
        executor.stats(),
        CaptureStats {
            submitted: 2,
            succeeded: 0,
            failed: 2
        }
    );
    assert!(executor.is_closed());
}
