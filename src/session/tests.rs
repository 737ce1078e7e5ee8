use super::*;
use crate::camera::{
    acquire_provider, CameraBackend, CameraDevice, CameraInfo, LensFacing, Preview,
    PreviewSurface, ProcessProviderSource,
};
use crate::capture::FixedClock;
use crate::config::CaptureConfig;
use crate::error::{CameraError, SnapcamError};
use crate::events::{EventBus, SnapcamEvent};
use crate::frame::FrameData;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Backend double with configurable flash capability that records torch calls
#[derive(Default)]
struct StubBackend {
    flash_lenses: Vec<LensFacing>,
    broken_lenses: Vec<LensFacing>,
    opens: AtomicUsize,
    torch_calls: Arc<Mutex<Vec<(LensFacing, bool)>>>,
    fail_captures: Arc<AtomicBool>,
    hang_captures: Arc<AtomicBool>,
}

impl StubBackend {
    fn with_flash(lenses: &[LensFacing]) -> Arc<Self> {
        Arc::new(Self {
            flash_lenses: lenses.to_vec(),
            ..Self::default()
        })
    }

    fn torch_calls(&self) -> Vec<(LensFacing, bool)> {
        self.torch_calls.lock().clone()
    }
}

#[async_trait]
impl CameraBackend for StubBackend {
    fn name(&self) -> &str {
        "stub"
    }

    async fn open(&self, lens: LensFacing) -> Result<Arc<dyn CameraDevice>, CameraError> {
        if self.broken_lenses.contains(&lens) {
            return Err(CameraError::DeviceOpen {
                lens,
                details: "unplugged".to_string(),
            });
        }

        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(StubDevice {
            info: CameraInfo {
                lens_facing: lens,
                name: format!("stub-{}", lens),
                resolution: (4, 4),
                has_flash_unit: self.flash_lenses.contains(&lens),
            },
            torch_calls: Arc::clone(&self.torch_calls),
            fail_captures: Arc::clone(&self.fail_captures),
            hang_captures: Arc::clone(&self.hang_captures),
        }))
    }
}

struct StubDevice {
    info: CameraInfo,
    torch_calls: Arc<Mutex<Vec<(LensFacing, bool)>>>,
    fail_captures: Arc<AtomicBool>,
    hang_captures: Arc<AtomicBool>,
}

#[async_trait]
impl CameraDevice for StubDevice {
    fn info(&self) -> &CameraInfo {
        &self.info
    }

    async fn start_streaming(&self, _preview: Preview) -> Result<(), CameraError> {
        Ok(())
    }

    async fn stop_streaming(&self) -> Result<(), CameraError> {
        Ok(())
    }

    async fn set_torch(&self, enabled: bool) -> Result<(), CameraError> {
        self.torch_calls.lock().push((self.info.lens_facing, enabled));
        Ok(())
    }

    async fn capture_still(&self, _jpeg_quality: u8) -> Result<Vec<u8>, CameraError> {
        if self.hang_captures.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_captures.load(Ordering::SeqCst) {
            return Err(CameraError::CaptureStream {
                details: "sensor busy".to_string(),
            });
        }
        Ok(vec![0xFF, 0xD8, 0xFF, 0xD9])
    }
}

struct NullSurface;

impl PreviewSurface for NullSurface {
    fn on_frame(&self, _frame: &FrameData) {}
}

struct Harness {
    _temp: TempDir,
    backend: Arc<StubBackend>,
    source: Arc<ProcessProviderSource>,
    clock: Arc<FixedClock>,
    session: CameraSession,
}

impl Harness {
    fn output_dir(&self) -> &Path {
        self.session.output_directory()
    }
}

fn build_harness(backend: Arc<StubBackend>, event_bus: Option<Arc<EventBus>>) -> Harness {
    let temp = TempDir::new().unwrap();
    let source = Arc::new(ProcessProviderSource::with_backend(backend.clone()));
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
    ));

    let mut builder = CameraSession::builder()
        .provider_source(source.clone())
        .capture_config(CaptureConfig {
            timestamp_timezone: "UTC".to_string(),
            ..CaptureConfig::default()
        })
        .output_directory(temp.path().join("photos"))
        .clock(clock.clone());
    if let Some(event_bus) = event_bus {
        builder = builder.event_bus(event_bus);
    }

    Harness {
        session: builder.build().unwrap(),
        _temp: temp,
        backend,
        source,
        clock,
    }
}

async fn started_harness(backend: Arc<StubBackend>) -> Harness {
    let mut harness = build_harness(backend, None);
    harness.session.start().await.unwrap();
    harness
}

#[tokio::test]
async fn test_builder_requires_provider_source() {
    let result = CameraSession::builder().build();
    assert!(matches!(result, Err(SnapcamError::Component { .. })));
}

#[tokio::test]
async fn test_initial_state() {
    let harness = build_harness(StubBackend::with_flash(&[LensFacing::Back]), None);
    assert_eq!(harness.session.state(), &SessionState::default());
    assert_eq!(harness.session.state().lens, LensFacing::Back);
    assert!(!harness.session.state().torch_enabled);
    assert_eq!(harness.session.state().binding, BindingState::Unbound);
    assert!(harness.session.captured_images().is_empty());
}

#[tokio::test]
async fn test_start_binds_initial_lens() {
    let harness = started_harness(StubBackend::with_flash(&[LensFacing::Back])).await;

    assert_eq!(
        harness.session.state().binding,
        BindingState::Bound(LensFacing::Back)
    );
    assert!(harness.output_dir().is_dir());
    assert_eq!(harness.backend.opens.load(Ordering::SeqCst), 1);

    let provider = acquire_provider(harness.source.as_ref()).await.unwrap();
    assert_eq!(provider.bound_lens().await, Some(LensFacing::Back));
}

#[tokio::test]
async fn test_torch_forced_off_after_lens_switch() {
    let backend = StubBackend::with_flash(&[LensFacing::Back, LensFacing::Front]);
    let mut harness = started_harness(backend.clone()).await;

    assert!(harness.session.toggle_torch().await);
    assert!(harness.session.state().torch_enabled);

    harness.session.flip_lens().await.unwrap();
    assert!(!harness.session.state().torch_enabled);
    assert_eq!(
        harness.session.state().binding,
        BindingState::Bound(LensFacing::Front)
    );

    // Old lens LED switched off before the rebind
    assert_eq!(
        backend.torch_calls(),
        vec![(LensFacing::Back, true), (LensFacing::Back, false)]
    );

    // Back again: still off
    harness.session.toggle_torch().await;
    harness.session.select_lens(LensFacing::Back).await.unwrap();
    assert!(!harness.session.state().torch_enabled);
}

#[tokio::test]
async fn test_torch_without_flash_unit_is_logical_only() {
    let backend = StubBackend::with_flash(&[]);
    let mut harness = started_harness(backend.clone()).await;

    assert!(harness.session.toggle_torch().await);
    assert!(harness.session.state().torch_enabled);
    assert!(!harness.session.toggle_torch().await);
    assert!(!harness.session.state().torch_enabled);

    assert!(backend.torch_calls().is_empty());
}

#[tokio::test]
async fn test_torch_toggle_while_unbound() {
    let backend = StubBackend::with_flash(&[LensFacing::Back]);
    let mut harness = build_harness(backend.clone(), None);

    assert!(harness.session.toggle_torch().await);
    assert!(backend.torch_calls().is_empty());
}

#[tokio::test]
async fn test_selecting_bound_lens_is_noop() {
    let backend = StubBackend::with_flash(&[LensFacing::Back]);
    let mut harness = started_harness(backend.clone()).await;
    harness.session.toggle_torch().await;

    harness.session.select_lens(LensFacing::Back).await.unwrap();

    assert_eq!(backend.opens.load(Ordering::SeqCst), 1);
    assert!(harness.session.state().torch_enabled);
}

#[tokio::test]
async fn test_bind_failure_leaves_session_unbound() {
    let backend = Arc::new(StubBackend {
        broken_lenses: vec![LensFacing::Front],
        ..StubBackend::default()
    });
    let mut harness = started_harness(backend).await;

    let result = harness.session.select_lens(LensFacing::Front).await;
    assert!(matches!(
        result,
        Err(SnapcamError::Camera(CameraError::DeviceOpen { .. }))
    ));
    assert_eq!(harness.session.state().lens, LensFacing::Front);
    assert_eq!(harness.session.state().binding, BindingState::Unbound);
    assert!(harness.session.camera().is_none());
    assert!(!harness.session.controls().shutter_enabled);

    // Recovers by selecting a working lens
    harness.session.select_lens(LensFacing::Back).await.unwrap();
    assert_eq!(
        harness.session.state().binding,
        BindingState::Bound(LensFacing::Back)
    );
}

#[tokio::test]
async fn test_capture_at_fixed_time() {
    let mut harness = started_harness(StubBackend::with_flash(&[LensFacing::Back])).await;

    harness.session.press_shutter().await;
    harness.session.wait_for_captures().await;

    let expected = harness.output_dir().join("2024-01-01-12-00-00-000.jpg");
    assert_eq!(harness.session.captured_images(), &[expected.clone()]);
    assert_eq!(std::fs::read(&expected).unwrap(), vec![0xFF, 0xD8, 0xFF, 0xD9]);
    assert_eq!(harness.session.capture_stats().failed, 0);
}

#[tokio::test]
async fn test_captures_recorded_in_order() {
    let mut harness = started_harness(StubBackend::with_flash(&[LensFacing::Back])).await;

    let mut expected = Vec::new();
    for i in 0..4 {
        expected.push(
            harness
                .output_dir()
                .join(format!("2024-01-01-12-00-00-00{}.jpg", i)),
        );
        harness.session.press_shutter().await;
        harness.clock.advance(chrono::Duration::milliseconds(1));
    }
    assert_eq!(harness.session.pending_captures(), 4);

    harness.session.wait_for_captures().await;

    assert_eq!(harness.session.captured_images(), expected.as_slice());
    assert_eq!(harness.session.pending_captures(), 0);
    assert_eq!(harness.session.controls().captured_count, 4);
}

#[tokio::test]
async fn test_capture_failure_keeps_session_alive() {
    let backend = StubBackend::with_flash(&[LensFacing::Back]);
    let mut harness = started_harness(backend.clone()).await;

    backend.fail_captures.store(true, Ordering::SeqCst);
    harness.session.press_shutter().await;
    harness.session.wait_for_captures().await;
    assert!(harness.session.captured_images().is_empty());

    backend.fail_captures.store(false, Ordering::SeqCst);
    harness.session.press_shutter().await;
    harness.session.wait_for_captures().await;
    assert_eq!(harness.session.captured_images().len(), 1);

    let stats = harness.session.capture_stats();
    assert_eq!((stats.succeeded, stats.failed), (1, 1));
}

#[tokio::test]
async fn test_capture_while_unbound_reports_failure() {
    let mut harness = build_harness(StubBackend::with_flash(&[]), None);
    tokio::fs::create_dir_all(harness.output_dir()).await.unwrap();

    harness.session.press_shutter().await;
    let outcome = harness.session.next_capture_outcome().await.unwrap();
    assert!(matches!(
        outcome,
        CaptureOutcome::Failed(crate::error::CaptureError::EndpointDetached)
    ));
    harness.session.handle_capture_outcome(outcome).await;
    assert!(harness.session.captured_images().is_empty());
}

#[tokio::test]
async fn test_gallery_is_a_stub() {
    let event_bus = Arc::new(EventBus::new(16));
    let mut rx = event_bus.subscribe();
    let mut harness = build_harness(
        StubBackend::with_flash(&[LensFacing::Back]),
        Some(event_bus),
    );
    harness.session.start().await.unwrap();
    while rx.try_recv().is_ok() {}

    let before = harness.session.state().clone();
    harness.session.open_gallery().await;

    assert_eq!(harness.session.state(), &before);
    assert!(!harness.session.controls().gallery_enabled);
    assert!(matches!(
        rx.try_recv(),
        Ok(SnapcamEvent::GalleryRequested { .. })
    ));
}

#[tokio::test]
async fn test_controls_view() {
    let mut harness = started_harness(StubBackend::with_flash(&[LensFacing::Back])).await;

    let controls = harness.session.controls();
    assert!(controls.torch_visible);
    assert_eq!(controls.torch_icon, TorchIcon::Off);
    assert!(controls.shutter_enabled);

    harness.session.toggle_torch().await;
    assert_eq!(harness.session.controls().torch_icon, TorchIcon::On);

    harness.session.flip_lens().await.unwrap();
    let controls = harness.session.controls();
    assert_eq!(controls.lens, LensFacing::Front);
    assert!(!controls.torch_visible);
    assert_eq!(controls.torch_icon, TorchIcon::Off);
}

#[tokio::test]
async fn test_events_published() {
    let event_bus = Arc::new(EventBus::new(32));
    let mut rx = event_bus.subscribe();
    let mut harness = build_harness(
        StubBackend::with_flash(&[LensFacing::Back]),
        Some(event_bus),
    );

    harness.session.start().await.unwrap();
    harness.session.flip_lens().await.unwrap();

    let mut types = Vec::new();
    while let Ok(event) = rx.try_recv() {
        types.push(event.event_type());
    }
    assert_eq!(
        types,
        vec!["camera_bound", "lens_changed", "camera_unbound", "camera_bound"]
    );
}

#[tokio::test]
async fn test_teardown_releases_camera() {
    let mut harness = started_harness(StubBackend::with_flash(&[LensFacing::Back])).await;
    harness.session.toggle_torch().await;
    harness.session.press_shutter().await;

    harness.session.teardown().await;

    assert!(harness.session.lifecycle().is_destroyed());
    assert_eq!(harness.session.state().binding, BindingState::Unbound);
    assert!(!harness.session.state().torch_enabled);
    // Queued capture finished before the camera went away
    assert_eq!(harness.session.captured_images().len(), 1);

    let provider = acquire_provider(harness.source.as_ref()).await.unwrap();
    assert!(!provider.is_bound().await);
}

#[tokio::test]
async fn test_teardown_detaches_preview_surface() {
    let temp = TempDir::new().unwrap();
    let source = Arc::new(ProcessProviderSource::with_backend(StubBackend::with_flash(&[])));
    let mut session = CameraSession::builder()
        .provider_source(source)
        .output_directory(temp.path().join("photos"))
        .preview_surface(Arc::new(NullSurface))
        .build()
        .unwrap();
    session.start().await.unwrap();
    assert!(session.preview().has_surface());

    session.teardown().await;
    assert!(!session.preview().has_surface());
}

#[tokio::test]
async fn test_teardown_releases_camera_when_capture_hangs() {
    let backend = StubBackend::with_flash(&[LensFacing::Back]);
    backend.hang_captures.store(true, Ordering::SeqCst);

    let temp = TempDir::new().unwrap();
    let source = Arc::new(ProcessProviderSource::with_backend(backend.clone()));
    let event_bus = Arc::new(EventBus::new(32));
    let mut events = event_bus.subscribe();
    let mut session = CameraSession::builder()
        .provider_source(source.clone())
        .output_directory(temp.path().join("photos"))
        .event_bus(event_bus)
        .capture_drain_timeout(Duration::from_millis(50))
        .build()
        .unwrap();
    session.start().await.unwrap();
    session.toggle_torch().await;
    session.press_shutter().await;

    tokio::time::timeout(Duration::from_secs(5), session.teardown())
        .await
        .expect("teardown hung on a stuck capture");

    assert!(session.lifecycle().is_destroyed());
    assert_eq!(session.state().binding, BindingState::Unbound);
    assert!(!session.state().torch_enabled);
    assert!(session.captured_images().is_empty());
    assert_eq!(session.pending_captures(), 0);
    assert_eq!(session.capture_stats().failed, 1);
    assert_eq!(backend.torch_calls().last(), Some(&(LensFacing::Back, false)));

    let provider = acquire_provider(source.as_ref()).await.unwrap();
    assert!(!provider.is_bound().await);

    let mut failed = false;
    while let Ok(event) = events.try_recv() {
        failed |= matches!(event, SnapcamEvent::CaptureFailed { .. });
    }
    assert!(failed);
}

#[tokio::test]
async fn test_run_session_processes_commands() {
    let backend = StubBackend::with_flash(&[LensFacing::Back]);
    let Harness {
        _temp: _temp,
        source,
        session,
        ..
    } = started_harness(backend.clone()).await;
    let (tx, rx) = mpsc::channel(16);

    let commands = [
        SessionCommand::ToggleTorch,
        SessionCommand::FlipLens,
        SessionCommand::ToggleTorch,
        SessionCommand::OpenGallery,
        SessionCommand::SelectLens(LensFacing::Back),
        SessionCommand::Shutter,
        SessionCommand::Shutdown,
    ];
    for command in commands {
        tx.send(command).await.unwrap();
    }

    let session = tokio::time::timeout(
        Duration::from_secs(5),
        run_session(session, rx, CancellationToken::new()),
    )
    .await
    .expect("session loop did not stop");

    assert_eq!(session.captured_images().len(), 1);
    assert_eq!(session.state().lens, LensFacing::Back);
    assert!(!session.state().torch_enabled);
    assert_eq!(session.state().binding, BindingState::Unbound);
    assert_eq!(
        backend.torch_calls(),
        vec![(LensFacing::Back, true), (LensFacing::Back, false)]
    );

    let provider = acquire_provider(source.as_ref()).await.unwrap();
    assert!(!provider.is_bound().await);
}

#[tokio::test]
async fn test_run_session_survives_failing_command() {
    let backend = Arc::new(StubBackend {
        broken_lenses: vec![LensFacing::Front],
        ..StubBackend::default()
    });
    let harness = started_harness(backend).await;
    let (tx, rx) = mpsc::channel(8);

    tx.send(SessionCommand::FlipLens).await.unwrap();
    tx.send(SessionCommand::SelectLens(LensFacing::Back))
        .await
        .unwrap();
    tx.send(SessionCommand::Shutter).await.unwrap();
    drop(tx);

    let session = tokio::time::timeout(
        Duration::from_secs(5),
        run_session(harness.session, rx, CancellationToken::new()),
    )
    .await
    .expect("session loop did not stop");

    assert_eq!(session.state().lens, LensFacing::Back);
    assert_eq!(session.captured_images().len(), 1);
}

#[tokio::test]
async fn test_run_session_cancelled() {
    let harness = started_harness(StubBackend::with_flash(&[])).await;
    let (_tx, rx) = mpsc::channel(1);
    let token = CancellationToken::new();
    token.cancel();

    let session = tokio::time::timeout(
        Duration::from_secs(5),
        run_session(harness.session, rx, token),
    )
    .await
    .expect("session loop did not stop");

    assert!(session.lifecycle().is_destroyed());
}
