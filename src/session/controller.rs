use super::runner::SessionCommand;
use super::state::{BindingState, ControlsView, SessionState};
use crate::camera::{
    acquire_provider, Camera, CaptureEndpoint, ImageCapture, LensFacing, Lifecycle, Preview,
    PreviewSurface, ProviderSource,
};
use crate::capture::{take_photo, CaptureExecutor, CaptureStats, Clock, PhotoNaming};
use crate::config::CaptureConfig;
use crate::error::{CaptureError, Result, SnapcamError};
use crate::events::{EventBus, SnapcamEvent};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Result of one shutter press, delivered back to the session task
#[derive(Debug)]
pub enum CaptureOutcome {
    Captured(PathBuf),
    Failed(CaptureError),
}

/// Owns lens selection, torch state and the captured photo list, and keeps
/// the camera binding in step with the selected lens.
pub struct CameraSession {
    state: SessionState,
    provider_source: Arc<dyn ProviderSource>,
    lifecycle: Lifecycle,
    preview: Preview,
    image_capture: ImageCapture,
    camera: Option<Camera>,
    naming: PhotoNaming,
    output_directory: PathBuf,
    executor: CaptureExecutor,
    outcome_tx: mpsc::UnboundedSender<CaptureOutcome>,
    outcome_rx: mpsc::UnboundedReceiver<CaptureOutcome>,
    in_flight: usize,
    captured_images: Vec<PathBuf>,
    event_bus: Option<Arc<EventBus>>,
}

impl CameraSession {
    pub fn builder() -> CameraSessionBuilder {
        CameraSessionBuilder::new()
    }

    /// Create the output directory and bind the initial lens
    pub async fn start(&mut self) -> Result<()> {
        tokio::fs::create_dir_all(&self.output_directory).await?;
        info!(
            "Camera session starting ({} lens, photos in {})",
            self.state.lens,
            self.output_directory.display()
        );

        self.rebind().await
    }

    /// Switch to `lens`. Selecting the bound lens again does nothing.
    pub async fn select_lens(&mut self, lens: LensFacing) -> Result<()> {
        if self.state.binding == BindingState::Bound(lens) {
            debug!("{} lens already bound", lens);
            return Ok(());
        }

        self.force_torch_off().await;

        if self.state.lens != lens {
            info!("Lens changed: {} -> {}", self.state.lens, lens);
            self.state.lens = lens;
            self.publish(SnapcamEvent::LensChanged {
                lens,
                timestamp: SystemTime::now(),
            })
            .await;
        }

        self.rebind().await
    }

    pub async fn flip_lens(&mut self) -> Result<()> {
        self.select_lens(self.state.lens.flipped()).await
    }

    /// Flip the torch flag. Hardware follows only when the bound camera has a
    /// flash unit; the flag changes either way.
    pub async fn toggle_torch(&mut self) -> bool {
        let enabled = !self.state.torch_enabled;
        self.state.torch_enabled = enabled;

        let applied = self.apply_torch(enabled).await;
        info!("Torch {} (hardware: {})", if enabled { "on" } else { "off" }, applied);

        self.publish(SnapcamEvent::TorchChanged {
            enabled,
            applied,
            timestamp: SystemTime::now(),
        })
        .await;

        enabled
    }

    /// Queue a still capture. The outcome arrives through `next_capture_outcome`.
    pub async fn press_shutter(&mut self) -> String {
        let on_captured_tx = self.outcome_tx.clone();
        let on_error_tx = self.outcome_tx.clone();
        let endpoint: Arc<dyn CaptureEndpoint> = Arc::new(self.image_capture.clone());

        self.in_flight += 1;
        let request_id = take_photo(
            &self.naming,
            endpoint,
            &self.output_directory,
            &self.executor,
            move |path| {
                let _ = on_captured_tx.send(CaptureOutcome::Captured(path));
            },
            move |e| {
                let _ = on_error_tx.send(CaptureOutcome::Failed(e));
            },
        )
        .to_string();

        debug!("Shutter pressed, capture {} queued", request_id);
        self.publish(SnapcamEvent::CaptureRequested {
            request_id: request_id.clone(),
        })
        .await;

        request_id
    }

    /// Next finished capture; pending forever while nothing is in flight
    pub async fn next_capture_outcome(&mut self) -> Option<CaptureOutcome> {
        self.outcome_rx.recv().await
    }

    /// Record a finished capture. Failures are logged and never end the session.
    pub async fn handle_capture_outcome(&mut self, outcome: CaptureOutcome) {
        self.in_flight = self.in_flight.saturating_sub(1);

        match outcome {
            CaptureOutcome::Captured(path) => {
                self.captured_images.push(path.clone());
                let total = self.captured_images.len();
                info!("Photo saved: {} ({} this session)", path.display(), total);
                self.publish(SnapcamEvent::PhotoCaptured { path, total }).await;
            }
            CaptureOutcome::Failed(e) => {
                error!("Photo capture failed: {}", e);
                self.publish(SnapcamEvent::CaptureFailed {
                    error: e.to_string(),
                })
                .await;
            }
        }
    }

    /// Process outcomes until every queued capture has reported back
    pub async fn wait_for_captures(&mut self) {
        while self.in_flight > 0 {
            match self.outcome_rx.recv().await {
                Some(outcome) => self.handle_capture_outcome(outcome).await,
                None => break,
            }
        }
    }

    /// The gallery control has no destination yet
    pub async fn open_gallery(&self) {
        info!("Gallery is not available");
        self.publish(SnapcamEvent::GalleryRequested {
            timestamp: SystemTime::now(),
        })
        .await;
    }

    pub async fn handle_command(&mut self, command: SessionCommand) -> Result<()> {
        match command {
            SessionCommand::SelectLens(lens) => self.select_lens(lens).await?,
            SessionCommand::FlipLens => self.flip_lens().await?,
            SessionCommand::ToggleTorch => {
                self.toggle_torch().await;
            }
            SessionCommand::Shutter => {
                self.press_shutter().await;
            }
            SessionCommand::OpenGallery => self.open_gallery().await,
            SessionCommand::Shutdown => {
                debug!("Shutdown is handled by the session loop");
            }
        }
        Ok(())
    }

    /// Finish queued captures, then release the camera. Always releases the
    /// binding, even when a capture is stuck past the drain timeout.
    pub async fn teardown(&mut self) {
        info!("Tearing down camera session");

        // Drain the executor; anything still running afterwards reports Aborted
        self.executor.shutdown().await;
        self.drain_capture_outcomes().await;

        // Hardware off before the camera goes away
        self.force_torch_off().await;
        self.lifecycle.destroy();
        self.preview.clear_surface_provider();

        match acquire_provider(self.provider_source.as_ref()).await {
            Ok(provider) => {
                if let Err(e) = provider.unbind_all().await {
                    warn!("Failed to release camera: {}", e);
                }
            }
            Err(e) => warn!("Camera provider unavailable during teardown: {}", e),
        }

        self.camera = None;
        if self.state.binding.is_bound() {
            self.state.binding = BindingState::Unbound;
            self.publish(SnapcamEvent::CameraUnbound {
                timestamp: SystemTime::now(),
            })
            .await;
        }

        info!(
            "Camera session ended with {} photo(s)",
            self.captured_images.len()
        );
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn controls(&self) -> ControlsView {
        ControlsView::from_state(&self.state, self.captured_images.len())
    }

    /// Saved photos in completion order
    pub fn captured_images(&self) -> &[PathBuf] {
        &self.captured_images
    }

    pub fn camera(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }

    pub fn preview(&self) -> &Preview {
        &self.preview
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    pub fn pending_captures(&self) -> usize {
        self.in_flight
    }

    pub fn capture_stats(&self) -> CaptureStats {
        self.executor.stats()
    }

    /// Unbind everything, then bind the selected lens
    async fn rebind(&mut self) -> Result<()> {
        let lens = self.state.lens;
        let provider = acquire_provider(self.provider_source.as_ref()).await?;

        // Release whatever is bound, even another lens
        if let Err(e) = provider.unbind_all().await {
            warn!("Error while releasing previous camera: {}", e);
        }
        self.camera = None;
        if self.state.binding.is_bound() {
            self.state.binding = BindingState::Unbound;
            self.publish(SnapcamEvent::CameraUnbound {
                timestamp: SystemTime::now(),
            })
            .await;
        }

        // Bind preview and capture together to the session lifecycle
        match provider
            .bind_to_lifecycle(&self.lifecycle, lens, &self.preview, &self.image_capture)
            .await
        {
            Ok(camera) => {
                let info = camera.info().clone();
                self.state.binding = BindingState::Bound(lens);
                self.camera = Some(camera);
                self.publish(SnapcamEvent::CameraBound {
                    lens,
                    camera_name: info.name,
                    has_flash_unit: info.has_flash_unit,
                    timestamp: SystemTime::now(),
                })
                .await;
                Ok(())
            }
            Err(e) => {
                // Stay unbound; the caller decides whether this is fatal
                error!("Failed to bind {} camera: {}", lens, e);
                self.publish(SnapcamEvent::SystemError {
                    component: "camera".to_string(),
                    error: e.to_string(),
                })
                .await;
                Err(e.into())
            }
        }
    }

    /// Handle every outcome already delivered, without waiting for more
    async fn drain_capture_outcomes(&mut self) {
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            self.handle_capture_outcome(outcome).await;
        }

        if self.in_flight > 0 {
            warn!("{} capture(s) never reported back", self.in_flight);
            self.in_flight = 0;
        }
    }

    /// Returns whether the hardware was driven
    async fn apply_torch(&self, enabled: bool) -> bool {
        match &self.camera {
            Some(camera) if camera.has_flash_unit() => match camera.enable_torch(enabled).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Torch hardware error: {}", e);
                    false
                }
            },
            Some(camera) => {
                debug!("{} has no flash unit, torch is logical only", camera.info().name);
                false
            }
            None => {
                debug!("No camera bound, torch is logical only");
                false
            }
        }
    }

    async fn force_torch_off(&mut self) {
        if !self.state.torch_enabled {
            return;
        }

        self.state.torch_enabled = false;
        let applied = self.apply_torch(false).await;
        self.publish(SnapcamEvent::TorchChanged {
            enabled: false,
            applied,
            timestamp: SystemTime::now(),
        })
        .await;
    }

    async fn publish(&self, event: SnapcamEvent) {
        if let Some(event_bus) = &self.event_bus {
            if let Err(e) = event_bus.publish(event).await {
                debug!("Session event not delivered: {}", e);
            }
        }
    }
}

/// Builder for [`CameraSession`]
#[derive(Default)]
pub struct CameraSessionBuilder {
    provider_source: Option<Arc<dyn ProviderSource>>,
    capture_config: Option<CaptureConfig>,
    output_directory: Option<PathBuf>,
    initial_lens: LensFacing,
    clock: Option<Arc<dyn Clock>>,
    event_bus: Option<Arc<EventBus>>,
    surface: Option<Arc<dyn PreviewSurface>>,
    capture_drain_timeout: Option<Duration>,
}

impl CameraSessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider_source(mut self, source: Arc<dyn ProviderSource>) -> Self {
        self.provider_source = Some(source);
        self
    }

    pub fn capture_config(mut self, config: CaptureConfig) -> Self {
        self.capture_config = Some(config);
        self
    }

    /// Overrides the directory derived from the capture config
    pub fn output_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.output_directory = Some(directory.into());
        self
    }

    pub fn initial_lens(mut self, lens: LensFacing) -> Self {
        self.initial_lens = lens;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn preview_surface(mut self, surface: Arc<dyn PreviewSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    /// How long teardown waits for queued captures before abandoning them
    pub fn capture_drain_timeout(mut self, timeout: Duration) -> Self {
        self.capture_drain_timeout = Some(timeout);
        self
    }

    /// Must be called inside a tokio runtime; the capture worker is spawned here
    pub fn build(self) -> Result<CameraSession> {
        let provider_source = self.provider_source.ok_or_else(|| {
            SnapcamError::component("camera_session", "Camera provider source must be specified")
        })?;
        let capture_config = self.capture_config.unwrap_or_default();

        let mut naming = PhotoNaming::from_config(&capture_config);
        if let Some(clock) = self.clock {
            naming = naming.with_clock(clock);
        }

        let output_directory = self
            .output_directory
            .unwrap_or_else(|| capture_config.output_directory());

        let preview = Preview::new();
        if let Some(surface) = self.surface {
            preview.set_surface_provider(surface);
        }

        let executor = match self.capture_drain_timeout {
            Some(timeout) => CaptureExecutor::with_drain_timeout(timeout),
            None => CaptureExecutor::new(),
        };
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        Ok(CameraSession {
            state: SessionState {
                lens: self.initial_lens,
                ..SessionState::default()
            },
            provider_source,
            lifecycle: Lifecycle::new(),
            preview,
            image_capture: ImageCapture::with_jpeg_quality(capture_config.jpeg_quality),
            camera: None,
            naming,
            output_directory,
            executor,
            outcome_tx,
            outcome_rx,
            in_flight: 0,
            captured_images: Vec::new(),
            event_bus: self.event_bus,
        })
    }
}
