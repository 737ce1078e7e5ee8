use super::preview::{PreviewStats, TerminalPreview};
use super::stats::DisplayStats;
use crate::error::{EventBusError, Result};
use crate::events::{EventBus, EventFilter, EventReceiver, SnapcamEvent};
use crate::session::{BindingState, ControlsView, SessionState, TorchIcon};
use crossterm::cursor::MoveToColumn;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use crossterm::QueueableCommand;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Session state as seen through published events
#[derive(Debug, Clone, Default)]
pub(crate) struct ChromeState {
    pub(crate) session: SessionState,
    pub(crate) captured: usize,
    pub(crate) camera_name: Option<String>,
    pub(crate) message: Option<String>,
}

impl ChromeState {
    pub(crate) fn apply(&mut self, event: &SnapcamEvent) {
        match event {
            SnapcamEvent::CameraBound {
                lens, camera_name, ..
            } => {
                self.session.lens = *lens;
                self.session.binding = BindingState::Bound(*lens);
                self.camera_name = Some(camera_name.clone());
            }
            SnapcamEvent::CameraUnbound { .. } => {
                self.session.binding = BindingState::Unbound;
                self.camera_name = None;
            }
            SnapcamEvent::LensChanged { lens, .. } => self.session.lens = *lens,
            SnapcamEvent::TorchChanged { enabled, .. } => self.session.torch_enabled = *enabled,
            SnapcamEvent::PhotoCaptured { path, total } => {
                self.captured = *total;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                self.message = Some(format!("saved {}", name));
            }
            SnapcamEvent::CaptureFailed { error } => {
                self.message = Some(format!("capture failed: {}", error));
            }
            SnapcamEvent::GalleryRequested { .. } => {
                self.message = Some("gallery not available".to_string());
            }
            SnapcamEvent::SystemError { component, error } => {
                self.message = Some(format!("{} error: {}", component, error));
            }
            SnapcamEvent::CaptureRequested { .. } | SnapcamEvent::ShutdownRequested { .. } => {}
        }
    }

    pub(crate) fn controls(&self) -> ControlsView {
        ControlsView::from_state(&self.session, self.captured)
    }
}

/// One status line: the camera chrome plus preview health
pub fn render_status_line(
    controls: &ControlsView,
    preview: &PreviewStats,
    camera_name: Option<&str>,
    message: Option<&str>,
) -> String {
    let torch = match (controls.torch_visible, controls.torch_icon) {
        (false, _) => "-",
        (true, TorchIcon::On) => "ON",
        (true, TorchIcon::Off) => "off",
    };
    let shutter = if controls.shutter_enabled {
        "ready"
    } else {
        "no camera"
    };
    let gallery = if controls.gallery_enabled { "open" } else { "n/a" };

    let mut line = format!(
        "[{}] {} | torch: {} | shutter: {} | gallery: {} | photos: {}",
        controls.lens.as_str().to_uppercase(),
        camera_name.unwrap_or("unbound"),
        torch,
        shutter,
        gallery,
        controls.captured_count
    );

    if let Some((width, height)) = preview.resolution {
        line.push_str(&format!(" | {} frames {}x{}", preview.frames, width, height));
        if let Some(luma) = preview.mean_luma {
            line.push_str(&format!(" luma {}", luma));
        }
    }

    if let Some(message) = message {
        line.push_str(" | ");
        line.push_str(message);
    }

    line
}

/// Draws the camera chrome on the terminal, driven by session events
pub struct DisplayController {
    preview: Arc<TerminalPreview>,
    chrome: Arc<Mutex<ChromeState>>,
    stats: Arc<Mutex<DisplayStats>>,
    refresh_interval: Duration,
    cancellation_token: CancellationToken,
    render_task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl DisplayController {
    pub fn new(preview: Arc<TerminalPreview>) -> Self {
        Self {
            preview,
            chrome: Arc::new(Mutex::new(ChromeState::default())),
            stats: Arc::new(Mutex::new(DisplayStats::default())),
            refresh_interval: Duration::from_millis(500),
            cancellation_token: CancellationToken::new(),
            render_task: tokio::sync::Mutex::new(None),
        }
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn preview(&self) -> Arc<TerminalPreview> {
        Arc::clone(&self.preview)
    }

    pub fn stats(&self) -> DisplayStats {
        self.stats.lock().clone()
    }

    pub fn controls(&self) -> ControlsView {
        self.chrome.lock().controls()
    }

    /// Current status line
    pub fn status_line(&self) -> String {
        let chrome = self.chrome.lock();
        render_status_line(
            &chrome.controls(),
            &self.preview.stats(),
            chrome.camera_name.as_deref(),
            chrome.message.as_deref(),
        )
    }

    pub async fn start(&self, event_bus: &EventBus) -> Result<()> {
        let mut render_task = self.render_task.lock().await;
        if render_task.is_some() {
            warn!("Display controller is already running");
            return Ok(());
        }

        info!("Starting terminal display");

        let mut receiver = EventReceiver::new(
            event_bus.subscribe(),
            EventFilter::All,
            "terminal_display".to_string(),
        );
        let preview = Arc::clone(&self.preview);
        let chrome = Arc::clone(&self.chrome);
        let stats = Arc::clone(&self.stats);
        let cancellation_token = self.cancellation_token.clone();
        let mut refresh = tokio::time::interval(self.refresh_interval);

        *render_task = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = receiver.recv() => match event {
                        Ok(event) => {
                            chrome.lock().apply(&event);
                            stats.lock().record_event();
                        }
                        Err(EventBusError::ChannelClosed) => {
                            debug!("Event bus closed, display stopping");
                            break;
                        }
                        Err(e) => {
                            warn!("Display event error: {}", e);
                            continue;
                        }
                    },
                    _ = refresh.tick() => {}
                    _ = cancellation_token.cancelled() => break,
                }

                let line = {
                    let chrome = chrome.lock();
                    render_status_line(
                        &chrome.controls(),
                        &preview.stats(),
                        chrome.camera_name.as_deref(),
                        chrome.message.as_deref(),
                    )
                };

                match draw_line(&line) {
                    Ok(()) => stats.lock().record_render(),
                    Err(e) => {
                        stats.lock().record_render_error();
                        error!("Failed to draw status line: {}", e);
                    }
                }
            }

            debug!("Terminal display task exited");
        }));

        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        info!("Stopping terminal display");
        self.cancellation_token.cancel();

        if let Some(task) = self.render_task.lock().await.take() {
            if tokio::time::timeout(Duration::from_secs(2), task).await.is_err() {
                warn!("Terminal display task did not stop within timeout");
            }
        }

        let mut stdout = std::io::stdout();
        let _ = stdout.write_all(b"\r\n");
        let _ = stdout.flush();
        Ok(())
    }
}

fn draw_line(line: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout
        .queue(MoveToColumn(0))?
        .queue(Clear(ClearType::CurrentLine))?
        .queue(Print(line))?;
    stdout.flush()
}
