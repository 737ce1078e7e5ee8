use super::types::{ComponentState, ShutdownReason};
use crate::camera::{ProcessProviderSource, ProviderSource};
use crate::config::SnapcamConfig;
use crate::display::{DisplayController, TerminalPreview};
use crate::error::Result;
use crate::events::EventBus;
use crate::keyboard_input::KeyboardInputHandler;
use crate::session::{CameraSession, SessionCommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Capacity of the session command channel
const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// Wires the camera session to the terminal display, keyboard and signals
pub struct SnapcamApp {
    pub(super) config: SnapcamConfig,
    pub(super) event_bus: Arc<EventBus>,

    // Components
    pub(super) session: Option<CameraSession>,
    pub(super) session_task: Option<JoinHandle<CameraSession>>,
    pub(super) display: Option<DisplayController>,
    pub(super) display_enabled: bool,
    pub(super) keyboard_handler: Option<KeyboardInputHandler>,
    pub(super) keyboard_enabled: bool,

    // Session command channel; the receiver moves into the session loop on start
    pub(super) command_tx: mpsc::Sender<SessionCommand>,
    pub(super) command_rx: Option<mpsc::Receiver<SessionCommand>>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_sender: Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
    pub(super) captured_images: Vec<PathBuf>,
}

impl SnapcamApp {
    /// Create the application over the process-wide camera provider
    pub async fn new(config: SnapcamConfig) -> Result<Self> {
        let source: Arc<dyn ProviderSource> =
            Arc::new(ProcessProviderSource::global(config.camera.clone()));
        Self::with_provider_source(config, source).await
    }

    /// Create the application over a specific provider source
    pub async fn with_provider_source(
        config: SnapcamConfig,
        provider_source: Arc<dyn ProviderSource>,
    ) -> Result<Self> {
        config.validate()?;

        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
        let preview = Arc::new(TerminalPreview::new());
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        let session = CameraSession::builder()
            .provider_source(provider_source)
            .capture_config(config.capture.clone())
            .initial_lens(config.camera.initial_lens)
            .event_bus(Arc::clone(&event_bus))
            .preview_surface(preview.clone())
            .build()?;

        let display = Some(DisplayController::new(preview));
        let keyboard_handler = Some(KeyboardInputHandler::new(command_tx.clone()));
        let keyboard_enabled = config.system.keyboard_controls;

        info!(
            "Snapcam configured: {:?} backend, photos in {}",
            config.camera.backend,
            session.output_directory().display()
        );

        Ok(Self {
            config,
            event_bus,
            session: Some(session),
            session_task: None,
            display,
            display_enabled: true,
            keyboard_handler,
            keyboard_enabled,
            command_tx,
            command_rx: Some(command_rx),
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Arc::new(Mutex::new(Some(shutdown_sender))),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
            captured_images: Vec::new(),
        })
    }

    /// Enable or disable terminal key bindings
    pub fn set_keyboard_enabled(&mut self, enabled: bool) {
        self.keyboard_enabled = enabled;
    }

    /// Enable or disable the terminal status line
    pub fn set_display_enabled(&mut self, enabled: bool) {
        self.display_enabled = enabled;
    }

    pub fn config(&self) -> &SnapcamConfig {
        &self.config
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    /// Sender for driving the session from outside the keyboard handler
    pub fn command_sender(&self) -> mpsc::Sender<SessionCommand> {
        self.command_tx.clone()
    }

    /// Photos saved by the session; filled in once it has shut down
    pub fn captured_images(&self) -> &[PathBuf] {
        &self.captured_images
    }
}
