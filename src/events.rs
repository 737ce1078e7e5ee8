use crate::camera::LensFacing;
use crate::error::EventBusError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Events published by the camera session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SnapcamEvent {
    /// A camera was bound for the given lens
    CameraBound {
        lens: LensFacing,
        camera_name: String,
        has_flash_unit: bool,
        timestamp: SystemTime,
    },
    /// All camera bindings were released
    CameraUnbound { timestamp: SystemTime },
    /// Lens selection changed
    LensChanged {
        lens: LensFacing,
        timestamp: SystemTime,
    },
    /// Torch flag changed; `applied` is false when hardware was not touched
    TorchChanged {
        enabled: bool,
        applied: bool,
        timestamp: SystemTime,
    },
    /// Shutter pressed and a capture queued
    CaptureRequested { request_id: String },
    /// A photo was written to disk
    PhotoCaptured { path: PathBuf, total: usize },
    /// A capture failed
    CaptureFailed { error: String },
    /// Gallery control pressed
    GalleryRequested { timestamp: SystemTime },
    /// A system error occurred in a component
    SystemError { component: String, error: String },
    /// System shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl SnapcamEvent {
    /// Get the timestamp of the event
    pub fn timestamp(&self) -> SystemTime {
        match self {
            SnapcamEvent::CameraBound { timestamp, .. } => *timestamp,
            SnapcamEvent::CameraUnbound { timestamp } => *timestamp,
            SnapcamEvent::LensChanged { timestamp, .. } => *timestamp,
            SnapcamEvent::TorchChanged { timestamp, .. } => *timestamp,
            SnapcamEvent::CaptureRequested { .. } => SystemTime::now(),
            SnapcamEvent::PhotoCaptured { .. } => SystemTime::now(),
            SnapcamEvent::CaptureFailed { .. } => SystemTime::now(),
            SnapcamEvent::GalleryRequested { timestamp } => *timestamp,
            SnapcamEvent::SystemError { .. } => SystemTime::now(),
            SnapcamEvent::ShutdownRequested { timestamp, .. } => *timestamp,
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            SnapcamEvent::CameraBound {
                lens, camera_name, ..
            } => format!("{} camera bound ({})", lens, camera_name),
            SnapcamEvent::CameraUnbound { .. } => "Camera unbound".to_string(),
            SnapcamEvent::LensChanged { lens, .. } => format!("Lens changed to {}", lens),
            SnapcamEvent::TorchChanged {
                enabled, applied, ..
            } => format!(
                "Torch {}{}",
                if *enabled { "on" } else { "off" },
                if *applied { "" } else { " (not applied to hardware)" }
            ),
            SnapcamEvent::CaptureRequested { request_id } => {
                format!("Capture requested: {}", request_id)
            }
            SnapcamEvent::PhotoCaptured { path, total } => {
                format!("Photo captured: {} ({} this session)", path.display(), total)
            }
            SnapcamEvent::CaptureFailed { error } => format!("Capture failed: {}", error),
            SnapcamEvent::GalleryRequested { .. } => "Gallery requested".to_string(),
            SnapcamEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
            SnapcamEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            SnapcamEvent::CameraBound { .. } => "camera_bound",
            SnapcamEvent::CameraUnbound { .. } => "camera_unbound",
            SnapcamEvent::LensChanged { .. } => "lens_changed",
            SnapcamEvent::TorchChanged { .. } => "torch_changed",
            SnapcamEvent::CaptureRequested { .. } => "capture_requested",
            SnapcamEvent::PhotoCaptured { .. } => "photo_captured",
            SnapcamEvent::CaptureFailed { .. } => "capture_failed",
            SnapcamEvent::GalleryRequested { .. } => "gallery_requested",
            SnapcamEvent::SystemError { .. } => "system_error",
            SnapcamEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Async event bus for component coordination using broadcast channels
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SnapcamEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<SnapcamEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers. Publishers log their own events.
    pub async fn publish(&self, event: SnapcamEvent) -> Result<usize, EventBusError> {
        debug!("Publishing event: {}", event.description());

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Custom filter function
    Custom(fn(&SnapcamEvent) -> bool),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &SnapcamEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<SnapcamEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    /// Create a new event receiver with a filter
    pub fn new(
        receiver: broadcast::Receiver<SnapcamEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event. Lagging is logged and skipped.
    pub async fn recv(&mut self) -> Result<SnapcamEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<SnapcamEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => {
                    return Ok(None);
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}
