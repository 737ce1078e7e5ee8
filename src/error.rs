use crate::camera::LensFacing;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapcamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl SnapcamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by camera backends, devices and the camera provider
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Camera provider unavailable: {details}")]
    ProviderUnavailable { details: String },

    #[error("Failed to open {lens} camera: {details}")]
    DeviceOpen { lens: LensFacing, details: String },

    #[error("Camera configuration error: {details}")]
    Configuration { details: String },

    #[error("Camera stream error: {details}")]
    CaptureStream { details: String },

    #[error("A {lens} camera binding is already active; unbind first")]
    AlreadyBound { lens: LensFacing },

    #[error("Torch control failed: {details}")]
    Torch { details: String },

    #[error("Camera backend '{backend}' is not available in this build")]
    NotAvailable { backend: String },
}

/// Errors delivered to the capture error callback
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Capture endpoint is not attached to a bound camera")]
    EndpointDetached,

    #[error("Camera failed during capture: {0}")]
    Camera(#[from] CameraError),

    #[error("Failed to write photo {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JPEG encoding failed: {details}")]
    Encoding { details: String },

    #[error("Filename format '{format}' could not be rendered")]
    InvalidFilenameFormat { format: String },

    #[error("Capture executor is closed")]
    ExecutorClosed,

    #[error("Capture aborted: {details}")]
    Aborted { details: String },
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event bus channel closed")]
    ChannelClosed,
}

pub type Result<T, E = SnapcamError> = std::result::Result<T, E>;
