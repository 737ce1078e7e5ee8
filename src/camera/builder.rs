use super::backend::CameraBackend;
use super::torch::TorchLed;
use super::virtual_camera::VirtualCameraBackend;
use crate::config::{CameraBackendKind, CameraConfig};
use crate::error::CameraError;
use std::sync::Arc;
use tracing::{info, warn};

/// Builder that picks the camera backend named by configuration
pub struct CameraBackendBuilder {
    config: Option<CameraConfig>,
}

impl CameraBackendBuilder {
    pub fn new() -> Self {
        Self { config: None }
    }

    pub fn config(mut self, config: CameraConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<Arc<dyn CameraBackend>, CameraError> {
        let config = self.config.ok_or_else(|| CameraError::Configuration {
            details: "Camera configuration must be specified".to_string(),
        })?;

        info!(
            "Creating {:?} camera backend ({}x{} @ {}fps)",
            config.backend, config.resolution.0, config.resolution.1, config.fps
        );

        match config.backend {
            CameraBackendKind::Virtual => {
                let torch_led = resolve_torch_led(&config);
                let mut backend = VirtualCameraBackend::new(config);
                if let Some(led) = torch_led {
                    backend = backend.with_torch_led(led);
                }
                Ok(Arc::new(backend))
            }
            CameraBackendKind::Gstreamer => build_gstreamer_backend(config),
        }
    }
}

/// A missing or unusable LED disables hardware torch control; it never fails the build
pub(crate) fn resolve_torch_led(config: &CameraConfig) -> Option<TorchLed> {
    let setting = config.torch_led.as_deref()?;
    match TorchLed::from_setting(setting) {
        Ok(Some(led)) => Some(led),
        Ok(None) => {
            warn!("No torch LED found under sysfs");
            None
        }
        Err(e) => {
            warn!("Torch LED '{}' unavailable: {}", setting, e);
            None
        }
    }
}

impl Default for CameraBackendBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(feature = "gstreamer", target_os = "linux"))]
fn build_gstreamer_backend(config: CameraConfig) -> Result<Arc<dyn CameraBackend>, CameraError> {
    Ok(Arc::new(super::gstreamer_backend::GstCameraBackend::new(
        config,
    )?))
}

#[cfg(not(all(feature = "gstreamer", target_os = "linux")))]
fn build_gstreamer_backend(_config: CameraConfig) -> Result<Arc<dyn CameraBackend>, CameraError> {
    Err(CameraError::NotAvailable {
        backend: "gstreamer".to_string(),
    })
}
