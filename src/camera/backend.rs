use super::types::{CameraInfo, LensFacing};
use super::use_cases::Preview;
use crate::error::CameraError;
use async_trait::async_trait;
use std::sync::Arc;

/// Source of camera devices, one per lens
#[async_trait]
pub trait CameraBackend: Send + Sync {
    /// Backend name used in logs
    fn name(&self) -> &str;

    /// Open the camera facing `lens`
    async fn open(&self, lens: LensFacing) -> Result<Arc<dyn CameraDevice>, CameraError>;
}

/// An opened camera device
#[async_trait]
pub trait CameraDevice: Send + Sync {
    fn info(&self) -> &CameraInfo;

    /// Start delivering frames to the preview
    async fn start_streaming(&self, preview: Preview) -> Result<(), CameraError>;

    /// Stop delivering frames
    async fn stop_streaming(&self) -> Result<(), CameraError>;

    /// Drive the flash LED in continuous mode
    async fn set_torch(&self, enabled: bool) -> Result<(), CameraError>;

    /// Capture one still image as JPEG bytes
    async fn capture_still(&self, jpeg_quality: u8) -> Result<Vec<u8>, CameraError>;
}
