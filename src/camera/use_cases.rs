use super::backend::CameraDevice;
use crate::error::CaptureError;
use crate::frame::FrameData;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, trace, warn};

/// Renders live frames
pub trait PreviewSurface: Send + Sync {
    fn on_frame(&self, frame: &FrameData);
}

/// Preview use case: routes frames from the bound device to a surface
#[derive(Clone, Default)]
pub struct Preview {
    inner: Arc<PreviewInner>,
}

#[derive(Default)]
struct PreviewInner {
    surface: RwLock<Option<Arc<dyn PreviewSurface>>>,
    frames_delivered: AtomicU64,
    frames_dropped: AtomicU64,
}

impl Preview {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the surface frames are rendered to
    pub fn set_surface_provider(&self, surface: Arc<dyn PreviewSurface>) {
        *self.inner.surface.write() = Some(surface);
    }

    pub fn clear_surface_provider(&self) {
        *self.inner.surface.write() = None;
    }

    pub fn has_surface(&self) -> bool {
        self.inner.surface.read().is_some()
    }

    /// Called by camera devices for every frame
    pub fn deliver(&self, frame: FrameData) {
        let surface = self.inner.surface.read().clone();
        match surface {
            Some(surface) => {
                surface.on_frame(&frame);
                self.inner.frames_delivered.fetch_add(1, Ordering::Relaxed);
                trace!("Delivered preview frame {}", frame.id);
            }
            None => {
                self.inner.frames_dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn frames_delivered(&self) -> u64 {
        self.inner.frames_delivered.load(Ordering::Relaxed)
    }

    pub fn frames_dropped(&self) -> u64 {
        self.inner.frames_dropped.load(Ordering::Relaxed)
    }
}

/// Handle through which a still capture is issued
#[async_trait]
pub trait CaptureEndpoint: Send + Sync {
    /// Capture a photo and save it to `output`, returning where it was saved
    async fn take_picture(&self, output: &Path) -> Result<PathBuf, CaptureError>;
}

const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Image capture use case. Attached to a device while a binding is active.
#[derive(Clone)]
pub struct ImageCapture {
    inner: Arc<ImageCaptureInner>,
}

struct ImageCaptureInner {
    device: RwLock<Option<Arc<dyn CameraDevice>>>,
    jpeg_quality: u8,
}

impl ImageCapture {
    pub fn new() -> Self {
        Self::with_jpeg_quality(DEFAULT_JPEG_QUALITY)
    }

    pub fn with_jpeg_quality(jpeg_quality: u8) -> Self {
        Self {
            inner: Arc::new(ImageCaptureInner {
                device: RwLock::new(None),
                jpeg_quality: jpeg_quality.clamp(1, 100),
            }),
        }
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.inner.jpeg_quality
    }

    pub fn is_bound(&self) -> bool {
        self.inner.device.read().is_some()
    }

    pub(crate) fn attach(&self, device: Arc<dyn CameraDevice>) {
        debug!("Image capture attached to {}", device.info().name);
        *self.inner.device.write() = Some(device);
    }

    pub(crate) fn detach(&self) {
        if self.inner.device.write().take().is_some() {
            debug!("Image capture detached");
        }
    }

    fn still_attached_to(&self, device: &Arc<dyn CameraDevice>) -> bool {
        self.inner
            .device
            .read()
            .as_ref()
            .map(|current| Arc::ptr_eq(current, device))
            .unwrap_or(false)
    }
}

impl Default for ImageCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureEndpoint for ImageCapture {
    async fn take_picture(&self, output: &Path) -> Result<PathBuf, CaptureError> {
        let device = self
            .inner
            .device
            .read()
            .clone()
            .ok_or(CaptureError::EndpointDetached)?;

        let jpeg = device.capture_still(self.inner.jpeg_quality).await?;

        if !self.still_attached_to(&device) {
            warn!("Camera was unbound while capturing {}", output.display());
            return Err(CaptureError::EndpointDetached);
        }

        let mut partial = output.as_os_str().to_owned();
        partial.push(".part");
        let partial = PathBuf::from(partial);

        if let Err(source) = fs::write(&partial, &jpeg).await {
            let _ = fs::remove_file(&partial).await;
            return Err(CaptureError::Io {
                path: partial,
                source,
            });
        }

        if let Err(source) = fs::rename(&partial, output).await {
            let _ = fs::remove_file(&partial).await;
            return Err(CaptureError::Io {
                path: output.to_path_buf(),
                source,
            });
        }

        debug!("Wrote {} bytes to {}", jpeg.len(), output.display());
        Ok(output.to_path_buf())
    }
}
