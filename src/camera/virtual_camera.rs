use super::backend::{CameraBackend, CameraDevice};
use super::torch::TorchLed;
use super::types::{CameraInfo, LensFacing};
use super::use_cases::Preview;
use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::frame::{FrameData, FrameFormat};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Backend producing synthetic frames; every lens is always present
pub struct VirtualCameraBackend {
    config: CameraConfig,
    torch_led: Option<Arc<TorchLed>>,
}

impl VirtualCameraBackend {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            torch_led: None,
        }
    }

    /// Mirror the torch state of flash-equipped lenses onto a real LED
    pub fn with_torch_led(mut self, led: TorchLed) -> Self {
        self.torch_led = Some(Arc::new(led));
        self
    }
}

#[async_trait]
impl CameraBackend for VirtualCameraBackend {
    fn name(&self) -> &str {
        "virtual"
    }

    async fn open(&self, lens: LensFacing) -> Result<Arc<dyn CameraDevice>, CameraError> {
        let has_flash_unit = self.config.virtual_flash_lenses.contains(&lens);
        let mut device =
            VirtualCameraDevice::new(lens, self.config.resolution, self.config.fps, has_flash_unit);
        if has_flash_unit {
            device.torch_led = self.torch_led.clone();
        }
        Ok(Arc::new(device))
    }
}

/// Synthetic camera device
pub struct VirtualCameraDevice {
    info: CameraInfo,
    fps: u32,
    frame_counter: Arc<AtomicU64>,
    is_running: Arc<AtomicBool>,
    torch: Arc<AtomicBool>,
    torch_led: Option<Arc<TorchLed>>,
    capture_task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl VirtualCameraDevice {
    pub fn new(lens: LensFacing, resolution: (u32, u32), fps: u32, has_flash_unit: bool) -> Self {
        info!(
            "Opening virtual {} camera ({}x{} @ {}fps, flash: {})",
            lens, resolution.0, resolution.1, fps, has_flash_unit
        );

        Self {
            info: CameraInfo {
                lens_facing: lens,
                name: format!("virtual-{}", lens),
                resolution,
                has_flash_unit,
            },
            fps: fps.max(1),
            frame_counter: Arc::new(AtomicU64::new(0)),
            is_running: Arc::new(AtomicBool::new(false)),
            torch: Arc::new(AtomicBool::new(false)),
            torch_led: None,
            capture_task: tokio::sync::Mutex::new(None),
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    pub fn torch_enabled(&self) -> bool {
        self.torch.load(Ordering::Relaxed)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_counter.load(Ordering::Relaxed)
    }
}

/// Gradient test pattern; the torch brightens it
fn render_frame(id: u64, lens: LensFacing, (width, height): (u32, u32), torch: bool) -> FrameData {
    let base: u8 = match lens {
        LensFacing::Back => 64,
        LensFacing::Front => 160,
    };
    let boost: u8 = if torch { 60 } else { 0 };
    let shift = (id % 256) as u8;

    let mut data = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height {
        for x in 0..width {
            let r = ((x * 255) / width.max(1)) as u8;
            let g = ((y * 255) / height.max(1)) as u8;
            data.push(r.wrapping_add(shift).saturating_add(boost));
            data.push(g.saturating_add(boost));
            data.push(base.saturating_add(boost));
        }
    }

    FrameData::new(id, SystemTime::now(), data, width, height, FrameFormat::Rgb24)
}

#[async_trait]
impl CameraDevice for VirtualCameraDevice {
    fn info(&self) -> &CameraInfo {
        &self.info
    }

    async fn start_streaming(&self, preview: Preview) -> Result<(), CameraError> {
        if self.is_running.swap(true, Ordering::Relaxed) {
            warn!("Virtual camera {} is already streaming", self.info.name);
            return Ok(());
        }

        let is_running = Arc::clone(&self.is_running);
        let frame_counter = Arc::clone(&self.frame_counter);
        let torch = Arc::clone(&self.torch);
        let lens = self.info.lens_facing;
        let resolution = self.info.resolution;
        let frame_interval = Duration::from_millis((1000 / self.fps as u64).max(1));

        let task = tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(frame_interval);
            debug!("Virtual {} camera stream started", lens);

            while is_running.load(Ordering::Relaxed) {
                interval_timer.tick().await;

                if !is_running.load(Ordering::Relaxed) {
                    break;
                }

                let frame_id = frame_counter.fetch_add(1, Ordering::Relaxed);
                let frame = render_frame(frame_id, lens, resolution, torch.load(Ordering::Relaxed));
                trace!("Generated virtual frame {} ({}x{})", frame_id, resolution.0, resolution.1);
                preview.deliver(frame);
            }

            debug!("Virtual {} camera stream stopped", lens);
        });

        *self.capture_task.lock().await = Some(task);
        Ok(())
    }

    async fn stop_streaming(&self) -> Result<(), CameraError> {
        if !self.is_running.swap(false, Ordering::Relaxed) {
            debug!("Virtual camera {} is not streaming", self.info.name);
            return Ok(());
        }

        if self.torch.swap(false, Ordering::Relaxed) {
            if let Some(led) = &self.torch_led {
                if let Err(e) = led.set(false).await {
                    warn!("Failed to switch off torch LED: {}", e);
                }
            }
        }

        if let Some(task) = self.capture_task.lock().await.take() {
            match tokio::time::timeout(Duration::from_secs(3), task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Virtual camera stream task failed: {}", e),
                Err(_) => warn!("Virtual camera stream task did not stop within timeout"),
            }
        }

        Ok(())
    }

    async fn set_torch(&self, enabled: bool) -> Result<(), CameraError> {
        if !self.info.has_flash_unit {
            return Err(CameraError::Torch {
                details: format!("{} has no flash unit", self.info.name),
            });
        }

        if let Some(led) = &self.torch_led {
            led.set(enabled).await?;
        }

        self.torch.store(enabled, Ordering::Relaxed);
        debug!("Virtual torch on {} set to {}", self.info.name, enabled);
        Ok(())
    }

    async fn capture_still(&self, jpeg_quality: u8) -> Result<Vec<u8>, CameraError> {
        let frame_id = self.frame_counter.fetch_add(1, Ordering::Relaxed);
        let frame = render_frame(
            frame_id,
            self.info.lens_facing,
            self.info.resolution,
            self.torch_enabled(),
        );

        let jpeg = tokio::task::spawn_blocking(move || frame.to_jpeg(jpeg_quality))
            .await
            .map_err(|e| CameraError::CaptureStream {
                details: format!("encoder task failed: {}", e),
            })?
            .map_err(|e| CameraError::CaptureStream {
                details: e.to_string(),
            })?;

        debug!(
            "Virtual {} camera captured still {} ({} bytes)",
            self.info.lens_facing,
            frame_id,
            jpeg.len()
        );
        Ok(jpeg)
    }
}
