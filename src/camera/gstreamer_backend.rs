use super::backend::{CameraBackend, CameraDevice};
use super::builder::resolve_torch_led;
use super::torch::TorchLed;
use super::types::{CameraInfo, LensFacing};
use super::use_cases::Preview;
use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::frame::{FrameData, FrameFormat};
use async_trait::async_trait;
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// V4L2 cameras through a GStreamer pipeline
pub struct GstCameraBackend {
    config: CameraConfig,
    torch_led: Option<Arc<TorchLed>>,
}

impl GstCameraBackend {
    pub fn new(config: CameraConfig) -> Result<Self, CameraError> {
        gstreamer::init().map_err(|e| CameraError::ProviderUnavailable {
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;

        let torch_led = resolve_torch_led(&config).map(Arc::new);
        info!(
            "GStreamer camera backend ready (back: /dev/video{}, front: /dev/video{})",
            config.back_index, config.front_index
        );

        Ok(Self { config, torch_led })
    }

    fn pipeline_description(&self, lens: LensFacing) -> String {
        let (width, height) = self.config.resolution;
        format!(
            "v4l2src device=/dev/video{} ! videoconvert ! \
             video/x-raw,format=RGB,width={},height={},framerate={}/1 ! \
             appsink name=sink sync=false max-buffers=2 drop=true",
            self.config.device_index(lens),
            width,
            height,
            self.config.fps
        )
    }
}

#[async_trait]
impl CameraBackend for GstCameraBackend {
    fn name(&self) -> &str {
        "gstreamer"
    }

    async fn open(&self, lens: LensFacing) -> Result<Arc<dyn CameraDevice>, CameraError> {
        let pipeline_desc = self.pipeline_description(lens);
        info!("Creating GStreamer pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| CameraError::DeviceOpen {
                lens,
                details: format!("Failed to create pipeline: {}", e),
            })?
            .downcast::<Pipeline>()
            .map_err(|_| CameraError::DeviceOpen {
                lens,
                details: "Failed to downcast to Pipeline".to_string(),
            })?;

        // Opening the v4l2 device happens on the Ready transition
        pipeline
            .set_state(gstreamer::State::Ready)
            .map_err(|e| CameraError::DeviceOpen {
                lens,
                details: format!("/dev/video{}: {}", self.config.device_index(lens), e),
            })?;

        let torch_led = match lens {
            LensFacing::Back => self.torch_led.clone(),
            LensFacing::Front => None,
        };

        Ok(Arc::new(GstCameraDevice {
            info: CameraInfo {
                lens_facing: lens,
                name: format!("/dev/video{}", self.config.device_index(lens)),
                resolution: self.config.resolution,
                has_flash_unit: torch_led.is_some(),
            },
            pipeline,
            torch_led,
            latest: Arc::new(parking_lot::Mutex::new(None)),
            frame_counter: Arc::new(AtomicU64::new(0)),
            is_running: Arc::new(AtomicBool::new(false)),
            capture_task: tokio::sync::Mutex::new(None),
        }))
    }
}

pub struct GstCameraDevice {
    info: CameraInfo,
    pipeline: Pipeline,
    torch_led: Option<Arc<TorchLed>>,
    latest: Arc<parking_lot::Mutex<Option<FrameData>>>,
    frame_counter: Arc<AtomicU64>,
    is_running: Arc<AtomicBool>,
    capture_task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl GstCameraDevice {
    /// Convert an RGB sample into a tightly packed frame
    fn sample_to_frame(sample: &gstreamer::Sample, frame_id: u64) -> Result<FrameData, CameraError> {
        let buffer = sample.buffer().ok_or_else(|| CameraError::CaptureStream {
            details: "No buffer in sample".to_string(),
        })?;

        let caps = sample.caps().ok_or_else(|| CameraError::CaptureStream {
            details: "No caps in sample".to_string(),
        })?;

        let video_info = VideoInfo::from_caps(caps).map_err(|e| CameraError::CaptureStream {
            details: format!("Failed to get video info: {}", e),
        })?;

        let width = video_info.width();
        let height = video_info.height();
        let stride = video_info.stride()[0] as usize;
        let row_bytes = width as usize * 3;

        let map = buffer
            .map_readable()
            .map_err(|e| CameraError::CaptureStream {
                details: format!("Failed to map buffer: {}", e),
            })?;

        let data = if stride == row_bytes {
            map.as_slice().to_vec()
        } else {
            let mut packed = Vec::with_capacity(row_bytes * height as usize);
            for row in map.as_slice().chunks(stride).take(height as usize) {
                packed.extend_from_slice(&row[..row_bytes.min(row.len())]);
            }
            packed
        };

        Ok(FrameData::new(
            frame_id,
            SystemTime::now(),
            data,
            width,
            height,
            FrameFormat::Rgb24,
        ))
    }
}

#[async_trait]
impl CameraDevice for GstCameraDevice {
    fn info(&self) -> &CameraInfo {
        &self.info
    }

    async fn start_streaming(&self, preview: Preview) -> Result<(), CameraError> {
        if self.is_running.swap(true, Ordering::Relaxed) {
            warn!("GStreamer camera {} is already streaming", self.info.name);
            return Ok(());
        }

        let appsink = self
            .pipeline
            .by_name("sink")
            .ok_or_else(|| CameraError::Configuration {
                details: "Failed to get appsink element".to_string(),
            })?
            .downcast::<AppSink>()
            .map_err(|_| CameraError::Configuration {
                details: "Failed to downcast to AppSink".to_string(),
            })?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let sample = appsink
                        .pull_sample()
                        .map_err(|_| gstreamer::FlowError::Eos)?;
                    let _ = tx.send(sample);
                    Ok(gstreamer::FlowSuccess::Ok)
                })
                .build(),
        );

        if let Err(e) = self.pipeline.set_state(gstreamer::State::Playing) {
            self.is_running.store(false, Ordering::Relaxed);
            return Err(CameraError::CaptureStream {
                details: format!("Failed to start GStreamer pipeline: {}", e),
            });
        }

        let is_running = Arc::clone(&self.is_running);
        let frame_counter = Arc::clone(&self.frame_counter);
        let latest = Arc::clone(&self.latest);
        let name = self.info.name.clone();

        let task = tokio::spawn(async move {
            info!("GStreamer stream for {} started", name);

            while is_running.load(Ordering::Relaxed) {
                tokio::select! {
                    sample = rx.recv() => {
                        let Some(sample) = sample else { break };
                        let frame_id = frame_counter.fetch_add(1, Ordering::Relaxed);
                        match Self::sample_to_frame(&sample, frame_id) {
                            Ok(frame) => {
                                trace!("Captured frame {} ({}x{})", frame_id, frame.width, frame.height);
                                *latest.lock() = Some(frame.clone());
                                preview.deliver(frame);
                            }
                            Err(e) => error!("Error processing GStreamer sample: {}", e),
                        }
                    }
                    _ = tokio::time::sleep(Duration::from_millis(100)) => {}
                }
            }

            info!("GStreamer stream for {} stopped", name);
        });

        *self.capture_task.lock().await = Some(task);
        Ok(())
    }

    async fn stop_streaming(&self) -> Result<(), CameraError> {
        if !self.is_running.swap(false, Ordering::Relaxed) {
            debug!("GStreamer camera {} is not streaming", self.info.name);
            return Ok(());
        }

        if let Some(led) = &self.torch_led {
            if let Err(e) = led.set(false).await {
                warn!("Failed to switch off torch LED: {}", e);
            }
        }

        if let Some(task) = self.capture_task.lock().await.take() {
            match tokio::time::timeout(Duration::from_secs(3), task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Error waiting for GStreamer stream task: {}", e),
                Err(_) => warn!("GStreamer stream task did not complete within timeout"),
            }
        }

        self.pipeline
            .set_state(gstreamer::State::Null)
            .map_err(|e| CameraError::CaptureStream {
                details: format!("Failed to stop pipeline: {}", e),
            })?;
        *self.latest.lock() = None;

        Ok(())
    }

    async fn set_torch(&self, enabled: bool) -> Result<(), CameraError> {
        match &self.torch_led {
            Some(led) => led.set(enabled).await,
            None => Err(CameraError::Torch {
                details: format!("{} has no flash unit", self.info.name),
            }),
        }
    }

    async fn capture_still(&self, jpeg_quality: u8) -> Result<Vec<u8>, CameraError> {
        let frame = self
            .latest
            .lock()
            .clone()
            .ok_or_else(|| CameraError::CaptureStream {
                details: format!("no frame received from {} yet", self.info.name),
            })?;

        tokio::task::spawn_blocking(move || frame.to_jpeg(jpeg_quality))
            .await
            .map_err(|e| CameraError::CaptureStream {
                details: format!("encoder task failed: {}", e),
            })?
            .map_err(|e| CameraError::CaptureStream {
                details: e.to_string(),
            })
    }
}

impl Drop for GstCameraDevice {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gstreamer::State::Null);
    }
}
