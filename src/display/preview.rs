use crate::camera::PreviewSurface;
use crate::frame::{FrameData, FrameFormat};
use parking_lot::Mutex;
use std::time::SystemTime;
use tracing::trace;

/// Every n-th pixel is sampled for the brightness estimate
const LUMA_SAMPLE_STEP: usize = 16;

/// Summary of the most recent preview frames
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreviewStats {
    pub frames: u64,
    pub resolution: Option<(u32, u32)>,
    /// Mean luma (0-255) of the last RGB frame
    pub mean_luma: Option<u8>,
    pub last_frame_time: Option<SystemTime>,
}

/// Preview surface for a terminal: frames are summarized, not drawn
#[derive(Debug, Default)]
pub struct TerminalPreview {
    stats: Mutex<PreviewStats>,
}

impl TerminalPreview {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> PreviewStats {
        self.stats.lock().clone()
    }
}

impl PreviewSurface for TerminalPreview {
    fn on_frame(&self, frame: &FrameData) {
        let luma = match frame.format {
            FrameFormat::Rgb24 => mean_luma(&frame.data),
            FrameFormat::Mjpeg => None,
        };

        let mut stats = self.stats.lock();
        stats.frames += 1;
        stats.resolution = Some((frame.width, frame.height));
        if luma.is_some() {
            stats.mean_luma = luma;
        }
        stats.last_frame_time = Some(frame.timestamp);
        trace!("Preview frame {} summarized", frame.id);
    }
}

/// Rec. 601 luma averaged over sampled RGB pixels
pub(crate) fn mean_luma(rgb: &[u8]) -> Option<u8> {
    let mut total: u64 = 0;
    let mut samples: u64 = 0;

    for pixel in rgb.chunks_exact(3).step_by(LUMA_SAMPLE_STEP) {
        let (r, g, b) = (pixel[0] as u64, pixel[1] as u64, pixel[2] as u64);
        total += (299 * r + 587 * g + 114 * b) / 1000;
        samples += 1;
    }

    if samples == 0 {
        None
    } else {
        Some((total / samples) as u8)
    }
}
