use crate::error::CaptureError;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

/// Pixel layouts camera devices deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// Motion JPEG format - compressed JPEG frames
    Mjpeg,
    /// RGB24 format - uncompressed RGB data
    Rgb24,
}

impl FrameFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            FrameFormat::Mjpeg => 0, // Variable size, compressed
            FrameFormat::Rgb24 => 3,
        }
    }

    /// Check if format is compressed
    pub fn is_compressed(&self) -> bool {
        matches!(self, FrameFormat::Mjpeg)
    }
}

/// Frame data structure containing raw frame data and metadata
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Unique frame identifier
    pub id: u64,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    /// Raw frame data (shared between preview and capture)
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frame format
    pub format: FrameFormat,
}

impl FrameData {
    /// Create a new frame data instance
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
            format,
        }
    }

    /// Get the expected frame size for uncompressed formats
    pub fn expected_size(&self) -> Option<usize> {
        if self.format.is_compressed() {
            None
        } else {
            Some(self.width as usize * self.height as usize * self.format.bytes_per_pixel())
        }
    }

    /// Validate frame data size against expected size
    pub fn validate_size(&self) -> bool {
        match self.expected_size() {
            Some(expected) => self.data.len() == expected,
            None => true,
        }
    }

    /// Encode the frame as a JPEG still. MJPEG frames are passed through untouched.
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>, CaptureError> {
        match self.format {
            FrameFormat::Mjpeg => Ok(self.data.as_ref().clone()),
            FrameFormat::Rgb24 => {
                if !self.validate_size() {
                    return Err(CaptureError::Encoding {
                        details: format!(
                            "RGB24 frame {} has {} bytes, expected {}x{}x3",
                            self.id,
                            self.data.len(),
                            self.width,
                            self.height
                        ),
                    });
                }

                let image = RgbImage::from_raw(self.width, self.height, self.data.as_ref().clone())
                    .ok_or_else(|| CaptureError::Encoding {
                        details: format!("Frame {} does not fit its dimensions", self.id),
                    })?;

                let mut buf = Vec::new();
                let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
                encoder
                    .encode_image(&image)
                    .map_err(|e| CaptureError::Encoding {
                        details: e.to_string(),
                    })?;

                Ok(buf)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_frame(width: u32, height: u32) -> FrameData {
        let data = vec![128u8; (width * height * 3) as usize];
        FrameData::new(1, SystemTime::now(), data, width, height, FrameFormat::Rgb24)
    }

    #[test]
    fn test_expected_size() {
        let frame = rgb_frame(4, 2);
        assert_eq!(frame.expected_size(), Some(24));
        assert!(frame.validate_size());

        let jpeg = FrameData::new(2, SystemTime::now(), vec![0xFF, 0xD8], 4, 2, FrameFormat::Mjpeg);
        assert_eq!(jpeg.expected_size(), None);
        assert!(jpeg.validate_size());
    }

    #[test]
    fn test_rgb_frame_encodes_to_jpeg() {
        let frame = rgb_frame(16, 8);
        let jpeg = frame.to_jpeg(90).unwrap();

        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_mjpeg_passthrough() {
        let data = vec![0xFF, 0xD8, 0x01, 0x02, 0xFF, 0xD9];
        let frame = FrameData::new(3, SystemTime::now(), data.clone(), 2, 2, FrameFormat::Mjpeg);

        assert_eq!(frame.to_jpeg(50).unwrap(), data);
    }

    #[test]
    fn test_truncated_rgb_frame_is_rejected() {
        let frame = FrameData::new(4, SystemTime::now(), vec![0u8; 10], 4, 4, FrameFormat::Rgb24);

        assert!(matches!(
            frame.to_jpeg(90),
            Err(CaptureError::Encoding { .. })
        ));
    }
}
