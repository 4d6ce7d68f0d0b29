use crate::error::AnalysisError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

/// Pixel layout of a frame read from the video surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// Already JPEG compressed
    Mjpeg,
    /// Packed 8-bit RGB
    Rgb24,
    /// Packed 8-bit RGBA
    Rgba32,
}

impl FrameFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            FrameFormat::Mjpeg => 0, // Variable size, compressed
            FrameFormat::Rgb24 => 3,
            FrameFormat::Rgba32 => 4,
        }
    }

    /// Check if format is compressed
    pub fn is_compressed(&self) -> bool {
        matches!(self, FrameFormat::Mjpeg)
    }
}

/// Manual view rotation, advanced a quarter turn per user action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Rotate0,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Rotation {
    /// Get rotation angle in degrees
    pub fn degrees(&self) -> u16 {
        match self {
            Rotation::Rotate0 => 0,
            Rotation::Rotate90 => 90,
            Rotation::Rotate180 => 180,
            Rotation::Rotate270 => 270,
        }
    }

    /// Next quarter turn clockwise, wrapping at 360
    pub fn rotated(self) -> Self {
        match self {
            Rotation::Rotate0 => Rotation::Rotate90,
            Rotation::Rotate90 => Rotation::Rotate180,
            Rotation::Rotate180 => Rotation::Rotate270,
            Rotation::Rotate270 => Rotation::Rotate0,
        }
    }
}

/// A single video frame as currently displayed on the surface
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Unique frame identifier
    pub id: u64,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    /// Raw frame data (shared ownership for efficiency)
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
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
            None => !self.data.is_empty(),
        }
    }
}

/// Lossy still image produced from one frame
#[derive(Debug, Clone)]
pub struct StillImage {
    pub frame_id: u64,
    pub jpeg: Vec<u8>,
}

impl StillImage {
    /// Compress a frame into a JPEG still at the given quality (1-100)
    pub fn from_frame(frame: &FrameData, quality: u8) -> Result<Self, AnalysisError> {
        if frame.width == 0 || frame.height == 0 || !frame.validate_size() {
            return Err(AnalysisError::Encoding {
                details: format!(
                    "frame {} has {} bytes for {}x{} {:?}",
                    frame.id,
                    frame.data.len(),
                    frame.width,
                    frame.height,
                    frame.format
                ),
            });
        }

        let jpeg = match frame.format {
            FrameFormat::Mjpeg => frame.data.as_ref().clone(),
            FrameFormat::Rgb24 => encode_rgb(&frame.data, frame.width, frame.height, quality)?,
            FrameFormat::Rgba32 => {
                let rgb: Vec<u8> = frame
                    .data
                    .chunks_exact(4)
                    .flat_map(|px| [px[0], px[1], px[2]])
                    .collect();
                encode_rgb(&rgb, frame.width, frame.height, quality)?
            }
        };

        Ok(Self {
            frame_id: frame.id,
            jpeg,
        })
    }

    /// Base64 data URL as accepted by the analysis endpoint
    pub fn to_data_url(&self) -> String {
        format!("data:image/jpeg;base64,{}", BASE64.encode(&self.jpeg))
    }
}

fn encode_rgb(data: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>, AnalysisError> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    encoder
        .encode(data, width, height, ColorType::Rgb8)
        .map_err(|e| AnalysisError::Encoding {
            details: e.to_string(),
        })?;
    Ok(buf)
}
