use crate::config::{CameraConfig, Facing};
use crate::error::{AnalysisError, CameraError};
use crate::frame::FrameData;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Hardware zoom range reported by a video track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

/// What to ask the platform for when opening the camera
#[derive(Debug, Clone, PartialEq)]
pub struct CameraRequest {
    pub device_index: u32,
    pub facing: Facing,
    pub ideal_resolution: (u32, u32),
    pub fps: u32,
}

impl From<&CameraConfig> for CameraRequest {
    fn from(config: &CameraConfig) -> Self {
        Self {
            device_index: config.index,
            facing: config.facing,
            ideal_resolution: config.resolution,
            fps: config.fps,
        }
    }
}

/// A live video track of an acquired camera stream
#[async_trait]
pub trait VideoTrack: Send + Sync {
    fn label(&self) -> String;

    /// Hardware zoom range, `None` when the device cannot zoom
    fn zoom_capability(&self) -> Option<ZoomRange>;

    /// Request a hardware zoom level. The device may reject it.
    async fn apply_zoom(&self, level: f64) -> Result<(), CameraError>;

    /// Release the underlying hardware
    fn stop(&self);

    fn is_live(&self) -> bool;
}

/// The rendered video surface frames are sampled from
pub trait FrameSurface: Send + Sync {
    /// Snapshot of the frame currently displayed. Non-destructive.
    fn current_frame(&self) -> Result<FrameData, AnalysisError>;
}

/// An acquired camera stream
pub trait CameraStream: Send + Sync {
    fn video_tracks(&self) -> Vec<Arc<dyn VideoTrack>>;

    fn surface(&self) -> Arc<dyn FrameSurface>;

    /// Stop every track of the stream
    fn stop(&self) -> Result<(), CameraError> {
        for track in self.video_tracks() {
            track.stop();
        }
        Ok(())
    }
}

/// Platform camera access
#[async_trait]
pub trait CameraProvider: Send + Sync {
    async fn open(&self, request: &CameraRequest) -> Result<Arc<dyn CameraStream>, CameraError>;
}
