use super::interface::{CameraProvider, CameraRequest, CameraStream, FrameSurface, VideoTrack, ZoomRange};
use crate::error::{AnalysisError, CameraError};
use crate::frame::{FrameData, FrameFormat};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, trace};

/// Camera provider producing a moving test pattern, for running without hardware
pub struct SyntheticCamera {
    resolution: Option<(u32, u32)>,
    zoom: Option<ZoomRange>,
    reject_zoom: bool,
    open_error: Option<CameraError>,
    fail_stop: bool,
    opened: Mutex<Vec<Arc<SyntheticTrack>>>,
}

impl SyntheticCamera {
    pub fn builder() -> SyntheticCameraBuilder {
        SyntheticCameraBuilder::new()
    }

    /// Tracks handed out so far, most recent last
    pub fn tracks(&self) -> Vec<Arc<SyntheticTrack>> {
        self.opened.lock().clone()
    }

    pub fn last_track(&self) -> Option<Arc<SyntheticTrack>> {
        self.opened.lock().last().cloned()
    }
}

#[async_trait]
impl CameraProvider for SyntheticCamera {
    async fn open(&self, request: &CameraRequest) -> Result<Arc<dyn CameraStream>, CameraError> {
        if let Some(err) = &self.open_error {
            return Err(err.clone());
        }

        let (width, height) = self.resolution.unwrap_or(request.ideal_resolution);
        let track = Arc::new(SyntheticTrack {
            label: format!("synthetic camera {}", request.device_index),
            zoom: self.zoom,
            reject_zoom: AtomicBool::new(self.reject_zoom),
            zoom_delays: Mutex::new(VecDeque::new()),
            applied: Mutex::new(Vec::new()),
            live: AtomicBool::new(true),
        });
        self.opened.lock().push(Arc::clone(&track));

        debug!("Opened synthetic camera {}x{}", width, height);

        Ok(Arc::new(SyntheticStream {
            surface: Arc::new(SyntheticSurface {
                track: Arc::clone(&track),
                width,
                height,
                frame_counter: AtomicU64::new(0),
            }),
            track,
            fail_stop: self.fail_stop,
        }))
    }
}

/// Builder for [`SyntheticCamera`]
pub struct SyntheticCameraBuilder {
    resolution: Option<(u32, u32)>,
    zoom: Option<ZoomRange>,
    reject_zoom: bool,
    open_error: Option<CameraError>,
    fail_stop: bool,
}

impl SyntheticCameraBuilder {
    pub fn new() -> Self {
        Self {
            resolution: None,
            zoom: None,
            reject_zoom: false,
            open_error: None,
            fail_stop: false,
        }
    }

    /// Fixed frame size; defaults to the requested ideal resolution
    pub fn resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = Some((width, height));
        self
    }

    /// Report a hardware zoom range
    pub fn zoom(mut self, min: f64, max: f64, step: f64) -> Self {
        self.zoom = Some(ZoomRange { min, max, step });
        self
    }

    /// Reject every hardware zoom request
    pub fn reject_zoom(mut self) -> Self {
        self.reject_zoom = true;
        self
    }

    /// Fail acquisition with the given error
    pub fn open_error(mut self, error: CameraError) -> Self {
        self.open_error = Some(error);
        self
    }

    /// Report an error when a stream is stopped; its tracks still end
    pub fn fail_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    pub fn build(self) -> SyntheticCamera {
        SyntheticCamera {
            resolution: self.resolution,
            zoom: self.zoom,
            reject_zoom: self.reject_zoom,
            open_error: self.open_error,
            fail_stop: self.fail_stop,
            opened: Mutex::new(Vec::new()),
        }
    }
}

impl Default for SyntheticCameraBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Video track of a synthetic stream. Records every zoom level it accepts.
pub struct SyntheticTrack {
    label: String,
    zoom: Option<ZoomRange>,
    reject_zoom: AtomicBool,
    zoom_delays: Mutex<VecDeque<Duration>>,
    applied: Mutex<Vec<f64>>,
    live: AtomicBool,
}

impl SyntheticTrack {
    /// Zoom levels accepted so far
    pub fn applied_zoom(&self) -> Vec<f64> {
        self.applied.lock().clone()
    }

    pub fn set_reject_zoom(&self, reject: bool) {
        self.reject_zoom.store(reject, Ordering::Relaxed);
    }

    /// Delay the next zoom request's answer
    pub fn push_zoom_delay(&self, delay: Duration) {
        self.zoom_delays.lock().push_back(delay);
    }
}

#[async_trait]
impl VideoTrack for SyntheticTrack {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn zoom_capability(&self) -> Option<ZoomRange> {
        self.zoom
    }

    async fn apply_zoom(&self, level: f64) -> Result<(), CameraError> {
        let delay = self.zoom_delays.lock().pop_front();
        let reject = self.reject_zoom.load(Ordering::Relaxed);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if !self.live.load(Ordering::Relaxed) {
            return Err(CameraError::NotActive);
        }
        if self.zoom.is_none() || reject {
            return Err(CameraError::ZoomRejected {
                details: format!("zoom {:.3} not accepted", level),
            });
        }

        self.applied.lock().push(level);
        Ok(())
    }

    fn stop(&self) {
        self.live.store(false, Ordering::Relaxed);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::Relaxed)
    }
}

struct SyntheticStream {
    track: Arc<SyntheticTrack>,
    surface: Arc<SyntheticSurface>,
    fail_stop: bool,
}

impl CameraStream for SyntheticStream {
    fn video_tracks(&self) -> Vec<Arc<dyn VideoTrack>> {
        vec![Arc::clone(&self.track) as Arc<dyn VideoTrack>]
    }

    fn surface(&self) -> Arc<dyn FrameSurface> {
        Arc::clone(&self.surface) as Arc<dyn FrameSurface>
    }

    fn stop(&self) -> Result<(), CameraError> {
        self.track.stop();
        if self.fail_stop {
            return Err(CameraError::Device {
                details: format!("{} did not release cleanly", self.track.label),
            });
        }
        Ok(())
    }
}

struct SyntheticSurface {
    track: Arc<SyntheticTrack>,
    width: u32,
    height: u32,
    frame_counter: AtomicU64,
}

impl FrameSurface for SyntheticSurface {
    fn current_frame(&self) -> Result<FrameData, AnalysisError> {
        if !self.track.is_live() {
            return Err(AnalysisError::NoFrame);
        }

        let frame_id = self.frame_counter.fetch_add(1, Ordering::Relaxed);
        let shift = (frame_id % 256) as u32;
        let mut data = Vec::with_capacity((self.width * self.height * 3) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                data.push(((x + shift) % 256) as u8);
                data.push(((y + shift) % 256) as u8);
                data.push(((x ^ y) % 256) as u8);
            }
        }

        trace!("Generated synthetic frame {} ({}x{})", frame_id, self.width, self.height);

        Ok(FrameData::new(
            frame_id,
            SystemTime::now(),
            data,
            self.width,
            self.height,
            FrameFormat::Rgb24,
        ))
    }
}
