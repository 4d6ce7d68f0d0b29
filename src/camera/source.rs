use super::interface::{CameraProvider, CameraRequest, CameraStream, FrameSurface, VideoTrack, ZoomRange};
use crate::error::{AnalysisError, CameraError};
use crate::events::{EventBus, StereocamEvent};
use crate::frame::{FrameData, Rotation};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Live camera stream plus the manual rotation applied to it
pub struct CameraSource {
    provider: Arc<dyn CameraProvider>,
    request: CameraRequest,
    stream: RwLock<Option<Arc<dyn CameraStream>>>,
    error: RwLock<Option<String>>,
    rotation: Mutex<Rotation>,
    event_bus: Arc<EventBus>,
}

impl CameraSource {
    pub fn new(
        provider: Arc<dyn CameraProvider>,
        request: CameraRequest,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            request,
            stream: RwLock::new(None),
            error: RwLock::new(None),
            rotation: Mutex::new(Rotation::default()),
            event_bus,
        }
    }

    /// Acquire the camera. On failure the user-facing message is kept in
    /// [`error`](Self::error) until the next attempt.
    pub async fn request_permission(&self) -> Result<(), CameraError> {
        *self.error.write() = None;

        info!(
            "Requesting camera {} ({:?}, ideal {}x{} @ {}fps)",
            self.request.device_index,
            self.request.facing,
            self.request.ideal_resolution.0,
            self.request.ideal_resolution.1,
            self.request.fps
        );

        match self.provider.open(&self.request).await {
            Ok(stream) => {
                let previous = self.stream.write().replace(Arc::clone(&stream));
                if let Some(previous) = previous {
                    debug!("Releasing previously acquired camera stream");
                    if let Err(e) = previous.stop() {
                        warn!("Failed to stop previous camera stream: {}", e);
                    }
                }

                match stream.video_tracks().first().and_then(|t| t.zoom_capability()) {
                    Some(range) => info!(
                        "Camera supports native zoom {:.1}-{:.1} (step {})",
                        range.min, range.max, range.step
                    ),
                    None => info!("Camera has no native zoom; digital zoom will be used"),
                }

                self.event_bus.publish(StereocamEvent::CameraStatusChanged {
                    connected: true,
                    timestamp: SystemTime::now(),
                });
                Ok(())
            }
            Err(e) => {
                warn!("Error accessing camera: {}", e);
                *self.error.write() = Some(e.user_message());
                Err(e)
            }
        }
    }

    pub fn has_permission(&self) -> bool {
        self.stream.read().is_some()
    }

    /// User-facing acquisition error, if the last attempt failed
    pub fn error(&self) -> Option<String> {
        self.error.read().clone()
    }

    pub fn video_track(&self) -> Option<Arc<dyn VideoTrack>> {
        self.stream
            .read()
            .as_ref()
            .and_then(|stream| stream.video_tracks().into_iter().next())
    }

    pub fn zoom_capability(&self) -> Option<ZoomRange> {
        self.video_track().and_then(|track| track.zoom_capability())
    }

    pub fn has_native_zoom(&self) -> bool {
        self.zoom_capability().is_some()
    }

    pub fn rotation(&self) -> Rotation {
        *self.rotation.lock()
    }

    /// Advance the manual rotation by a quarter turn
    pub fn rotate(&self) -> Rotation {
        let mut rotation = self.rotation.lock();
        *rotation = rotation.rotated();
        debug!("Manual rotation now {} degrees", rotation.degrees());
        *rotation
    }

    /// Release the camera hardware
    pub fn stop(&self) -> Result<(), CameraError> {
        let stream = self.stream.write().take();
        match stream {
            Some(stream) => {
                info!("Stopping camera tracks");
                let result = stream.stop();
                self.event_bus.publish(StereocamEvent::CameraStatusChanged {
                    connected: false,
                    timestamp: SystemTime::now(),
                });
                result
            }
            None => Ok(()),
        }
    }
}

impl FrameSurface for CameraSource {
    fn current_frame(&self) -> Result<FrameData, AnalysisError> {
        let stream = self.stream.read().clone();
        match stream {
            Some(stream) => stream.surface().current_frame(),
            None => Err(AnalysisError::SurfaceUnavailable {
                details: "camera stream not acquired".to_string(),
            }),
        }
    }
}
