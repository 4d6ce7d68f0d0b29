use super::state::{ANALYSIS, CAMERA};
use super::types::{ComponentState, SessionComponents};
use crate::analysis::{AnalysisLoop, AnalysisSnapshot};
use crate::camera::{CameraRequest, CameraSource, FrameSurface};
use crate::config::StereocamConfig;
use crate::error::{AnalysisError, CameraError, Result};
use crate::events::EventBus;
use crate::frame::Rotation;
use crate::orientation::{OrientationSampler, PermissionState};
use crate::transform::{StereoTransform, TransformReconciler};
use crate::zoom::{ZoomController, ZoomMode, ZoomState};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// One viewer's stereo session. Owns every stateful component; nothing is global.
pub struct VrSession {
    pub(super) config: StereocamConfig,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) camera: Arc<CameraSource>,
    pub(super) orientation: OrientationSampler,
    pub(super) zoom: ZoomController,
    pub(super) analysis: AnalysisLoop,
    pub(super) reconciler: TransformReconciler,
    pub(super) component_states: Mutex<HashMap<String, ComponentState>>,
}

impl VrSession {
    pub fn new(config: StereocamConfig, components: SessionComponents) -> Self {
        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));

        let camera = Arc::new(CameraSource::new(
            components.camera,
            CameraRequest::from(&config.camera),
            Arc::clone(&event_bus),
        ));
        let orientation = OrientationSampler::new(components.orientation, Arc::clone(&event_bus));
        let zoom = ZoomController::new(Arc::clone(&event_bus));
        let analysis = AnalysisLoop::new(
            components.analysis,
            config.analysis.jpeg_quality,
            Arc::clone(&event_bus),
        );
        let reconciler = TransformReconciler::new(&config.view);

        Self {
            config,
            event_bus,
            camera,
            orientation,
            zoom,
            analysis,
            reconciler,
            component_states: Mutex::new(HashMap::new()),
        }
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    /// Current transforms for both eyes
    pub fn transform(&self) -> StereoTransform {
        let sample = self.orientation.effective_sample();
        self.reconciler
            .reconcile(self.camera.rotation(), sample.as_ref(), &self.zoom.state())
    }

    /// Advance the manual rotation by a quarter turn
    pub fn rotate(&self) -> Rotation {
        self.camera.rotate()
    }

    pub fn rotation(&self) -> Rotation {
        self.camera.rotation()
    }

    /// Apply a zoom slider value, preferring the camera's native zoom
    pub async fn set_zoom(&self, value: f64) -> ZoomMode {
        self.zoom.set_level(value, self.camera.video_track()).await
    }

    pub fn zoom_state(&self) -> ZoomState {
        self.zoom.state()
    }

    pub fn has_native_zoom(&self) -> bool {
        self.camera.has_native_zoom()
    }

    /// Explicit orientation permission request, for gated platforms
    pub async fn request_orientation_access(&self) -> bool {
        self.orientation.request_access().await
    }

    pub fn orientation_permission(&self) -> PermissionState {
        self.orientation.permission()
    }

    /// Re-acquire the camera after a failed or released attempt
    pub async fn request_camera(&self) -> std::result::Result<(), CameraError> {
        let result = self.camera.request_permission().await;
        self.record_camera_outcome(&result);
        self.zoom.sync_capability(self.camera.video_track()).await;
        result
    }

    pub fn camera_error(&self) -> Option<String> {
        self.camera.error()
    }

    pub fn has_camera(&self) -> bool {
        self.camera.has_permission()
    }

    /// Restart the capture-analyze loop with a new prompt and interval
    pub fn restart_analysis(&self, prompt_text: &str, interval_seconds: f64) -> Result<()> {
        self.analysis
            .start(prompt_text, interval_seconds, self.frame_surface())?;
        self.set_component_state(ANALYSIS, self.analysis_component_state());
        info!("Analysis restarted");
        Ok(())
    }

    /// One capture-analyze cycle outside the timer
    pub async fn capture_and_analyze(&self) -> std::result::Result<String, AnalysisError> {
        self.analysis.capture_and_analyze(self.frame_surface()).await
    }

    pub fn analysis_snapshot(&self) -> AnalysisSnapshot {
        self.analysis.snapshot()
    }

    pub fn config(&self) -> &StereocamConfig {
        &self.config
    }

    pub(super) fn frame_surface(&self) -> Arc<dyn FrameSurface> {
        Arc::clone(&self.camera) as Arc<dyn FrameSurface>
    }

    pub(super) fn analysis_component_state(&self) -> ComponentState {
        if self.analysis.is_running() {
            ComponentState::Running
        } else {
            ComponentState::Stopped
        }
    }

    pub(super) fn record_camera_outcome(&self, result: &std::result::Result<(), CameraError>) {
        let state = match result {
            Ok(()) => ComponentState::Running,
            Err(_) => ComponentState::Unavailable,
        };
        self.set_component_state(CAMERA, state);
    }
}
