use super::state::{ANALYSIS, CAMERA, ORIENTATION};
use super::{ComponentState, VrSession};
use crate::error::{OrientationError, Result, StereocamError};
use crate::events::StereocamEvent;
use crate::orientation::PermissionState;
use std::time::SystemTime;
use tracing::{error, info, warn};

impl VrSession {
    /// Acquire camera and orientation concurrently, then start the
    /// capture-analyze loop with the configured prompt.
    ///
    /// Device failures are not fatal: they are surfaced through
    /// [`camera_error`](Self::camera_error) and the orientation permission
    /// state. Only an invalid analysis configuration is returned as an error.
    pub async fn start(&self) -> Result<()> {
        info!("Starting stereo session");
        self.set_component_state(CAMERA, ComponentState::Starting);
        self.set_component_state(ORIENTATION, ComponentState::Starting);

        let (camera_result, orientation_result) = tokio::join!(
            self.camera.request_permission(),
            async { self.orientation.start() }
        );

        self.record_camera_outcome(&camera_result);
        if let Err(e) = &camera_result {
            warn!("Session continuing without camera: {}", e);
        }

        let orientation_state = match orientation_result {
            Ok(()) if self.orientation.permission() == PermissionState::Granted => ComponentState::Running,
            Ok(()) => ComponentState::Stopped,
            Err(OrientationError::Unsupported) => ComponentState::Unavailable,
            Err(e) => {
                warn!("Orientation unavailable: {}", e);
                ComponentState::Failed
            }
        };
        self.set_component_state(ORIENTATION, orientation_state);

        self.zoom.sync_capability(self.camera.video_track()).await;

        self.set_component_state(ANALYSIS, ComponentState::Starting);
        if let Err(e) = self.analysis.start(
            &self.config.analysis.prompt,
            self.config.analysis.interval_seconds,
            self.frame_surface(),
        ) {
            self.set_component_state(ANALYSIS, ComponentState::Failed);
            return Err(e.into());
        }
        self.set_component_state(ANALYSIS, self.analysis_component_state());

        self.event_bus.publish(StereocamEvent::SessionStarted {
            timestamp: SystemTime::now(),
        });
        info!("Stereo session started");
        Ok(())
    }

    /// Release everything the session holds. Each teardown step is attempted
    /// even when an earlier one fails; the failures are reported together.
    pub fn stop(&self) -> Result<()> {
        info!("Stopping stereo session");
        let mut failures = Vec::new();

        self.set_component_state(CAMERA, ComponentState::Stopping);
        match self.camera.stop() {
            Ok(()) => self.set_component_state(CAMERA, ComponentState::Stopped),
            Err(e) => {
                error!("Error stopping camera: {}", e);
                self.set_component_state(CAMERA, ComponentState::Failed);
                failures.push(format!("{}: {}", CAMERA, e));
            }
        }

        self.set_component_state(ANALYSIS, ComponentState::Stopping);
        self.analysis.stop();
        self.set_component_state(ANALYSIS, ComponentState::Stopped);

        self.set_component_state(ORIENTATION, ComponentState::Stopping);
        match self.orientation.stop() {
            Ok(()) => self.set_component_state(ORIENTATION, ComponentState::Stopped),
            Err(e) => {
                error!("Error stopping orientation: {}", e);
                self.set_component_state(ORIENTATION, ComponentState::Failed);
                failures.push(format!("{}: {}", ORIENTATION, e));
            }
        }

        self.event_bus.publish(StereocamEvent::SessionStopped {
            timestamp: SystemTime::now(),
        });

        if failures.is_empty() {
            info!("Stereo session stopped");
            Ok(())
        } else {
            Err(StereocamError::component(
                "session".to_string(),
                failures.join("; "),
            ))
        }
    }
}
