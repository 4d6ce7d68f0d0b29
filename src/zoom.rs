//! Zoom strategy selection.
//!
//! A slider value in `[0.5, 3.0]` is either remapped onto the camera's
//! hardware zoom range or applied as a software scale. Exactly one of the two
//! is in effect at any time.

use crate::camera::{VideoTrack, ZoomRange};
use crate::events::{EventBus, StereocamEvent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const SLIDER_MIN: f64 = 0.5;
pub const SLIDER_MAX: f64 = 3.0;

/// Which zoom path is currently applied
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ZoomMode {
    /// Camera zoomed in hardware; the rendered surface is not scaled
    Hardware { level: f64 },
    /// Rendered surface scaled in software
    Software { scale: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZoomState {
    /// Slider value in [0.5, 3.0]
    pub requested_level: f64,
    pub native_supported: bool,
    pub native_range: Option<ZoomRange>,
    pub mode: ZoomMode,
}

impl ZoomState {
    /// Scale factor for the eye surfaces; pinned to 1 under hardware zoom
    pub fn software_scale(&self) -> f64 {
        match self.mode {
            ZoomMode::Hardware { .. } => 1.0,
            ZoomMode::Software { scale } => scale,
        }
    }
}

impl Default for ZoomState {
    fn default() -> Self {
        Self {
            requested_level: 1.0,
            native_supported: false,
            native_range: None,
            mode: ZoomMode::Software { scale: 1.0 },
        }
    }
}

/// Map a slider value onto a hardware zoom range
pub fn hardware_target(value: f64, range: &ZoomRange) -> f64 {
    let t = (value - SLIDER_MIN) / (SLIDER_MAX - SLIDER_MIN);
    range.min + t * (range.max - range.min)
}

/// Chooses between hardware and software zoom on each slider change
pub struct ZoomController {
    state: Mutex<ZoomState>,
    sequence: AtomicU64,
    event_bus: Arc<EventBus>,
}

impl ZoomController {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            state: Mutex::new(ZoomState::default()),
            sequence: AtomicU64::new(0),
            event_bus,
        }
    }

    pub fn state(&self) -> ZoomState {
        self.state.lock().clone()
    }

    /// Record the capability of a newly acquired track. A hardware zoom
    /// committed on a previous track does not carry over, so the requested
    /// level is re-applied to the new one.
    pub async fn sync_capability(&self, track: Option<Arc<dyn VideoTrack>>) -> ZoomMode {
        let range = track.as_ref().and_then(|t| t.zoom_capability());
        let (mode, level) = {
            let mut state = self.state.lock();
            state.native_range = range;
            state.native_supported = range.is_some();
            (state.mode, state.requested_level)
        };

        match mode {
            ZoomMode::Hardware { .. } => {
                debug!("Re-applying zoom {:.2} to the new camera track", level);
                self.set_level(level, track).await
            }
            software => software,
        }
    }

    /// Apply a slider value. Hardware zoom is attempted when the track reports a
    /// range; any failure falls back to software scale silently. When calls
    /// overlap, only the most recent call's outcome is committed.
    pub async fn set_level(&self, value: f64, track: Option<Arc<dyn VideoTrack>>) -> ZoomMode {
        if !value.is_finite() {
            warn!("Ignoring non-finite zoom value");
            return self.state.lock().mode;
        }
        let level = value.clamp(SLIDER_MIN, SLIDER_MAX);
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;

        let range = track.as_ref().and_then(|t| t.zoom_capability());
        {
            let mut state = self.state.lock();
            state.requested_level = level;
            state.native_range = range;
            state.native_supported = range.is_some();
        }

        let (track, range) = match (track, range) {
            (Some(track), Some(range)) => (track, range),
            _ => {
                debug!("No native zoom; using software scale {:.2}", level);
                return self.commit(seq, ZoomMode::Software { scale: level });
            }
        };

        let target = hardware_target(level, &range);
        debug!(
            "Requesting hardware zoom {:.3} for slider {:.2} on {}",
            target,
            level,
            track.label()
        );

        let mode = match track.apply_zoom(target).await {
            Ok(()) => ZoomMode::Hardware { level: target },
            Err(e) => {
                warn!("Failed to adjust camera zoom, using digital zoom: {}", e);
                ZoomMode::Software { scale: level }
            }
        };

        self.commit(seq, mode)
    }

    fn commit(&self, seq: u64, mode: ZoomMode) -> ZoomMode {
        let mut state = self.state.lock();
        if self.sequence.load(Ordering::SeqCst) != seq {
            debug!("Discarding stale zoom outcome {:?} (request {})", mode, seq);
            return state.mode;
        }

        let previous = state.mode;
        state.mode = mode;
        drop(state);

        if std::mem::discriminant(&previous) != std::mem::discriminant(&mode) {
            info!("Zoom mode changed: {:?}", mode);
            self.event_bus.publish(StereocamEvent::ZoomModeChanged { mode });
        }
        mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraProvider, CameraRequest, SyntheticCamera, SyntheticTrack};
    use crate::config::Facing;
    use std::time::Duration;

    async fn open_track(camera: &SyntheticCamera) -> (Arc<dyn VideoTrack>, Arc<SyntheticTrack>) {
        let request = CameraRequest {
            device_index: 0,
            facing: Facing::Environment,
            ideal_resolution: (8, 8),
            fps: 30,
        };
        let stream = camera.open(&request).await.unwrap();
        let track = stream.video_tracks().into_iter().next().unwrap();
        (track, camera.last_track().unwrap())
    }

    fn controller() -> ZoomController {
        ZoomController::new(Arc::new(EventBus::new(16)))
    }

    #[test]
    fn test_hardware_target_mapping() {
        let range = ZoomRange {
            min: 1.0,
            max: 6.0,
            step: 0.1,
        };
        assert_eq!(hardware_target(0.5, &range), 1.0);
        assert_eq!(hardware_target(3.0, &range), 6.0);
        assert!((hardware_target(1.75, &range) - 3.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_hardware_zoom_pins_software_scale() {
        let camera = SyntheticCamera::builder().zoom(1.0, 8.0, 0.1).build();
        let (track, synthetic) = open_track(&camera).await;
        let zoom = controller();

        for v in [0.5, 1.0, 1.7, 2.2, 3.0] {
            let mode = zoom.set_level(v, Some(Arc::clone(&track))).await;
            let expected = 1.0 + ((v - 0.5) / 2.5) * (8.0 - 1.0);
            match mode {
                ZoomMode::Hardware { level } => assert!((level - expected).abs() < 1e-9),
                other => panic!("expected hardware zoom, got {:?}", other),
            }
            assert_eq!(zoom.state().software_scale(), 1.0);
            let applied = synthetic.applied_zoom();
            assert!((applied.last().unwrap() - expected).abs() < 1e-9);
        }
    }

    #[tokio::test]
    async fn test_no_capability_uses_software_scale() {
        let camera = SyntheticCamera::builder().build();
        let (track, synthetic) = open_track(&camera).await;
        let zoom = controller();

        for v in [0.5, 1.3, 2.0, 3.0] {
            let mode = zoom.set_level(v, Some(Arc::clone(&track))).await;
            assert_eq!(mode, ZoomMode::Software { scale: v });
            assert_eq!(zoom.state().software_scale(), v);
        }
        assert!(synthetic.applied_zoom().is_empty());
        assert!(!zoom.state().native_supported);

        assert_eq!(zoom.set_level(2.5, None).await, ZoomMode::Software { scale: 2.5 });
    }

    #[tokio::test]
    async fn test_rejected_hardware_zoom_falls_back() {
        let camera = SyntheticCamera::builder().zoom(1.0, 4.0, 0.5).build();
        let (track, synthetic) = open_track(&camera).await;
        let zoom = controller();

        zoom.set_level(2.0, Some(Arc::clone(&track))).await;
        assert_eq!(zoom.state().software_scale(), 1.0);

        synthetic.set_reject_zoom(true);
        let mode = zoom.set_level(2.4, Some(Arc::clone(&track))).await;
        assert_eq!(mode, ZoomMode::Software { scale: 2.4 });
        assert_eq!(zoom.state().software_scale(), 2.4);
        assert!(zoom.state().native_supported);
    }

    #[tokio::test]
    async fn test_slider_value_is_clamped() {
        let zoom = controller();
        assert_eq!(zoom.set_level(7.0, None).await, ZoomMode::Software { scale: 3.0 });
        assert_eq!(zoom.set_level(0.1, None).await, ZoomMode::Software { scale: 0.5 });
        assert_eq!(zoom.state().requested_level, 0.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_hardware_outcome_is_discarded() {
        let camera = SyntheticCamera::builder().zoom(1.0, 4.0, 0.5).build();
        let (track, synthetic) = open_track(&camera).await;
        let zoom = Arc::new(controller());

        // first request answers slowly and succeeds, second fails fast
        synthetic.push_zoom_delay(Duration::from_millis(500));
        let slow = {
            let zoom = Arc::clone(&zoom);
            let track = Arc::clone(&track);
            tokio::spawn(async move { zoom.set_level(1.5, Some(track)).await })
        };
        tokio::task::yield_now().await;

        synthetic.set_reject_zoom(true);
        let latest = zoom.set_level(2.5, Some(Arc::clone(&track))).await;
        assert_eq!(latest, ZoomMode::Software { scale: 2.5 });

        slow.await.unwrap();
        assert_eq!(zoom.state().mode, ZoomMode::Software { scale: 2.5 });
        assert_eq!(zoom.state().requested_level, 2.5);
    }

    #[tokio::test]
    async fn test_sync_capability() {
        let camera = SyntheticCamera::builder().zoom(1.0, 2.0, 0.1).build();
        let (track, synthetic) = open_track(&camera).await;
        let zoom = controller();

        let mode = zoom.sync_capability(Some(Arc::clone(&track))).await;
        assert_eq!(mode, ZoomMode::Software { scale: 1.0 });
        assert!(zoom.state().native_supported);
        // software mode is not pushed to a freshly synced track
        assert!(synthetic.applied_zoom().is_empty());

        zoom.sync_capability(None).await;
        assert!(!zoom.state().native_supported);
    }

    #[tokio::test]
    async fn test_hardware_zoom_reapplied_to_new_track() {
        let camera = SyntheticCamera::builder().zoom(1.0, 6.0, 0.1).build();
        let (first, _) = open_track(&camera).await;
        let zoom = controller();

        zoom.set_level(3.0, Some(first)).await;
        assert_eq!(zoom.state().mode, ZoomMode::Hardware { level: 6.0 });

        let (second, synthetic) = open_track(&camera).await;
        let mode = zoom.sync_capability(Some(second)).await;
        assert_eq!(mode, ZoomMode::Hardware { level: 6.0 });
        assert_eq!(synthetic.applied_zoom(), vec![6.0]);
    }

    #[tokio::test]
    async fn test_hardware_zoom_falls_back_when_track_lost() {
        let camera = SyntheticCamera::builder().zoom(1.0, 6.0, 0.1).build();
        let (track, _) = open_track(&camera).await;
        let zoom = controller();

        zoom.set_level(2.5, Some(track)).await;
        assert_eq!(zoom.state().software_scale(), 1.0);

        let mode = zoom.sync_capability(None).await;
        assert_eq!(mode, ZoomMode::Software { scale: 2.5 });
        assert_eq!(zoom.state().software_scale(), 2.5);
    }
}
