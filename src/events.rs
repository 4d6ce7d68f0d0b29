use crate::zoom::ZoomMode;
use crate::orientation::PermissionState;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events emitted by a VR session and its components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StereocamEvent {
    /// A capture-analyze cycle was dispatched
    AnalysisStarted { task_id: String, timestamp: SystemTime },
    /// A cycle produced a scene description
    AnalysisCompleted {
        task_id: String,
        result: String,
        timestamp: SystemTime,
    },
    /// A cycle failed; the previous description stays current
    AnalysisFailed {
        task_id: String,
        error: String,
        timestamp: SystemTime,
    },
    /// The zoom strategy switched between hardware and software
    ZoomModeChanged { mode: ZoomMode },
    /// Orientation permission state changed
    OrientationPermissionChanged { state: PermissionState },
    /// Camera stream acquired or released
    CameraStatusChanged {
        connected: bool,
        timestamp: SystemTime,
    },
    SessionStarted { timestamp: SystemTime },
    SessionStopped { timestamp: SystemTime },
    /// A system error occurred in a component
    SystemError { component: String, error: String },
}

impl StereocamEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            StereocamEvent::AnalysisStarted { task_id, .. } => {
                format!("Analysis {} started", task_id)
            }
            StereocamEvent::AnalysisCompleted { task_id, result, .. } => {
                format!("Analysis {} completed ({} chars)", task_id, result.len())
            }
            StereocamEvent::AnalysisFailed { task_id, error, .. } => {
                format!("Analysis {} failed: {}", task_id, error)
            }
            StereocamEvent::ZoomModeChanged { mode } => format!("Zoom mode: {:?}", mode),
            StereocamEvent::OrientationPermissionChanged { state } => {
                format!("Orientation permission: {:?}", state)
            }
            StereocamEvent::CameraStatusChanged { connected, .. } => format!(
                "Camera {}",
                if *connected { "connected" } else { "disconnected" }
            ),
            StereocamEvent::SessionStarted { .. } => "VR session started".to_string(),
            StereocamEvent::SessionStopped { .. } => "VR session stopped".to_string(),
            StereocamEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            StereocamEvent::AnalysisStarted { .. } => "analysis_started",
            StereocamEvent::AnalysisCompleted { .. } => "analysis_completed",
            StereocamEvent::AnalysisFailed { .. } => "analysis_failed",
            StereocamEvent::ZoomModeChanged { .. } => "zoom_mode_changed",
            StereocamEvent::OrientationPermissionChanged { .. } => {
                "orientation_permission_changed"
            }
            StereocamEvent::CameraStatusChanged { .. } => "camera_status_changed",
            StereocamEvent::SessionStarted { .. } => "session_started",
            StereocamEvent::SessionStopped { .. } => "session_stopped",
            StereocamEvent::SystemError { .. } => "system_error",
        }
    }
}

/// Broadcast event bus shared by the session components
pub struct EventBus {
    sender: broadcast::Sender<StereocamEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<StereocamEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers, returning how many received it.
    /// Having no subscribers is not an error.
    pub fn publish(&self, event: StereocamEvent) -> usize {
        match &event {
            StereocamEvent::AnalysisFailed { task_id, error, .. } => {
                warn!("Analysis {} failed: {}", task_id, error);
            }
            StereocamEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            StereocamEvent::CameraStatusChanged { connected, .. } => {
                if *connected {
                    info!("Camera connected");
                } else {
                    info!("Camera released");
                }
            }
            _ => debug!("Event: {}", event.description()),
        }

        self.sender.send(event).unwrap_or(0)
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        let delivered = bus.publish(StereocamEvent::SessionStarted {
            timestamp: SystemTime::now(),
        });
        assert_eq!(delivered, 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "session_started");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(
            bus.publish(StereocamEvent::SystemError {
                component: "test".to_string(),
                error: "nobody listening".to_string(),
            }),
            0
        );
    }

    #[test]
    fn test_event_descriptions() {
        let event = StereocamEvent::AnalysisFailed {
            task_id: "t1".to_string(),
            error: "timeout".to_string(),
            timestamp: SystemTime::now(),
        };
        assert_eq!(event.description(), "Analysis t1 failed: timeout");
        assert_eq!(event.event_type(), "analysis_failed");
    }
}
