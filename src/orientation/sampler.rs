use super::types::{OrientationSample, OrientationSink, PermissionState};
use crate::error::OrientationError;
use crate::events::{EventBus, StereocamEvent};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Platform orientation sensor
#[async_trait]
pub trait OrientationSource: Send + Sync {
    /// Whether the platform has an orientation sensor at all
    fn is_supported(&self) -> bool;

    /// Whether events are gated behind an explicit, user-initiated request
    fn requires_permission(&self) -> bool;

    /// Ask the platform for access. Must be driven by a user action on gated platforms.
    async fn request_permission(&self) -> Result<bool, OrientationError>;

    /// Start delivering readings into `sink`
    fn subscribe(&self, sink: OrientationSink) -> Result<(), OrientationError>;

    /// Stop delivering readings
    fn unsubscribe(&self) -> Result<(), OrientationError>;
}

/// Tracks the latest orientation sample and the permission lifecycle
pub struct OrientationSampler {
    source: Arc<dyn OrientationSource>,
    sink: OrientationSink,
    permission: Mutex<PermissionState>,
    subscribed: Mutex<bool>,
    event_bus: Arc<EventBus>,
}

impl OrientationSampler {
    pub fn new(source: Arc<dyn OrientationSource>, event_bus: Arc<EventBus>) -> Self {
        Self {
            source,
            sink: OrientationSink::new(),
            permission: Mutex::new(PermissionState::Unrequested),
            subscribed: Mutex::new(false),
            event_bus,
        }
    }

    /// Attempt ungated subscription. Gated platforms stay `Unrequested`
    /// until [`request_access`](Self::request_access) is called.
    pub fn start(&self) -> Result<(), OrientationError> {
        if !self.source.is_supported() {
            info!("Device orientation not supported; tilt disabled");
            return Err(OrientationError::Unsupported);
        }

        if self.source.requires_permission() {
            debug!("Orientation events are gated; waiting for an explicit request");
            return Ok(());
        }

        self.set_permission(PermissionState::Granted);
        self.ensure_subscribed()
    }

    /// Explicit permission request for gated platforms, callable from a user action.
    /// Returns whether access is granted.
    pub async fn request_access(&self) -> bool {
        if !self.source.is_supported() {
            return false;
        }

        if !self.source.requires_permission() {
            self.set_permission(PermissionState::Granted);
            return self.ensure_subscribed().is_ok();
        }

        match self.source.request_permission().await {
            Ok(true) => {
                info!("Orientation permission granted");
                self.set_permission(PermissionState::Granted);
                match self.ensure_subscribed() {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Orientation subscription failed after grant: {}", e);
                        false
                    }
                }
            }
            Ok(false) => {
                info!("Orientation permission denied");
                self.set_permission(PermissionState::Denied);
                false
            }
            Err(e) => {
                warn!("Error requesting device orientation permission: {}", e);
                self.set_permission(PermissionState::Denied);
                false
            }
        }
    }

    /// Latest sample regardless of permission
    pub fn latest(&self) -> Option<OrientationSample> {
        self.sink.latest()
    }

    /// Sample to feed the eye transform: only once permission is granted
    pub fn effective_sample(&self) -> Option<OrientationSample> {
        if self.permission() == PermissionState::Granted {
            self.sink.latest()
        } else {
            None
        }
    }

    pub fn permission(&self) -> PermissionState {
        *self.permission.lock()
    }

    pub fn is_supported(&self) -> bool {
        self.source.is_supported()
    }

    /// Unsubscribe from the sensor and drop the last sample
    pub fn stop(&self) -> Result<(), OrientationError> {
        let mut subscribed = self.subscribed.lock();
        if !*subscribed {
            return Ok(());
        }
        *subscribed = false;
        self.sink.clear();
        self.source.unsubscribe()
    }

    fn ensure_subscribed(&self) -> Result<(), OrientationError> {
        let mut subscribed = self.subscribed.lock();
        if *subscribed {
            return Ok(());
        }
        self.source.subscribe(self.sink.clone())?;
        *subscribed = true;
        debug!("Subscribed to orientation events");
        Ok(())
    }

    fn set_permission(&self, state: PermissionState) {
        let changed = {
            let mut current = self.permission.lock();
            let changed = *current != state;
            *current = state;
            changed
        };
        if changed {
            self.event_bus
                .publish(StereocamEvent::OrientationPermissionChanged { state });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orientation::MockOrientationSource;

    fn sampler_with(source: Arc<MockOrientationSource>) -> OrientationSampler {
        OrientationSampler::new(source, Arc::new(EventBus::new(16)))
    }

    #[test]
    fn test_ungated_platform_subscribes_on_start() {
        let source = Arc::new(MockOrientationSource::ungated());
        let sampler = sampler_with(Arc::clone(&source));

        sampler.start().unwrap();
        assert_eq!(sampler.permission(), PermissionState::Granted);

        source.emit(Some(10.0), Some(-10.0), Some(20.0));
        let sample = sampler.effective_sample().unwrap();
        assert_eq!(sample.gamma, Some(20.0));
    }

    #[tokio::test]
    async fn test_gated_platform_waits_for_request() {
        let source = Arc::new(MockOrientationSource::gated(true));
        let sampler = sampler_with(Arc::clone(&source));

        sampler.start().unwrap();
        assert_eq!(sampler.permission(), PermissionState::Unrequested);
        assert!(!source.is_subscribed());

        source.emit(Some(0.0), Some(5.0), Some(5.0));
        assert!(sampler.effective_sample().is_none());

        assert!(sampler.request_access().await);
        assert_eq!(sampler.permission(), PermissionState::Granted);
        assert!(source.is_subscribed());

        source.emit(Some(0.0), Some(5.0), Some(5.0));
        assert!(sampler.effective_sample().is_some());
    }

    #[tokio::test]
    async fn test_denied_permission() {
        let source = Arc::new(MockOrientationSource::gated(false));
        let sampler = sampler_with(Arc::clone(&source));

        assert!(!sampler.request_access().await);
        assert_eq!(sampler.permission(), PermissionState::Denied);
        assert!(sampler.effective_sample().is_none());
    }

    #[tokio::test]
    async fn test_failed_request_counts_as_denied() {
        let source = Arc::new(MockOrientationSource::gated(true));
        source.set_fail_request(true);
        let sampler = sampler_with(Arc::clone(&source));

        assert!(!sampler.request_access().await);
        assert_eq!(sampler.permission(), PermissionState::Denied);
        assert!(!source.is_subscribed());
    }

    #[test]
    fn test_unsubscribe_failure_still_clears_sample() {
        let source = Arc::new(MockOrientationSource::ungated());
        let sampler = sampler_with(Arc::clone(&source));

        sampler.start().unwrap();
        source.emit(Some(1.0), Some(2.0), Some(3.0));
        source.set_fail_unsubscribe(true);

        assert!(matches!(
            sampler.stop(),
            Err(OrientationError::Unsubscribe { .. })
        ));
        assert!(sampler.latest().is_none());
        assert!(!source.is_subscribed());
    }

    #[test]
    fn test_unsupported_platform() {
        let source = Arc::new(MockOrientationSource::unsupported());
        let sampler = sampler_with(source);

        assert_eq!(sampler.start(), Err(OrientationError::Unsupported));
        assert!(!sampler.is_supported());
        assert!(sampler.effective_sample().is_none());
    }

    #[test]
    fn test_stop_unsubscribes() {
        let source = Arc::new(MockOrientationSource::ungated());
        let sampler = sampler_with(Arc::clone(&source));

        sampler.start().unwrap();
        source.emit(Some(1.0), Some(1.0), Some(1.0));
        sampler.stop().unwrap();

        assert!(!source.is_subscribed());
        assert!(sampler.latest().is_none());
        // second stop is a no-op
        sampler.stop().unwrap();
    }
}
