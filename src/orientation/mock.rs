use super::sampler::OrientationSource;
use super::types::OrientationSink;
use crate::error::OrientationError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Mock orientation sensor for running without device hardware
pub struct MockOrientationSource {
    supported: bool,
    gated: bool,
    grant: bool,
    sink: Mutex<Option<OrientationSink>>,
    fail_request: AtomicBool,
    fail_unsubscribe: AtomicBool,
}

impl MockOrientationSource {
    fn with(supported: bool, gated: bool, grant: bool) -> Self {
        Self {
            supported,
            gated,
            grant,
            sink: Mutex::new(None),
            fail_request: AtomicBool::new(false),
            fail_unsubscribe: AtomicBool::new(false),
        }
    }

    /// Sensor that delivers events without a permission prompt
    pub fn ungated() -> Self {
        Self::with(true, false, true)
    }

    /// Sensor behind a permission prompt that answers `grant`
    pub fn gated(grant: bool) -> Self {
        Self::with(true, true, grant)
    }

    /// Platform with no orientation sensor
    pub fn unsupported() -> Self {
        Self::with(false, false, false)
    }

    /// Make the permission prompt itself error out
    pub fn set_fail_request(&self, fail: bool) {
        self.fail_request.store(fail, Ordering::Relaxed);
    }

    /// Make unsubscribing report an error. The listener is still detached.
    pub fn set_fail_unsubscribe(&self, fail: bool) {
        self.fail_unsubscribe.store(fail, Ordering::Relaxed);
    }

    /// Deliver a reading if someone is subscribed
    pub fn emit(&self, alpha: Option<f64>, beta: Option<f64>, gamma: Option<f64>) {
        if let Some(sink) = self.sink.lock().as_ref() {
            debug!("Mock orientation event: {:?} {:?} {:?}", alpha, beta, gamma);
            sink.record(alpha, beta, gamma);
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.sink.lock().is_some()
    }
}

#[async_trait]
impl OrientationSource for MockOrientationSource {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn requires_permission(&self) -> bool {
        self.gated
    }

    async fn request_permission(&self) -> Result<bool, OrientationError> {
        if !self.supported {
            return Err(OrientationError::Unsupported);
        }
        if self.fail_request.load(Ordering::Relaxed) {
            return Err(OrientationError::RequestFailed {
                details: "permission prompt dismissed".to_string(),
            });
        }
        Ok(self.grant)
    }

    fn subscribe(&self, sink: OrientationSink) -> Result<(), OrientationError> {
        if !self.supported {
            return Err(OrientationError::Unsupported);
        }
        *self.sink.lock() = Some(sink);
        Ok(())
    }

    fn unsubscribe(&self) -> Result<(), OrientationError> {
        self.sink.lock().take();
        if self.fail_unsubscribe.load(Ordering::Relaxed) {
            return Err(OrientationError::Unsubscribe {
                details: "listener already detached".to_string(),
            });
        }
        Ok(())
    }
}
