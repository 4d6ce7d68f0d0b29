use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Device rotation angles in degrees, each absent until the sensor reports it
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OrientationSample {
    /// Rotation around Z, in [0, 360)
    pub alpha: Option<f64>,
    /// Rotation around X, in [-180, 180)
    pub beta: Option<f64>,
    /// Rotation around Y, in [-90, 90)
    pub gamma: Option<f64>,
}

impl OrientationSample {
    /// Build a sample from raw sensor readings, wrapping each angle into its range.
    /// Non-finite readings are treated as absent.
    pub fn from_raw(alpha: Option<f64>, beta: Option<f64>, gamma: Option<f64>) -> Self {
        Self {
            alpha: alpha.filter(|a| a.is_finite()).map(|a| a.rem_euclid(360.0)),
            beta: beta
                .filter(|b| b.is_finite())
                .map(|b| wrap_symmetric(b, 180.0)),
            gamma: gamma
                .filter(|g| g.is_finite())
                .map(|g| wrap_symmetric(g, 90.0)),
        }
    }
}

/// Wrap into [-half, half)
fn wrap_symmetric(value: f64, half: f64) -> f64 {
    (value + half).rem_euclid(2.0 * half) - half
}

/// Orientation permission lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PermissionState {
    #[default]
    Unrequested,
    Granted,
    Denied,
}

/// Write handle given to an orientation source on subscribe.
/// Each reading replaces the previous sample wholesale.
#[derive(Debug, Clone, Default)]
pub struct OrientationSink {
    latest: Arc<RwLock<Option<OrientationSample>>>,
}

impl OrientationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a raw sensor reading
    pub fn record(&self, alpha: Option<f64>, beta: Option<f64>, gamma: Option<f64>) {
        *self.latest.write() = Some(OrientationSample::from_raw(alpha, beta, gamma));
    }

    pub fn latest(&self) -> Option<OrientationSample> {
        *self.latest.read()
    }

    pub fn clear(&self) {
        *self.latest.write() = None;
    }
}
