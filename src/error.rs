use thiserror::Error;

#[derive(Error, Debug)]
pub enum StereocamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Orientation error: {0}")]
    Orientation(#[from] OrientationError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl StereocamError {
    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Camera acquisition and control failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("no camera device found")]
    NotFound,

    #[error("{details}")]
    Device { details: String },

    #[error("zoom constraint rejected: {details}")]
    ZoomRejected { details: String },

    #[error("camera stream is not active")]
    NotActive,
}

impl CameraError {
    /// Message shown to the viewer when camera acquisition fails
    pub fn user_message(&self) -> String {
        match self {
            CameraError::PermissionDenied => {
                "Camera access denied. Please grant permission.".to_string()
            }
            CameraError::NotFound => "No camera found on this device.".to_string(),
            other => format!("Camera error: {}", other),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrientationError {
    #[error("device orientation is not supported")]
    Unsupported,

    #[error("orientation permission request failed: {details}")]
    RequestFailed { details: String },

    #[error("failed to unsubscribe orientation listener: {details}")]
    Unsubscribe { details: String },
}

/// Failures of a single capture-analyze cycle
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("no video frame available for capture")]
    NoFrame,

    #[error("capture surface unavailable: {details}")]
    SurfaceUnavailable { details: String },

    #[error("failed to encode still image: {details}")]
    Encoding { details: String },

    #[error("analysis request failed: {details}")]
    Request { details: String },

    #[error("analysis endpoint returned {status}: {message}")]
    Endpoint { status: u16, message: String },

    #[error("analysis loop was stopped")]
    Cancelled,

    #[error("no analysis prompt configured")]
    NoPrompt,

    #[error("invalid analysis interval: {seconds} seconds")]
    InvalidInterval { seconds: f64 },
}

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Failed to bind relay server to {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Relay server failed: {details}")]
    StartupFailed { details: String },

    #[error("Upstream model call failed: {details}")]
    Upstream { details: String },

    #[error("Missing upstream API key in environment variable {variable}")]
    MissingApiKey { variable: String },
}

pub type Result<T> = std::result::Result<T, StereocamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_user_messages() {
        assert_eq!(
            CameraError::PermissionDenied.user_message(),
            "Camera access denied. Please grant permission."
        );
        assert_eq!(
            CameraError::NotFound.user_message(),
            "No camera found on this device."
        );
        assert_eq!(
            CameraError::Device {
                details: "busy".to_string()
            }
            .user_message(),
            "Camera error: busy"
        );
    }

    #[test]
    fn test_error_conversion() {
        let err: StereocamError = AnalysisError::NoFrame.into();
        assert!(matches!(err, StereocamError::Analysis(AnalysisError::NoFrame)));
        assert_eq!(
            err.to_string(),
            "Analysis error: no video frame available for capture"
        );
    }
}
