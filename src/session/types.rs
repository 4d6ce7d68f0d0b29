use crate::analysis::AnalysisClient;
use crate::camera::CameraProvider;
use crate::orientation::OrientationSource;
use std::sync::Arc;

/// Component lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    /// Started but without its device: denied, missing or unsupported
    Unavailable,
    Stopping,
    Failed,
}

/// Platform collaborators a session is built from
#[derive(Clone)]
pub struct SessionComponents {
    pub camera: Arc<dyn CameraProvider>,
    pub orientation: Arc<dyn OrientationSource>,
    pub analysis: Arc<dyn AnalysisClient>,
}
