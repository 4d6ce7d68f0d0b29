pub mod analysis;
pub mod camera;
pub mod config;
pub mod error;
pub mod events;
pub mod frame;
pub mod orientation;
pub mod session;
pub mod transform;
pub mod zoom;

#[cfg(feature = "relay")]
pub mod relay;

pub use analysis::{
    AnalysisClient, AnalysisLoop, AnalysisSnapshot, AnalysisStatus, AnalysisTask,
    MockAnalysisClient, RelayClient,
};
pub use camera::{
    CameraProvider, CameraRequest, CameraSource, CameraStream, FrameSurface, SyntheticCamera,
    VideoTrack, ZoomRange,
};
pub use config::StereocamConfig;
pub use error::{Result, StereocamError};
pub use events::{EventBus, StereocamEvent};
pub use frame::{FrameData, FrameFormat, Rotation, StillImage};
pub use orientation::{
    MockOrientationSource, OrientationSample, OrientationSampler, OrientationSource,
    PermissionState,
};
pub use session::{ComponentState, SessionComponents, VrSession};
pub use transform::{Eye, EyeTransform, StereoTransform, TransformReconciler};
pub use zoom::{ZoomController, ZoomMode, ZoomState};

#[cfg(feature = "relay")]
pub use relay::{local_base_url, GroqChatClient, RelayServer, RelayServerBuilder, VisionModel};
