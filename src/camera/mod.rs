mod interface;
mod source;
mod synthetic;

pub use interface::{
    CameraProvider, CameraRequest, CameraStream, FrameSurface, VideoTrack, ZoomRange,
};
pub use source::CameraSource;
pub use synthetic::{SyntheticCamera, SyntheticCameraBuilder, SyntheticTrack};
