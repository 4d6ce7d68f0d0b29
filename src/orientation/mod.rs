mod mock;
mod sampler;
mod types;

pub use mock::MockOrientationSource;
pub use sampler::{OrientationSampler, OrientationSource};
pub use types::{OrientationSample, OrientationSink, PermissionState};
