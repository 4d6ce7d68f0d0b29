//! Per-viewer session tying camera, orientation, zoom and analysis together.

mod core;
mod lifecycle;
mod state;
mod types;


pub use self::core::VrSession;
pub use types::{ComponentState, SessionComponents};
