//! Per-eye view transform.
//!
//! Manual rotation, device tilt and software zoom are folded into one
//! transform chain applied to both eye surfaces. The chain order is fixed:
//! `rotate` (about Z), then `rotateY`, then `rotateX`, then `scale`.
//! 3-D rotations do not commute, so reordering changes the rendered result.

use crate::config::ViewConfig;
use crate::frame::Rotation;
use crate::orientation::OrientationSample;
use crate::zoom::ZoomState;
use glam::{DMat4, DVec3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Divisor mapping full device tilt (±90°) to a ±9° visual parallax
pub const DEFAULT_TILT_DAMPING: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Eye {
    Left,
    Right,
}

/// One step of the transform chain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TransformOp {
    /// In-plane rotation, degrees
    Rotate(f64),
    RotateY(f64),
    RotateX(f64),
    Scale(f64),
    /// Horizontal mirror
    ScaleX(f64),
}

impl TransformOp {
    pub fn matrix(&self) -> DMat4 {
        match *self {
            TransformOp::Rotate(deg) => DMat4::from_rotation_z(deg.to_radians()),
            TransformOp::RotateY(deg) => DMat4::from_rotation_y(deg.to_radians()),
            TransformOp::RotateX(deg) => DMat4::from_rotation_x(deg.to_radians()),
            TransformOp::Scale(s) => DMat4::from_scale(DVec3::new(s, s, 1.0)),
            TransformOp::ScaleX(s) => DMat4::from_scale(DVec3::new(s, 1.0, 1.0)),
        }
    }
}

impl fmt::Display for TransformOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformOp::Rotate(deg) => write!(f, "rotate({}deg)", deg),
            TransformOp::RotateY(deg) => write!(f, "rotateY({}deg)", deg),
            TransformOp::RotateX(deg) => write!(f, "rotateX({}deg)", deg),
            TransformOp::Scale(s) => write!(f, "scale({})", s),
            TransformOp::ScaleX(s) => write!(f, "scaleX({})", s),
        }
    }
}

/// Transform for a single eye surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeTransform {
    pub rotation_deg: f64,
    pub rotate_y_deg: f64,
    pub rotate_x_deg: f64,
    pub scale: f64,
    pub mirrored: bool,
}

impl EyeTransform {
    pub fn identity() -> Self {
        Self {
            rotation_deg: 0.0,
            rotate_y_deg: 0.0,
            rotate_x_deg: 0.0,
            scale: 1.0,
            mirrored: false,
        }
    }

    /// The chain in application order
    pub fn operations(&self) -> Vec<TransformOp> {
        let mut ops = vec![
            TransformOp::Rotate(self.rotation_deg),
            TransformOp::RotateY(self.rotate_y_deg),
            TransformOp::RotateX(self.rotate_x_deg),
            TransformOp::Scale(self.scale),
        ];
        if self.mirrored {
            ops.push(TransformOp::ScaleX(-1.0));
        }
        ops
    }

    /// CSS `transform` value
    pub fn to_css(&self) -> String {
        self.operations()
            .iter()
            .map(|op| op.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Composed matrix, chain applied left to right as in CSS
    pub fn matrix(&self) -> DMat4 {
        self.operations()
            .iter()
            .fold(DMat4::IDENTITY, |acc, op| acc * op.matrix())
    }

    fn mirrored(mut self) -> Self {
        self.mirrored = true;
        self
    }
}

impl Default for EyeTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Transforms for both eye surfaces
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StereoTransform {
    pub left: EyeTransform,
    pub right: EyeTransform,
}

impl StereoTransform {
    pub fn for_eye(&self, eye: Eye) -> &EyeTransform {
        match eye {
            Eye::Left => &self.left,
            Eye::Right => &self.right,
        }
    }
}

/// Folds rotation, tilt and zoom into eye transforms
#[derive(Debug, Clone)]
pub struct TransformReconciler {
    tilt_damping: f64,
    mirror_right_eye: bool,
}

impl TransformReconciler {
    pub fn new(config: &ViewConfig) -> Self {
        Self {
            tilt_damping: config.orientation_damping,
            mirror_right_eye: config.mirror_right_eye,
        }
    }

    /// Transform for one surface. `orientation` must already be `None` when
    /// permission was not granted; absent angles contribute no tilt.
    pub fn eye_transform(
        &self,
        rotation: Rotation,
        orientation: Option<&OrientationSample>,
        zoom: &ZoomState,
    ) -> EyeTransform {
        let (rotate_y_deg, rotate_x_deg) = match orientation {
            Some(sample) => (
                sample.gamma.unwrap_or(0.0) / self.tilt_damping,
                sample.beta.unwrap_or(0.0) / self.tilt_damping,
            ),
            None => (0.0, 0.0),
        };

        EyeTransform {
            rotation_deg: f64::from(rotation.degrees()),
            rotate_y_deg,
            rotate_x_deg,
            scale: zoom.software_scale(),
            mirrored: false,
        }
    }

    pub fn reconcile(
        &self,
        rotation: Rotation,
        orientation: Option<&OrientationSample>,
        zoom: &ZoomState,
    ) -> StereoTransform {
        let left = self.eye_transform(rotation, orientation, zoom);
        let right = if self.mirror_right_eye {
            left.mirrored()
        } else {
            left
        };
        StereoTransform { left, right }
    }
}

impl Default for TransformReconciler {
    fn default() -> Self {
        Self {
            tilt_damping: DEFAULT_TILT_DAMPING,
            mirror_right_eye: false,
        }
    }
}
