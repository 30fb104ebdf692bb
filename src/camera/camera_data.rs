//! Camera data structures - Pure DOP
//!
//! NO METHODS. Just data.
//! All transformations happen in camera_operations.rs

use crate::constants::{
    DEFAULT_CAMERA_PITCH, DEFAULT_CAMERA_POSITION, DEFAULT_CAMERA_YAW, DEFAULT_FAR_PLANE,
    DEFAULT_FOV_DEGREES, DEFAULT_MOVE_SPEED, DEFAULT_NEAR_PLANE,
};
use cgmath::{Matrix4, Point3, SquareMatrix};
use serde::{Deserialize, Serialize};

/// Free-fly camera state
///
/// Position is in level units with z up. Orientation is kept in f64 and
/// only narrowed to f32 when the view matrix is built, so long sessions do
/// not accumulate rounding drift.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraData {
    pub position: Point3<f64>,

    /// Rotation about the world z axis (radians)
    pub yaw: f64,

    /// Rotation about the camera x axis (radians). Not clamped.
    pub pitch: f64,

    /// Set by move_forward, cleared by stop_move
    pub moving_forward: bool,

    /// Units per reference tick
    pub move_speed: f64,
}

/// Cached projection, rebuilt only when the viewport size changes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionData {
    /// Size the matrix was built for; `None` until the first frame
    pub last_size: Option<(u32, u32)>,
    pub matrix: Matrix4<f32>,
    pub fov_degrees: f32,
    pub near_plane: f32,
    pub far_plane: f32,
}

/// Camera configuration for initialization
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: [f64; 3],
    pub yaw: f64,
    pub pitch: f64,
    pub move_speed: f64,
    pub fov_degrees: f32,
    pub near_plane: f32,
    pub far_plane: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: DEFAULT_CAMERA_POSITION,
            yaw: DEFAULT_CAMERA_YAW,
            pitch: DEFAULT_CAMERA_PITCH,
            move_speed: DEFAULT_MOVE_SPEED,
            fov_degrees: DEFAULT_FOV_DEGREES,
            near_plane: DEFAULT_NEAR_PLANE,
            far_plane: DEFAULT_FAR_PLANE,
        }
    }
}

impl Default for CameraData {
    fn default() -> Self {
        let [x, y, z] = DEFAULT_CAMERA_POSITION;
        Self {
            position: Point3::new(x, y, z),
            yaw: DEFAULT_CAMERA_YAW,
            pitch: DEFAULT_CAMERA_PITCH,
            moving_forward: false,
            move_speed: DEFAULT_MOVE_SPEED,
        }
    }
}

impl Default for ProjectionData {
    fn default() -> Self {
        Self {
            last_size: None,
            matrix: Matrix4::identity(),
            fov_degrees: DEFAULT_FOV_DEGREES,
            near_plane: DEFAULT_NEAR_PLANE,
            far_plane: DEFAULT_FAR_PLANE,
        }
    }
}
