//! Camera operations - Pure DOP functions
//!
//! All functions are pure: they take data, return new data, no side effects.
//! No methods, no self, just transformations.

use super::camera_data::{CameraConfig, CameraData, ProjectionData};
use cgmath::{Deg, Matrix4, Point3, Rad, Vector3};
use std::f64::consts::FRAC_PI_2;

// ============================================================================
// INITIALIZATION
// ============================================================================

/// Initialize camera from config
pub fn init_camera_from_config(config: &CameraConfig) -> CameraData {
    let [x, y, z] = config.position;
    CameraData {
        position: Point3::new(x, y, z),
        yaw: config.yaw,
        pitch: config.pitch,
        moving_forward: false,
        move_speed: config.move_speed,
    }
}

/// Initialize an empty projection cache from config
pub fn init_projection_from_config(config: &CameraConfig) -> ProjectionData {
    ProjectionData {
        fov_degrees: config.fov_degrees,
        near_plane: config.near_plane,
        far_plane: config.far_plane,
        ..Default::default()
    }
}

// ============================================================================
// VIEW/PROJECTION MATRICES
// ============================================================================

/// Build view matrix from camera data
///
/// Points are first translated by -position, then rotated by -yaw about z,
/// then by -(pitch + pi/2) about x. The extra quarter turn maps the z-up
/// world onto the y-up clip convention.
pub fn build_view_matrix(camera: &CameraData) -> Matrix4<f32> {
    let translation = Matrix4::from_translation(Vector3::new(
        -camera.position.x as f32,
        -camera.position.y as f32,
        -camera.position.z as f32,
    ));
    let yaw = Matrix4::from_angle_z(Rad(-camera.yaw as f32));
    let pitch = Matrix4::from_angle_x(Rad((-camera.pitch - FRAC_PI_2) as f32));

    pitch * yaw * translation
}

/// Build a right-handed perspective matrix for the given viewport size
///
/// Degenerate sizes are treated as one pixel so a minimised window never
/// produces a NaN matrix.
pub fn build_projection_matrix(projection: &ProjectionData, width: u32, height: u32) -> Matrix4<f32> {
    let aspect = width.max(1) as f32 / height.max(1) as f32;
    cgmath::perspective(
        Deg(projection.fov_degrees),
        aspect,
        projection.near_plane,
        projection.far_plane,
    )
}

// ============================================================================
// UPDATES
// ============================================================================

/// Rebuild the projection if the viewport size changed
///
/// Returns the new projection, or `None` when the cached one is still valid.
pub fn update_projection(
    projection: &ProjectionData,
    width: u32,
    height: u32,
) -> Option<ProjectionData> {
    if projection.last_size == Some((width, height)) {
        return None;
    }

    let mut new_projection = *projection;
    new_projection.matrix = build_projection_matrix(projection, width, height);
    new_projection.last_size = Some((width, height));

    log::debug!(
        "[Camera::update_projection] Rebuilt projection for {}x{}",
        width,
        height
    );
    Some(new_projection)
}

// ============================================================================
// MOVEMENT
// ============================================================================

/// Start moving along the view direction
pub fn move_forward(camera: &CameraData) -> CameraData {
    let mut new_camera = *camera;
    new_camera.moving_forward = true;
    new_camera
}

/// Stop moving
pub fn stop_move(camera: &CameraData) -> CameraData {
    let mut new_camera = *camera;
    new_camera.moving_forward = false;
    new_camera
}

/// Rotate camera: horizontal delta turns yaw, vertical delta turns pitch.
/// Angles accumulate without clamping or wrapping.
pub fn rotate(camera: &CameraData, yaw_delta: f64, pitch_delta: f64) -> CameraData {
    let mut new_camera = *camera;
    new_camera.yaw += yaw_delta;
    new_camera.pitch += pitch_delta;
    new_camera
}

/// Advance the camera by `ticks` reference ticks of motion
pub fn integrate_motion(camera: &CameraData, ticks: f64) -> CameraData {
    if !camera.moving_forward {
        return *camera;
    }

    let step = camera.move_speed * ticks;
    let mut new_camera = *camera;
    new_camera.position.x += step * camera.yaw.sin();
    new_camera.position.y += step * camera.yaw.cos();
    new_camera.position.z -= step * (-camera.pitch).sin();
    new_camera
}

// ============================================================================
// DIAGNOSTICS
// ============================================================================

/// Log camera context for debugging
pub fn log_camera_context(camera: &CameraData) {
    log::debug!(
        "[Camera] Position: ({:.1}, {:.1}, {:.1}) | Yaw: {:.3}rad ({:.1}°) | Pitch: {:.3}rad ({:.1}°) | Moving: {}",
        camera.position.x,
        camera.position.y,
        camera.position.z,
        camera.yaw,
        camera.yaw.to_degrees(),
        camera.pitch,
        camera.pitch.to_degrees(),
        camera.moving_forward
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{SquareMatrix, Vector4};

    fn spawn_camera() -> CameraData {
        init_camera_from_config(&CameraConfig::default())
    }

    #[test]
    fn test_spawn_matches_defaults() {
        let camera = spawn_camera();
        assert_eq!(camera.position, Point3::new(504.0, 401.0, 75.0));
        assert_eq!(camera.yaw, 0.0);
        assert_eq!(camera.pitch, std::f64::consts::PI);
        assert!(!camera.moving_forward);
    }

    #[test]
    fn test_one_tick_forward_from_spawn() {
        let camera = move_forward(&spawn_camera());
        let moved = integrate_motion(&camera, 1.0);

        assert!((moved.position.x - 504.0).abs() < 1e-9);
        assert!((moved.position.y - 406.0).abs() < 1e-9);
        // sin(-pi) is not exactly zero in floating point
        assert!((moved.position.z - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_stopped_camera_does_not_move() {
        let camera = stop_move(&move_forward(&spawn_camera()));
        let moved = integrate_motion(&camera, 10.0);
        assert_eq!(moved.position, camera.position);
    }

    #[test]
    fn test_motion_scales_with_ticks() {
        let camera = move_forward(&rotate(&spawn_camera(), std::f64::consts::FRAC_PI_2, 0.0));
        let moved = integrate_motion(&camera, 2.5);
        assert!((moved.position.x - (504.0 + 12.5)).abs() < 1e-9);
        assert!((moved.position.y - 401.0).abs() < 1e-9);
    }

    #[test]
    fn test_rotate_accumulates_unclamped() {
        let mut camera = spawn_camera();
        for _ in 0..10 {
            camera = rotate(&camera, 0.5, 1.0);
        }
        assert!((camera.yaw - 5.0).abs() < 1e-12);
        assert!((camera.pitch - (std::f64::consts::PI + 10.0)).abs() < 1e-12);
    }

    #[test]
    fn test_zero_rotation_view_is_pure_translation() {
        let camera = CameraData {
            position: Point3::new(10.0, -20.0, 30.0),
            yaw: 0.0,
            pitch: -FRAC_PI_2,
            ..Default::default()
        };
        let view = build_view_matrix(&camera);
        let expected = Matrix4::from_translation(Vector3::new(-10.0, 20.0, -30.0));
        assert_eq!(view, expected);
    }

    #[test]
    fn test_zero_position_view_is_pure_rotation() {
        let camera = CameraData {
            position: Point3::new(0.0, 0.0, 0.0),
            yaw: 0.7,
            pitch: 0.3,
            ..Default::default()
        };
        let view = build_view_matrix(&camera);
        let expected = Matrix4::from_angle_x(Rad((-0.3 - FRAC_PI_2) as f32))
            * Matrix4::from_angle_z(Rad(-0.7_f32));
        assert_eq!(view, expected);
    }

    #[test]
    fn test_translation_applies_before_rotation() {
        let camera = CameraData {
            position: Point3::new(100.0, 0.0, 0.0),
            yaw: FRAC_PI_2,
            pitch: -FRAC_PI_2,
            ..Default::default()
        };
        // The camera position itself must land on the view-space origin
        let eye = build_view_matrix(&camera) * Vector4::new(100.0, 0.0, 0.0, 1.0);
        assert!(eye.x.abs() < 1e-4 && eye.y.abs() < 1e-4 && eye.z.abs() < 1e-4);
    }

    #[test]
    fn test_level_pitch_looks_along_positive_y() {
        // With yaw 0 and pitch 0 a point further along +y sits on -z in view space
        let camera = CameraData {
            position: Point3::new(0.0, 0.0, 0.0),
            yaw: 0.0,
            pitch: 0.0,
            ..Default::default()
        };
        let ahead = build_view_matrix(&camera) * Vector4::new(0.0, 100.0, 0.0, 1.0);
        assert!(ahead.z < -99.0, "point ahead mapped to {:?}", ahead);
        let above = build_view_matrix(&camera) * Vector4::new(0.0, 0.0, 100.0, 1.0);
        assert!(above.y > 99.0, "point above mapped to {:?}", above);
    }

    #[test]
    fn test_projection_rebuilt_only_on_resize() {
        let projection = init_projection_from_config(&CameraConfig::default());
        let first = update_projection(&projection, 800, 600).unwrap();
        assert_eq!(first.last_size, Some((800, 600)));
        assert_ne!(first.matrix, Matrix4::identity());

        assert!(update_projection(&first, 800, 600).is_none());

        let resized = update_projection(&first, 1024, 600).unwrap();
        assert_ne!(resized.matrix, first.matrix);
        assert!(update_projection(&resized, 1024, 600).is_none());
    }

    #[test]
    fn test_degenerate_viewport_yields_finite_projection() {
        let projection = init_projection_from_config(&CameraConfig::default());
        let rebuilt = update_projection(&projection, 0, 0).unwrap();
        let columns: [[f32; 4]; 4] = rebuilt.matrix.into();
        assert!(columns.iter().flatten().all(|value| value.is_finite()));
    }
}
