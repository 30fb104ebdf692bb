/// Camera Module - Data-Oriented Programming (DOP) style
///
/// - camera_data.rs: Pure data structures with NO methods
/// - camera_operations.rs: Pure functions that operate on data
pub mod camera_data;
pub mod camera_operations;

// Re-export data structures
pub use camera_data::{CameraConfig, CameraData, ProjectionData};

// Re-export all operations
pub use camera_operations::{
    // Initialization
    init_camera_from_config,
    init_projection_from_config,

    // View/projection
    build_view_matrix,
    build_projection_matrix,
    update_projection,

    // Movement
    move_forward,
    stop_move,
    rotate,
    integrate_motion,

    // Diagnostics
    log_camera_context,
};
