/// Map Module - Data-Oriented Programming (DOP) style
///
/// The geometry provider behind the frame: builds one vertex buffer from a
/// level, draws it, and releases it.
///
/// - map_data.rs: vertex layout and build summary
/// - map_operations.rs: build, render, release
pub mod map_data;
pub mod map_operations;

pub use map_data::{MapData, MapStats, MapVertex, MAP_VERTEX_LAYOUT};
pub use map_operations::{build_map, is_unshaded, release_map, render_map};
