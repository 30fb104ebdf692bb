//! Renderer Data - Pure DOP
//!
//! NO METHODS. Just data.
//! All transformations happen in renderer_operations.rs

use super::frame_timing::FrameTimer;
use super::indexed_color::IndexedColorData;
use super::light_styles::LightStyles;
use super::shader_program::WorldProgram;
use super::texture_atlas_data::AtlasSet;
use crate::camera::{CameraData, ProjectionData};
use crate::config::RendererConfig;
use crate::map::MapData;
use cgmath::Matrix4;

/// Everything one renderer instance owns
///
/// Created by `init_renderer`, driven by `draw`, torn down by
/// `shutdown_renderer`. Several instances may coexist on different
/// contexts.
#[derive(Debug)]
pub struct RendererState {
    pub config: RendererConfig,
    pub indexed_color: IndexedColorData,
    pub atlases: AtlasSet,
    pub program: WorldProgram,
    pub map: MapData,
    pub camera: CameraData,
    pub projection: ProjectionData,
    pub timer: FrameTimer,
    pub light_styles: LightStyles,
    pub frame_count: u64,
}

/// What one frame did
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Zero-based index of the frame
    pub frame: u64,
    /// Reference ticks applied to motion and light styles
    pub ticks: f64,
    pub projection_rebuilt: bool,
    pub projection_matrix: Matrix4<f32>,
    pub view_matrix: Matrix4<f32>,
}
