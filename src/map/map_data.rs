//! Map Data - Pure DOP
//!
//! NO METHODS. Just data.
//! All transformations happen in map_operations.rs

use crate::gl::{AttribFormat, BufferHandle};
use static_assertions::const_assert_eq;

/// Interleaved world vertex, one per triangle corner
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MapVertex {
    pub position: [f32; 3],
    /// Base light level added to the lightmap contribution
    pub light: f32,
    /// Surface texture coordinates in texels
    pub tex: [f32; 2],
    /// Diffuse atlas region: x, y, width, height
    pub tex_info: [f32; 4],
    /// Lightmap atlas region origin, then this corner's offset inside it
    pub light_info: [f32; 4],
    /// Light style index as a float
    pub light_style: f32,
}

const_assert_eq!(std::mem::size_of::<MapVertex>(), 60);

/// Byte layout of the six attributes inside [`MapVertex`], in program order
pub const MAP_VERTEX_LAYOUT: [(AttribFormat, u32); 6] = [
    (AttribFormat::Float32x3, 0),
    (AttribFormat::Float32, 12),
    (AttribFormat::Float32x2, 16),
    (AttribFormat::Float32x4, 24),
    (AttribFormat::Float32x4, 40),
    (AttribFormat::Float32, 56),
];

/// Build summary, logged and kept for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapStats {
    pub faces_total: usize,
    pub faces_drawn: usize,
    pub faces_skipped: usize,
    pub textures_packed: usize,
    pub lightmaps_packed: usize,
    pub vertex_count: u32,
}

/// Uploaded map geometry
///
/// All faces share one vertex buffer; `vertex_buffer` is `None` when the
/// level had nothing drawable.
#[derive(Debug, Clone, PartialEq)]
pub struct MapData {
    pub vertex_buffer: Option<BufferHandle>,
    pub vertex_count: u32,
    pub stats: MapStats,
}
