//! Level data - Pure data
//!
//! In-memory form of a parsed BSP level, as handed over by the level
//! parser. Only the lumps the renderer consumes are represented.
//!
//! - surface_operations.rs: polygon walk and texture-space extents
//! - sample_levels.rs: small generated levels for demos and tests

pub mod sample_levels;
pub mod surface_operations;

pub use sample_levels::{checker_pixels, sample_quad_level, sample_room_level, LevelBuilder};
pub use surface_operations::{face_polygon, surface_extents, texture_coordinates};

use crate::constants::NO_LIGHT_STYLE;

/// Edge between two vertex indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub vertices: [u32; 2],
}

/// Texture projection of a face: texel s = dot(position, s.xyz) + s.w
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureInfo {
    pub s: [f32; 4],
    pub t: [f32; 4],
    pub texture: u32,
    pub flags: u32,
}

/// Polygonal face
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Face {
    pub first_edge: u32,
    pub edge_count: u32,
    pub texture_info: u32,
    /// Light styles, unused slots hold 255
    pub styles: [u8; 4],
    /// Byte offset into the lighting lump, negative when unlit
    pub light_offset: i32,
}

impl Face {
    pub fn has_lightmap(&self) -> bool {
        self.light_offset >= 0 && self.styles[0] != NO_LIGHT_STYLE
    }
}

/// Indexed-colour texture, level 0 mip only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MipTexture {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Parsed level
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BspLevel {
    pub vertices: Vec<[f32; 3]>,
    pub edges: Vec<Edge>,
    /// Signed edge references: negative walks the edge backwards
    pub surface_edges: Vec<i32>,
    pub texture_infos: Vec<TextureInfo>,
    pub faces: Vec<Face>,
    /// Missing textures are `None`
    pub textures: Vec<Option<MipTexture>>,
    /// One byte per lightmap sample
    pub lighting: Vec<u8>,
}

/// Texture-space bounds of a face, in whole lightmap samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceExtents {
    /// Texel coordinate of the first lightmap sample (multiple of 16)
    pub texture_mins: [i32; 2],
    /// Lightmap samples along s and t
    pub lightmap_size: [u32; 2],
}
