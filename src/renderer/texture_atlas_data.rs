//! Texture Atlas Data - Pure DOP
//!
//! NO METHODS. Just data.
//! All transformations happen in texture_atlas_operations.rs

use crate::error::AtlasKind;
use crate::gl::{FilterMode, TextureHandle};
use image::GrayImage;

/// Rectangle packing for atlas, in texels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Bounding box of texels written since the last upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRegion {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

/// Single-channel texture atlas - Pure data structure
///
/// The GPU texture is fixed size and allocated up front. Packing state is a
/// skyline: the filled height of every column.
#[derive(Debug)]
pub struct TextureAtlasData {
    pub kind: AtlasKind,
    pub texture: TextureHandle,
    pub atlas_size: u32,
    pub filter: FilterMode,

    // Packing state
    pub skyline: Vec<u32>,
    pub packed_rects: Vec<PackedRect>,
    pub atlas_image: GrayImage,
    pub dirty: Option<DirtyRegion>,
}

/// The diffuse/lightmap pair a map packs into
#[derive(Debug)]
pub struct AtlasSet {
    pub diffuse: TextureAtlasData,
    pub lightmap: TextureAtlasData,
}
