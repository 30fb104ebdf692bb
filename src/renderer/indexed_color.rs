//! Palette and colormap lookup textures
//!
//! The fragment program resolves every texel through two lookups: the
//! colormap maps (colour index, light level) to a shaded colour index, the
//! palette maps that index to RGB. Both are created once at init and never
//! change.

use crate::asset::AssetArchive;
use crate::constants::{
    COLORMAP_HEIGHT, COLORMAP_PATH, COLORMAP_WIDTH, PALETTE_HEIGHT, PALETTE_PATH, PALETTE_WIDTH,
};
use crate::error::{RenderError, RenderResult};
use crate::gl::{FilterMode, GraphicsContext, PixelFormat, TextureDescriptor, TextureHandle};

/// GPU handles of the two lookup textures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedColorData {
    pub palette: TextureHandle,
    pub colour_map: TextureHandle,
}

/// Load both lookup tables from the archive and upload them
pub fn load_indexed_color<G, A>(ctx: &mut G, archive: &A) -> RenderResult<IndexedColorData>
where
    G: GraphicsContext + ?Sized,
    A: AssetArchive + ?Sized,
{
    let colour_map_bytes = read_table(
        archive,
        COLORMAP_PATH,
        (COLORMAP_WIDTH * COLORMAP_HEIGHT) as usize,
    )?;
    let palette_bytes = read_table(
        archive,
        PALETTE_PATH,
        (PALETTE_WIDTH * PALETTE_HEIGHT * 3) as usize,
    )?;

    let colour_map = ctx.create_texture(&TextureDescriptor {
        label: "Colour Map",
        data: &colour_map_bytes,
        width: COLORMAP_WIDTH,
        height: COLORMAP_HEIGHT,
        format: PixelFormat::Luminance,
        filter: FilterMode::Nearest,
    })?;

    let palette = match ctx.create_texture(&TextureDescriptor {
        label: "Palette",
        data: &palette_bytes,
        width: PALETTE_WIDTH,
        height: PALETTE_HEIGHT,
        format: PixelFormat::Rgb,
        filter: FilterMode::Nearest,
    }) {
        Ok(palette) => palette,
        Err(err) => {
            ctx.delete_texture(colour_map);
            return Err(err);
        }
    };

    log::info!("[indexed_color::load] Palette and colour map uploaded");
    Ok(IndexedColorData {
        palette,
        colour_map,
    })
}

pub fn release_indexed_color<G: GraphicsContext + ?Sized>(ctx: &mut G, data: IndexedColorData) {
    ctx.delete_texture(data.palette);
    ctx.delete_texture(data.colour_map);
}

/// Read an entry that must hold at least `expected` bytes; trailing bytes
/// (the colormap carries one) are dropped.
fn read_table<A: AssetArchive + ?Sized>(
    archive: &A,
    path: &str,
    expected: usize,
) -> RenderResult<Vec<u8>> {
    let mut bytes = archive.read(path)?;
    if bytes.len() < expected {
        return Err(RenderError::AssetFormat {
            path: path.to_string(),
            expected,
            found: bytes.len(),
        });
    }
    bytes.truncate(expected);
    Ok(bytes)
}
