//! Texture Atlas Operations - Pure DOP Functions
//!
//! Packing and CPU-side writes are pure data transformations. Only creation,
//! upload and release talk to the graphics context.

use super::texture_atlas_data::{AtlasSet, DirtyRegion, PackedRect, TextureAtlasData};
use crate::error::{AtlasKind, RenderError, RenderResult};
use crate::gl::{validate_region, FilterMode, GraphicsContext, PixelFormat, TextureDescriptor};
use image::GrayImage;
use std::path::Path;

/// Create new texture atlas data
///
/// The GPU texture is initialised with zeros so every texel is defined
/// before the first region lands in it.
pub fn create_texture_atlas<G: GraphicsContext + ?Sized>(
    ctx: &mut G,
    kind: AtlasKind,
    atlas_size: u32,
    filter: FilterMode,
) -> RenderResult<TextureAtlasData> {
    let dummy = vec![0u8; atlas_size as usize * atlas_size as usize];
    let label = match kind {
        AtlasKind::Diffuse => "Diffuse Atlas",
        AtlasKind::Lightmap => "Lightmap Atlas",
    };
    let texture = ctx.create_texture(&TextureDescriptor {
        label,
        data: &dummy,
        width: atlas_size,
        height: atlas_size,
        format: PixelFormat::Luminance,
        filter,
    })?;

    log::debug!(
        "[texture_atlas_operations::create] {} atlas {}x{} ({:?})",
        kind,
        atlas_size,
        atlas_size,
        filter
    );

    Ok(TextureAtlasData {
        kind,
        texture,
        atlas_size,
        filter,
        skyline: vec![0; atlas_size as usize],
        packed_rects: Vec::new(),
        atlas_image: GrayImage::new(atlas_size, atlas_size),
        dirty: None,
    })
}

/// Create the diffuse (nearest) and lightmap (linear) atlas pair
pub fn create_atlas_set<G: GraphicsContext + ?Sized>(
    ctx: &mut G,
    atlas_size: u32,
) -> RenderResult<AtlasSet> {
    let diffuse = create_texture_atlas(ctx, AtlasKind::Diffuse, atlas_size, FilterMode::Nearest)?;
    let lightmap =
        match create_texture_atlas(ctx, AtlasKind::Lightmap, atlas_size, FilterMode::Linear) {
            Ok(lightmap) => lightmap,
            Err(err) => {
                release_texture_atlas(ctx, diffuse);
                return Err(err);
            }
        };
    Ok(AtlasSet { diffuse, lightmap })
}

/// Reserve a `width` x `height` region
///
/// Picks the lowest position along the skyline, leftmost on ties. The atlas
/// never grows: when nothing fits the result is [`RenderError::AtlasFull`].
pub fn allocate_region(
    data: &mut TextureAtlasData,
    width: u32,
    height: u32,
) -> RenderResult<PackedRect> {
    let rect = find_packing_position(data, width, height).ok_or_else(|| RenderError::AtlasFull {
        atlas: data.kind,
        width,
        height,
    })?;

    let columns = rect.x as usize..(rect.x + rect.width) as usize;
    for column in &mut data.skyline[columns] {
        *column = rect.y + rect.height;
    }
    data.packed_rects.push(rect);
    Ok(rect)
}

/// Find position to pack new rectangle
fn find_packing_position(data: &TextureAtlasData, width: u32, height: u32) -> Option<PackedRect> {
    if width == 0 || height == 0 || width > data.atlas_size || height > data.atlas_size {
        return None;
    }

    let mut best: Option<(u32, u32)> = None;
    let mut best_y = data.atlas_size;

    for x in 0..=(data.atlas_size - width) {
        let mut y = 0;
        let mut fits = true;
        for &column in &data.skyline[x as usize..(x + width) as usize] {
            if column >= best_y {
                fits = false;
                break;
            }
            y = y.max(column);
        }
        if fits {
            best_y = y;
            best = Some((x, y));
        }
    }

    let (x, y) = best?;
    if y + height > data.atlas_size {
        return None;
    }
    Some(PackedRect {
        x,
        y,
        width,
        height,
    })
}

/// Copy tightly packed texels into a packed region of the CPU mirror
pub fn write_region(data: &mut TextureAtlasData, rect: PackedRect, pixels: &[u8]) -> RenderResult<()> {
    validate_region(
        rect.x,
        rect.y,
        rect.width,
        rect.height,
        (data.atlas_size, data.atlas_size),
        PixelFormat::Luminance,
        pixels.len(),
    )?;

    let stride = data.atlas_size as usize;
    let row_len = rect.width as usize;
    let image: &mut [u8] = &mut data.atlas_image;
    for row in 0..rect.height as usize {
        let src = &pixels[row * row_len..(row + 1) * row_len];
        let dst_start = (rect.y as usize + row) * stride + rect.x as usize;
        image[dst_start..dst_start + row_len].copy_from_slice(src);
    }

    data.dirty = Some(match data.dirty {
        None => DirtyRegion {
            min_x: rect.x,
            min_y: rect.y,
            max_x: rect.x + rect.width,
            max_y: rect.y + rect.height,
        },
        Some(dirty) => DirtyRegion {
            min_x: dirty.min_x.min(rect.x),
            min_y: dirty.min_y.min(rect.y),
            max_x: dirty.max_x.max(rect.x + rect.width),
            max_y: dirty.max_y.max(rect.y + rect.height),
        },
    });
    Ok(())
}

/// Allocate a region and fill it
pub fn add_image(
    data: &mut TextureAtlasData,
    width: u32,
    height: u32,
    pixels: &[u8],
) -> RenderResult<PackedRect> {
    let expected = width as usize * height as usize;
    if pixels.len() < expected {
        return Err(RenderError::TextureDataSize {
            expected,
            found: pixels.len(),
        });
    }
    let rect = allocate_region(data, width, height)?;
    write_region(data, rect, &pixels[..expected])?;
    Ok(rect)
}

/// Upload atlas to GPU if dirty
///
/// Sends the bounding box of everything written since the last upload as a
/// single sub-region write.
pub fn upload_atlas<G: GraphicsContext + ?Sized>(
    ctx: &mut G,
    data: &mut TextureAtlasData,
) -> RenderResult<()> {
    let Some(dirty) = data.dirty else {
        return Ok(());
    };

    let width = dirty.max_x - dirty.min_x;
    let height = dirty.max_y - dirty.min_y;
    let stride = data.atlas_size as usize;
    let image: &[u8] = &data.atlas_image;

    let mut region = Vec::with_capacity(width as usize * height as usize);
    for row in dirty.min_y as usize..dirty.max_y as usize {
        let start = row * stride + dirty.min_x as usize;
        region.extend_from_slice(&image[start..start + width as usize]);
    }

    ctx.write_texture_region(data.texture, dirty.min_x, dirty.min_y, width, height, &region)?;
    data.dirty = None;

    log::debug!(
        "[texture_atlas_operations::upload] {} atlas: {}x{} at ({}, {}), {:.1}% used",
        data.kind,
        width,
        height,
        dirty.min_x,
        dirty.min_y,
        utilization(data)
    );
    Ok(())
}

/// Upload both atlases of a set
pub fn upload_atlas_set<G: GraphicsContext + ?Sized>(
    ctx: &mut G,
    atlases: &mut AtlasSet,
) -> RenderResult<()> {
    upload_atlas(ctx, &mut atlases.diffuse)?;
    upload_atlas(ctx, &mut atlases.lightmap)
}

/// Delete the GPU texture of an atlas
pub fn release_texture_atlas<G: GraphicsContext + ?Sized>(ctx: &mut G, data: TextureAtlasData) {
    ctx.delete_texture(data.texture);
}

pub fn release_atlas_set<G: GraphicsContext + ?Sized>(ctx: &mut G, atlases: AtlasSet) {
    release_texture_atlas(ctx, atlases.diffuse);
    release_texture_atlas(ctx, atlases.lightmap);
}

/// Get atlas utilization percentage
pub fn utilization(data: &TextureAtlasData) -> f32 {
    let used_area: u64 = data
        .packed_rects
        .iter()
        .map(|r| r.width as u64 * r.height as u64)
        .sum();

    let total_area = data.atlas_size as u64 * data.atlas_size as u64;
    (used_area as f64 / total_area as f64 * 100.0) as f32
}

/// Save atlas to file for debugging
pub fn save_debug(data: &TextureAtlasData, path: impl AsRef<Path>) -> RenderResult<()> {
    let path = path.as_ref();
    data.atlas_image
        .save(path)
        .map_err(|source| RenderError::DebugImage {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::{GlCall, RecordingContext};

    fn small_atlas(ctx: &mut RecordingContext, size: u32) -> TextureAtlasData {
        create_texture_atlas(ctx, AtlasKind::Lightmap, size, FilterMode::Linear).unwrap()
    }

    #[test]
    fn test_atlas_starts_zeroed() {
        let mut ctx = RecordingContext::new();
        let atlas = small_atlas(&mut ctx, 32);
        let texture = ctx.texture(atlas.texture).unwrap();
        assert_eq!(texture.data.len(), 32 * 32);
        assert!(texture.data.iter().all(|&texel| texel == 0));
        assert_eq!(texture.filter, FilterMode::Linear);
    }

    #[test]
    fn test_set_uses_expected_filters() {
        let mut ctx = RecordingContext::new();
        let set = create_atlas_set(&mut ctx, 64).unwrap();
        assert_eq!(ctx.texture(set.diffuse.texture).unwrap().filter, FilterMode::Nearest);
        assert_eq!(ctx.texture(set.lightmap.texture).unwrap().filter, FilterMode::Linear);

        release_atlas_set(&mut ctx, set);
        assert_eq!(ctx.live_texture_count(), 0);
    }

    #[test]
    fn test_skyline_fills_lowest_first() {
        let mut ctx = RecordingContext::new();
        let mut atlas = small_atlas(&mut ctx, 16);

        let a = allocate_region(&mut atlas, 8, 4).unwrap();
        let b = allocate_region(&mut atlas, 8, 2).unwrap();
        let c = allocate_region(&mut atlas, 8, 3).unwrap();

        assert_eq!((a.x, a.y), (0, 0));
        assert_eq!((b.x, b.y), (8, 0));
        // Column 8..16 is lower, so the third region stacks there
        assert_eq!((c.x, c.y), (8, 2));
        assert_eq!(atlas.skyline[..8], [4; 8]);
        assert_eq!(atlas.skyline[8..], [5; 8]);
    }

    #[test]
    fn test_regions_never_overlap() {
        let mut ctx = RecordingContext::new();
        let mut atlas = small_atlas(&mut ctx, 64);
        let sizes = [(17, 9), (3, 30), (40, 5), (8, 8), (1, 1), (22, 13), (5, 17)];
        let rects: Vec<PackedRect> = sizes
            .iter()
            .map(|&(w, h)| allocate_region(&mut atlas, w, h).unwrap())
            .collect();

        for (i, a) in rects.iter().enumerate() {
            assert!(a.x + a.width <= 64 && a.y + a.height <= 64);
            for b in &rects[i + 1..] {
                let disjoint = a.x + a.width <= b.x
                    || b.x + b.width <= a.x
                    || a.y + a.height <= b.y
                    || b.y + b.height <= a.y;
                assert!(disjoint, "{:?} overlaps {:?}", a, b);
            }
        }
    }

    #[test]
    fn test_exhaustion_is_atlas_full() {
        let mut ctx = RecordingContext::new();
        let mut atlas = small_atlas(&mut ctx, 16);
        allocate_region(&mut atlas, 16, 12).unwrap();

        match allocate_region(&mut atlas, 4, 5) {
            Err(RenderError::AtlasFull {
                atlas: AtlasKind::Lightmap,
                width: 4,
                height: 5,
            }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
        // A region that still fits is unaffected by the failure
        assert!(allocate_region(&mut atlas, 16, 4).is_ok());
        assert!(allocate_region(&mut atlas, 20, 1).is_err());
    }

    #[test]
    fn test_upload_sends_dirty_bounds_once() {
        let mut ctx = RecordingContext::new();
        let mut atlas = small_atlas(&mut ctx, 16);
        add_image(&mut atlas, 2, 2, &[1, 2, 3, 4]).unwrap();
        add_image(&mut atlas, 3, 1, &[9, 9, 9]).unwrap();
        ctx.take_calls();

        upload_atlas(&mut ctx, &mut atlas).unwrap();
        assert_eq!(
            ctx.calls(),
            &[GlCall::WriteTextureRegion {
                texture: atlas.texture,
                x: 0,
                y: 0,
                width: 5,
                height: 2,
            }]
        );

        let texels = &ctx.texture(atlas.texture).unwrap().data;
        assert_eq!(&texels[0..5], &[1, 2, 9, 9, 9]);
        assert_eq!(&texels[16..21], &[3, 4, 0, 0, 0]);

        // Nothing new written: no second upload
        upload_atlas(&mut ctx, &mut atlas).unwrap();
        assert_eq!(ctx.calls().len(), 1);
    }

    #[test]
    fn test_short_pixel_data_rejected() {
        let mut ctx = RecordingContext::new();
        let mut atlas = small_atlas(&mut ctx, 16);
        let result = add_image(&mut atlas, 4, 4, &[0; 10]);
        assert!(matches!(result, Err(RenderError::TextureDataSize { expected: 16, found: 10 })));
        assert!(atlas.packed_rects.is_empty());
    }

    #[test]
    fn test_utilization_and_debug_dump() {
        let mut ctx = RecordingContext::new();
        let mut atlas = small_atlas(&mut ctx, 16);
        add_image(&mut atlas, 8, 8, &[200; 64]).unwrap();
        assert!((utilization(&atlas) - 25.0).abs() < 1e-4);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lightmap.png");
        save_debug(&atlas, &path).unwrap();
        let reloaded = image::open(&path).unwrap().to_luma8();
        assert_eq!(reloaded.get_pixel(3, 3).0, [200]);
        assert_eq!(reloaded.get_pixel(12, 12).0, [0]);
    }
}
