//! Map Operations - Pure DOP Functions
//!
//! Turns a parsed level into one interleaved vertex buffer plus packed atlas
//! regions, and draws it with whatever attribute state the caller set up.

use super::map_data::{MapData, MapStats, MapVertex, MAP_VERTEX_LAYOUT};
use crate::bsp::{face_polygon, surface_extents, texture_coordinates, BspLevel, SurfaceExtents};
use crate::constants::{LIGHTMAP_SAMPLE_SIZE, NO_LIGHT_STYLE, UNSHADED_LIGHT_LEVEL};
use crate::error::{OptionExt, RenderError, RenderResult};
use crate::gl::GraphicsContext;
use crate::renderer::shader_program::WorldAttributes;
use crate::renderer::texture_atlas_data::{AtlasSet, PackedRect};
use crate::renderer::texture_atlas_operations::{add_image, upload_atlas_set, utilization};
use rustc_hash::FxHashMap;

/// Lightmap placement shared by every vertex of a face
#[derive(Debug, Clone, Copy)]
struct FaceLighting {
    region: PackedRect,
    extents: Option<SurfaceExtents>,
    base_light: f32,
    style: u8,
}

// ============================================================================
// CONSTRUCTION
// ============================================================================

/// Build and upload the geometry of a level
///
/// Packs every referenced texture once and every lit face's first-style
/// lightmap into `atlases`, then uploads both atlases and a single vertex
/// buffer. Faces without texture data are skipped with a warning.
pub fn build_map<G: GraphicsContext + ?Sized>(
    ctx: &mut G,
    level: &BspLevel,
    atlases: &mut AtlasSet,
) -> RenderResult<MapData> {
    let mut stats = MapStats {
        faces_total: level.faces.len(),
        ..Default::default()
    };
    let mut vertices: Vec<MapVertex> = Vec::new();
    let mut texture_regions: FxHashMap<u32, PackedRect> = FxHashMap::default();

    // Faces without a lightmap all sample this single zero texel
    let unlit_region = add_image(&mut atlases.lightmap, 1, 1, &[0])?;

    for (index, face) in level.faces.iter().enumerate() {
        let info = level
            .texture_infos
            .get(face.texture_info as usize)
            .ok_or_render(|| RenderError::MalformedLevel {
                reason: format!("face {} uses missing texture info {}", index, face.texture_info),
            })?;

        let Some(texture) = level
            .textures
            .get(info.texture as usize)
            .and_then(Option::as_ref)
        else {
            log::warn!(
                "[map_operations::build_map] Face {} skipped: texture {} has no data",
                index,
                info.texture
            );
            stats.faces_skipped += 1;
            continue;
        };

        let polygon = face_polygon(level, face)?;
        if polygon.len() < 3 {
            log::warn!(
                "[map_operations::build_map] Face {} skipped: only {} vertices",
                index,
                polygon.len()
            );
            stats.faces_skipped += 1;
            continue;
        }

        let texture_region = match texture_regions.get(&info.texture) {
            Some(region) => *region,
            None => {
                let region =
                    add_image(&mut atlases.diffuse, texture.width, texture.height, &texture.pixels)
                        .map_err(|err| match err {
                            RenderError::TextureDataSize { expected, found } => {
                                RenderError::MalformedLevel {
                                    reason: format!(
                                        "texture '{}' holds {} of {} texels",
                                        texture.name, found, expected
                                    ),
                                }
                            }
                            other => other,
                        })?;
                texture_regions.insert(info.texture, region);
                stats.textures_packed += 1;
                region
            }
        };

        let coordinates: Vec<[f64; 2]> = polygon
            .iter()
            .map(|&point| texture_coordinates(info, point))
            .collect();

        let lighting = if face.has_lightmap() && !is_unshaded(&texture.name) {
            let extents = surface_extents(&coordinates).map_err(|err| match err {
                RenderError::MalformedLevel { reason } => RenderError::MalformedLevel {
                    reason: format!("face {}: {}", index, reason),
                },
                other => other,
            })?;
            let [width, height] = extents.lightmap_size;
            let start = face.light_offset as usize;
            let samples = (width as usize)
                .checked_mul(height as usize)
                .and_then(|len| start.checked_add(len))
                .and_then(|end| level.lighting.get(start..end))
                .ok_or_render(|| RenderError::MalformedLevel {
                    reason: format!(
                        "face {} lightmap {}x{} at {} exceeds {} lighting bytes",
                        index,
                        width,
                        height,
                        start,
                        level.lighting.len()
                    ),
                })?;
            let region = add_image(&mut atlases.lightmap, width, height, samples)?;
            stats.lightmaps_packed += 1;
            FaceLighting {
                region,
                extents: Some(extents),
                base_light: 0.0,
                style: face.styles[0],
            }
        } else {
            FaceLighting {
                region: unlit_region,
                extents: None,
                base_light: UNSHADED_LIGHT_LEVEL,
                style: 0,
            }
        };

        let corners: Vec<MapVertex> = polygon
            .iter()
            .zip(&coordinates)
            .map(|(&position, &st)| {
                face_vertex(position, st, texture_region, texture.width, texture.height, &lighting)
            })
            .collect();

        // Faces are stored clockwise; emit counter-clockwise triangles
        for i in 1..corners.len() - 1 {
            vertices.push(corners[0]);
            vertices.push(corners[i + 1]);
            vertices.push(corners[i]);
        }
        stats.faces_drawn += 1;
    }

    upload_atlas_set(ctx, atlases)?;

    let vertex_count = vertices.len() as u32;
    let vertex_buffer = if vertices.is_empty() {
        None
    } else {
        Some(ctx.create_vertex_buffer("Map Vertices", bytemuck::cast_slice(&vertices))?)
    };
    stats.vertex_count = vertex_count;

    log::info!(
        "[map_operations::build_map] {} of {} faces drawn ({} skipped), {} vertices, {} textures, {} lightmaps",
        stats.faces_drawn,
        stats.faces_total,
        stats.faces_skipped,
        vertex_count,
        stats.textures_packed,
        stats.lightmaps_packed
    );
    log::info!(
        "[map_operations::build_map] Atlas utilisation: diffuse {:.1}%, lightmap {:.1}%",
        utilization(&atlases.diffuse),
        utilization(&atlases.lightmap)
    );

    Ok(MapData {
        vertex_buffer,
        vertex_count,
        stats,
    })
}

/// Sky and liquid surfaces are drawn without lightmap shading
pub fn is_unshaded(texture_name: &str) -> bool {
    texture_name.starts_with("sky") || texture_name.starts_with('*')
}

fn face_vertex(
    position: [f32; 3],
    st: [f64; 2],
    texture_region: PackedRect,
    texture_width: u32,
    texture_height: u32,
    lighting: &FaceLighting,
) -> MapVertex {
    // Offset inside the lightmap region, on sample centres
    let light_local = match lighting.extents {
        Some(extents) => [
            ((st[0] - extents.texture_mins[0] as f64) / LIGHTMAP_SAMPLE_SIZE as f64 + 0.5) as f32,
            ((st[1] - extents.texture_mins[1] as f64) / LIGHTMAP_SAMPLE_SIZE as f64 + 0.5) as f32,
        ],
        None => [0.5, 0.5],
    };
    let style = if lighting.style == NO_LIGHT_STYLE {
        0
    } else {
        lighting.style
    };

    MapVertex {
        position,
        light: lighting.base_light,
        tex: [st[0] as f32, st[1] as f32],
        tex_info: [
            texture_region.x as f32,
            texture_region.y as f32,
            texture_width as f32,
            texture_height as f32,
        ],
        light_info: [
            lighting.region.x as f32,
            lighting.region.y as f32,
            light_local[0],
            light_local[1],
        ],
        light_style: style as f32,
    }
}

// ============================================================================
// RENDERING
// ============================================================================

/// Draw the whole map
///
/// Binds the vertex buffer and points the six attributes into it. The
/// caller owns program, texture units, capabilities and attribute enables.
pub fn render_map<G: GraphicsContext + ?Sized>(
    ctx: &mut G,
    map: &MapData,
    attributes: &WorldAttributes,
) {
    let Some(buffer) = map.vertex_buffer else {
        return;
    };

    let stride = std::mem::size_of::<MapVertex>() as u32;
    ctx.bind_vertex_buffer(buffer);
    for (location, (format, offset)) in attributes.all().into_iter().zip(MAP_VERTEX_LAYOUT) {
        ctx.vertex_attrib_pointer(location, format, stride, offset);
    }
    ctx.draw_triangles(0, map.vertex_count);
}

// ============================================================================
// TEARDOWN
// ============================================================================

/// Delete the map's vertex buffer. Atlas textures belong to the caller.
pub fn release_map<G: GraphicsContext + ?Sized>(ctx: &mut G, map: MapData) {
    if let Some(buffer) = map.vertex_buffer {
        ctx.delete_buffer(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsp::{checker_pixels, sample_quad_level, sample_room_level, LevelBuilder};
    use crate::gl::{AttribFormat, AttributeLocation, GlCall, RecordingContext};
    use crate::renderer::texture_atlas_operations::create_atlas_set;

    fn attributes() -> WorldAttributes {
        WorldAttributes {
            position: AttributeLocation(0),
            light: AttributeLocation(1),
            tex: AttributeLocation(2),
            tex_info: AttributeLocation(3),
            light_info: AttributeLocation(4),
            light_style: AttributeLocation(5),
        }
    }

    fn uploaded_vertices(ctx: &RecordingContext, map: &MapData) -> usize {
        ctx.calls()
            .iter()
            .find_map(|call| match call {
                GlCall::CreateBuffer { buffer, len } if Some(*buffer) == map.vertex_buffer => {
                    Some(*len)
                }
                _ => None,
            })
            .unwrap_or(0)
    }

    #[test]
    fn test_quad_builds_two_triangles() {
        let mut ctx = RecordingContext::new();
        let mut atlases = create_atlas_set(&mut ctx, 64).unwrap();
        let map = build_map(&mut ctx, &sample_quad_level(), &mut atlases).unwrap();

        assert_eq!(map.vertex_count, 6);
        assert_eq!(uploaded_vertices(&ctx, &map), 6 * 60);
        assert_eq!(map.stats.faces_drawn, 1);
        assert_eq!(map.stats.textures_packed, 1);
        assert_eq!(map.stats.lightmaps_packed, 1);

        // Unlit texel plus a 5x5 lightmap
        assert_eq!(atlases.lightmap.packed_rects.len(), 2);
        assert_eq!(atlases.lightmap.packed_rects[1].width, 5);
        assert!(atlases.lightmap.dirty.is_none());
        assert!(atlases.diffuse.dirty.is_none());
    }

    #[test]
    fn test_triangles_are_counter_clockwise_from_front() {
        let mut ctx = RecordingContext::new();
        let mut atlases = create_atlas_set(&mut ctx, 64).unwrap();
        let level = sample_quad_level();

        let polygon = face_polygon(&level, &level.faces[0]).unwrap();
        let texture = level.textures[0].as_ref().unwrap();
        let lighting = FaceLighting {
            region: PackedRect { x: 0, y: 0, width: 1, height: 1 },
            extents: None,
            base_light: 0.0,
            style: 0,
        };
        let region = add_image(&mut atlases.diffuse, 16, 16, &texture.pixels).unwrap();
        let corners: Vec<MapVertex> = polygon
            .iter()
            .map(|&p| face_vertex(p, [0.0, 0.0], region, 16, 16, &lighting))
            .collect();

        // Signed area in the xy plane seen from +z, for the first emitted triangle
        let (a, b, c) = (corners[0].position, corners[2].position, corners[1].position);
        let cross = (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0]);
        assert!(cross > 0.0);
    }

    #[test]
    fn test_vertex_lighting_attributes() {
        let mut ctx = RecordingContext::new();
        let mut atlases = create_atlas_set(&mut ctx, 64).unwrap();
        let level = sample_quad_level();
        build_map(&mut ctx, &level, &mut atlases).unwrap();

        let lightmap = atlases.lightmap.packed_rects[1];
        let extents = SurfaceExtents {
            texture_mins: [0, -64],
            lightmap_size: [5, 5],
        };
        let lighting = FaceLighting {
            region: lightmap,
            extents: Some(extents),
            base_light: 0.0,
            style: 0,
        };
        let vertex = face_vertex(
            [64.0, 64.0, 0.0],
            [64.0, -64.0],
            atlases.diffuse.packed_rects[0],
            16,
            16,
            &lighting,
        );
        // Far corner of a 5x5 lightmap lands on the last sample centre
        assert_eq!(vertex.light_info[2], 4.5);
        assert_eq!(vertex.light_info[3], 0.5);
        assert_eq!(vertex.tex, [64.0, -64.0]);
        assert_eq!(vertex.tex_info[2..], [16.0, 16.0]);
        assert_eq!(vertex.light, 0.0);
    }

    #[test]
    fn test_textures_packed_once_and_sky_unshaded() {
        let mut ctx = RecordingContext::new();
        let mut atlases = create_atlas_set(&mut ctx, 256).unwrap();
        let map = build_map(&mut ctx, &sample_room_level(64.0), &mut atlases).unwrap();

        assert_eq!(map.stats.faces_drawn, 6);
        assert_eq!(map.vertex_count, 36);
        // floor, wall, sky
        assert_eq!(map.stats.textures_packed, 3);
        // sky and the unlit wall use the shared texel
        assert_eq!(map.stats.lightmaps_packed, 4);
    }

    #[test]
    fn test_missing_texture_face_skipped() {
        let mut builder = LevelBuilder::new();
        let missing = builder.add_missing_texture();
        let square = [[0.0, 0.0, 0.0], [0.0, 16.0, 0.0], [16.0, 16.0, 0.0], [16.0, 0.0, 0.0]];
        builder.add_face(&square, missing, [1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0], None, |_, _| 0);
        let level = builder.build();

        let mut ctx = RecordingContext::new();
        let mut atlases = create_atlas_set(&mut ctx, 64).unwrap();
        let map = build_map(&mut ctx, &level, &mut atlases).unwrap();

        assert_eq!(map.stats.faces_skipped, 1);
        assert_eq!(map.vertex_count, 0);
        assert!(map.vertex_buffer.is_none());

        // Nothing to draw: render issues no calls
        ctx.take_calls();
        render_map(&mut ctx, &map, &attributes());
        assert!(ctx.calls().is_empty());
    }

    #[test]
    fn test_truncated_lighting_is_malformed() {
        let mut level = sample_quad_level();
        level.lighting.truncate(10);

        let mut ctx = RecordingContext::new();
        let mut atlases = create_atlas_set(&mut ctx, 64).unwrap();
        let result = build_map(&mut ctx, &level, &mut atlases);
        assert!(matches!(result, Err(RenderError::MalformedLevel { .. })));
    }

    #[test]
    fn test_oversized_surface_extents_are_malformed() {
        let mut builder = LevelBuilder::new();
        let floor = builder.add_texture("floor", 16, 16, checker_pixels(16, 20, 40));
        let square = [[0.0, 0.0, 0.0], [0.0, 64.0, 0.0], [64.0, 64.0, 0.0], [64.0, 0.0, 0.0]];
        builder.add_face(
            &square,
            floor,
            [2.0e6, 0.0, 0.0, 0.0],
            [0.0, 2.0e6, 0.0, 0.0],
            Some(0),
            |_, _| 128,
        );
        let level = builder.build();
        assert!(level.faces[0].has_lightmap());

        let mut ctx = RecordingContext::new();
        let mut atlases = create_atlas_set(&mut ctx, 64).unwrap();
        match build_map(&mut ctx, &level, &mut atlases) {
            Err(RenderError::MalformedLevel { reason }) => assert!(reason.contains("extents")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_tiny_atlas_reports_full() {
        let mut ctx = RecordingContext::new();
        let mut atlases = create_atlas_set(&mut ctx, 8).unwrap();
        let result = build_map(&mut ctx, &sample_quad_level(), &mut atlases);
        assert!(matches!(result, Err(RenderError::AtlasFull { .. })));
    }

    #[test]
    fn test_render_points_attributes_and_draws() {
        let mut ctx = RecordingContext::new();
        let mut atlases = create_atlas_set(&mut ctx, 64).unwrap();
        let map = build_map(&mut ctx, &sample_quad_level(), &mut atlases).unwrap();
        ctx.take_calls();

        render_map(&mut ctx, &map, &attributes());
        let calls = ctx.take_calls();
        assert_eq!(calls.len(), 8);
        assert_eq!(calls[0], GlCall::BindVertexBuffer(map.vertex_buffer.unwrap()));
        assert_eq!(
            calls[4],
            GlCall::VertexAttribPointer {
                location: AttributeLocation(3),
                format: AttribFormat::Float32x4,
                stride: 60,
                offset: 24,
            }
        );
        assert_eq!(
            calls[7],
            GlCall::DrawTriangles {
                first_vertex: 0,
                vertex_count: 6,
            }
        );

        // Global enable state is untouched
        assert!(!calls
            .iter()
            .any(|call| matches!(call, GlCall::Enable(_) | GlCall::EnableVertexAttrib(_))));

        release_map(&mut ctx, map);
        assert_eq!(ctx.live_buffer_count(), 0);
    }

    #[test]
    fn test_unshaded_names() {
        assert!(is_unshaded("sky4"));
        assert!(is_unshaded("*water0"));
        assert!(!is_unshaded("wall"));
    }
}
