//! Surface operations - Pure functions over level data

use super::{BspLevel, Face, SurfaceExtents, TextureInfo};
use crate::constants::{LIGHTMAP_SAMPLE_SIZE, MAX_SURFACE_EXTENT};
use crate::error::{OptionExt, RenderError, RenderResult};

/// Walk a face's surface edges into its polygon
///
/// A non-positive edge reference walks the edge backwards and contributes
/// its second vertex.
pub fn face_polygon(level: &BspLevel, face: &Face) -> RenderResult<Vec<[f32; 3]>> {
    let first = face.first_edge as usize;
    let count = face.edge_count as usize;
    let references = first
        .checked_add(count)
        .and_then(|end| level.surface_edges.get(first..end))
        .ok_or_render(|| {
            malformed(format!(
                "{} edges from {} exceed {} surface edges",
                count,
                first,
                level.surface_edges.len()
            ))
        })?;

    references
        .iter()
        .map(|&reference| {
            let edge = level
                .edges
                .get(reference.unsigned_abs() as usize)
                .ok_or_render(|| malformed(format!("edge {} does not exist", reference)))?;
            let vertex = if reference > 0 {
                edge.vertices[0]
            } else {
                edge.vertices[1]
            };
            level
                .vertices
                .get(vertex as usize)
                .copied()
                .ok_or_render(|| malformed(format!("vertex {} does not exist", vertex)))
        })
        .collect()
}

/// Project a point onto the texture axes, in texels
pub fn texture_coordinates(info: &TextureInfo, point: [f32; 3]) -> [f64; 2] {
    let project = |axis: &[f32; 4]| {
        point
            .iter()
            .zip(axis)
            .map(|(&p, &a)| p as f64 * a as f64)
            .sum::<f64>()
            + axis[3] as f64
    };
    [project(&info.s), project(&info.t)]
}

/// Lightmap placement of a face from its vertices' texture coordinates
///
/// A surface spanning more than [`MAX_SURFACE_EXTENT`] texels on either axis
/// has no valid lightmap and is rejected as malformed.
pub fn surface_extents(coordinates: &[[f64; 2]]) -> RenderResult<SurfaceExtents> {
    let sample = LIGHTMAP_SAMPLE_SIZE as f64;
    let mut texture_mins = [0i32; 2];
    let mut lightmap_size = [1u32; 2];

    for axis in 0..2 {
        let (min, max) = coordinates.iter().fold((f64::MAX, f64::MIN), |(min, max), st| {
            (min.min(st[axis]), max.max(st[axis]))
        });
        if min > max {
            continue;
        }
        let low = (min / sample).floor();
        let high = (max / sample).ceil();
        let extent = (high - low) * sample;
        if !extent.is_finite() || extent > MAX_SURFACE_EXTENT as f64 {
            return Err(malformed(format!(
                "bad surface extents: {} texels on axis {}, limit {}",
                extent, axis, MAX_SURFACE_EXTENT
            )));
        }
        let texture_min = low * sample;
        if texture_min < i32::MIN as f64 || texture_min > i32::MAX as f64 {
            return Err(malformed(format!(
                "texture offset {} on axis {} is out of range",
                texture_min, axis
            )));
        }
        texture_mins[axis] = texture_min as i32;
        lightmap_size[axis] = (high - low) as u32 + 1;
    }

    Ok(SurfaceExtents {
        texture_mins,
        lightmap_size,
    })
}

fn malformed(reason: String) -> RenderError {
    RenderError::MalformedLevel { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsp::{sample_quad_level, Edge};

    #[test]
    fn test_polygon_follows_edge_direction() {
        let level = BspLevel {
            vertices: vec![[0.0; 3], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]],
            edges: vec![
                Edge { vertices: [0, 0] },
                Edge { vertices: [0, 1] },
                Edge { vertices: [2, 1] },
                Edge { vertices: [2, 0] },
            ],
            surface_edges: vec![1, -2, 3],
            ..Default::default()
        };
        let face = Face {
            first_edge: 0,
            edge_count: 3,
            texture_info: 0,
            styles: [0, 255, 255, 255],
            light_offset: 0,
        };
        let polygon = face_polygon(&level, &face).unwrap();
        assert_eq!(polygon, vec![[0.0; 3], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]]);
    }

    #[test]
    fn test_out_of_range_edges_are_malformed() {
        let mut level = sample_quad_level();
        level.faces[0].edge_count = 40;
        let result = face_polygon(&level, &level.faces[0]);
        assert!(matches!(result, Err(RenderError::MalformedLevel { .. })));
    }

    #[test]
    fn test_extents_round_outwards() {
        let extents = surface_extents(&[[100.0, -50.0], [200.0, 30.0]]).unwrap();
        assert_eq!(extents.texture_mins, [96, -64]);
        // (13 - 6) + 1 and (2 - -4) + 1 samples
        assert_eq!(extents.lightmap_size, [8, 7]);
    }

    #[test]
    fn test_extents_limit_is_256_texels() {
        let widest = surface_extents(&[[-128.0, 0.0], [128.0, 256.0]]).unwrap();
        assert_eq!(widest.lightmap_size, [17, 17]);

        // Unaligned, so the span rounds out to 272 texels
        let result = surface_extents(&[[8.0, 0.0], [264.0, 16.0]]);
        assert!(matches!(result, Err(RenderError::MalformedLevel { .. })));

        let result = surface_extents(&[[0.0, 0.0], [2.0e6, 2.0e6]]);
        assert!(matches!(result, Err(RenderError::MalformedLevel { .. })));
    }

    #[test]
    fn test_extents_reject_unrepresentable_offsets() {
        let result = surface_extents(&[[1.0e12, 0.0], [1.0e12 + 32.0, 16.0]]);
        assert!(matches!(result, Err(RenderError::MalformedLevel { .. })));

        let result = surface_extents(&[[f64::INFINITY, 0.0], [0.0, 16.0]]);
        assert!(matches!(result, Err(RenderError::MalformedLevel { .. })));
    }

    #[test]
    fn test_texture_coordinates_include_offset() {
        let info = TextureInfo {
            s: [1.0, 0.0, 0.0, 8.0],
            t: [0.0, -1.0, 0.0, 0.0],
            texture: 0,
            flags: 0,
        };
        assert_eq!(texture_coordinates(&info, [4.0, 10.0, 99.0]), [12.0, -10.0]);
    }
}
