//! Generated levels
//!
//! Small, valid levels built in memory so the renderer can be exercised
//! without a game archive.

use super::{surface_extents, texture_coordinates, BspLevel, Edge, Face, MipTexture, TextureInfo};
use crate::constants::NO_LIGHT_STYLE;

/// Incrementally assembles a [`BspLevel`]
///
/// Faces are given as polygons wound clockwise when seen from the side
/// they face. Every other edge is stored reversed and referenced with a
/// negative index, so both walk directions are present.
#[derive(Debug)]
pub struct LevelBuilder {
    level: BspLevel,
}

impl Default for LevelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LevelBuilder {
    pub fn new() -> Self {
        Self {
            level: BspLevel {
                // Edge 0 is never referenced
                edges: vec![Edge { vertices: [0, 0] }],
                ..Default::default()
            },
        }
    }

    /// Add an indexed-colour texture; returns its index
    pub fn add_texture(&mut self, name: &str, width: u32, height: u32, pixels: Vec<u8>) -> u32 {
        self.level.textures.push(Some(MipTexture {
            name: name.to_string(),
            width,
            height,
            pixels,
        }));
        (self.level.textures.len() - 1) as u32
    }

    /// Reserve a texture slot whose data is missing
    pub fn add_missing_texture(&mut self) -> u32 {
        self.level.textures.push(None);
        (self.level.textures.len() - 1) as u32
    }

    /// Add a face. With a style, a lightmap is generated by `sample` from
    /// the (s, t) sample index; without one the face is unlit.
    pub fn add_face(
        &mut self,
        polygon: &[[f32; 3]],
        texture: u32,
        s: [f32; 4],
        t: [f32; 4],
        style: Option<u8>,
        sample: impl Fn(u32, u32) -> u8,
    ) -> usize {
        let texture_info = TextureInfo {
            s,
            t,
            texture,
            flags: 0,
        };
        self.level.texture_infos.push(texture_info);

        let first_vertex = self.level.vertices.len() as u32;
        self.level.vertices.extend_from_slice(polygon);

        let first_edge = self.level.surface_edges.len() as u32;
        let count = polygon.len() as u32;
        for i in 0..count {
            let a = first_vertex + i;
            let b = first_vertex + (i + 1) % count;
            let index = self.level.edges.len() as i32;
            if i % 2 == 0 {
                self.level.edges.push(Edge { vertices: [a, b] });
                self.level.surface_edges.push(index);
            } else {
                self.level.edges.push(Edge { vertices: [b, a] });
                self.level.surface_edges.push(-index);
            }
        }

        let (styles, light_offset) = match style {
            Some(style) => {
                let coordinates: Vec<[f64; 2]> = polygon
                    .iter()
                    .map(|&point| texture_coordinates(&texture_info, point))
                    .collect();
                // Oversized faces get no samples; the level is malformed either way
                let [width, height] = surface_extents(&coordinates)
                    .map(|extents| extents.lightmap_size)
                    .unwrap_or([0, 0]);
                let offset = self.level.lighting.len() as i32;
                for row in 0..height {
                    for column in 0..width {
                        self.level.lighting.push(sample(column, row));
                    }
                }
                ([style, NO_LIGHT_STYLE, NO_LIGHT_STYLE, NO_LIGHT_STYLE], offset)
            }
            None => ([NO_LIGHT_STYLE; 4], -1),
        };

        self.level.faces.push(Face {
            first_edge,
            edge_count: count,
            texture_info: (self.level.texture_infos.len() - 1) as u32,
            styles,
            light_offset,
        });
        self.level.faces.len() - 1
    }

    pub fn build(self) -> BspLevel {
        self.level
    }
}

/// Two-colour checker of 4x4 texel squares
pub fn checker_pixels(size: u32, a: u8, b: u8) -> Vec<u8> {
    (0..size * size)
        .map(|i| if ((i % size) / 4 + (i / size) / 4) % 2 == 0 { a } else { b })
        .collect()
}

/// One 64x64 floor quad at z = 0, facing up, lit at normal brightness
pub fn sample_quad_level() -> BspLevel {
    let mut builder = LevelBuilder::new();
    let floor = builder.add_texture("floor", 16, 16, checker_pixels(16, 20, 40));
    builder.add_face(
        &[
            [0.0, 0.0, 0.0],
            [0.0, 64.0, 0.0],
            [64.0, 64.0, 0.0],
            [64.0, 0.0, 0.0],
        ],
        floor,
        [1.0, 0.0, 0.0, 0.0],
        [0.0, -1.0, 0.0, 0.0],
        Some(0),
        |_, _| 128,
    );
    builder.build()
}

/// Closed cube centred on the origin with every face pointing inwards
///
/// The ceiling is sky and therefore unshaded; one wall uses the flicker
/// style and one face is unlit. Textures map one texel per unit, so a
/// `half_extent` above 128 makes faces too wide to lightmap.
pub fn sample_room_level(half_extent: f32) -> BspLevel {
    let h = half_extent;
    let mut builder = LevelBuilder::new();
    let floor = builder.add_texture("floor", 16, 16, checker_pixels(16, 20, 40));
    let wall = builder.add_texture("wall", 32, 32, checker_pixels(32, 90, 110));
    let sky = builder.add_texture("sky1", 16, 16, checker_pixels(16, 200, 210));

    // (normal axis, normal sign, u axis, v axis) with u x v pointing inwards
    let sides: [(usize, f32, usize, usize, u32, Option<u8>); 6] = [
        (2, 1.0, 0, 1, floor, Some(0)),
        (2, -1.0, 1, 0, sky, Some(0)),
        (0, 1.0, 1, 2, wall, Some(1)),
        (0, -1.0, 2, 1, wall, Some(0)),
        (1, 1.0, 2, 0, wall, Some(0)),
        (1, -1.0, 0, 2, wall, None),
    ];

    for (normal, sign, u, v, texture, style) in sides {
        let corner = |du: f32, dv: f32| {
            let mut point = [0.0f32; 3];
            point[normal] = -sign * h;
            point[u] = du * h;
            point[v] = dv * h;
            point
        };
        let polygon = [
            corner(-1.0, -1.0),
            corner(-1.0, 1.0),
            corner(1.0, 1.0),
            corner(1.0, -1.0),
        ];

        let mut s = [0.0f32; 4];
        s[u] = 1.0;
        let mut t = [0.0f32; 4];
        t[v] = -1.0;

        builder.add_face(&polygon, texture, s, t, style, |column, row| {
            (64 + (column * 7 + row * 5) % 128) as u8
        });
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsp::face_polygon;

    #[test]
    fn test_quad_level_shape() {
        let level = sample_quad_level();
        assert_eq!(level.faces.len(), 1);
        assert_eq!(level.edges.len(), 5);
        // 64 texels per side is 4 samples plus the trailing edge
        assert_eq!(level.lighting.len(), 25);
        assert!(level.faces[0].has_lightmap());

        let polygon = face_polygon(&level, &level.faces[0]).unwrap();
        assert_eq!(polygon[1], [0.0, 64.0, 0.0]);
        assert_eq!(polygon[3], [64.0, 0.0, 0.0]);
    }

    #[test]
    fn test_room_level_faces() {
        let level = sample_room_level(128.0);
        assert_eq!(level.faces.len(), 6);
        assert_eq!(level.faces.iter().filter(|face| face.has_lightmap()).count(), 5);
        for face in &level.faces {
            assert_eq!(face_polygon(&level, face).unwrap().len(), 4);
        }
    }
}
