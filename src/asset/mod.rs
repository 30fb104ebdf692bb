//! Asset archive seam
//!
//! The archive format itself lives outside this crate; the renderer only
//! needs whole-entry reads by path.

use crate::constants::{COLORMAP_HEIGHT, COLORMAP_PATH, COLORMAP_WIDTH, PALETTE_PATH};
use crate::error::{RenderError, RenderResult};
use rustc_hash::FxHashMap;

/// Read access to a game asset archive
pub trait AssetArchive {
    /// Read a whole entry. A missing entry is an [`RenderError::AssetLoad`].
    fn read(&self, path: &str) -> RenderResult<Vec<u8>>;
}

/// Archive held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    entries: FxHashMap<String, Vec<u8>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, data: Vec<u8>) {
        self.entries.insert(path.into(), data);
    }

    pub fn with_entry(mut self, path: impl Into<String>, data: Vec<u8>) -> Self {
        self.insert(path, data);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AssetArchive for MemoryArchive {
    fn read(&self, path: &str) -> RenderResult<Vec<u8>> {
        self.entries
            .get(path)
            .cloned()
            .ok_or_else(|| RenderError::AssetLoad {
                path: path.to_string(),
            })
    }
}

/// Archive holding a grey-ramp palette and a linear colour map
///
/// Palette index `i` is grey `i`. Colour map row 32 is the identity, lower
/// rows brighten and higher rows darken towards black, the same layout as
/// the game's own tables. The colour map carries one trailing byte like
/// the game's `colormap.lmp`.
pub fn sample_archive() -> MemoryArchive {
    let palette: Vec<u8> = (0..=255u8).flat_map(|i| [i, i, i]).collect();

    let mut colour_map = Vec::with_capacity((COLORMAP_WIDTH * COLORMAP_HEIGHT) as usize + 1);
    for row in 0..COLORMAP_HEIGHT {
        for index in 0..COLORMAP_WIDTH {
            let shaded = index * (64 - row) / 32;
            colour_map.push(shaded.min(255) as u8);
        }
    }
    colour_map.push(0);

    MemoryArchive::new()
        .with_entry(PALETTE_PATH, palette)
        .with_entry(COLORMAP_PATH, colour_map)
}

impl<A: AssetArchive + ?Sized> AssetArchive for &A {
    fn read(&self, path: &str) -> RenderResult<Vec<u8>> {
        (**self).read(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_existing_entry() {
        let archive = MemoryArchive::new().with_entry("gfx/palette.lmp", vec![1, 2, 3]);
        assert_eq!(archive.read("gfx/palette.lmp").unwrap(), vec![1, 2, 3]);
        assert_eq!(archive.len(), 1);
    }

    #[test]
    fn test_sample_archive_tables() {
        let archive = sample_archive();
        let palette = archive.read(PALETTE_PATH).unwrap();
        assert_eq!(palette.len(), 768);
        assert_eq!(&palette[3 * 200..3 * 201], &[200, 200, 200]);

        let colour_map = archive.read(COLORMAP_PATH).unwrap();
        assert_eq!(colour_map.len(), 256 * 64 + 1);
        // Row 32 leaves indices unchanged
        assert_eq!(colour_map[32 * 256 + 77], 77);
        assert_eq!(colour_map[63 * 256 + 255], 7);
    }

    #[test]
    fn test_missing_entry_names_path() {
        let archive = MemoryArchive::new();
        match archive.read("gfx/colormap.lmp") {
            Err(RenderError::AssetLoad { path }) => assert_eq!(path, "gfx/colormap.lmp"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
