//! Fixed constants of the indexed-colour pipeline

/// Edge length of both atlases in texels
pub const ATLAS_SIZE: u32 = 1024;

/// Colormap lookup: 256 colour indices by 64 light levels, one byte each
pub const COLORMAP_PATH: &str = "gfx/colormap.lmp";
pub const COLORMAP_WIDTH: u32 = 256;
pub const COLORMAP_HEIGHT: u32 = 64;

/// Palette lookup: 256 RGB entries laid out as a 16x16 texture
pub const PALETTE_PATH: &str = "gfx/palette.lmp";
pub const PALETTE_WIDTH: u32 = 16;
pub const PALETTE_HEIGHT: u32 = 16;

/// Fixed texture unit assignment used by every frame
pub mod texture_units {
    pub const PALETTE: u32 = 0;
    pub const COLORMAP: u32 = 1;
    pub const DIFFUSE_ATLAS: u32 = 2;
    pub const LIGHTMAP_ATLAS: u32 = 3;
}

/// Motion is expressed per tick of this reference rate
pub const REFERENCE_TICK_HZ: u32 = 60;

/// World units travelled per reference tick while moving
pub const DEFAULT_MOVE_SPEED: f64 = 5.0;

/// Vertical field of view in degrees
pub const DEFAULT_FOV_DEGREES: f32 = 75.0;
pub const DEFAULT_NEAR_PLANE: f32 = 0.1;
pub const DEFAULT_FAR_PLANE: f32 = 10000.0;

/// Spawn point and orientation of the free-fly camera
pub const DEFAULT_CAMERA_POSITION: [f64; 3] = [504.0, 401.0, 75.0];
pub const DEFAULT_CAMERA_YAW: f64 = 0.0;
pub const DEFAULT_CAMERA_PITCH: f64 = std::f64::consts::PI;

/// Upper bound on a single frame step, in reference ticks (250 ms)
pub const DEFAULT_MAX_FRAME_TICKS: f64 = 15.0;

/// Light styles: count, animation rate, and the pattern level that means 1.0
pub const MAX_LIGHT_STYLES: usize = 64;
pub const LIGHT_STYLE_HZ: f64 = 10.0;
pub const LIGHT_STYLE_NORMAL: u8 = b'm';

/// Lightmap samples cover this many texels of surface texture
pub const LIGHTMAP_SAMPLE_SIZE: f32 = 16.0;

/// Widest lit surface along either texture axis, in texels (17 samples)
pub const MAX_SURFACE_EXTENT: f32 = 256.0;

/// A face style slot with this value is unused
pub const NO_LIGHT_STYLE: u8 = 255;

/// Light level that leaves colours unshaded (colour map row 32)
pub const UNSHADED_LIGHT_LEVEL: f32 = 0.5;
