//! Graphics seam - GL-shaped, synchronous calls
//!
//! The renderer talks to the GPU only through [`GraphicsContext`]. Calls are
//! submissions to a command stream that is flushed at frame end, so state
//! set here (bound units, enabled attributes, capabilities) persists until
//! changed, exactly like a GL context.
//!
//! - recording.rs: headless context that records every call
//! - wgpu_context.rs: GL state machine emulated on wgpu
//! - program_interface.rs: attribute/uniform reflection of WGSL sources

pub mod program_interface;
pub mod recording;
pub mod wgpu_context;

pub use program_interface::{ProgramInterface, UniformInfo, UniformKind};
pub use recording::{GlCall, RecordingContext};
pub use wgpu_context::WgpuContext;

use crate::error::RenderResult;

/// Handle to a texture object owned by a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// Handle to a vertex buffer owned by a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

/// Handle to a linked program owned by a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

/// Shader input location of a vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeLocation(pub u32);

/// Binding slot of a uniform, texture or sampler global
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniformLocation(pub u32);

/// Pixel layout of texture data handed to a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// One byte per texel
    Luminance,
    /// Three bytes per texel
    Rgb,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Luminance => 1,
            PixelFormat::Rgb => 3,
        }
    }
}

/// Sampling filter of a texture object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    #[default]
    Nearest,
    Linear,
}

/// Everything needed to allocate and fill a texture
#[derive(Debug, Clone, Copy)]
pub struct TextureDescriptor<'a> {
    pub label: &'a str,
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub filter: FilterMode,
}

impl TextureDescriptor<'_> {
    /// Number of bytes a full upload requires
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

/// Toggleable pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    DepthTest,
    CullFace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullFace {
    #[default]
    Back,
    Front,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    #[default]
    CounterClockwise,
    Clockwise,
}

/// Buffers affected by a clear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClearFlags {
    pub color: bool,
    pub depth: bool,
}

impl ClearFlags {
    pub const COLOR_AND_DEPTH: ClearFlags = ClearFlags {
        color: true,
        depth: true,
    };
}

/// Component layout of one vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttribFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
}

impl AttribFormat {
    pub fn size_bytes(self) -> u32 {
        match self {
            AttribFormat::Float32 => 4,
            AttribFormat::Float32x2 => 8,
            AttribFormat::Float32x3 => 12,
            AttribFormat::Float32x4 => 16,
        }
    }
}

/// Source of an enabled attribute: buffer plus layout within it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttribPointer {
    pub buffer: BufferHandle,
    pub format: AttribFormat,
    pub stride: u32,
    pub offset: u32,
}

/// The graphics component consumed by the renderer core.
///
/// Resource creation can fail and reports through [`RenderResult`]. Every
/// per-frame call is infallible; a context that hits trouble logs it and
/// drops the affected work, the way a GL error flag would.
pub trait GraphicsContext {
    // Resources
    fn create_texture(&mut self, desc: &TextureDescriptor<'_>) -> RenderResult<TextureHandle>;

    /// Overwrite a sub-rectangle of an existing texture; `data` is tightly
    /// packed in the texture's pixel format.
    fn write_texture_region(
        &mut self,
        texture: TextureHandle,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> RenderResult<()>;

    fn delete_texture(&mut self, texture: TextureHandle);

    fn create_vertex_buffer(&mut self, label: &str, data: &[u8]) -> RenderResult<BufferHandle>;

    fn delete_buffer(&mut self, buffer: BufferHandle);

    /// Compile and link a program whose interface was already reflected
    fn compile_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
        interface: &ProgramInterface,
    ) -> RenderResult<ProgramHandle>;

    /// Release a program; unbinds it when it is current
    fn delete_program(&mut self, program: ProgramHandle);

    // Frame state
    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32);
    fn clear_color(&mut self, rgba: [f32; 4]);
    fn clear(&mut self, flags: ClearFlags);
    fn use_program(&mut self, program: ProgramHandle);
    fn uniform_matrix4(&mut self, location: UniformLocation, matrix: &[[f32; 4]; 4]);
    fn uniform_int(&mut self, location: UniformLocation, value: i32);
    fn uniform_floats(&mut self, location: UniformLocation, values: &[f32]);
    fn active_texture(&mut self, unit: u32);
    fn bind_texture(&mut self, texture: TextureHandle);
    fn enable(&mut self, capability: Capability);
    fn disable(&mut self, capability: Capability);
    fn cull_face(&mut self, face: CullFace);
    fn front_face(&mut self, winding: FrontFace);
    fn enable_vertex_attrib(&mut self, location: AttributeLocation);
    fn disable_vertex_attrib(&mut self, location: AttributeLocation);

    // Drawing
    fn bind_vertex_buffer(&mut self, buffer: BufferHandle);

    /// Source `location` from the currently bound vertex buffer
    fn vertex_attrib_pointer(
        &mut self,
        location: AttributeLocation,
        format: AttribFormat,
        stride: u32,
        offset: u32,
    );

    fn draw_triangles(&mut self, first_vertex: u32, vertex_count: u32);
    fn flush(&mut self);
}

/// Check a sub-rectangle against texture bounds and its data length
pub(crate) fn validate_region(
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    bounds: (u32, u32),
    format: PixelFormat,
    data_len: usize,
) -> RenderResult<()> {
    let (bounds_width, bounds_height) = bounds;
    let fits_x = x.checked_add(width).is_some_and(|end| end <= bounds_width);
    let fits_y = y.checked_add(height).is_some_and(|end| end <= bounds_height);
    if !fits_x || !fits_y {
        return Err(crate::error::RenderError::RegionOutOfBounds {
            x,
            y,
            width,
            height,
            bounds_width,
            bounds_height,
        });
    }

    let expected = width as usize * height as usize * format.bytes_per_pixel();
    if data_len < expected {
        return Err(crate::error::RenderError::TextureDataSize {
            expected,
            found: data_len,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;

    #[test]
    fn test_region_inside_bounds() {
        assert!(validate_region(0, 0, 16, 16, (16, 16), PixelFormat::Luminance, 256).is_ok());
        assert!(validate_region(8, 4, 8, 12, (16, 16), PixelFormat::Rgb, 8 * 12 * 3).is_ok());
    }

    #[test]
    fn test_region_outside_bounds() {
        let result = validate_region(10, 0, 8, 1, (16, 16), PixelFormat::Luminance, 8);
        assert!(matches!(result, Err(RenderError::RegionOutOfBounds { .. })));

        let result = validate_region(0, u32::MAX, 1, 2, (16, 16), PixelFormat::Luminance, 2);
        assert!(matches!(result, Err(RenderError::RegionOutOfBounds { .. })));
    }

    #[test]
    fn test_region_short_data() {
        let result = validate_region(0, 0, 4, 4, (16, 16), PixelFormat::Rgb, 47);
        assert!(matches!(
            result,
            Err(RenderError::TextureDataSize {
                expected: 48,
                found: 47
            })
        ));
    }
}
