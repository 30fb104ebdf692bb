//! Headless graphics context
//!
//! Records every call in order, keeps CPU copies of texture contents and
//! enforces the draw-time contract: a draw is only accepted when a program
//! is bound and every attribute it declares is enabled and sourced from a
//! live buffer.

use super::{
    validate_region, AttribFormat, AttribPointer, AttributeLocation, BufferHandle, Capability,
    ClearFlags, CullFace, FilterMode, FrontFace, GraphicsContext, PixelFormat, ProgramHandle,
    ProgramInterface, TextureDescriptor, TextureHandle, UniformLocation,
};
use crate::error::{RenderError, RenderResult};
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};

/// One recorded call
#[derive(Debug, Clone, PartialEq)]
pub enum GlCall {
    CreateTexture {
        texture: TextureHandle,
        width: u32,
        height: u32,
        format: PixelFormat,
        filter: FilterMode,
    },
    WriteTextureRegion {
        texture: TextureHandle,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    DeleteTexture(TextureHandle),
    CreateBuffer {
        buffer: BufferHandle,
        len: usize,
    },
    DeleteBuffer(BufferHandle),
    CompileProgram(ProgramHandle),
    DeleteProgram(ProgramHandle),
    Viewport {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    ClearColor([f32; 4]),
    Clear(ClearFlags),
    UseProgram(ProgramHandle),
    UniformMatrix4(UniformLocation, [[f32; 4]; 4]),
    UniformInt(UniformLocation, i32),
    UniformFloats(UniformLocation, Vec<f32>),
    ActiveTexture(u32),
    BindTexture(TextureHandle),
    Enable(Capability),
    Disable(Capability),
    CullFace(CullFace),
    FrontFace(FrontFace),
    EnableVertexAttrib(AttributeLocation),
    DisableVertexAttrib(AttributeLocation),
    BindVertexBuffer(BufferHandle),
    VertexAttribPointer {
        location: AttributeLocation,
        format: AttribFormat,
        stride: u32,
        offset: u32,
    },
    DrawTriangles {
        first_vertex: u32,
        vertex_count: u32,
    },
    Flush,
}

#[derive(Debug, Clone)]
pub struct RecordedTexture {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub filter: FilterMode,
    pub data: Vec<u8>,
}

/// Context that performs no GPU work
#[derive(Debug, Default)]
pub struct RecordingContext {
    calls: Vec<GlCall>,
    paused: bool,
    next_id: u32,

    textures: FxHashMap<TextureHandle, RecordedTexture>,
    buffers: FxHashMap<BufferHandle, usize>,
    programs: FxHashMap<ProgramHandle, ProgramInterface>,

    current_program: Option<ProgramHandle>,
    active_unit: u32,
    unit_bindings: BTreeMap<u32, TextureHandle>,
    bound_buffer: Option<BufferHandle>,
    enabled_attributes: BTreeSet<AttributeLocation>,
    attribute_pointers: FxHashMap<AttributeLocation, AttribPointer>,
    capabilities: BTreeSet<CapabilityKey>,

    accepted_draws: usize,
    rejected_draws: usize,
}

// Capability is not Ord; keep the set ordered for stable debug output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum CapabilityKey {
    DepthTest,
    CullFace,
}

impl From<Capability> for CapabilityKey {
    fn from(capability: Capability) -> Self {
        match capability {
            Capability::DepthTest => CapabilityKey::DepthTest,
            Capability::CullFace => CapabilityKey::CullFace,
        }
    }
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[GlCall] {
        &self.calls
    }

    /// Drain the call log, keeping all resources and state.
    ///
    /// The log grows by every call made, so a long-running dry run drains it
    /// once per frame or turns recording off.
    pub fn take_calls(&mut self) -> Vec<GlCall> {
        std::mem::take(&mut self.calls)
    }

    /// Stop or resume appending to the call log. Resources, bindings and
    /// draw validation keep working while recording is off.
    pub fn set_recording(&mut self, enabled: bool) {
        self.paused = !enabled;
    }

    pub fn is_recording(&self) -> bool {
        !self.paused
    }

    pub fn texture(&self, texture: TextureHandle) -> Option<&RecordedTexture> {
        self.textures.get(&texture)
    }

    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_program_count(&self) -> usize {
        self.programs.len()
    }

    pub fn is_enabled(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability.into())
    }

    pub fn enabled_attributes(&self) -> Vec<AttributeLocation> {
        self.enabled_attributes.iter().copied().collect()
    }

    pub fn unit_binding(&self, unit: u32) -> Option<TextureHandle> {
        self.unit_bindings.get(&unit).copied()
    }

    pub fn accepted_draws(&self) -> usize {
        self.accepted_draws
    }

    pub fn rejected_draws(&self) -> usize {
        self.rejected_draws
    }

    fn record(&mut self, call: GlCall) {
        if !self.paused {
            self.calls.push(call);
        }
    }

    fn next_handle(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn draw_is_valid(&self) -> Result<(), String> {
        let program = self
            .current_program
            .ok_or_else(|| "no program bound".to_string())?;
        let interface = self
            .programs
            .get(&program)
            .ok_or_else(|| format!("program {} was never compiled", program.0))?;

        for attribute in &interface.attributes {
            if !self.enabled_attributes.contains(&attribute.location) {
                return Err(format!("attribute '{}' is not enabled", attribute.name));
            }
            let pointer = self
                .attribute_pointers
                .get(&attribute.location)
                .ok_or_else(|| format!("attribute '{}' has no source", attribute.name))?;
            if !self.buffers.contains_key(&pointer.buffer) {
                return Err(format!(
                    "attribute '{}' points at deleted buffer {}",
                    attribute.name, pointer.buffer.0
                ));
            }
        }
        Ok(())
    }
}

impl GraphicsContext for RecordingContext {
    fn create_texture(&mut self, desc: &TextureDescriptor<'_>) -> RenderResult<TextureHandle> {
        let expected = desc.expected_len();
        if desc.data.len() < expected {
            return Err(RenderError::TextureDataSize {
                expected,
                found: desc.data.len(),
            });
        }

        let texture = TextureHandle(self.next_handle());
        self.textures.insert(
            texture,
            RecordedTexture {
                width: desc.width,
                height: desc.height,
                format: desc.format,
                filter: desc.filter,
                data: desc.data[..expected].to_vec(),
            },
        );
        self.record(GlCall::CreateTexture {
            texture,
            width: desc.width,
            height: desc.height,
            format: desc.format,
            filter: desc.filter,
        });
        Ok(texture)
    }

    fn write_texture_region(
        &mut self,
        texture: TextureHandle,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> RenderResult<()> {
        let target = self
            .textures
            .get_mut(&texture)
            .ok_or_else(|| RenderError::UnknownResource {
                resource_type: "texture".to_string(),
                id: texture.0,
            })?;
        validate_region(
            x,
            y,
            width,
            height,
            (target.width, target.height),
            target.format,
            data.len(),
        )?;

        let bpp = target.format.bytes_per_pixel();
        let row_len = width as usize * bpp;
        for row in 0..height as usize {
            let src = &data[row * row_len..(row + 1) * row_len];
            let dst_start = ((y as usize + row) * target.width as usize + x as usize) * bpp;
            target.data[dst_start..dst_start + row_len].copy_from_slice(src);
        }

        self.record(GlCall::WriteTextureRegion {
            texture,
            x,
            y,
            width,
            height,
        });
        Ok(())
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
        self.unit_bindings.retain(|_, bound| *bound != texture);
        self.record(GlCall::DeleteTexture(texture));
    }

    fn create_vertex_buffer(&mut self, _label: &str, data: &[u8]) -> RenderResult<BufferHandle> {
        let buffer = BufferHandle(self.next_handle());
        self.buffers.insert(buffer, data.len());
        self.record(GlCall::CreateBuffer {
            buffer,
            len: data.len(),
        });
        Ok(buffer)
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
        if self.bound_buffer == Some(buffer) {
            self.bound_buffer = None;
        }
        self.record(GlCall::DeleteBuffer(buffer));
    }

    fn compile_program(
        &mut self,
        _vertex_source: &str,
        _fragment_source: &str,
        interface: &ProgramInterface,
    ) -> RenderResult<ProgramHandle> {
        let program = ProgramHandle(self.next_handle());
        self.programs.insert(program, interface.clone());
        self.record(GlCall::CompileProgram(program));
        Ok(program)
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
        if self.current_program == Some(program) {
            self.current_program = None;
        }
        self.record(GlCall::DeleteProgram(program));
    }

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.record(GlCall::Viewport {
            x,
            y,
            width,
            height,
        });
    }

    fn clear_color(&mut self, rgba: [f32; 4]) {
        self.record(GlCall::ClearColor(rgba));
    }

    fn clear(&mut self, flags: ClearFlags) {
        self.record(GlCall::Clear(flags));
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.current_program = Some(program);
        self.record(GlCall::UseProgram(program));
    }

    fn uniform_matrix4(&mut self, location: UniformLocation, matrix: &[[f32; 4]; 4]) {
        self.record(GlCall::UniformMatrix4(location, *matrix));
    }

    fn uniform_int(&mut self, location: UniformLocation, value: i32) {
        self.record(GlCall::UniformInt(location, value));
    }

    fn uniform_floats(&mut self, location: UniformLocation, values: &[f32]) {
        self.record(GlCall::UniformFloats(location, values.to_vec()));
    }

    fn active_texture(&mut self, unit: u32) {
        self.active_unit = unit;
        self.record(GlCall::ActiveTexture(unit));
    }

    fn bind_texture(&mut self, texture: TextureHandle) {
        self.unit_bindings.insert(self.active_unit, texture);
        self.record(GlCall::BindTexture(texture));
    }

    fn enable(&mut self, capability: Capability) {
        self.capabilities.insert(capability.into());
        self.record(GlCall::Enable(capability));
    }

    fn disable(&mut self, capability: Capability) {
        self.capabilities.remove(&capability.into());
        self.record(GlCall::Disable(capability));
    }

    fn cull_face(&mut self, face: CullFace) {
        self.record(GlCall::CullFace(face));
    }

    fn front_face(&mut self, winding: FrontFace) {
        self.record(GlCall::FrontFace(winding));
    }

    fn enable_vertex_attrib(&mut self, location: AttributeLocation) {
        self.enabled_attributes.insert(location);
        self.record(GlCall::EnableVertexAttrib(location));
    }

    fn disable_vertex_attrib(&mut self, location: AttributeLocation) {
        self.enabled_attributes.remove(&location);
        self.record(GlCall::DisableVertexAttrib(location));
    }

    fn bind_vertex_buffer(&mut self, buffer: BufferHandle) {
        self.bound_buffer = Some(buffer);
        self.record(GlCall::BindVertexBuffer(buffer));
    }

    fn vertex_attrib_pointer(
        &mut self,
        location: AttributeLocation,
        format: AttribFormat,
        stride: u32,
        offset: u32,
    ) {
        match self.bound_buffer {
            Some(buffer) => {
                self.attribute_pointers.insert(
                    location,
                    AttribPointer {
                        buffer,
                        format,
                        stride,
                        offset,
                    },
                );
            }
            None => log::warn!(
                "[RecordingContext::vertex_attrib_pointer] No buffer bound for attribute {}",
                location.0
            ),
        }
        self.record(GlCall::VertexAttribPointer {
            location,
            format,
            stride,
            offset,
        });
    }

    fn draw_triangles(&mut self, first_vertex: u32, vertex_count: u32) {
        match self.draw_is_valid() {
            Ok(()) => self.accepted_draws += 1,
            Err(reason) => {
                log::warn!("[RecordingContext::draw_triangles] Draw rejected: {}", reason);
                self.rejected_draws += 1;
            }
        }
        self.record(GlCall::DrawTriangles {
            first_vertex,
            vertex_count,
        });
    }

    fn flush(&mut self) {
        self.record(GlCall::Flush);
    }
}
