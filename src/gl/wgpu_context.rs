//! GL state machine on wgpu
//!
//! Calls mutate a GL-style state block. Each draw snapshots that state into
//! a cached render pipeline plus a bind group and is queued; `flush` replays
//! the queue into a single render pass against the attached colour target
//! and submits it.
//!
//! Uniforms are individually bound globals in bind group 0. A texture global
//! is fed from the texture unit its uniform int names, filtered by the
//! sampler of the texture object bound there (GL keeps filtering on the
//! texture, not the sampler slot).

use super::{
    validate_region, AttribFormat, AttribPointer, AttributeLocation, BufferHandle, Capability,
    ClearFlags, CullFace, FilterMode, FrontFace, GraphicsContext, PixelFormat, ProgramHandle,
    ProgramInterface, TextureDescriptor, TextureHandle, UniformKind, UniformLocation,
};
use crate::error::{RenderError, RenderResult};
use rustc_hash::FxHashMap;
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::sync::Arc;
use wgpu::util::DeviceExt;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    width: u32,
    height: u32,
    format: PixelFormat,
}

struct GpuProgram {
    interface: ProgramInterface,
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    /// Raw bytes of buffer uniforms, as last set
    uniform_values: FxHashMap<UniformLocation, Vec<u8>>,
    /// Texture unit each texture uniform samples from
    texture_units: FxHashMap<UniformLocation, u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct VertexSlotKey {
    stride: u32,
    attributes: Vec<(AttributeLocation, AttribFormat, u32)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramHandle,
    slots: Vec<VertexSlotKey>,
    depth_test: bool,
    cull: Option<CullFace>,
    front_face: FrontFace,
}

#[derive(Debug, Clone, Copy)]
struct Viewport {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
}

/// A GL viewport placed on a wgpu pass, both rects top-left based
#[derive(Debug, Clone, Copy, PartialEq)]
struct PassViewport {
    rect: [f32; 4],
    scissor: [u32; 4],
}

/// Convert a bottom-left GL viewport to pass coordinates on a
/// `width` x `height` target.
///
/// The scissor is the part of the viewport that lands on the target; `None`
/// when nothing does. A viewport inside the target keeps its exact transform.
/// wgpu rejects viewport rects that leave the target, so an overhanging one
/// is reduced to its visible part.
fn pass_viewport(viewport: Viewport, width: u32, height: u32) -> Option<PassViewport> {
    let left = viewport.x as i64;
    let right = left + viewport.width as i64;
    let bottom = height as i64 - viewport.y as i64;
    let top = bottom - viewport.height as i64;

    let clip_left = left.clamp(0, width as i64);
    let clip_right = right.clamp(0, width as i64);
    let clip_top = top.clamp(0, height as i64);
    let clip_bottom = bottom.clamp(0, height as i64);
    if clip_right <= clip_left || clip_bottom <= clip_top {
        return None;
    }

    let scissor = [
        clip_left as u32,
        clip_top as u32,
        (clip_right - clip_left) as u32,
        (clip_bottom - clip_top) as u32,
    ];
    let inside = left >= 0 && top >= 0 && right <= width as i64 && bottom <= height as i64;
    let rect = if inside {
        [
            left as f32,
            top as f32,
            viewport.width as f32,
            viewport.height as f32,
        ]
    } else {
        scissor.map(|value| value as f32)
    };
    Some(PassViewport { rect, scissor })
}

#[derive(Default)]
struct GlState {
    program: Option<ProgramHandle>,
    active_unit: u32,
    units: FxHashMap<u32, TextureHandle>,
    bound_buffer: Option<BufferHandle>,
    enabled_attributes: BTreeSet<AttributeLocation>,
    pointers: FxHashMap<AttributeLocation, AttribPointer>,
    depth_test: bool,
    cull: bool,
    cull_face: CullFace,
    front_face: FrontFace,
    viewport: Option<Viewport>,
    clear_color: [f32; 4],
}

struct PendingDraw {
    pipeline: Arc<wgpu::RenderPipeline>,
    bind_group: usize,
    vertex_buffers: Vec<Arc<wgpu::Buffer>>,
    viewport: Option<Viewport>,
    first_vertex: u32,
    vertex_count: u32,
}

#[derive(Default)]
struct PendingFrame {
    clear_color: Option<wgpu::Color>,
    clear_depth: bool,
    draws: Vec<PendingDraw>,
    bind_groups: Vec<wgpu::BindGroup>,
    uniform_buffers: Vec<wgpu::Buffer>,
    /// Bind group reusable by the next draw while no binding state changed
    current_bind_group: Option<usize>,
}

impl PendingFrame {
    fn is_empty(&self) -> bool {
        self.draws.is_empty() && self.clear_color.is_none() && !self.clear_depth
    }
}

struct RenderTarget {
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

struct DepthTarget {
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

/// wgpu-backed graphics context
pub struct WgpuContext {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    color_format: wgpu::TextureFormat,
    next_id: u32,

    textures: FxHashMap<TextureHandle, GpuTexture>,
    buffers: FxHashMap<BufferHandle, Arc<wgpu::Buffer>>,
    programs: FxHashMap<ProgramHandle, GpuProgram>,
    pipelines: FxHashMap<PipelineKey, Arc<wgpu::RenderPipeline>>,

    state: GlState,
    frame: PendingFrame,
    target: Option<RenderTarget>,
    depth: Option<DepthTarget>,
}

impl WgpuContext {
    /// Create a context rendering into targets of `color_format`
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        color_format: wgpu::TextureFormat,
    ) -> Self {
        device.on_uncaptured_error(Box::new(|error| match error {
            wgpu::Error::OutOfMemory { .. } => {
                log::error!("[WgpuContext] GPU out of memory");
            }
            wgpu::Error::Validation { description, .. } => {
                log::error!("[WgpuContext] GPU validation error: {}", description);
            }
        }));

        Self {
            device,
            queue,
            color_format,
            next_id: 0,
            textures: FxHashMap::default(),
            buffers: FxHashMap::default(),
            programs: FxHashMap::default(),
            pipelines: FxHashMap::default(),
            state: GlState::default(),
            frame: PendingFrame::default(),
            target: None,
            depth: None,
        }
    }

    /// Attach the colour target for the next flush. The view must have the
    /// format this context was created with.
    pub fn attach_target(&mut self, view: wgpu::TextureView, width: u32, height: u32) {
        self.target = Some(RenderTarget {
            view,
            width,
            height,
        });
    }

    pub fn detach_target(&mut self) -> Option<wgpu::TextureView> {
        self.target.take().map(|target| target.view)
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    fn next_handle(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn invalidate_bindings(&mut self) {
        self.frame.current_bind_group = None;
    }

    fn current_program_mut(&mut self, caller: &str) -> Option<&mut GpuProgram> {
        let program = self.state.program;
        let found = program.and_then(|handle| self.programs.get_mut(&handle));
        if found.is_none() {
            log::warn!("[WgpuContext::{}] No program in use", caller);
        }
        found
    }

    fn ensure_depth(&mut self, width: u32, height: u32) {
        let matches = self
            .depth
            .as_ref()
            .is_some_and(|depth| depth.width == width && depth.height == height);
        if matches {
            return;
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Buffer"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        log::debug!(
            "[WgpuContext::ensure_depth] Depth buffer resized to {}x{}",
            width,
            height
        );
        self.depth = Some(DepthTarget {
            view,
            width,
            height,
        });
    }

    fn record_draw(&mut self, first_vertex: u32, vertex_count: u32) -> Result<(), String> {
        let program_handle = self.state.program.ok_or("no program in use")?;
        let program = self
            .programs
            .get(&program_handle)
            .ok_or_else(|| format!("program {} does not exist", program_handle.0))?;

        // Group the program's attributes by source buffer, one slot each
        let mut slots: Vec<(BufferHandle, VertexSlotKey)> = Vec::new();
        for attribute in &program.interface.attributes {
            if !self.state.enabled_attributes.contains(&attribute.location) {
                return Err(format!("attribute '{}' is not enabled", attribute.name));
            }
            let pointer = self
                .state
                .pointers
                .get(&attribute.location)
                .ok_or_else(|| format!("attribute '{}' has no source", attribute.name))?;

            let entry = (attribute.location, pointer.format, pointer.offset);
            match slots.iter_mut().find(|(buffer, _)| *buffer == pointer.buffer) {
                Some((_, slot)) if slot.stride == pointer.stride => slot.attributes.push(entry),
                Some(_) => {
                    return Err(format!(
                        "attribute '{}' uses a different stride within one buffer",
                        attribute.name
                    ))
                }
                None => slots.push((
                    pointer.buffer,
                    VertexSlotKey {
                        stride: pointer.stride,
                        attributes: vec![entry],
                    },
                )),
            }
        }

        let mut vertex_buffers = Vec::with_capacity(slots.len());
        for (buffer, _) in &slots {
            let gpu_buffer = self
                .buffers
                .get(buffer)
                .ok_or_else(|| format!("vertex buffer {} does not exist", buffer.0))?;
            vertex_buffers.push(Arc::clone(gpu_buffer));
        }

        let key = PipelineKey {
            program: program_handle,
            slots: slots.into_iter().map(|(_, slot)| slot).collect(),
            depth_test: self.state.depth_test,
            cull: self.state.cull.then_some(self.state.cull_face),
            front_face: self.state.front_face,
        };

        let pipeline = match self.pipelines.get(&key) {
            Some(pipeline) => Arc::clone(pipeline),
            None => {
                let pipeline = Arc::new(create_pipeline(
                    &self.device,
                    program,
                    &key,
                    self.color_format,
                )?);
                self.pipelines.insert(key, Arc::clone(&pipeline));
                pipeline
            }
        };

        let bind_group = match self.frame.current_bind_group {
            Some(index) => index,
            None => {
                let (bind_group, uniform_buffers) =
                    create_bind_group(&self.device, program, &self.state, &self.textures)?;
                self.frame.bind_groups.push(bind_group);
                self.frame.uniform_buffers.extend(uniform_buffers);
                let index = self.frame.bind_groups.len() - 1;
                self.frame.current_bind_group = Some(index);
                index
            }
        };

        self.frame.draws.push(PendingDraw {
            pipeline,
            bind_group,
            vertex_buffers,
            viewport: self.state.viewport,
            first_vertex,
            vertex_count,
        });
        Ok(())
    }
}

fn texture_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::Luminance => wgpu::TextureFormat::R8Unorm,
        PixelFormat::Rgb => wgpu::TextureFormat::Rgba8Unorm,
    }
}

fn gpu_bytes_per_pixel(format: PixelFormat) -> u32 {
    match format {
        PixelFormat::Luminance => 1,
        PixelFormat::Rgb => 4,
    }
}

/// Repack tightly packed source texels into the GPU layout
fn to_gpu_layout(format: PixelFormat, data: &[u8], texels: usize) -> Cow<'_, [u8]> {
    match format {
        PixelFormat::Luminance => Cow::Borrowed(&data[..texels]),
        PixelFormat::Rgb => Cow::Owned(
            data[..texels * 3]
                .chunks_exact(3)
                .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
                .collect(),
        ),
    }
}

fn filter(mode: FilterMode) -> wgpu::FilterMode {
    match mode {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

fn vertex_format(format: AttribFormat) -> wgpu::VertexFormat {
    match format {
        AttribFormat::Float32 => wgpu::VertexFormat::Float32,
        AttribFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        AttribFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        AttribFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    program: &GpuProgram,
    key: &PipelineKey,
    color_format: wgpu::TextureFormat,
) -> Result<wgpu::RenderPipeline, String> {
    let attributes: Vec<Vec<wgpu::VertexAttribute>> = key
        .slots
        .iter()
        .map(|slot| {
            slot.attributes
                .iter()
                .map(|(location, format, offset)| wgpu::VertexAttribute {
                    format: vertex_format(*format),
                    offset: *offset as wgpu::BufferAddress,
                    shader_location: location.0,
                })
                .collect()
        })
        .collect();
    let layouts: Vec<wgpu::VertexBufferLayout> = key
        .slots
        .iter()
        .zip(&attributes)
        .map(|(slot, attributes)| wgpu::VertexBufferLayout {
            array_stride: slot.stride as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes,
        })
        .collect();

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Program Pipeline"),
        layout: Some(&program.pipeline_layout),
        vertex: wgpu::VertexState {
            module: &program.vertex,
            entry_point: &program.interface.vertex_entry,
            buffers: &layouts,
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: match key.front_face {
                FrontFace::CounterClockwise => wgpu::FrontFace::Ccw,
                FrontFace::Clockwise => wgpu::FrontFace::Cw,
            },
            cull_mode: key.cull.map(|face| match face {
                CullFace::Back => wgpu::Face::Back,
                CullFace::Front => wgpu::Face::Front,
            }),
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: key.depth_test,
            depth_compare: if key.depth_test {
                wgpu::CompareFunction::Less
            } else {
                wgpu::CompareFunction::Always
            },
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &program.fragment,
            entry_point: &program.interface.fragment_entry,
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
    });

    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => Err(format!("pipeline creation failed: {}", error)),
        None => {
            log::debug!(
                "[WgpuContext::create_pipeline] New pipeline for program {} (depth: {}, cull: {:?})",
                key.program.0,
                key.depth_test,
                key.cull
            );
            Ok(pipeline)
        }
    }
}

fn create_bind_group(
    device: &wgpu::Device,
    program: &GpuProgram,
    state: &GlState,
    textures: &FxHashMap<TextureHandle, GpuTexture>,
) -> Result<(wgpu::BindGroup, Vec<wgpu::Buffer>), String> {
    // Uniform buffers first so the entries below can borrow them
    let mut uniform_buffers = Vec::new();
    for uniform in &program.interface.uniforms {
        if let UniformKind::Buffer { size } = uniform.kind {
            let mut contents = program
                .uniform_values
                .get(&uniform.location)
                .cloned()
                .unwrap_or_default();
            contents.resize(size as usize, 0);
            let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(uniform.name.as_str()),
                contents: &contents,
                usage: wgpu::BufferUsages::UNIFORM,
            });
            uniform_buffers.push((uniform.location, buffer));
        }
    }

    let mut entries = Vec::with_capacity(program.interface.uniforms.len());
    for uniform in &program.interface.uniforms {
        match uniform.kind {
            UniformKind::Buffer { .. } => {
                let buffer = uniform_buffers
                    .iter()
                    .find(|(location, _)| *location == uniform.location)
                    .map(|(_, buffer)| buffer)
                    .ok_or_else(|| format!("uniform '{}' has no buffer", uniform.name))?;
                entries.push(wgpu::BindGroupEntry {
                    binding: uniform.location.0,
                    resource: buffer.as_entire_binding(),
                });
            }
            UniformKind::Texture { sampler } => {
                let unit = program
                    .texture_units
                    .get(&uniform.location)
                    .copied()
                    .unwrap_or(0);
                let texture = state
                    .units
                    .get(&unit)
                    .and_then(|handle| textures.get(handle))
                    .ok_or_else(|| {
                        format!("no texture bound to unit {} for '{}'", unit, uniform.name)
                    })?;
                entries.push(wgpu::BindGroupEntry {
                    binding: uniform.location.0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                });
                entries.push(wgpu::BindGroupEntry {
                    binding: sampler.0,
                    resource: wgpu::BindingResource::Sampler(&texture.sampler),
                });
            }
            UniformKind::Sampler => {}
        }
    }

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Program Bindings"),
        layout: &program.bind_group_layout,
        entries: &entries,
    });
    drop(entries);

    Ok((
        bind_group,
        uniform_buffers.into_iter().map(|(_, buffer)| buffer).collect(),
    ))
}

impl GraphicsContext for WgpuContext {
    fn create_texture(&mut self, desc: &TextureDescriptor<'_>) -> RenderResult<TextureHandle> {
        let expected = desc.expected_len();
        if desc.data.len() < expected {
            return Err(RenderError::TextureDataSize {
                expected,
                found: desc.data.len(),
            });
        }

        // Get device limits to ensure we don't exceed GPU capabilities
        let max_dimension = self.device.limits().max_texture_dimension_2d;
        if desc.width > max_dimension || desc.height > max_dimension {
            return Err(RenderError::Gpu {
                operation: format!("create texture '{}'", desc.label),
                error: format!(
                    "{}x{} exceeds the device limit of {}",
                    desc.width, desc.height, max_dimension
                ),
            });
        }

        let size = wgpu::Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(desc.format),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let texels = desc.width as usize * desc.height as usize;
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &to_gpu_layout(desc.format, desc.data, texels),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(gpu_bytes_per_pixel(desc.format) * desc.width),
                rows_per_image: Some(desc.height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(desc.label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter(desc.filter),
            min_filter: filter(desc.filter),
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let handle = TextureHandle(self.next_handle());
        self.textures.insert(
            handle,
            GpuTexture {
                texture,
                view,
                sampler,
                width: desc.width,
                height: desc.height,
                format: desc.format,
            },
        );
        Ok(handle)
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
            .get(&texture)
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
        if width == 0 || height == 0 {
            return Ok(());
        }

        // Region writes must not tear pending draws that sampled old contents
        if !self.frame.draws.is_empty() {
            self.flush();
        }
        let Some(target) = self.textures.get(&texture) else {
            return Ok(());
        };

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            &to_gpu_layout(target.format, data, width as usize * height as usize),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(gpu_bytes_per_pixel(target.format) * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture).is_some() {
            self.state.units.retain(|_, bound| *bound != texture);
            self.invalidate_bindings();
        }
    }

    fn create_vertex_buffer(&mut self, label: &str, data: &[u8]) -> RenderResult<BufferHandle> {
        let max_size = self.device.limits().max_buffer_size;
        if data.len() as u64 > max_size {
            return Err(RenderError::Gpu {
                operation: format!("create buffer '{}'", label),
                error: format!("{} bytes exceeds the device limit of {}", data.len(), max_size),
            });
        }

        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: data,
                usage: wgpu::BufferUsages::VERTEX,
            });
        let handle = BufferHandle(self.next_handle());
        self.buffers.insert(handle, Arc::new(buffer));
        Ok(handle)
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
        if self.state.bound_buffer == Some(buffer) {
            self.state.bound_buffer = None;
        }
    }

    fn compile_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
        interface: &ProgramInterface,
    ) -> RenderResult<ProgramHandle> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let vertex = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Vertex Program"),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(vertex_source)),
            });
        let fragment = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Fragment Program"),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(fragment_source)),
            });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(RenderError::ShaderLink {
                message: error.to_string(),
            });
        }

        let layout_entries: Vec<wgpu::BindGroupLayoutEntry> = interface
            .uniforms
            .iter()
            .map(|uniform| wgpu::BindGroupLayoutEntry {
                binding: uniform.location.0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: match uniform.kind {
                    UniformKind::Buffer { .. } => wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    UniformKind::Texture { .. } => wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    UniformKind::Sampler => {
                        wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
                    }
                },
                count: None,
            })
            .collect();

        let bind_group_layout =
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Program Bind Group Layout"),
                    entries: &layout_entries,
                });
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Program Pipeline Layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        let handle = ProgramHandle(self.next_handle());
        self.programs.insert(
            handle,
            GpuProgram {
                interface: interface.clone(),
                vertex,
                fragment,
                bind_group_layout,
                pipeline_layout,
                uniform_values: FxHashMap::default(),
                texture_units: FxHashMap::default(),
            },
        );
        log::info!(
            "[WgpuContext::compile_program] Program {} linked ({} attributes, {} uniforms)",
            handle.0,
            interface.attributes.len(),
            interface.uniforms.len()
        );
        Ok(handle)
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(&program).is_none() {
            return;
        }
        self.pipelines.retain(|key, _| key.program != program);
        if self.state.program == Some(program) {
            self.state.program = None;
        }
        self.invalidate_bindings();
        log::debug!("[WgpuContext::delete_program] Released program {}", program.0);
    }

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.state.viewport = Some(Viewport {
            x,
            y,
            width,
            height,
        });
    }

    fn clear_color(&mut self, rgba: [f32; 4]) {
        self.state.clear_color = rgba;
    }

    fn clear(&mut self, flags: ClearFlags) {
        // A clear after queued draws must not be hoisted in front of them
        if !self.frame.draws.is_empty() {
            self.flush();
        }
        if flags.color {
            let [r, g, b, a] = self.state.clear_color;
            self.frame.clear_color = Some(wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: a as f64,
            });
        }
        if flags.depth {
            self.frame.clear_depth = true;
        }
    }

    fn use_program(&mut self, program: ProgramHandle) {
        if self.state.program != Some(program) {
            self.state.program = Some(program);
            self.invalidate_bindings();
        }
    }

    fn uniform_matrix4(&mut self, location: UniformLocation, matrix: &[[f32; 4]; 4]) {
        if let Some(program) = self.current_program_mut("uniform_matrix4") {
            program
                .uniform_values
                .insert(location, bytemuck::bytes_of(matrix).to_vec());
            self.invalidate_bindings();
        }
    }

    fn uniform_int(&mut self, location: UniformLocation, value: i32) {
        if let Some(program) = self.current_program_mut("uniform_int") {
            let is_texture = matches!(
                program.interface.uniform_info(location).map(|info| info.kind),
                Some(UniformKind::Texture { .. })
            );
            if is_texture {
                program.texture_units.insert(location, value.max(0) as u32);
            } else {
                program
                    .uniform_values
                    .insert(location, value.to_ne_bytes().to_vec());
            }
            self.invalidate_bindings();
        }
    }

    fn uniform_floats(&mut self, location: UniformLocation, values: &[f32]) {
        if let Some(program) = self.current_program_mut("uniform_floats") {
            program
                .uniform_values
                .insert(location, bytemuck::cast_slice(values).to_vec());
            self.invalidate_bindings();
        }
    }

    fn active_texture(&mut self, unit: u32) {
        self.state.active_unit = unit;
    }

    fn bind_texture(&mut self, texture: TextureHandle) {
        let previous = self.state.units.insert(self.state.active_unit, texture);
        if previous != Some(texture) {
            self.invalidate_bindings();
        }
    }

    fn enable(&mut self, capability: Capability) {
        match capability {
            Capability::DepthTest => self.state.depth_test = true,
            Capability::CullFace => self.state.cull = true,
        }
    }

    fn disable(&mut self, capability: Capability) {
        match capability {
            Capability::DepthTest => self.state.depth_test = false,
            Capability::CullFace => self.state.cull = false,
        }
    }

    fn cull_face(&mut self, face: CullFace) {
        self.state.cull_face = face;
    }

    fn front_face(&mut self, winding: FrontFace) {
        self.state.front_face = winding;
    }

    fn enable_vertex_attrib(&mut self, location: AttributeLocation) {
        self.state.enabled_attributes.insert(location);
    }

    fn disable_vertex_attrib(&mut self, location: AttributeLocation) {
        self.state.enabled_attributes.remove(&location);
    }

    fn bind_vertex_buffer(&mut self, buffer: BufferHandle) {
        self.state.bound_buffer = Some(buffer);
    }

    fn vertex_attrib_pointer(
        &mut self,
        location: AttributeLocation,
        format: AttribFormat,
        stride: u32,
        offset: u32,
    ) {
        match self.state.bound_buffer {
            Some(buffer) => {
                self.state.pointers.insert(
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
                "[WgpuContext::vertex_attrib_pointer] No buffer bound for attribute {}",
                location.0
            ),
        }
    }

    fn draw_triangles(&mut self, first_vertex: u32, vertex_count: u32) {
        if vertex_count == 0 {
            return;
        }
        if let Err(reason) = self.record_draw(first_vertex, vertex_count) {
            log::warn!("[WgpuContext::draw_triangles] Draw dropped: {}", reason);
        }
    }

    fn flush(&mut self) {
        let frame = std::mem::take(&mut self.frame);
        if frame.is_empty() {
            return;
        }

        let Some((width, height)) = self.target.as_ref().map(|t| (t.width, t.height)) else {
            log::warn!(
                "[WgpuContext::flush] No render target attached, dropping {} draws",
                frame.draws.len()
            );
            return;
        };
        self.ensure_depth(width, height);
        let (Some(target), Some(depth)) = (self.target.as_ref(), self.depth.as_ref()) else {
            return;
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Frame Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: frame
                            .clear_color
                            .map(wgpu::LoadOp::Clear)
                            .unwrap_or(wgpu::LoadOp::Load),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: if frame.clear_depth {
                            wgpu::LoadOp::Clear(1.0)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for draw in &frame.draws {
                if let Some(viewport) = draw.viewport {
                    let Some(placed) = pass_viewport(viewport, width, height) else {
                        continue;
                    };
                    let [x, y, w, h] = placed.rect;
                    pass.set_viewport(x, y, w, h, 0.0, 1.0);
                    let [x, y, w, h] = placed.scissor;
                    pass.set_scissor_rect(x, y, w, h);
                }
                pass.set_pipeline(&draw.pipeline);
                pass.set_bind_group(0, &frame.bind_groups[draw.bind_group], &[]);
                for (slot, buffer) in draw.vertex_buffers.iter().enumerate() {
                    pass.set_vertex_buffer(slot as u32, buffer.slice(..));
                }
                pass.draw(
                    draw.first_vertex..draw.first_vertex + draw.vertex_count,
                    0..1,
                );
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport(x: i32, y: i32, width: u32, height: u32) -> Viewport {
        Viewport {
            x,
            y,
            width,
            height,
        }
    }

    #[test]
    fn test_viewport_flips_to_top_left() {
        let placed = pass_viewport(viewport(10, 20, 100, 50), 640, 480).unwrap();
        assert_eq!(placed.rect, [10.0, 410.0, 100.0, 50.0]);
        assert_eq!(placed.scissor, [10, 410, 100, 50]);

        let full = pass_viewport(viewport(0, 0, 640, 480), 640, 480).unwrap();
        assert_eq!(full.rect, [0.0, 0.0, 640.0, 480.0]);
        assert_eq!(full.scissor, [0, 0, 640, 480]);
    }

    #[test]
    fn test_overhanging_viewport_is_clipped_to_target() {
        // Bottom-left anchored, so the top rows fall off the target
        let placed = pass_viewport(viewport(0, 0, 800, 600), 640, 480).unwrap();
        assert_eq!(placed.scissor, [0, 0, 640, 480]);
        assert_eq!(placed.rect, [0.0, 0.0, 640.0, 480.0]);

        let shifted = pass_viewport(viewport(-40, -30, 200, 100), 640, 480).unwrap();
        assert_eq!(shifted.scissor, [0, 410, 160, 70]);
    }

    #[test]
    fn test_viewport_off_target_is_skipped() {
        assert_eq!(pass_viewport(viewport(700, 0, 100, 100), 640, 480), None);
        assert_eq!(pass_viewport(viewport(0, 480, 100, 100), 640, 480), None);
        assert_eq!(pass_viewport(viewport(0, 0, 0, 100), 640, 480), None);
    }
}
