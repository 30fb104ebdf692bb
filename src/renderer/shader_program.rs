//! Shader programs
//!
//! A [`ShaderProgram`] pairs the context's program handle with its reflected
//! interface so attribute and uniform lookups fail at init, never mid-frame.
//! [`WorldProgram`] resolves every name the world geometry needs once.

use crate::error::{RenderError, RenderResult};
use crate::gl::{AttributeLocation, GraphicsContext, ProgramHandle, ProgramInterface, UniformLocation};

pub const WORLD_VERTEX_SOURCE: &str = include_str!("shaders/world.vert.wgsl");
pub const WORLD_FRAGMENT_SOURCE: &str = include_str!("shaders/world.frag.wgsl");

/// Attribute names of the world program, in vertex layout order
pub mod attribute_names {
    pub const POSITION: &str = "a_position";
    pub const LIGHT: &str = "a_light";
    pub const TEX: &str = "a_tex";
    pub const TEX_INFO: &str = "a_tex_info";
    pub const LIGHT_INFO: &str = "a_light_info";
    pub const LIGHT_STYLE: &str = "a_light_style";
}

/// Uniform names of the world program
pub mod uniform_names {
    pub const PROJECTION: &str = "u_projection";
    pub const VIEW: &str = "u_view";
    pub const LIGHT_STYLES: &str = "u_light_styles";
    pub const PALETTE: &str = "u_palette";
    pub const COLOUR_MAP: &str = "u_colour_map";
    pub const TEXTURE: &str = "u_texture";
    pub const TEXTURE_LIGHT: &str = "u_texture_light";
}

/// Linked program plus the names it exposes
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    handle: ProgramHandle,
    interface: ProgramInterface,
}

impl ShaderProgram {
    /// Compile and link a vertex/fragment pair
    ///
    /// Reflection runs first, so a source that does not parse, validate or
    /// link fails the same way on every backend.
    pub fn compile<G: GraphicsContext + ?Sized>(
        ctx: &mut G,
        vertex_source: &str,
        fragment_source: &str,
    ) -> RenderResult<Self> {
        let interface = ProgramInterface::reflect(vertex_source, fragment_source)?;
        let handle = ctx.compile_program(vertex_source, fragment_source, &interface)?;

        log::info!(
            "[ShaderProgram::compile] Linked program {:?}: {} attributes, {} uniforms",
            handle,
            interface.attributes.len(),
            interface.uniforms.len()
        );
        Ok(Self { handle, interface })
    }

    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    pub fn interface(&self) -> &ProgramInterface {
        &self.interface
    }

    pub fn attribute_location(&self, name: &str) -> RenderResult<AttributeLocation> {
        self.interface
            .attribute(name)
            .ok_or_else(|| RenderError::MissingAttribute {
                name: name.to_string(),
            })
    }

    pub fn uniform_location(&self, name: &str) -> RenderResult<UniformLocation> {
        self.interface
            .uniform(name)
            .ok_or_else(|| RenderError::MissingUniform {
                name: name.to_string(),
            })
    }

    /// Make this the current program
    pub fn use_program<G: GraphicsContext + ?Sized>(&self, ctx: &mut G) {
        ctx.use_program(self.handle);
    }

    pub fn release<G: GraphicsContext + ?Sized>(self, ctx: &mut G) {
        ctx.delete_program(self.handle);
    }
}

/// Vertex attribute locations of the world program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldAttributes {
    pub position: AttributeLocation,
    pub light: AttributeLocation,
    pub tex: AttributeLocation,
    pub tex_info: AttributeLocation,
    pub light_info: AttributeLocation,
    pub light_style: AttributeLocation,
}

impl WorldAttributes {
    /// All six, in vertex layout order
    pub fn all(&self) -> [AttributeLocation; 6] {
        [
            self.position,
            self.light,
            self.tex,
            self.tex_info,
            self.light_info,
            self.light_style,
        ]
    }
}

/// Uniform locations of the world program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldUniforms {
    pub projection: UniformLocation,
    pub view: UniformLocation,
    pub light_styles: UniformLocation,
    pub palette: UniformLocation,
    pub colour_map: UniformLocation,
    pub texture: UniformLocation,
    pub texture_light: UniformLocation,
}

/// The world program with every location resolved
#[derive(Debug, Clone)]
pub struct WorldProgram {
    pub program: ShaderProgram,
    pub attributes: WorldAttributes,
    pub uniforms: WorldUniforms,
}

/// Compile the world program and resolve its names
pub fn compile_world_program<G: GraphicsContext + ?Sized>(ctx: &mut G) -> RenderResult<WorldProgram> {
    let program = ShaderProgram::compile(ctx, WORLD_VERTEX_SOURCE, WORLD_FRAGMENT_SOURCE)?;
    resolve_world_program(ctx, program)
}

/// Release the world program's GPU side
pub fn release_world_program<G: GraphicsContext + ?Sized>(ctx: &mut G, world: WorldProgram) {
    world.program.release(ctx);
}

/// Resolve every world name on a linked program; the program is released
/// when any of them is missing.
fn resolve_world_program<G: GraphicsContext + ?Sized>(
    ctx: &mut G,
    program: ShaderProgram,
) -> RenderResult<WorldProgram> {
    match resolve_world_locations(&program) {
        Ok((attributes, uniforms)) => Ok(WorldProgram {
            program,
            attributes,
            uniforms,
        }),
        Err(err) => {
            log::error!("[ShaderProgram::resolve_world_program] {}", err);
            program.release(ctx);
            Err(err)
        }
    }
}

fn resolve_world_locations(program: &ShaderProgram) -> RenderResult<(WorldAttributes, WorldUniforms)> {
    let attributes = WorldAttributes {
        position: program.attribute_location(attribute_names::POSITION)?,
        light: program.attribute_location(attribute_names::LIGHT)?,
        tex: program.attribute_location(attribute_names::TEX)?,
        tex_info: program.attribute_location(attribute_names::TEX_INFO)?,
        light_info: program.attribute_location(attribute_names::LIGHT_INFO)?,
        light_style: program.attribute_location(attribute_names::LIGHT_STYLE)?,
    };

    let uniforms = WorldUniforms {
        projection: program.uniform_location(uniform_names::PROJECTION)?,
        view: program.uniform_location(uniform_names::VIEW)?,
        light_styles: program.uniform_location(uniform_names::LIGHT_STYLES)?,
        palette: program.uniform_location(uniform_names::PALETTE)?,
        colour_map: program.uniform_location(uniform_names::COLOUR_MAP)?,
        texture: program.uniform_location(uniform_names::TEXTURE)?,
        texture_light: program.uniform_location(uniform_names::TEXTURE_LIGHT)?,
    };

    Ok((attributes, uniforms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShaderStage;
    use crate::gl::{GlCall, RecordingContext, UniformKind};

    #[test]
    fn test_world_program_resolves_every_name() {
        let mut ctx = RecordingContext::new();
        let world = compile_world_program(&mut ctx).unwrap();

        let locations: Vec<u32> = world.attributes.all().iter().map(|l| l.0).collect();
        assert_eq!(locations, vec![0, 1, 2, 3, 4, 5]);

        let interface = world.program.interface();
        assert_eq!(interface.vertex_entry, "vs_main");
        assert_eq!(interface.fragment_entry, "fs_main");
        assert_eq!(
            interface.uniform_info(world.uniforms.projection).unwrap().kind,
            UniformKind::Buffer { size: 64 }
        );
        assert_eq!(
            interface.uniform_info(world.uniforms.light_styles).unwrap().kind,
            UniformKind::Buffer { size: 256 }
        );
        assert!(matches!(
            interface.uniform_info(world.uniforms.texture_light).unwrap().kind,
            UniformKind::Texture { .. }
        ));
    }

    #[test]
    fn test_unknown_names_are_typed_errors() {
        let mut ctx = RecordingContext::new();
        let world = compile_world_program(&mut ctx).unwrap();

        match world.program.attribute_location("a_normal") {
            Err(RenderError::MissingAttribute { name }) => assert_eq!(name, "a_normal"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(matches!(
            world.program.uniform_location("u_fog"),
            Err(RenderError::MissingUniform { .. })
        ));
    }

    #[test]
    fn test_bad_fragment_source_reports_stage() {
        let mut ctx = RecordingContext::new();
        let result = ShaderProgram::compile(&mut ctx, WORLD_VERTEX_SOURCE, "@fragment fn fs_main( {");
        assert!(matches!(
            result,
            Err(RenderError::ShaderCompile {
                stage: ShaderStage::Fragment,
                ..
            })
        ));
        assert!(ctx.calls().is_empty());
    }

    #[test]
    fn test_program_missing_world_names_is_released() {
        let vertex = r#"
@vertex
fn vs_main(@location(0) a_position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(a_position, 1.0);
}
"#;
        let fragment = r#"
@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0);
}
"#;
        let mut ctx = RecordingContext::new();
        let program = ShaderProgram::compile(&mut ctx, vertex, fragment).unwrap();
        let handle = program.handle();
        assert_eq!(ctx.live_program_count(), 1);

        match resolve_world_program(&mut ctx, program) {
            Err(RenderError::MissingAttribute { name }) => assert_eq!(name, attribute_names::LIGHT),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(ctx.live_program_count(), 0);
        assert_eq!(ctx.calls().last(), Some(&GlCall::DeleteProgram(handle)));
    }

    #[test]
    fn test_release_world_program() {
        let mut ctx = RecordingContext::new();
        let world = compile_world_program(&mut ctx).unwrap();
        assert_eq!(ctx.live_program_count(), 1);
        release_world_program(&mut ctx, world);
        assert_eq!(ctx.live_program_count(), 0);
    }
}
