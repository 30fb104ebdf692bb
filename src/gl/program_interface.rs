//! Program reflection
//!
//! Parses and validates a WGSL vertex/fragment pair with naga and records
//! which attribute and uniform names the linked program exposes. Both
//! contexts consume the same [`ProgramInterface`], so a name that is missing
//! here fails identically on real and headless backends.

use super::{AttributeLocation, UniformLocation};
use crate::error::{RenderError, RenderResult, ShaderStage};
use naga::{AddressSpace, Binding, TypeInner};

/// Suffix pairing a sampler global with the texture it filters
pub const SAMPLER_SUFFIX: &str = "_sampler";

/// What a uniform slot holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    /// Uniform buffer of the given byte size
    Buffer { size: u32 },
    /// 2D texture, filtered through the paired sampler slot
    Texture { sampler: UniformLocation },
    /// Sampler; bound implicitly alongside its texture
    Sampler,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformInfo {
    pub name: String,
    pub location: UniformLocation,
    pub kind: UniformKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    pub name: String,
    pub location: AttributeLocation,
}

/// Reflected interface of a linked vertex/fragment pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramInterface {
    pub vertex_entry: String,
    pub fragment_entry: String,
    pub attributes: Vec<AttributeInfo>,
    pub uniforms: Vec<UniformInfo>,
}

impl ProgramInterface {
    /// Parse, validate and reflect a program
    pub fn reflect(vertex_source: &str, fragment_source: &str) -> RenderResult<Self> {
        let vertex = parse_module(vertex_source, ShaderStage::Vertex)?;
        let fragment = parse_module(fragment_source, ShaderStage::Fragment)?;

        let vertex_entry = find_entry(&vertex, naga::ShaderStage::Vertex, ShaderStage::Vertex)?;
        let fragment_entry =
            find_entry(&fragment, naga::ShaderStage::Fragment, ShaderStage::Fragment)?;

        let attributes = reflect_attributes(&vertex, vertex_entry);

        let mut uniforms = Vec::new();
        collect_uniforms(&vertex, &mut uniforms)?;
        collect_uniforms(&fragment, &mut uniforms)?;
        pair_samplers(&mut uniforms)?;
        uniforms.sort_by_key(|uniform| uniform.location);

        Ok(Self {
            vertex_entry: vertex_entry.name.clone(),
            fragment_entry: fragment_entry.name.clone(),
            attributes,
            uniforms,
        })
    }

    pub fn attribute(&self, name: &str) -> Option<AttributeLocation> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name == name)
            .map(|attribute| attribute.location)
    }

    pub fn uniform(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms
            .iter()
            .find(|uniform| uniform.name == name)
            .map(|uniform| uniform.location)
    }

    pub fn uniform_info(&self, location: UniformLocation) -> Option<&UniformInfo> {
        self.uniforms
            .iter()
            .find(|uniform| uniform.location == location)
    }
}

fn parse_module(source: &str, stage: ShaderStage) -> RenderResult<naga::Module> {
    let module = naga::front::wgsl::parse_str(source).map_err(|err| {
        RenderError::ShaderCompile {
            stage,
            message: err.emit_to_string(source),
        }
    })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    )
    .validate(&module)
    .map_err(|err| RenderError::ShaderCompile {
        stage,
        message: err.to_string(),
    })?;

    Ok(module)
}

fn find_entry(
    module: &naga::Module,
    wanted: naga::ShaderStage,
    stage: ShaderStage,
) -> RenderResult<&naga::EntryPoint> {
    let mut entries = module.entry_points.iter().filter(|entry| entry.stage == wanted);
    let entry = entries.next().ok_or_else(|| RenderError::ShaderCompile {
        stage,
        message: format!("no {} entry point", stage),
    })?;
    if entries.next().is_some() {
        return Err(RenderError::ShaderCompile {
            stage,
            message: format!("more than one {} entry point", stage),
        });
    }
    Ok(entry)
}

fn reflect_attributes(module: &naga::Module, entry: &naga::EntryPoint) -> Vec<AttributeInfo> {
    let mut attributes = Vec::new();
    for argument in &entry.function.arguments {
        match (&argument.binding, &argument.name) {
            (Some(Binding::Location { location, .. }), Some(name)) => {
                attributes.push(AttributeInfo {
                    name: name.clone(),
                    location: AttributeLocation(*location),
                });
            }
            (None, _) => {
                // Struct inputs carry their bindings on the members
                if let TypeInner::Struct { members, .. } = &module.types[argument.ty].inner {
                    for member in members {
                        if let (Some(Binding::Location { location, .. }), Some(name)) =
                            (&member.binding, &member.name)
                        {
                            attributes.push(AttributeInfo {
                                name: name.clone(),
                                location: AttributeLocation(*location),
                            });
                        }
                    }
                }
            }
            _ => {}
        }
    }
    attributes.sort_by_key(|attribute| attribute.location);
    attributes
}

fn collect_uniforms(module: &naga::Module, uniforms: &mut Vec<UniformInfo>) -> RenderResult<()> {
    for (_, global) in module.global_variables.iter() {
        let (Some(name), Some(binding)) = (&global.name, &global.binding) else {
            continue;
        };
        if binding.group != 0 {
            return Err(RenderError::ShaderLink {
                message: format!("'{}' uses bind group {}, only group 0 is supported", name, binding.group),
            });
        }

        let inner = &module.types[global.ty].inner;
        let kind = match (global.space, inner) {
            (AddressSpace::Uniform, _) => UniformKind::Buffer {
                size: inner.size(module.to_ctx()),
            },
            (AddressSpace::Handle, TypeInner::Image { .. }) => UniformKind::Texture {
                sampler: UniformLocation(u32::MAX),
            },
            (AddressSpace::Handle, TypeInner::Sampler { .. }) => UniformKind::Sampler,
            _ => {
                return Err(RenderError::ShaderLink {
                    message: format!("global '{}' has an unsupported resource type", name),
                })
            }
        };
        let location = UniformLocation(binding.binding);

        if let Some(existing) = uniforms.iter().find(|uniform| uniform.name == *name) {
            if existing.location != location || existing.kind != kind {
                return Err(RenderError::ShaderLink {
                    message: format!("'{}' is declared differently in the two stages", name),
                });
            }
            continue;
        }
        if uniforms.iter().any(|uniform| uniform.location == location) {
            return Err(RenderError::ShaderLink {
                message: format!("binding {} is used by more than one global", location.0),
            });
        }

        uniforms.push(UniformInfo {
            name: name.clone(),
            location,
            kind,
        });
    }
    Ok(())
}

fn pair_samplers(uniforms: &mut [UniformInfo]) -> RenderResult<()> {
    let samplers: Vec<(String, UniformLocation)> = uniforms
        .iter()
        .filter(|uniform| uniform.kind == UniformKind::Sampler)
        .map(|uniform| (uniform.name.clone(), uniform.location))
        .collect();

    for uniform in uniforms.iter_mut() {
        if let UniformKind::Texture { sampler } = &mut uniform.kind {
            let wanted = format!("{}{}", uniform.name, SAMPLER_SUFFIX);
            *sampler = samplers
                .iter()
                .find(|(name, _)| *name == wanted)
                .map(|(_, location)| *location)
                .ok_or_else(|| RenderError::ShaderLink {
                    message: format!("texture '{}' has no sampler named '{}'", uniform.name, wanted),
                })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r#"
@group(0) @binding(0) var<uniform> u_matrix: mat4x4<f32>;

struct Out {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@location(0) a_position: vec3<f32>, @location(1) a_uv: vec2<f32>) -> Out {
    var out: Out;
    out.clip = u_matrix * vec4<f32>(a_position, 1.0);
    out.uv = a_uv;
    return out;
}
"#;

    const FRAGMENT: &str = r#"
@group(0) @binding(1) var u_image: texture_2d<f32>;
@group(0) @binding(2) var u_image_sampler: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(u_image, u_image_sampler, uv);
}
"#;

    #[test]
    fn test_reflects_attributes_and_uniforms() {
        let interface = ProgramInterface::reflect(VERTEX, FRAGMENT).unwrap();
        assert_eq!(interface.vertex_entry, "vs_main");
        assert_eq!(interface.fragment_entry, "fs_main");
        assert_eq!(interface.attribute("a_position"), Some(AttributeLocation(0)));
        assert_eq!(interface.attribute("a_uv"), Some(AttributeLocation(1)));
        assert_eq!(interface.attribute("a_missing"), None);

        let matrix = interface.uniform("u_matrix").unwrap();
        assert_eq!(
            interface.uniform_info(matrix).unwrap().kind,
            UniformKind::Buffer { size: 64 }
        );
        let image = interface.uniform("u_image").unwrap();
        assert_eq!(
            interface.uniform_info(image).unwrap().kind,
            UniformKind::Texture {
                sampler: UniformLocation(2)
            }
        );
    }

    #[test]
    fn test_syntax_error_is_compile_error() {
        let result = ProgramInterface::reflect("fn broken(", FRAGMENT);
        assert!(matches!(
            result,
            Err(RenderError::ShaderCompile {
                stage: ShaderStage::Vertex,
                ..
            })
        ));
    }

    #[test]
    fn test_texture_without_sampler_fails_link() {
        let fragment = r#"
@group(0) @binding(1) var u_image: texture_2d<f32>;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureLoad(u_image, vec2<i32>(uv), 0);
}
"#;
        let result = ProgramInterface::reflect(VERTEX, fragment);
        assert!(matches!(result, Err(RenderError::ShaderLink { .. })));
    }

    #[test]
    fn test_conflicting_bindings_fail_link() {
        let fragment = r#"
@group(0) @binding(0) var<uniform> u_tint: vec4<f32>;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return u_tint;
}
"#;
        let result = ProgramInterface::reflect(VERTEX, fragment);
        assert!(matches!(result, Err(RenderError::ShaderLink { .. })));
    }
}
