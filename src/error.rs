//! Error handling for the viewer core
//!
//! Every initialization path returns [`RenderResult`]. Per-frame paths are
//! infallible: once `init` succeeded, drawing only logs backend trouble.

use std::path::PathBuf;

/// Which atlas a packing or upload error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtlasKind {
    Diffuse,
    Lightmap,
}

impl std::fmt::Display for AtlasKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AtlasKind::Diffuse => write!(f, "diffuse"),
            AtlasKind::Lightmap => write!(f, "lightmap"),
        }
    }
}

/// Shader stage a compile error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// Main error type for the viewer core
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    // Asset errors
    #[error("Asset load failed for {path}")]
    AssetLoad { path: String },

    #[error("Asset {path} has unexpected size: expected at least {expected} bytes, found {found}")]
    AssetFormat {
        path: String,
        expected: usize,
        found: usize,
    },

    // Program errors
    #[error("Shader compilation failed ({stage}): {message}")]
    ShaderCompile { stage: ShaderStage, message: String },

    #[error("Shader link failed: {message}")]
    ShaderLink { message: String },

    #[error("Attribute '{name}' not found in program")]
    MissingAttribute { name: String },

    #[error("Uniform '{name}' not found in program")]
    MissingUniform { name: String },

    // Texture and atlas errors
    #[error("Region {x},{y} {width}x{height} exceeds texture bounds {bounds_width}x{bounds_height}")]
    RegionOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        bounds_width: u32,
        bounds_height: u32,
    },

    #[error("Texture data too short: expected {expected} bytes, found {found}")]
    TextureDataSize { expected: usize, found: usize },

    #[error("{atlas} atlas is full: no room for a {width}x{height} region")]
    AtlasFull {
        atlas: AtlasKind,
        width: u32,
        height: u32,
    },

    #[error("Unknown {resource_type} handle {id}")]
    UnknownResource { resource_type: String, id: u32 },

    // Level errors
    #[error("Malformed level data: {reason}")]
    MalformedLevel { reason: String },

    // Configuration errors
    #[error("Invalid config: {field} = {value} ({reason})")]
    InvalidConfig {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write debug image {path}: {source}")]
    DebugImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("GPU operation '{operation}' failed: {error}")]
    Gpu { operation: String, error: String },
}

/// Result alias used throughout the crate
pub type RenderResult<T> = Result<T, RenderError>;

/// Convert Option to Result with a lazily built error
pub trait OptionExt<T> {
    fn ok_or_render<F>(self, f: F) -> RenderResult<T>
    where
        F: FnOnce() -> RenderError;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_render<F>(self, f: F) -> RenderResult<T>
    where
        F: FnOnce() -> RenderError,
    {
        self.ok_or_else(f)
    }
}

/// Attach a path to IO failures
pub trait IoContext<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> RenderResult<T>;
}

impl<T> IoContext<T> for Result<T, std::io::Error> {
    fn with_path(self, path: impl Into<PathBuf>) -> RenderResult<T> {
        self.map_err(|source| RenderError::Io {
            path: path.into(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RenderError::AtlasFull {
            atlas: AtlasKind::Lightmap,
            width: 17,
            height: 9,
        };
        assert_eq!(
            err.to_string(),
            "lightmap atlas is full: no room for a 17x9 region"
        );

        let err = RenderError::AssetLoad {
            path: "gfx/palette.lmp".to_string(),
        };
        assert_eq!(err.to_string(), "Asset load failed for gfx/palette.lmp");
    }

    #[test]
    fn test_option_ext() {
        let opt: Option<i32> = None;
        let result = opt.ok_or_render(|| RenderError::MissingUniform {
            name: "u_view".to_string(),
        });
        assert!(matches!(result, Err(RenderError::MissingUniform { .. })));
    }

    #[test]
    fn test_io_context() {
        let result: Result<i32, std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));
        let err = result.with_path("viewer.toml").unwrap_err();
        assert!(err.to_string().starts_with("IO error for viewer.toml"));
    }
}
