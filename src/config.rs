//! Renderer configuration
//!
//! Every field has a default, so an empty TOML document is a valid config.

use crate::camera::CameraConfig;
use crate::constants::{ATLAS_SIZE, DEFAULT_MAX_FRAME_TICKS};
use crate::error::{IoContext, RenderError, RenderResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest atlas edge accepted; the backend may impose a lower limit
const MAX_ATLAS_SIZE: u32 = 8192;

/// Main renderer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Edge length of the diffuse and lightmap atlases
    pub atlas_size: u32,
    pub camera: CameraConfig,
    pub clear_color: [f32; 4],
    /// Longest frame step applied to camera motion, in 60 Hz ticks
    pub max_frame_ticks: f64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            atlas_size: ATLAS_SIZE,
            camera: CameraConfig::default(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            max_frame_ticks: DEFAULT_MAX_FRAME_TICKS,
        }
    }
}

impl RendererConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> RenderResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> RenderResult<()> {
        if self.atlas_size == 0 || self.atlas_size > MAX_ATLAS_SIZE {
            return Err(invalid(
                "atlas_size",
                self.atlas_size,
                format!("must be between 1 and {}", MAX_ATLAS_SIZE),
            ));
        }

        let camera = &self.camera;
        if !(camera.fov_degrees > 0.0 && camera.fov_degrees < 180.0) {
            return Err(invalid(
                "camera.fov_degrees",
                camera.fov_degrees,
                "must be inside (0, 180)",
            ));
        }
        if !(camera.near_plane > 0.0) {
            return Err(invalid("camera.near_plane", camera.near_plane, "must be positive"));
        }
        if !(camera.far_plane > camera.near_plane) {
            return Err(invalid(
                "camera.far_plane",
                camera.far_plane,
                format!("must be greater than near_plane {}", camera.near_plane),
            ));
        }
        if !camera.move_speed.is_finite() {
            return Err(invalid("camera.move_speed", camera.move_speed, "must be finite"));
        }
        if camera.position.iter().any(|axis| !axis.is_finite()) {
            return Err(invalid(
                "camera.position",
                format!("{:?}", camera.position),
                "must be finite",
            ));
        }

        if !(self.max_frame_ticks > 0.0) {
            return Err(invalid(
                "max_frame_ticks",
                self.max_frame_ticks,
                "must be positive",
            ));
        }

        log::debug!("[RendererConfig] Configuration validated successfully");
        Ok(())
    }
}

/// Load and validate a TOML config file
pub fn load_config(path: impl AsRef<Path>) -> RenderResult<RendererConfig> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).with_path(path)?;
    let config = RendererConfig::from_toml_str(&source)?;
    log::info!("[RendererConfig] Loaded {}", path.display());
    Ok(config)
}

fn invalid(field: &str, value: impl ToString, reason: impl Into<String>) -> RenderError {
    RenderError::InvalidConfig {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = RendererConfig::from_toml_str("").unwrap();
        assert_eq!(config, RendererConfig::default());
        assert_eq!(config.atlas_size, 1024);
        assert_eq!(config.camera.position, [504.0, 401.0, 75.0]);
        assert_eq!(config.camera.fov_degrees, 75.0);
    }

    #[test]
    fn test_partial_override() {
        let config = RendererConfig::from_toml_str(
            r#"
atlas_size = 512

[camera]
fov_degrees = 90.0
position = [0.0, 0.0, 64.0]
"#,
        )
        .unwrap();
        assert_eq!(config.atlas_size, 512);
        assert_eq!(config.camera.fov_degrees, 90.0);
        assert_eq!(config.camera.position, [0.0, 0.0, 64.0]);
        assert_eq!(config.camera.near_plane, 0.1);
        assert_eq!(config.max_frame_ticks, 15.0);
    }

    #[test]
    fn test_rejects_inverted_planes() {
        let result = RendererConfig::from_toml_str(
            r#"
[camera]
near_plane = 100.0
far_plane = 10.0
"#,
        );
        match result {
            Err(RenderError::InvalidConfig { field, .. }) => assert_eq!(field, "camera.far_plane"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_zero_atlas() {
        let result = RendererConfig::from_toml_str("atlas_size = 0");
        assert!(matches!(result, Err(RenderError::InvalidConfig { .. })));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let result = RendererConfig::from_toml_str("atlas_size = \"big\"");
        assert!(matches!(result, Err(RenderError::ConfigParse(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_frame_ticks = 4.0").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.max_frame_ticks, 4.0);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(dir.path().join("missing.toml"));
        assert!(matches!(result, Err(RenderError::Io { .. })));
    }
}
