//! Quake View Core - rendering core of an indexed-colour BSP level viewer
//!
//! Data-oriented layout: `*_data` modules hold plain data, `*_operations`
//! modules hold the functions that transform it. All GPU work goes through
//! the [`gl::GraphicsContext`] seam, implemented on wgpu for real frames and
//! by a recording context for headless runs.
//!
//! ```no_run
//! use quake_view_core::{asset, bsp, gl::RecordingContext, renderer, RendererConfig};
//!
//! let mut ctx = RecordingContext::new();
//! let archive = asset::sample_archive();
//! let level = bsp::sample_room_level(128.0);
//! let mut state = renderer::init_renderer(&mut ctx, &archive, &level, RendererConfig::default())?;
//! renderer::move_forward(&mut state);
//! renderer::draw(&mut ctx, &mut state, 800, 600);
//! # Ok::<(), quake_view_core::RenderError>(())
//! ```

// Constants module
pub mod constants;

// Core modules
pub mod config;
pub mod error;

// External seams
pub mod asset;
pub mod bsp;
pub mod gl;

// Rendering systems
pub mod camera;
pub mod map;
pub mod renderer;

pub use asset::{AssetArchive, MemoryArchive};
pub use bsp::BspLevel;
pub use camera::{CameraConfig, CameraData, ProjectionData};
pub use config::{load_config, RendererConfig};
pub use error::{AtlasKind, RenderError, RenderResult, ShaderStage};
pub use gl::{GraphicsContext, RecordingContext, WgpuContext};
pub use map::{MapData, MapStats};
pub use renderer::{
    draw, draw_at, init_renderer, load_map, move_forward, rotate, set_light_style,
    shutdown_renderer, stop_move, FrameReport, RendererState,
};

// Re-export wgpu for integrators constructing a WgpuContext
pub use wgpu;
