//! Renderer Module - Data-Oriented Programming (DOP) style
//!
//! - texture_atlas_*: fixed-size luminance atlases and their packing
//! - indexed_color: palette and colour map lookup textures
//! - shader_program: the world program and its resolved names
//! - light_styles, frame_timing: per-frame clocks
//! - frame_scope: guards for per-frame GPU state
//! - renderer_data / renderer_operations: the frame orchestrator

pub mod frame_scope;
pub mod frame_timing;
pub mod indexed_color;
pub mod light_styles;
pub mod renderer_data;
pub mod renderer_operations;
pub mod shader_program;
pub mod texture_atlas_data;
pub mod texture_atlas_operations;

pub use frame_scope::{AttributeScope, CapabilityScope};
pub use frame_timing::{duration_to_ticks, FrameTimer};
pub use indexed_color::{load_indexed_color, release_indexed_color, IndexedColorData};
pub use light_styles::LightStyles;
pub use renderer_data::{FrameReport, RendererState};
pub use renderer_operations::{
    draw, draw_at, init_renderer, load_map, move_forward, rotate, save_atlas_debug,
    set_light_style, shutdown_renderer, stop_move,
};
pub use shader_program::{
    compile_world_program, release_world_program, ShaderProgram, WorldAttributes, WorldProgram,
    WorldUniforms,
};
pub use texture_atlas_data::{AtlasSet, DirtyRegion, PackedRect, TextureAtlasData};
pub use texture_atlas_operations::{
    add_image, allocate_region, create_atlas_set, create_texture_atlas, release_atlas_set,
    release_texture_atlas, save_debug, upload_atlas, upload_atlas_set, utilization, write_region,
};
