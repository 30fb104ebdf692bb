//! Renderer Operations - Pure DOP Functions
//!
//! Init, the per-frame sequence, camera control and map replacement, all
//! operating on an explicit [`RendererState`].

use super::frame_scope::{AttributeScope, CapabilityScope};
use super::frame_timing::FrameTimer;
use super::indexed_color::{load_indexed_color, release_indexed_color};
use super::light_styles::LightStyles;
use super::renderer_data::{FrameReport, RendererState};
use super::shader_program::{compile_world_program, release_world_program};
use super::texture_atlas_operations::{create_atlas_set, release_atlas_set, save_debug};
use crate::asset::AssetArchive;
use crate::bsp::BspLevel;
use crate::camera;
use crate::config::RendererConfig;
use crate::constants::texture_units;
use crate::error::{IoContext, RenderResult};
use crate::gl::{ClearFlags, GraphicsContext, TextureHandle, UniformLocation};
use crate::map::{build_map, release_map, render_map};
use std::path::Path;
use std::time::Instant;

/// Log the camera every this many frames at debug level
const CAMERA_LOG_INTERVAL: u64 = 600;

// ============================================================================
// LIFECYCLE
// ============================================================================

/// Create every GPU resource and build the first map
///
/// Must run once before any [`draw`]. On failure everything created so far
/// is released again.
pub fn init_renderer<G, A>(
    ctx: &mut G,
    archive: &A,
    level: &BspLevel,
    config: RendererConfig,
) -> RenderResult<RendererState>
where
    G: GraphicsContext + ?Sized,
    A: AssetArchive + ?Sized,
{
    config.validate()?;

    let indexed_color = load_indexed_color(ctx, archive)?;

    let mut atlases = create_atlas_set(ctx, config.atlas_size).map_err(|err| {
        release_indexed_color(ctx, indexed_color);
        err
    })?;

    let program = match compile_world_program(ctx) {
        Ok(program) => program,
        Err(err) => {
            release_atlas_set(ctx, atlases);
            release_indexed_color(ctx, indexed_color);
            return Err(err);
        }
    };

    let map = match build_map(ctx, level, &mut atlases) {
        Ok(map) => map,
        Err(err) => {
            release_world_program(ctx, program);
            release_atlas_set(ctx, atlases);
            release_indexed_color(ctx, indexed_color);
            return Err(err);
        }
    };

    let camera = camera::init_camera_from_config(&config.camera);
    let projection = camera::init_projection_from_config(&config.camera);
    let timer = FrameTimer::new(config.max_frame_ticks);

    log::info!(
        "[Renderer::init] Ready: {} faces drawn, {} vertices",
        map.stats.faces_drawn,
        map.vertex_count
    );
    camera::log_camera_context(&camera);

    Ok(RendererState {
        config,
        indexed_color,
        atlases,
        program,
        map,
        camera,
        projection,
        timer,
        light_styles: LightStyles::new(),
        frame_count: 0,
    })
}

/// Release every GPU resource the renderer owns
pub fn shutdown_renderer<G: GraphicsContext + ?Sized>(ctx: &mut G, state: RendererState) {
    release_map(ctx, state.map);
    release_world_program(ctx, state.program);
    release_atlas_set(ctx, state.atlases);
    release_indexed_color(ctx, state.indexed_color);
    log::info!(
        "[Renderer::shutdown] Released after {} frames",
        state.frame_count
    );
}

// ============================================================================
// FRAME
// ============================================================================

/// Render one frame at the current wall-clock time
pub fn draw<G: GraphicsContext + ?Sized>(
    ctx: &mut G,
    state: &mut RendererState,
    width: u32,
    height: u32,
) -> FrameReport {
    draw_at(ctx, state, width, height, Instant::now())
}

/// Render one frame as if it started at `now`
pub fn draw_at<G: GraphicsContext + ?Sized>(
    ctx: &mut G,
    state: &mut RendererState,
    width: u32,
    height: u32,
    now: Instant,
) -> FrameReport {
    let ticks = state.timer.tick(now);

    let projection_rebuilt = match camera::update_projection(&state.projection, width, height) {
        Some(projection) => {
            state.projection = projection;
            true
        }
        None => false,
    };

    ctx.viewport(0, 0, width, height);
    ctx.clear_color(state.config.clear_color);
    ctx.clear(ClearFlags::COLOR_AND_DEPTH);

    state.camera = camera::integrate_motion(&state.camera, ticks);
    state.light_styles.advance(ticks);
    let view_matrix = camera::build_view_matrix(&state.camera);

    let world = &state.program;
    world.program.use_program(ctx);
    let projection: [[f32; 4]; 4] = state.projection.matrix.into();
    let view: [[f32; 4]; 4] = view_matrix.into();
    ctx.uniform_matrix4(world.uniforms.projection, &projection);
    ctx.uniform_matrix4(world.uniforms.view, &view);
    ctx.uniform_floats(world.uniforms.light_styles, state.light_styles.values());

    bind_texture_unit(
        ctx,
        texture_units::PALETTE,
        state.indexed_color.palette,
        world.uniforms.palette,
    );
    bind_texture_unit(
        ctx,
        texture_units::COLORMAP,
        state.indexed_color.colour_map,
        world.uniforms.colour_map,
    );
    bind_texture_unit(
        ctx,
        texture_units::DIFFUSE_ATLAS,
        state.atlases.diffuse.texture,
        world.uniforms.texture,
    );
    bind_texture_unit(
        ctx,
        texture_units::LIGHTMAP_ATLAS,
        state.atlases.lightmap.texture,
        world.uniforms.texture_light,
    );

    {
        let mut capabilities = CapabilityScope::enter(ctx);
        let mut attributes = AttributeScope::enter(&mut *capabilities, world.attributes.all());
        render_map(&mut *attributes, &state.map, &world.attributes);
    }

    ctx.flush();

    let frame = state.frame_count;
    state.frame_count += 1;
    if frame % CAMERA_LOG_INTERVAL == 0 {
        camera::log_camera_context(&state.camera);
    }

    FrameReport {
        frame,
        ticks,
        projection_rebuilt,
        projection_matrix: state.projection.matrix,
        view_matrix,
    }
}

fn bind_texture_unit<G: GraphicsContext + ?Sized>(
    ctx: &mut G,
    unit: u32,
    texture: TextureHandle,
    sampler: UniformLocation,
) {
    ctx.active_texture(unit);
    ctx.bind_texture(texture);
    ctx.uniform_int(sampler, unit as i32);
}

// ============================================================================
// CAMERA CONTROL
// ============================================================================

/// Start continuous forward motion from the next frame on
pub fn move_forward(state: &mut RendererState) {
    state.camera = camera::move_forward(&state.camera);
}

pub fn stop_move(state: &mut RendererState) {
    state.camera = camera::stop_move(&state.camera);
}

/// Add `dx` to yaw and `dy` to pitch, in radians
pub fn rotate(state: &mut RendererState, dx: f64, dy: f64) {
    state.camera = camera::rotate(&state.camera, dx, dy);
}

// ============================================================================
// MAP AND LIGHTING
// ============================================================================

/// Replace the active map
///
/// The new map is packed into fresh atlases and fully uploaded before the
/// old map and its atlases are released. On failure the current map stays
/// active and untouched.
pub fn load_map<G: GraphicsContext + ?Sized>(
    ctx: &mut G,
    state: &mut RendererState,
    level: &BspLevel,
) -> RenderResult<()> {
    let mut atlases = create_atlas_set(ctx, state.config.atlas_size)?;
    let map = match build_map(ctx, level, &mut atlases) {
        Ok(map) => map,
        Err(err) => {
            log::error!("[Renderer::load_map] Keeping current map: {}", err);
            release_atlas_set(ctx, atlases);
            return Err(err);
        }
    };

    let old_map = std::mem::replace(&mut state.map, map);
    let old_atlases = std::mem::replace(&mut state.atlases, atlases);
    release_map(ctx, old_map);
    release_atlas_set(ctx, old_atlases);

    log::info!(
        "[Renderer::load_map] Switched map: {} faces drawn",
        state.map.stats.faces_drawn
    );
    Ok(())
}

/// Replace one light style's brightness pattern
pub fn set_light_style(state: &mut RendererState, index: usize, pattern: &str) -> RenderResult<()> {
    state.light_styles.set_pattern(index, pattern)
}

/// Write both atlases as PNG files into `directory`
pub fn save_atlas_debug(state: &RendererState, directory: impl AsRef<Path>) -> RenderResult<()> {
    let directory = directory.as_ref();
    std::fs::create_dir_all(directory).with_path(directory)?;
    save_debug(&state.atlases.diffuse, directory.join("diffuse_atlas.png"))?;
    save_debug(&state.atlases.lightmap, directory.join("lightmap_atlas.png"))?;
    log::info!(
        "[Renderer::save_atlas_debug] Wrote atlases to {}",
        directory.display()
    );
    Ok(())
}
