//! Renders a generated room offscreen for a few frames
//!
//! Walks forward while turning, printing what each frame did. Pass
//! `--config <file.toml>` to override the renderer settings and
//! `--dump-atlases <dir>` to write both atlases as PNG afterwards.

use anyhow::{Context, Result};
use quake_view_core::{
    asset::sample_archive,
    bsp::sample_room_level,
    load_config,
    renderer::{self, save_atlas_debug},
    RendererConfig, WgpuContext,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;
const FRAMES: u32 = 8;

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let mut config_path = None;
    let mut dump_dir = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config_path = args.next(),
            "--dump-atlases" => dump_dir = args.next(),
            other => anyhow::bail!("unknown argument {other}"),
        }
    }

    let config = match config_path {
        Some(path) => load_config(&path).with_context(|| format!("loading {path}"))?,
        None => {
            let mut config = RendererConfig::default();
            // Inside the room, level with the floor's centre
            config.camera.position = [0.0, 0.0, -64.0];
            config
        }
    };

    let instance = wgpu::Instance::default();
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        ..Default::default()
    }))
    .context("no suitable GPU adapter")?;

    let (device, queue) = pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("Headless Frames Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
        },
        None,
    ))
    .context("failed to create device")?;

    let format = wgpu::TextureFormat::Rgba8Unorm;
    let target = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Offscreen Target"),
        size: wgpu::Extent3d {
            width: WIDTH,
            height: HEIGHT,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });

    let mut ctx = WgpuContext::new(Arc::new(device), Arc::new(queue), format);
    ctx.attach_target(
        target.create_view(&wgpu::TextureViewDescriptor::default()),
        WIDTH,
        HEIGHT,
    );

    let archive = sample_archive();
    let level = sample_room_level(128.0);
    let mut state = renderer::init_renderer(&mut ctx, &archive, &level, config)?;
    println!(
        "Map: {} of {} faces, {} vertices",
        state.map.stats.faces_drawn, state.map.stats.faces_total, state.map.vertex_count
    );

    let start = Instant::now();
    let frame_time = Duration::from_secs(1) / 30;
    renderer::move_forward(&mut state);
    for frame in 0..FRAMES {
        let report = renderer::draw_at(&mut ctx, &mut state, WIDTH, HEIGHT, start + frame_time * frame);
        renderer::rotate(&mut state, 0.05, 0.0);
        let position = state.camera.position;
        println!(
            "Frame {}: {:.2} ticks, projection rebuilt: {}, camera at ({:.1}, {:.1}, {:.1})",
            report.frame, report.ticks, report.projection_rebuilt, position.x, position.y, position.z
        );
    }
    renderer::stop_move(&mut state);
    println!("Render pipelines built: {}", ctx.pipeline_count());

    if let Some(dir) = dump_dir {
        save_atlas_debug(&state, &dir).with_context(|| format!("dumping atlases to {dir}"))?;
        println!("Atlases written to {dir}");
    }

    renderer::shutdown_renderer(&mut ctx, state);
    Ok(())
}
