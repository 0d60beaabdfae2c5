// use log macros.
#[macro_use]
extern crate log as _log;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use structopt::StructOpt;

use kestrel_pipeline::{PassRegistry, PipelineHost};
use kestrel_render::{register_builtin_passes, RenderContext, SceneBuffers};
use kestrel_rg::{Executor, FrameConstants};
use kestrel_rhi::{Device, HeadlessDevice, PixelFormat, TextureDesc, TextureUsage};

/// Headless driver: loads a declarative pipeline asset, builds the frame
/// graph and runs it for a few frames against the headless device.
#[derive(StructOpt, Debug)]
#[structopt(name = "sandbox")]
struct Opt {
    #[structopt(long, default_value = "1280")]
    width: u32,

    #[structopt(long, default_value = "720")]
    height: u32,

    /// How many frames to drive before exiting.
    #[structopt(long, default_value = "3")]
    frames: u64,

    /// Pipeline asset to load.
    #[structopt(long, parse(from_os_str), default_value = "assets/pipelines/forward.json")]
    pipeline: PathBuf,

    /// Per-pass trace logging.
    #[structopt(long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();

    kestrel_log::init(if opt.verbose {
        log::LevelFilter::Trace
    } else {
        log::LevelFilter::Info
    })?;

    let device = HeadlessDevice::new();
    let device_dyn: Arc<dyn Device> = Arc::new(device.clone());

    // scene loading lives outside the renderer; a few placeholder buffers
    // stand in for the loaded meshlet data
    let scene = Arc::new(SceneBuffers::new(&device_dyn, 4 << 20, 180_000, 1500)?);
    let render_ctx = RenderContext::new(device_dyn.clone(), scene);

    let mut registry = PassRegistry::new();
    register_builtin_passes(&mut registry, &render_ctx)?;

    // stand-in for the swapchain image
    let swapchain = Arc::new(device.create_texture(
        TextureDesc::new_2d(opt.width, opt.height, PixelFormat::Bgra8)
            .usage_flags(TextureUsage::RENDER_TARGET | TextureUsage::TRANSFER_DST),
        "swapchain",
    )?);
    let mut imports = HashMap::new();
    imports.insert("$backbuffer".to_string(), swapchain);

    let mut host = PipelineHost::new();
    host.reload_from_file(
        &opt.pipeline,
        &registry,
        &device_dyn,
        &imports,
        opt.width,
        opt.height,
    )?;

    let mut executor = Executor::new(device_dyn);
    let active = host
        .active_mut()
        .context("no active pipeline after reload")?;

    info!(
        "driving pipeline {} at {}x{} for {} frames",
        active.pipeline.name(),
        opt.width,
        opt.height,
        opt.frames
    );

    for frame_index in 0..opt.frames {
        let frame = FrameConstants {
            frame_index,
            width: opt.width,
            height: opt.height,
        };

        render_ctx.scratch.lock().clear();
        active.pipeline.update_passes(&frame);
        executor.execute(&mut active.graph, &frame)?;
        executor.reset_transients(&mut active.graph);
    }

    let stats = device.stats();
    info!(
        "{} frames: {} draws, {} dispatches, {} copies across {} encoder scopes",
        opt.frames, stats.draws, stats.dispatches, stats.copies, stats.encoders_begun
    );
    info!(
        "textures: {} created, {} currently pooled",
        stats.textures_created,
        executor.cached_transient_count()
    );

    executor.shutdown();
    Ok(())
}
