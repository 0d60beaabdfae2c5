use std::sync::Arc;

use anyhow::Context;
use parking_lot::Mutex;
use serde::Deserialize;

use kestrel_pipeline::{PassBuildContext, PassIo, PipelinePass};
use kestrel_rg::FrameGraph;
use kestrel_rhi::{
    Buffer, BufferDesc, BufferUsage, ComputePipelineDesc, Device, TextureUsage,
};

use crate::context::{FrameScratch, RenderContext};
use super::{bind_output_texture, parse_config};

#[derive(Deserialize, Clone, Copy, Debug)]
#[serde(default)]
pub struct LightCullConfig {
    pub tile_size: u32,
    pub max_lights: u32,
}

impl Default for LightCullConfig {
    fn default() -> Self {
        Self {
            tile_size: 16,
            max_lights: 256,
        }
    }
}

/// Tiled light culling against the depth buffer.
///
/// Input: `[0]` scene depth. Output: `[0]` the per-tile light grid texture.
/// The flat light list buffer is owned by the pass and published into the
/// frame scratch each frame for the lighting pass to pick up.
pub struct LightCullPass {
    device: Arc<dyn Device>,
    scratch: Arc<Mutex<FrameScratch>>,
    light_buffer: Arc<Buffer>,
    config: LightCullConfig,
}

impl LightCullPass {
    pub const TYPE_KEY: &'static str = "light_cull";

    pub fn factory(
        render_ctx: &RenderContext,
    ) -> impl Fn(&PassBuildContext) -> anyhow::Result<Box<dyn PipelinePass>> + Send + Sync + 'static
    {
        let scratch = render_ctx.scratch.clone();
        move |ctx| {
            let config: LightCullConfig = parse_config(ctx.config)?;

            // 32 bytes per packed light
            let light_buffer = ctx
                .device
                .create_buffer(
                    BufferDesc::new(u64::from(config.max_lights) * 32, BufferUsage::STORAGE),
                    "culled_light_list",
                )
                .context("light list buffer")?;

            Ok(Box::new(LightCullPass {
                device: ctx.device.clone(),
                scratch: scratch.clone(),
                light_buffer: Arc::new(light_buffer),
                config,
            }))
        }
    }
}

impl PipelinePass for LightCullPass {
    fn setup(&mut self, graph: &mut FrameGraph, io: &mut PassIo) -> anyhow::Result<()> {
        let depth = io.input(0)?;

        let pipeline = self
            .device
            .create_compute_pipeline(&ComputePipelineDesc::new("shaders/light_cull.hlsl"))
            .context("light culling compute pipeline")?;

        let mut pass = graph.add_pass(io.name());
        pass.read(depth);
        let light_grid = bind_output_texture(
            &mut pass,
            io.output_slot(0)?,
            TextureUsage::STORAGE | TextureUsage::SAMPLED,
        );

        let scratch = self.scratch.clone();
        let light_buffer = self.light_buffer.clone();
        let config = self.config;
        pass.compute(move |ctx, encoder| {
            encoder.bind_pipeline(pipeline);
            encoder.bind_texture(0, ctx.texture(depth));
            encoder.bind_texture(1, ctx.texture(light_grid));
            encoder.bind_buffer(0, &light_buffer);

            let groups_x = (ctx.frame.width + config.tile_size - 1) / config.tile_size;
            let groups_y = (ctx.frame.height + config.tile_size - 1) / config.tile_size;
            encoder.dispatch(groups_x, groups_y, 1);

            // hand the list to the lighting pass later in this frame
            let mut scratch = scratch.lock();
            scratch.culled_lights = Some(light_buffer.clone());
            scratch.visible_light_count = config.max_lights;
            Ok(())
        });

        io.bind_output(0, light_grid);
        Ok(())
    }
}
