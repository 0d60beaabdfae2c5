use std::sync::Arc;

use anyhow::Context;
use parking_lot::Mutex;
use serde::Deserialize;

use kestrel_pipeline::{PassBuildContext, PassIo, PipelinePass};
use kestrel_rg::FrameGraph;
use kestrel_rhi::{Device, LoadAction, RasterPipelineDesc, StoreAction, TextureUsage};

use crate::context::{FrameScratch, RenderContext};
use super::{bind_output_texture, output_desc, parse_config};

#[derive(Deserialize, Clone, Copy, Debug)]
#[serde(default)]
pub struct LightingConfig {
    pub ambient_intensity: f32,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            ambient_intensity: 0.03,
        }
    }
}

/// Shades the scene: albedo plus sky composite, lit by the culled light list
/// the light culling pass published into the frame scratch earlier this
/// frame.
///
/// Inputs: `[0]` scene color, `[1]` sky color, `[2]` light grid.
/// Output: `[0]` lit color.
pub struct LightingPass {
    device: Arc<dyn Device>,
    scratch: Arc<Mutex<FrameScratch>>,
    #[allow(dead_code)]
    config: LightingConfig,
}

impl LightingPass {
    pub const TYPE_KEY: &'static str = "lighting";

    pub fn factory(
        render_ctx: &RenderContext,
    ) -> impl Fn(&PassBuildContext) -> anyhow::Result<Box<dyn PipelinePass>> + Send + Sync + 'static
    {
        let scratch = render_ctx.scratch.clone();
        move |ctx| {
            let config: LightingConfig = parse_config(ctx.config)?;
            Ok(Box::new(LightingPass {
                device: ctx.device.clone(),
                scratch: scratch.clone(),
                config,
            }))
        }
    }
}

impl PipelinePass for LightingPass {
    fn setup(&mut self, graph: &mut FrameGraph, io: &mut PassIo) -> anyhow::Result<()> {
        let scene_color = io.input(0)?;
        let sky_color = io.input(1)?;
        let light_grid = io.input(2)?;
        let lit_desc = output_desc(graph, io.output_slot(0)?);

        let pipeline = self
            .device
            .create_raster_pipeline(
                &RasterPipelineDesc::new("shaders/lighting.hlsl").color_format(lit_desc.format),
            )
            .context("lighting raster pipeline")?;

        let mut pass = graph.add_pass(io.name());
        pass.read(scene_color);
        pass.read(sky_color);
        pass.read(light_grid);
        let lit = bind_output_texture(
            &mut pass,
            io.output_slot(0)?,
            TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
        );
        pass.set_color_attachment(0, lit, LoadAction::DontCare, StoreAction::Store, [0.0; 4]);

        let scratch = self.scratch.clone();
        pass.render(move |ctx, encoder| {
            let scratch = scratch.lock();
            let lights = scratch.culled_lights.as_ref().ok_or_else(|| {
                anyhow::anyhow!("light culling did not publish a light list this frame")
            })?;

            encoder.bind_pipeline(pipeline);
            encoder.bind_texture(0, ctx.texture(scene_color));
            encoder.bind_texture(1, ctx.texture(sky_color));
            encoder.bind_texture(2, ctx.texture(light_grid));
            encoder.bind_buffer(0, lights);
            encoder.draw(3, 1);
            Ok(())
        });

        io.bind_output(0, lit);
        Ok(())
    }
}
