use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;

use kestrel_pipeline::{PassBuildContext, PassIo, PipelinePass};
use kestrel_rg::FrameGraph;
use kestrel_rhi::{ComputePipelineDesc, Device, TextureUsage};

use super::{bind_output_texture, parse_config};

#[derive(Deserialize, Clone, Copy, Debug)]
#[serde(default)]
pub struct TonemapConfig {
    pub exposure: f32,
}

impl Default for TonemapConfig {
    fn default() -> Self {
        Self { exposure: 1.0 }
    }
}

/// HDR to display range. Input: `[0]` lit color, output: `[0]` the LDR image.
pub struct TonemapPass {
    device: Arc<dyn Device>,
    #[allow(dead_code)]
    config: TonemapConfig,
}

impl TonemapPass {
    pub const TYPE_KEY: &'static str = "tonemap";

    pub fn factory(
    ) -> impl Fn(&PassBuildContext) -> anyhow::Result<Box<dyn PipelinePass>> + Send + Sync + 'static
    {
        move |ctx| {
            let config: TonemapConfig = parse_config(ctx.config)?;
            Ok(Box::new(TonemapPass {
                device: ctx.device.clone(),
                config,
            }))
        }
    }
}

impl PipelinePass for TonemapPass {
    fn setup(&mut self, graph: &mut FrameGraph, io: &mut PassIo) -> anyhow::Result<()> {
        let hdr = io.input(0)?;

        let pipeline = self
            .device
            .create_compute_pipeline(&ComputePipelineDesc::new("shaders/tonemap.hlsl"))
            .context("tonemap compute pipeline")?;

        let mut pass = graph.add_pass(io.name());
        pass.read(hdr);
        let ldr = bind_output_texture(
            &mut pass,
            io.output_slot(0)?,
            TextureUsage::STORAGE | TextureUsage::SAMPLED | TextureUsage::TRANSFER_SRC,
        );

        pass.compute(move |ctx, encoder| {
            encoder.bind_pipeline(pipeline);
            encoder.bind_texture(0, ctx.texture(hdr));
            encoder.bind_texture(1, ctx.texture(ldr));
            let groups_x = (ctx.frame.width + 7) / 8;
            let groups_y = (ctx.frame.height + 7) / 8;
            encoder.dispatch(groups_x, groups_y, 1);
            Ok(())
        });

        io.bind_output(0, ldr);
        Ok(())
    }
}
