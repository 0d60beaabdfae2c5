use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;

use kestrel_pipeline::{PassBuildContext, PassIo, PipelinePass};
use kestrel_rg::FrameGraph;
use kestrel_rhi::{Device, LoadAction, RasterPipelineDesc, StoreAction, Texture, TextureUsage};

use super::{bind_output_texture, output_desc, parse_config};

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct SkyConfig {
    pub shader: String,
}

impl Default for SkyConfig {
    fn default() -> Self {
        Self {
            shader: "shaders/sky.hlsl".to_string(),
        }
    }
}

/// Renders the sky behind the scene, sampling the atmosphere cubemap.
///
/// Input: `[0]` scene depth. Output: `[0]` sky color. When no atmosphere data
/// was loaded, the registered factory hands this pass a 1x1 flat-color
/// texture instead and the sky degrades to that color.
pub struct SkyPass {
    device: Arc<dyn Device>,
    environment: Arc<Texture>,
    config: SkyConfig,
}

impl SkyPass {
    pub const TYPE_KEY: &'static str = "sky";

    pub fn factory(
        environment: Arc<Texture>,
    ) -> impl Fn(&PassBuildContext) -> anyhow::Result<Box<dyn PipelinePass>> + Send + Sync + 'static
    {
        move |ctx| {
            let config: SkyConfig = parse_config(ctx.config)?;
            Ok(Box::new(SkyPass {
                device: ctx.device.clone(),
                environment: environment.clone(),
                config,
            }))
        }
    }
}

impl PipelinePass for SkyPass {
    fn setup(&mut self, graph: &mut FrameGraph, io: &mut PassIo) -> anyhow::Result<()> {
        let depth = io.input(0)?;
        let color_desc = output_desc(graph, io.output_slot(0)?);

        let pipeline = self
            .device
            .create_raster_pipeline(
                &RasterPipelineDesc::new(self.config.shader.as_str())
                    .color_format(color_desc.format),
            )
            .context("sky raster pipeline")?;

        let mut pass = graph.add_pass(io.name());
        pass.read(depth);
        let color = bind_output_texture(
            &mut pass,
            io.output_slot(0)?,
            TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
        );
        pass.set_color_attachment(0, color, LoadAction::Clear, StoreAction::Store, [0.0; 4]);

        let environment = self.environment.clone();
        pass.render(move |ctx, encoder| {
            encoder.bind_pipeline(pipeline);
            encoder.bind_texture(0, &environment);
            encoder.bind_texture(1, ctx.texture(depth));
            // fullscreen triangle
            encoder.draw(3, 1);
            Ok(())
        });

        io.bind_output(0, color);
        Ok(())
    }
}
