use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;

use kestrel_pipeline::{PassBuildContext, PassIo, PipelinePass};
use kestrel_rg::FrameGraph;
use kestrel_rhi::{Device, LoadAction, RasterPipelineDesc, StoreAction, TextureUsage};

use crate::context::{RenderContext, SceneBuffers};
use super::{bind_output_texture, output_desc, parse_config};

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct GeometryConfig {
    pub shader: String,
    pub clear_color: [f32; 4],
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            shader: "shaders/geometry_meshlet.hlsl".to_string(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Rasterizes the scene's meshlets into a color target and a depth target.
///
/// Outputs: `[0]` color, `[1]` depth. The pipeline state is created at setup
/// time, once the declared target formats are known.
pub struct GeometryPass {
    device: Arc<dyn Device>,
    scene: Arc<SceneBuffers>,
    config: GeometryConfig,
}

impl GeometryPass {
    pub const TYPE_KEY: &'static str = "geometry";

    pub fn factory(
        render_ctx: &RenderContext,
    ) -> impl Fn(&PassBuildContext) -> anyhow::Result<Box<dyn PipelinePass>> + Send + Sync + 'static
    {
        let scene = render_ctx.scene.clone();
        move |ctx| {
            let config: GeometryConfig = parse_config(ctx.config)?;
            Ok(Box::new(GeometryPass {
                device: ctx.device.clone(),
                scene: scene.clone(),
                config,
            }))
        }
    }
}

impl PipelinePass for GeometryPass {
    fn setup(&mut self, graph: &mut FrameGraph, io: &mut PassIo) -> anyhow::Result<()> {
        let color_desc = output_desc(graph, io.output_slot(0)?);
        let depth_desc = output_desc(graph, io.output_slot(1)?);

        let pipeline = self
            .device
            .create_raster_pipeline(
                &RasterPipelineDesc::new(self.config.shader.as_str())
                    .color_format(color_desc.format)
                    .depth_format(depth_desc.format),
            )
            .context("geometry raster pipeline")?;

        let mut pass = graph.add_pass(io.name());
        let color = bind_output_texture(
            &mut pass,
            io.output_slot(0)?,
            TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
        );
        let depth = bind_output_texture(
            &mut pass,
            io.output_slot(1)?,
            TextureUsage::DEPTH_TARGET | TextureUsage::SAMPLED,
        );
        pass.set_color_attachment(
            0,
            color,
            LoadAction::Clear,
            StoreAction::Store,
            self.config.clear_color,
        );
        pass.set_depth_attachment(depth, LoadAction::Clear, StoreAction::Store, 1.0);

        let scene = self.scene.clone();
        pass.render(move |_ctx, encoder| {
            encoder.bind_pipeline(pipeline);
            encoder.bind_buffer(0, &scene.vertex_buffer);
            encoder.bind_buffer(1, &scene.meshlet_buffer);
            encoder.draw_indexed(scene.index_count, 1);
            Ok(())
        });

        io.bind_output(0, color);
        io.bind_output(1, depth);
        Ok(())
    }
}
