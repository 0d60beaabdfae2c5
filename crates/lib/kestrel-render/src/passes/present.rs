use kestrel_pipeline::{PassBuildContext, PassIo, PipelinePass};
use kestrel_rg::FrameGraph;
use kestrel_rhi::TextureUsage;

use super::bind_output_texture;

/// Copies the final image into the externally supplied backbuffer.
///
/// Writing the presented image is externally observable, so the pass pins
/// itself live regardless of what the declaration says.
pub struct PresentPass;

impl PresentPass {
    pub const TYPE_KEY: &'static str = "present";

    pub fn factory(
    ) -> impl Fn(&PassBuildContext) -> anyhow::Result<Box<dyn PipelinePass>> + Send + Sync + 'static
    {
        move |_ctx| Ok(Box::new(PresentPass))
    }
}

impl PipelinePass for PresentPass {
    fn setup(&mut self, graph: &mut FrameGraph, io: &mut PassIo) -> anyhow::Result<()> {
        let source = io.input(0)?;

        let mut pass = graph.add_pass(io.name());
        pass.read(source);
        let target = bind_output_texture(
            &mut pass,
            io.output_slot(0)?,
            TextureUsage::TRANSFER_DST,
        );
        pass.set_side_effect();

        pass.blit(move |ctx, encoder| {
            encoder.copy_texture(ctx.texture(source), ctx.texture(target));
            Ok(())
        });

        io.bind_output(0, target);
        Ok(())
    }
}
