use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use kestrel_rg::FrameGraph;
use kestrel_rhi::{Device, Texture};

use crate::asset::PipelineAsset;
use crate::builder::{BuiltPipeline, PipelineBuilder};
use crate::registry::PassRegistry;

/// A pipeline currently driving frames: the asset it came from, the frame
/// graph built out of it (already compiled), and the constructed passes.
pub struct ActivePipeline {
    pub asset: PipelineAsset,
    pub graph: FrameGraph,
    pub pipeline: BuiltPipeline,
}

/// Owns the active pipeline and mediates reloads.
///
/// A failed reload never destroys working state: the previous pipeline keeps
/// driving frames, the failure counter goes up, and only a successful build
/// swaps the active graph.
pub struct PipelineHost {
    builder: PipelineBuilder,
    active: Option<ActivePipeline>,
    failure_count: u32,
}

impl PipelineHost {
    pub fn new() -> Self {
        Self {
            builder: PipelineBuilder::new(),
            active: None,
            failure_count: 0,
        }
    }

    pub fn active(&self) -> Option<&ActivePipeline> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut ActivePipeline> {
        self.active.as_mut()
    }

    /// Cumulative reload failures over the lifetime of the host.
    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn last_error(&self) -> Option<&str> {
        self.builder.last_error()
    }

    /// Build `asset` into a fresh graph and make it the active pipeline.
    ///
    /// Also the path for resolution changes: reload the active asset with the
    /// new extent.
    pub fn reload(
        &mut self,
        asset: PipelineAsset,
        registry: &PassRegistry,
        device: &Arc<dyn Device>,
        imports: &HashMap<String, Arc<Texture>>,
        width: u32,
        height: u32,
    ) -> anyhow::Result<()> {
        let mut graph = FrameGraph::new();

        match self
            .builder
            .build(&asset, registry, &mut graph, device, imports, width, height)
        {
            Ok(pipeline) => {
                graph.compile();
                glog::info!("pipeline {} is now active", pipeline.name());
                self.active = Some(ActivePipeline {
                    asset,
                    graph,
                    pipeline,
                });
                Ok(())
            }
            Err(err) => {
                self.failure_count += 1;
                glog::warn!(
                    "pipeline reload failed ({} failures so far), keeping the previous pipeline",
                    self.failure_count
                );
                Err(err)
            }
        }
    }

    pub fn reload_from_json(
        &mut self,
        text: &str,
        registry: &PassRegistry,
        device: &Arc<dyn Device>,
        imports: &HashMap<String, Arc<Texture>>,
        width: u32,
        height: u32,
    ) -> anyhow::Result<()> {
        let asset = match PipelineAsset::from_json(text) {
            Ok(asset) => asset,
            Err(err) => {
                self.failure_count += 1;
                glog::warn!("pipeline reload failed to parse, keeping the previous pipeline");
                return Err(err.into());
            }
        };
        self.reload(asset, registry, device, imports, width, height)
    }

    pub fn reload_from_file(
        &mut self,
        path: &Path,
        registry: &PassRegistry,
        device: &Arc<dyn Device>,
        imports: &HashMap<String, Arc<Texture>>,
        width: u32,
        height: u32,
    ) -> anyhow::Result<()> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read pipeline asset {}", path.display()))?;
        self.reload_from_json(&text, registry, device, imports, width, height)
    }
}

impl Default for PipelineHost {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{PassDecl, PipelineAsset};
    use crate::registry::{OutputSlot, PassIo, PassTypeMeta, PipelinePass};
    use kestrel_rhi::{HeadlessDevice, PixelFormat, TextureDesc};

    struct PassthroughPass;

    impl PipelinePass for PassthroughPass {
        fn setup(&mut self, graph: &mut FrameGraph, io: &mut PassIo) -> anyhow::Result<()> {
            let mut pass = graph.add_pass(io.name());
            for index in 0..io.input_count() {
                let input = io.input(index)?;
                pass.read(input);
            }
            let mut bound = Vec::new();
            for index in 0..io.output_count() {
                let handle = match io.output_slot(index)? {
                    OutputSlot::Target(handle) => pass.write(*handle),
                    OutputSlot::Create { name, desc } => pass.create(name, *desc),
                };
                bound.push(handle);
            }
            pass.compute(|_ctx, _encoder| Ok(()));
            for (index, handle) in bound.into_iter().enumerate() {
                io.bind_output(index, handle);
            }
            Ok(())
        }
    }

    fn environment() -> (
        PassRegistry,
        Arc<dyn Device>,
        HashMap<String, Arc<Texture>>,
    ) {
        let mut registry = PassRegistry::new();
        registry.register("passthrough", PassTypeMeta::default(), |_ctx| {
            Ok(Box::new(PassthroughPass))
        });

        let device = HeadlessDevice::new();
        let texture = device
            .create_texture(
                TextureDesc::new_2d(1280, 720, PixelFormat::Bgra8),
                "swapchain",
            )
            .unwrap();
        let mut imports = HashMap::new();
        imports.insert("$backbuffer".to_string(), Arc::new(texture));

        (registry, Arc::new(device), imports)
    }

    fn present_only(name: &str) -> PipelineAsset {
        PipelineAsset {
            name: name.to_string(),
            resources: Vec::new(),
            passes: vec![PassDecl {
                name: "present".to_string(),
                pass_type: "passthrough".to_string(),
                inputs: Vec::new(),
                outputs: vec!["$backbuffer".to_string()],
                enabled: true,
                side_effect: true,
                config: serde_json::Value::Null,
            }],
        }
    }

    #[test]
    fn failed_reload_keeps_the_previous_pipeline() {
        let (registry, device, imports) = environment();
        let mut host = PipelineHost::new();

        host.reload(present_only("good"), &registry, &device, &imports, 1280, 720)
            .unwrap();
        assert_eq!(host.failure_count(), 0);

        // reload with a cyclic asset: must fail, must not disturb the active one
        let mut bad = present_only("bad");
        bad.passes.push(PassDecl {
            name: "A".to_string(),
            pass_type: "passthrough".to_string(),
            inputs: vec!["b_out".to_string()],
            outputs: vec!["a_out".to_string()],
            enabled: true,
            side_effect: false,
            config: serde_json::Value::Null,
        });
        bad.passes.push(PassDecl {
            name: "B".to_string(),
            pass_type: "passthrough".to_string(),
            inputs: vec!["a_out".to_string()],
            outputs: vec!["b_out".to_string()],
            enabled: true,
            side_effect: false,
            config: serde_json::Value::Null,
        });

        assert!(host
            .reload(bad, &registry, &device, &imports, 1280, 720)
            .is_err());

        assert_eq!(host.failure_count(), 1);
        assert!(host.last_error().is_some());
        let active = host.active().unwrap();
        assert_eq!(active.pipeline.name(), "good");
        assert!(active.graph.is_compiled());
    }

    #[test]
    fn unparseable_json_counts_as_a_failure() {
        let (registry, device, imports) = environment();
        let mut host = PipelineHost::new();

        host.reload(present_only("good"), &registry, &device, &imports, 1280, 720)
            .unwrap();

        assert!(host
            .reload_from_json("{ not json", &registry, &device, &imports, 1280, 720)
            .is_err());

        assert_eq!(host.failure_count(), 1);
        assert_eq!(host.active().unwrap().pipeline.name(), "good");
    }

    #[test]
    fn successful_reload_swaps_the_active_pipeline() {
        let (registry, device, imports) = environment();
        let mut host = PipelineHost::new();

        host.reload(present_only("first"), &registry, &device, &imports, 1280, 720)
            .unwrap();
        host.reload(present_only("second"), &registry, &device, &imports, 1280, 720)
            .unwrap();

        assert_eq!(host.active().unwrap().pipeline.name(), "second");
        assert_eq!(host.failure_count(), 0);
    }
}
