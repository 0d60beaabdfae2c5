use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;

use kestrel_rg::{FrameConstants, FrameGraph, RgHandle};
use kestrel_rhi::{Device, Texture, TextureDesc, TextureUsage};

use crate::asset::{
    is_reserved, resolve_format, resolve_size, AssetError, PipelineAsset, ResourceKind,
};
use crate::registry::{OutputSlot, PassBuildContext, PassIo, PassRegistry, PipelinePass};

/// A pipeline after construction: the pass instances in execution order plus
/// the name -> handle map of everything they produced or imported.
pub struct BuiltPipeline {
    name: String,
    passes: Vec<(String, Box<dyn PipelinePass>)>,
    resources: HashMap<String, RgHandle>,
}

impl BuiltPipeline {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn pass_names(&self) -> impl Iterator<Item = &str> {
        self.passes.iter().map(|(name, _)| name.as_str())
    }

    pub fn pass_mut(&mut self, name: &str) -> Option<&mut (dyn PipelinePass + 'static)> {
        self.passes
            .iter_mut()
            .find(|(pass_name, _)| pass_name == name)
            .map(|(_, pass)| pass.as_mut())
    }

    /// Handle of a produced or imported resource, for UI and debug overlays.
    pub fn resource(&self, name: &str) -> Option<RgHandle> {
        self.resources.get(name).copied()
    }

    /// Per-frame context injection into every constructed pass.
    pub fn update_passes(&mut self, frame: &FrameConstants) {
        for (_, pass) in &mut self.passes {
            pass.update(frame);
        }
    }
}

/// Builds a frame graph out of a validated pipeline asset, instantiating
/// passes through a [`PassRegistry`].
pub struct PipelineBuilder {
    last_error: Option<String>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self { last_error: None }
    }

    /// The most recent build failure, kept as a plain string so editor-style
    /// tooling can show it without an error type crossing into UI code.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Validate and build.
    ///
    /// On failure the graph is reset: a pipeline is either fully constructed
    /// or not at all.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        &mut self,
        asset: &PipelineAsset,
        registry: &PassRegistry,
        graph: &mut FrameGraph,
        device: &Arc<dyn Device>,
        imports: &HashMap<String, Arc<Texture>>,
        width: u32,
        height: u32,
    ) -> anyhow::Result<BuiltPipeline> {
        match self.try_build(asset, registry, graph, device, imports, width, height) {
            Ok(pipeline) => {
                self.last_error = None;
                glog::info!(
                    "built pipeline {} ({} passes, {} resources)",
                    pipeline.name,
                    pipeline.pass_count(),
                    graph.registry().len()
                );
                Ok(pipeline)
            }
            Err(err) => {
                let message = format!("{:#}", err);
                glog::error!("pipeline {} failed to build: {}", asset.name, message);
                self.last_error = Some(message);
                graph.reset();
                Err(err)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn try_build(
        &mut self,
        asset: &PipelineAsset,
        registry: &PassRegistry,
        graph: &mut FrameGraph,
        device: &Arc<dyn Device>,
        imports: &HashMap<String, Arc<Texture>>,
        width: u32,
        height: u32,
    ) -> anyhow::Result<BuiltPipeline> {
        asset.validate()?;
        let order = asset.topological_sort();

        // every reserved name an enabled pass touches must have been supplied
        // by the caller; import them up front
        let mut resolved: HashMap<String, RgHandle> = HashMap::new();
        for decl in asset.passes.iter().filter(|decl| decl.enabled) {
            for name in decl.inputs.iter().chain(decl.outputs.iter()) {
                if !is_reserved(name) || resolved.contains_key(name) {
                    continue;
                }
                let texture = imports.get(name).ok_or_else(|| {
                    anyhow::anyhow!(
                        "externally supplied resource {} was not provided to the builder",
                        name
                    )
                })?;
                let handle = graph.import(name, texture.clone());
                resolved.insert(name.clone(), handle);
            }
        }

        let mut built_passes: Vec<(String, Box<dyn PipelinePass>)> = Vec::new();

        for &pass_idx in &order {
            let decl = &asset.passes[pass_idx];
            if !decl.enabled {
                glog::debug!("pipeline {}: skipping disabled pass {}", asset.name, decl.name);
                continue;
            }

            if !registry.contains(&decl.pass_type) {
                return Err(AssetError::UnknownPassType {
                    pass: decl.name.clone(),
                    pass_type: decl.pass_type.clone(),
                }
                .into());
            }

            let mut inputs = Vec::with_capacity(decl.inputs.len());
            for input in &decl.inputs {
                let handle = resolved.get(input).copied().ok_or_else(|| {
                    AssetError::UnresolvedInput {
                        pass: decl.name.clone(),
                        input: input.clone(),
                    }
                })?;
                inputs.push(handle);
            }

            let mut output_slots = Vec::with_capacity(decl.outputs.len());
            for output in &decl.outputs {
                if let Some(handle) = resolved.get(output) {
                    output_slots.push(OutputSlot::Target(*handle));
                } else {
                    output_slots.push(OutputSlot::Create {
                        name: output.clone(),
                        desc: declared_output_desc(asset, output, width, height),
                    });
                }
            }

            let ctx = PassBuildContext {
                device,
                config: &decl.config,
                width,
                height,
            };
            let mut pass = registry.construct(&decl.pass_type, &ctx).with_context(|| {
                format!(
                    "failed to construct pass {} (type {})",
                    decl.name, decl.pass_type
                )
            })?;

            let mut io = PassIo {
                name: decl.name.clone(),
                side_effect: decl.side_effect,
                inputs,
                output_slots,
                bound_outputs: vec![None; decl.outputs.len()],
            };

            let first_added = graph.pass_count();
            pass.setup(graph, &mut io)
                .with_context(|| format!("setup of pass {} failed", decl.name))?;

            // the declaration's flag pins everything this pass added; a pass
            // may additionally pin itself during setup
            if decl.side_effect {
                for added in first_added..graph.pass_count() {
                    graph.mark_side_effect(added);
                }
            }

            for (slot, output) in decl.outputs.iter().enumerate() {
                let handle = io.bound_outputs[slot].ok_or_else(|| {
                    anyhow::anyhow!("pass {} never bound its output {}", decl.name, output)
                })?;
                resolved.insert(output.clone(), handle);
            }

            built_passes.push((decl.name.clone(), pass));
        }

        Ok(BuiltPipeline {
            name: asset.name.clone(),
            passes: built_passes,
            resources: resolved,
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Description for a transient a pass is about to create, resolved from the
/// asset's resource declaration. Usage flags stay at the 2d default; the
/// producing pass adjusts them to how it actually binds the texture.
fn declared_output_desc(
    asset: &PipelineAsset,
    output: &str,
    width: u32,
    height: u32,
) -> TextureDesc {
    let Some(decl) = asset.resource(output) else {
        glog::warn!(
            "pipeline {}: output {} has no resource declaration, defaulting to a screen-sized RGBA8 target",
            asset.name,
            output
        );
        return TextureDesc::new_2d(width, height, kestrel_rhi::PixelFormat::Rgba8)
            .usage_flags(TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED);
    };

    if decl.kind == ResourceKind::Buffer {
        // graph-tracked resources are textures; buffers belong to scene code
        glog::warn!(
            "pipeline {}: {} is declared as a buffer, which the frame graph does not manage; treating it as a screen-sized texture",
            asset.name,
            output
        );
    }

    let (width, height) = resolve_size(&decl.size, width, height);
    TextureDesc::new_2d(width, height, resolve_format(&decl.format))
}
