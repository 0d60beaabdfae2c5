use std::sync::Arc;

use anyhow::Context;
use arrayvec::ArrayVec;

use kestrel_rhi::{ColorAttachmentDesc, DepthAttachmentDesc, Device, RenderEncoderDesc};

use crate::graph::FrameGraph;
use crate::graph_resource::GraphResource;
use crate::pass::{Pass, PassEncodeFn};
use crate::pass_context::PassContext;
use crate::transient_resource_cache::TransientResourceCache;

/// Per-frame values every encode callback can see.
#[derive(Clone, Copy, Debug)]
pub struct FrameConstants {
    pub frame_index: u64,
    /// Current target extent, what "screen"-sized resources resolve against.
    pub width: u32,
    pub height: u32,
}

/// Walks a compiled frame graph in declaration order, allocating transients
/// right before their producing pass and releasing them right after their
/// last consumer.
pub struct Executor {
    device: Arc<dyn Device>,
    transient_cache: TransientResourceCache,
}

impl Executor {
    pub fn new(device: Arc<dyn Device>) -> Self {
        Self {
            device,
            transient_cache: TransientResourceCache::new(),
        }
    }

    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    /// Number of textures currently parked in the transient pool.
    pub fn cached_transient_count(&self) -> usize {
        self.transient_cache.len()
    }

    /// Run one frame.
    ///
    /// Encoding failures are fatal for the frame and are not retried; by the
    /// time a callback fails, earlier passes already committed GPU work.
    pub fn execute(
        &mut self,
        graph: &mut FrameGraph,
        frame: &FrameConstants,
    ) -> anyhow::Result<()> {
        assert!(
            graph.is_compiled(),
            "execute() called on an uncompiled frame graph"
        );

        for pass_idx in 0..graph.passes.len() {
            if graph.passes[pass_idx].ref_count == 0 {
                glog::trace!("skipping culled pass {}", graph.passes[pass_idx].name);
                continue;
            }

            self.allocate_produced_resources(graph, pass_idx)?;
            Self::encode_pass(&self.device, graph, pass_idx, frame)?;
            self.release_expired_resources(graph, pass_idx);
        }

        Ok(())
    }

    /// Give every transient resource created by this pass its backing
    /// texture, pool first, device second.
    fn allocate_produced_resources(
        &mut self,
        graph: &mut FrameGraph,
        pass_idx: usize,
    ) -> anyhow::Result<()> {
        for slot in graph.registry.slots.iter_mut() {
            if slot.producer != Some(pass_idx) {
                continue;
            }

            if let GraphResource::Created { desc, backing } = &mut slot.resource {
                if backing.is_none() {
                    let texture = match self.transient_cache.get(desc) {
                        Some(texture) => texture,
                        None => self
                            .device
                            .create_texture(*desc, &slot.name)
                            .with_context(|| {
                                format!("failed to allocate transient resource {}", slot.name)
                            })?,
                    };

                    glog::trace!("allocated transient {} at pass {}", slot.name, pass_idx);
                    *backing = Some(texture);
                }
            }
        }

        Ok(())
    }

    fn encode_pass(
        device: &Arc<dyn Device>,
        graph: &mut FrameGraph,
        pass_idx: usize,
        frame: &FrameConstants,
    ) -> anyhow::Result<()> {
        let Pass {
            name,
            color_attachments,
            depth_attachment,
            encode_fn,
            ..
        } = &mut graph.passes[pass_idx];

        let mut ctx = PassContext {
            resources: &graph.registry,
            frame,
        };

        match encode_fn {
            PassEncodeFn::Render(encode_fn) => {
                let mut attachments = ArrayVec::new();
                for bound in color_attachments.iter() {
                    attachments.push(bound.as_ref().map(|attachment| ColorAttachmentDesc {
                        texture: graph.registry.texture(attachment.handle),
                        load: attachment.load,
                        store: attachment.store,
                        clear_color: attachment.clear_color,
                    }));
                }
                let depth_attachment =
                    depth_attachment.as_ref().map(|attachment| DepthAttachmentDesc {
                        texture: graph.registry.texture(attachment.handle),
                        load: attachment.load,
                        store: attachment.store,
                        clear_depth: attachment.clear_depth,
                    });

                let desc = RenderEncoderDesc {
                    label: name,
                    color_attachments: attachments,
                    depth_attachment,
                };

                let mut encoder = device.begin_render_encoder(&desc);
                encoder.push_debug_group(name);
                encode_fn(&mut ctx, encoder.as_mut())
                    .with_context(|| format!("render pass {} failed to encode", name))?;
                encoder.pop_debug_group();
                // the encoder scope ends when it drops, right here
            }
            PassEncodeFn::Compute(encode_fn) => {
                let mut encoder = device.begin_compute_encoder(name);
                encoder.push_debug_group(name);
                encode_fn(&mut ctx, encoder.as_mut())
                    .with_context(|| format!("compute pass {} failed to encode", name))?;
                encoder.pop_debug_group();
            }
            PassEncodeFn::Blit(encode_fn) => {
                let mut encoder = device.begin_blit_encoder(name);
                encoder.push_debug_group(name);
                encode_fn(&mut ctx, encoder.as_mut())
                    .with_context(|| format!("blit pass {} failed to encode", name))?;
                encoder.pop_debug_group();
            }
            PassEncodeFn::Pending => {
                panic!("pass {} reached execution without an encode callback", name)
            }
        }

        Ok(())
    }

    /// Return every transient whose last consumer just ran to the pool and
    /// null its backing so re-execution allocates it afresh.
    fn release_expired_resources(&mut self, graph: &mut FrameGraph, pass_idx: usize) {
        for slot in graph.registry.slots.iter_mut() {
            if slot.last_user != Some(pass_idx) {
                continue;
            }

            if let GraphResource::Created { backing, .. } = &mut slot.resource {
                if let Some(texture) = backing.take() {
                    glog::trace!("released transient {} after pass {}", slot.name, pass_idx);
                    self.transient_cache.store(texture);
                }
            }
        }
    }

    /// Null out transient backings only, keeping the compiled structure.
    ///
    /// Cheap to call between frames of the same graph; after a normal
    /// execute() everything has already been released pass by pass and this
    /// is a no-op.
    pub fn reset_transients(&mut self, graph: &mut FrameGraph) {
        for slot in graph.registry.slots.iter_mut() {
            if let GraphResource::Created { backing, .. } = &mut slot.resource {
                if let Some(texture) = backing.take() {
                    self.transient_cache.store(texture);
                }
            }
        }
    }

    /// Explicitly destroy everything parked in the transient pool.
    pub fn shutdown(self) {
        self.transient_cache.clean(self.device.as_ref());
    }
}
