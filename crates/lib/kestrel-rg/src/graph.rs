use std::collections::HashMap;
use std::sync::Arc;

use kestrel_rhi::Texture;

use crate::graph_resource::{GraphResource, Handle};
use crate::pass::{Pass, PassBuilder, PassKind};
use crate::resource_registry::ResourceRegistry;

/// The per-frame dependency graph of passes and resources.
///
/// Passes execute in declaration order; the graph never reorders. Adding
/// passes in an order consistent with their declared reads and writes is the
/// caller's job (the declarative pipeline layer does it by topologically
/// sorting its pass declarations before it ever touches this graph).
pub struct FrameGraph {
    pub(crate) passes: Vec<Pass>,
    pub(crate) registry: ResourceRegistry,
    /// Externally supplied resources by name (e.g. the swapchain image).
    imported_by_name: HashMap<String, Handle>,
    compiled: bool,
}

impl FrameGraph {
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            registry: ResourceRegistry::new(),
            imported_by_name: HashMap::new(),
            compiled: false,
        }
    }

    /// Begin declaring a new pass. The pass joins the graph when the returned
    /// builder drops.
    pub fn add_pass(&mut self, name: &str) -> PassBuilder<'_> {
        let curr_pass_idx = self.passes.len();

        PassBuilder {
            pass: Some(Pass::new_empty(curr_pass_idx, name.to_string())),
            rg: self,
        }
    }

    pub(crate) fn finish_add_pass(&mut self, pass: Pass) {
        debug_assert!(
            pass.kind().is_some(),
            "pass {} dropped without an encode callback",
            pass.name
        );
        self.compiled = false;
        self.passes.push(pass);
    }

    /// Register an externally owned texture under a name.
    ///
    /// The graph references the texture for the whole frame but never
    /// allocates or frees it.
    pub fn import(&mut self, name: &str, texture: Arc<Texture>) -> Handle {
        assert!(
            !self.imported_by_name.contains_key(name),
            "resource {} is already imported",
            name
        );
        let handle = self.registry.import(name, texture);
        self.imported_by_name.insert(name.to_string(), handle);
        handle
    }

    /// Swap the texture behind an existing import, keeping its handle valid.
    pub fn update_import(&mut self, handle: Handle, texture: Arc<Texture>) {
        self.registry.update_import(handle, texture);
    }

    pub fn imported(&self, name: &str) -> Option<Handle> {
        self.imported_by_name.get(name).copied()
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn pass_name(&self, pass_idx: usize) -> &str {
        &self.passes[pass_idx].name
    }

    pub fn pass_kind(&self, pass_idx: usize) -> Option<PassKind> {
        self.passes[pass_idx].kind()
    }

    pub fn pass_ref_count(&self, pass_idx: usize) -> u32 {
        self.passes[pass_idx].ref_count
    }

    /// Pin a pass live from outside its setup, e.g. when a declarative pass
    /// declaration carries the side-effect flag.
    pub fn mark_side_effect(&mut self, pass_idx: usize) {
        self.compiled = false;
        self.passes[pass_idx].side_effect = true;
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    /// Drop every pass, resource and callback. Used between independent graph
    /// builds, e.g. on a resolution change.
    ///
    /// Transient backings should have been reclaimed first (see
    /// [`crate::Executor::reset_transients`]); anything still allocated here
    /// is dropped without going back to the pool.
    pub fn reset(&mut self) {
        for slot in &self.registry.slots {
            if let GraphResource::Created {
                backing: Some(_), ..
            } = &slot.resource
            {
                glog::warn!(
                    "resetting frame graph while transient {} is still allocated",
                    slot.name
                );
            }
        }

        self.passes.clear();
        self.registry = ResourceRegistry::new();
        self.imported_by_name.clear();
        self.compiled = false;
    }
}

impl Default for FrameGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Compilation: a two-phase reference-counting mark over passes and
/// resources. Deterministic and single-pass over the data; dependencies only
/// flow forward through producer relationships, so no fixpoint iteration is
/// needed.
impl FrameGraph {
    pub fn compile(&mut self) {
        // passes start live only if they are externally observable
        for pass in &mut self.passes {
            pass.ref_count = u32::from(pass.side_effect);
        }

        // count readers per resource
        for slot in &mut self.registry.slots {
            slot.ref_count = 0;
            slot.last_user = None;
        }
        for pass in &self.passes {
            for handle in &pass.reads {
                self.registry.slots[handle.index()].ref_count += 1;
            }
        }

        // propagate liveness one hop to producers. a producer is kept alive
        // if any reader of its output exists, whether or not that reader
        // itself survives culling. liveness is one producer-edge deep, not a
        // transitive mark-and-sweep; with the shallow graphs this renderer
        // builds, the work retained by that difference is negligible.
        for slot in &self.registry.slots {
            if slot.ref_count > 0 {
                if let Some(producer) = slot.producer {
                    self.passes[producer].ref_count += slot.ref_count;
                }
            }
        }

        // dead passes stay in the vec so indices remain stable; they are
        // skipped at execution.

        // the last live pass touching a resource is its deallocation point
        for (pass_idx, pass) in self.passes.iter().enumerate() {
            if pass.ref_count == 0 {
                continue;
            }
            for handle in pass.reads.iter().chain(pass.writes.iter()) {
                let slot = &mut self.registry.slots[handle.index()];
                slot.last_user = Some(
                    slot.last_user
                        .map(|last| last.max(pass_idx))
                        .unwrap_or(pass_idx),
                );
            }
        }

        self.compiled = true;
    }
}
