use std::collections::HashMap;
use std::sync::Arc;

use kestrel_rg::{FrameConstants, FrameGraph, PassKind, RgHandle};
use kestrel_rhi::{Device, TextureDesc};

/// Everything a pass factory gets to work with.
pub struct PassBuildContext<'a> {
    pub device: &'a Arc<dyn Device>,
    /// The declaration's opaque config object.
    pub config: &'a serde_json::Value,
    pub width: u32,
    pub height: u32,
}

/// A constructed pass instance, built by a registry factory and owned by the
/// built pipeline for the rest of its life.
pub trait PipelinePass {
    /// Declare this pass's resource dependencies into the frame graph.
    ///
    /// Called exactly once, right after construction, with the inputs the
    /// pipeline builder resolved for it.
    fn setup(&mut self, graph: &mut FrameGraph, io: &mut PassIo) -> anyhow::Result<()>;

    /// Per-frame context injection before execution. Most passes need
    /// nothing here.
    fn update(&mut self, _frame: &FrameConstants) {}
}

/// What one declared output resolves to.
pub enum OutputSlot {
    /// Externally supplied (`$`-named) or already produced by an earlier
    /// writer in the chain; the pass writes into the existing resource.
    Target(RgHandle),
    /// The pass is the producer: it creates the transient itself, starting
    /// from the declared description (usage flags are the pass's call).
    Create { name: String, desc: TextureDesc },
}

/// Resolved inputs and output slots handed to a pass during setup.
pub struct PassIo {
    pub(crate) name: String,
    pub(crate) side_effect: bool,
    pub(crate) inputs: Vec<RgHandle>,
    pub(crate) output_slots: Vec<OutputSlot>,
    pub(crate) bound_outputs: Vec<Option<RgHandle>>,
}

impl PassIo {
    /// The declaration's instance name (not the registry type key).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the declaration pinned this pass as side-effecting. The
    /// pipeline builder applies the flag itself; passes only need this when
    /// they branch on it.
    pub fn side_effect(&self) -> bool {
        self.side_effect
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn input(&self, index: usize) -> anyhow::Result<RgHandle> {
        self.inputs.get(index).copied().ok_or_else(|| {
            anyhow::anyhow!(
                "pass {} declares {} inputs, but its type wants input #{}",
                self.name,
                self.inputs.len(),
                index
            )
        })
    }

    pub fn output_count(&self) -> usize {
        self.output_slots.len()
    }

    pub fn output_slot(&self, index: usize) -> anyhow::Result<&OutputSlot> {
        self.output_slots.get(index).ok_or_else(|| {
            anyhow::anyhow!(
                "pass {} declares {} outputs, but its type wants output #{}",
                self.name,
                self.output_slots.len(),
                index
            )
        })
    }

    /// Record the graph handle this pass bound to output `index`, making it
    /// visible to downstream passes under the declared name.
    pub fn bind_output(&mut self, index: usize, handle: RgHandle) {
        assert!(
            index < self.bound_outputs.len(),
            "pass {} binds output #{} but only declares {}",
            self.name,
            index,
            self.bound_outputs.len()
        );
        self.bound_outputs[index] = Some(handle);
    }
}

/// Editor-facing metadata of a registered pass type.
#[derive(Clone, Debug, Default)]
pub struct PassTypeMeta {
    pub display_name: String,
    pub category: String,
    pub default_inputs: Vec<String>,
    pub default_outputs: Vec<String>,
    /// Schema of the pass's config object, for the node-graph editor's
    /// property panel. Opaque to the builder itself.
    pub config_schema: Option<serde_json::Value>,
    pub kind: Option<PassKind>,
}

pub type PassFactory =
    Box<dyn Fn(&PassBuildContext) -> anyhow::Result<Box<dyn PipelinePass>> + Send + Sync>;

struct PassEntry {
    meta: PassTypeMeta,
    factory: PassFactory,
}

/// Maps pass type names to factories.
///
/// An explicit object, constructed once at startup and passed by reference to
/// whoever needs to instantiate pass types; there is deliberately no global
/// instance, which also makes registries trivially substitutable in tests.
pub struct PassRegistry {
    entries: HashMap<String, PassEntry>,
}

impl PassRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        key: &str,
        meta: PassTypeMeta,
        factory: impl Fn(&PassBuildContext) -> anyhow::Result<Box<dyn PipelinePass>>
            + Send
            + Sync
            + 'static,
    ) {
        let previous = self.entries.insert(
            key.to_string(),
            PassEntry {
                meta,
                factory: Box::new(factory),
            },
        );
        if previous.is_some() {
            glog::warn!("pass type {} registered twice, keeping the newer factory", key);
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn meta(&self, key: &str) -> Option<&PassTypeMeta> {
        self.entries.get(key).map(|entry| &entry.meta)
    }

    /// Registered type keys, for editor tooling.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub(crate) fn construct(
        &self,
        key: &str,
        ctx: &PassBuildContext,
    ) -> anyhow::Result<Box<dyn PipelinePass>> {
        let entry = self
            .entries
            .get(key)
            .ok_or_else(|| anyhow::anyhow!("unregistered pass type {}", key))?;
        (entry.factory)(ctx)
    }
}

impl Default for PassRegistry {
    fn default() -> Self {
        Self::new()
    }
}
