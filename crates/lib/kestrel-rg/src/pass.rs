use arrayvec::ArrayVec;

use kestrel_rhi::{
    BlitEncoder, ComputeEncoder, LoadAction, RenderEncoder, StoreAction, TextureDesc,
    MAX_COLOR_ATTACHMENTS,
};

use crate::graph::FrameGraph;
use crate::graph_resource::Handle;
use crate::pass_context::PassContext;

pub type RenderFunc =
    dyn FnMut(&mut PassContext, &mut dyn RenderEncoder) -> anyhow::Result<()>;
pub type ComputeFunc =
    dyn FnMut(&mut PassContext, &mut dyn ComputeEncoder) -> anyhow::Result<()>;
pub type BlitFunc = dyn FnMut(&mut PassContext, &mut dyn BlitEncoder) -> anyhow::Result<()>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PassKind {
    Render,
    Compute,
    Blit,
}

/// The one encode callback of a pass, tagged by kind.
///
/// A pass carries exactly the closure matching its kind; invoking the wrong
/// encoder for a pass is unrepresentable.
pub(crate) enum PassEncodeFn {
    /// The builder has not picked a kind yet. Executing a pass left in this
    /// state is a programmer error.
    Pending,
    Render(Box<RenderFunc>),
    Compute(Box<ComputeFunc>),
    Blit(Box<BlitFunc>),
}

#[derive(Clone, Copy, Debug)]
pub struct ColorAttachment {
    pub handle: Handle,
    pub load: LoadAction,
    pub store: StoreAction,
    pub clear_color: [f32; 4],
}

#[derive(Clone, Copy, Debug)]
pub struct DepthAttachment {
    pub handle: Handle,
    pub load: LoadAction,
    pub store: StoreAction,
    pub clear_depth: f32,
}

/// One unit of GPU work in the frame graph.
pub(crate) struct Pass {
    /// Slot id of the pass in the frame graph.
    pub(crate) id: usize,
    pub(crate) name: String,
    /// Resources read by this pass, in declaration order.
    pub(crate) reads: Vec<Handle>,
    /// Resources written by this pass, in declaration order. Attachments
    /// count as writes.
    pub(crate) writes: Vec<Handle>,
    /// Indexed by attachment slot, unbound slots are None.
    pub(crate) color_attachments: ArrayVec<Option<ColorAttachment>, MAX_COLOR_ATTACHMENTS>,
    pub(crate) depth_attachment: Option<DepthAttachment>,
    /// Forces the pass to survive culling even with zero readers.
    pub(crate) side_effect: bool,
    /// Computed by compile(); a pass ending up with zero is skipped at
    /// execution but stays in the graph so pass indices remain stable.
    pub(crate) ref_count: u32,
    pub(crate) encode_fn: PassEncodeFn,
}

impl Pass {
    pub(crate) fn new_empty(id: usize, name: String) -> Self {
        Self {
            id,
            name,
            reads: Vec::new(),
            writes: Vec::new(),
            color_attachments: ArrayVec::new(),
            depth_attachment: None,
            side_effect: false,
            ref_count: 0,
            encode_fn: PassEncodeFn::Pending,
        }
    }

    pub(crate) fn kind(&self) -> Option<PassKind> {
        match self.encode_fn {
            PassEncodeFn::Pending => None,
            PassEncodeFn::Render(_) => Some(PassKind::Render),
            PassEncodeFn::Compute(_) => Some(PassKind::Compute),
            PassEncodeFn::Blit(_) => Some(PassKind::Blit),
        }
    }
}

/// Declaration API handed to a pass while it is being set up.
///
/// All resource dependencies of a pass go through here, and only here: the
/// builder mutates the pass graph and the resource registry on behalf of the
/// one pass it was created for. Dropping the builder adds the pass to the
/// graph.
pub struct PassBuilder<'rg> {
    pub(crate) rg: &'rg mut FrameGraph,
    pub(crate) pass: Option<Pass>,
}

impl<'rg> Drop for PassBuilder<'rg> {
    fn drop(&mut self) {
        // a contract violation mid-setup already unwinds; don't add the
        // half-declared pass on top of it
        if std::thread::panicking() {
            return;
        }
        self.rg.finish_add_pass(self.pass.take().unwrap());
    }
}

impl<'rg> PassBuilder<'rg> {
    /// Register a new transient resource produced by this pass.
    ///
    /// No GPU state is touched here; the executor allocates the backing
    /// texture right before this pass runs.
    pub fn create(&mut self, name: &str, desc: TextureDesc) -> Handle {
        let pass = self.pass.as_mut().unwrap();
        let handle = self.rg.registry.declare(name, desc, pass.id);
        pass.writes.push(handle);
        handle
    }

    /// Record this pass as a reader of an existing resource.
    pub fn read(&mut self, handle: Handle) -> Handle {
        // bounds assertion doubles as the handle validity contract
        let _ = self.rg.registry.slot(handle);
        self.pass.as_mut().unwrap().reads.push(handle);
        handle
    }

    /// Record this pass as a writer of an existing resource without creating
    /// it (ping-pong targets, later-stage mutation of an import).
    pub fn write(&mut self, handle: Handle) -> Handle {
        let _ = self.rg.registry.slot(handle);
        self.pass.as_mut().unwrap().writes.push(handle);
        handle
    }

    /// Bind a color attachment. Implicitly records a write.
    pub fn set_color_attachment(
        &mut self,
        slot: usize,
        handle: Handle,
        load: LoadAction,
        store: StoreAction,
        clear_color: [f32; 4],
    ) {
        assert!(
            slot < MAX_COLOR_ATTACHMENTS,
            "color attachment slot {} out of range",
            slot
        );
        self.write(handle);

        let pass = self.pass.as_mut().unwrap();
        while pass.color_attachments.len() <= slot {
            pass.color_attachments.push(None);
        }
        pass.color_attachments[slot] = Some(ColorAttachment {
            handle,
            load,
            store,
            clear_color,
        });
    }

    /// Bind the depth attachment. Implicitly records a write.
    pub fn set_depth_attachment(
        &mut self,
        handle: Handle,
        load: LoadAction,
        store: StoreAction,
        clear_depth: f32,
    ) {
        self.write(handle);
        self.pass.as_mut().unwrap().depth_attachment = Some(DepthAttachment {
            handle,
            load,
            store,
            clear_depth,
        });
    }

    /// Mark the pass as externally observable, pinning it live through
    /// culling even when nothing reads its outputs.
    pub fn set_side_effect(&mut self) {
        self.pass.as_mut().unwrap().side_effect = true;
    }

    /// Finish as a raster pass with the given encode callback.
    pub fn render(
        mut self,
        encode_fn: impl FnMut(&mut PassContext, &mut dyn RenderEncoder) -> anyhow::Result<()>
            + 'static,
    ) {
        self.set_encode_fn(PassEncodeFn::Render(Box::new(encode_fn)));
    }

    /// Finish as a compute pass with the given encode callback.
    pub fn compute(
        mut self,
        encode_fn: impl FnMut(&mut PassContext, &mut dyn ComputeEncoder) -> anyhow::Result<()>
            + 'static,
    ) {
        self.set_encode_fn(PassEncodeFn::Compute(Box::new(encode_fn)));
    }

    /// Finish as a blit pass with the given encode callback.
    pub fn blit(
        mut self,
        encode_fn: impl FnMut(&mut PassContext, &mut dyn BlitEncoder) -> anyhow::Result<()>
            + 'static,
    ) {
        self.set_encode_fn(PassEncodeFn::Blit(Box::new(encode_fn)));
    }

    fn set_encode_fn(&mut self, encode_fn: PassEncodeFn) {
        let pass = self.pass.as_mut().unwrap();
        assert!(
            matches!(pass.encode_fn, PassEncodeFn::Pending),
            "pass {} already has an encode callback",
            pass.name
        );
        pass.encode_fn = encode_fn;
    }
}
