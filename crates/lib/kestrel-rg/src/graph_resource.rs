use std::sync::Arc;

use kestrel_rhi::{Texture, TextureDesc};

/// Handle to a resource tracked by the frame graph.
///
/// Only meaningful for the graph it came from; using it against another graph
/// is a programmer error and is caught by the registry's bounds assertions.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct Handle {
    /// Slot id of the resource in the resource registry.
    pub(crate) id: u32,
}

impl Handle {
    pub fn index(self) -> usize {
        self.id as usize
    }
}

/// A resource as the graph owns it.
///
/// Created resources are transient: declared up front, backed lazily by the
/// executor, and released once their last consumer has run. Imported
/// resources are owned by the caller for the whole frame; the graph never
/// allocates or frees them.
pub(crate) enum GraphResource {
    Created {
        desc: TextureDesc,
        backing: Option<Texture>,
    },
    Imported {
        texture: Arc<Texture>,
    },
}

impl GraphResource {
    pub(crate) fn desc(&self) -> TextureDesc {
        match self {
            GraphResource::Created { desc, .. } => *desc,
            GraphResource::Imported { texture } => texture.desc,
        }
    }

    pub(crate) fn is_imported(&self) -> bool {
        matches!(self, GraphResource::Imported { .. })
    }
}
