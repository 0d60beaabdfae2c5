use std::sync::Arc;

use kestrel_rhi::{Texture, TextureDesc};

use crate::graph_resource::{GraphResource, Handle};

/// One tracked resource and its per-frame bookkeeping.
pub(crate) struct ResourceSlot {
    /// Diagnostic name, never used for lookup.
    pub(crate) name: String,
    pub(crate) resource: GraphResource,
    /// Index of the pass that creates this resource, none for imports.
    pub(crate) producer: Option<usize>,
    /// Number of live readers, computed by compile().
    pub(crate) ref_count: u32,
    /// Index of the last live pass touching this resource, computed by compile().
    pub(crate) last_user: Option<usize>,
}

/// Tracks every resource the frame graph knows about, transient and imported.
pub struct ResourceRegistry {
    pub(crate) slots: Vec<ResourceSlot>,
}

impl ResourceRegistry {
    pub(crate) fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub(crate) fn declare(&mut self, name: &str, desc: TextureDesc, producer: usize) -> Handle {
        let handle = Handle {
            id: self.slots.len() as u32,
        };
        self.slots.push(ResourceSlot {
            name: name.to_string(),
            resource: GraphResource::Created {
                desc,
                backing: None,
            },
            producer: Some(producer),
            ref_count: 0,
            last_user: None,
        });
        handle
    }

    pub(crate) fn import(&mut self, name: &str, texture: Arc<Texture>) -> Handle {
        let handle = Handle {
            id: self.slots.len() as u32,
        };
        self.slots.push(ResourceSlot {
            name: name.to_string(),
            resource: GraphResource::Imported { texture },
            producer: None,
            ref_count: 0,
            last_user: None,
        });
        handle
    }

    /// Swap the externally owned texture behind an imported slot, keeping the
    /// handle stable (e.g. a new swapchain image every frame).
    pub(crate) fn update_import(&mut self, handle: Handle, texture: Arc<Texture>) {
        let slot = self.slot_mut(handle);
        match &mut slot.resource {
            GraphResource::Imported { texture: slot_texture } => *slot_texture = texture,
            GraphResource::Created { .. } => {
                panic!("update_import() on transient resource {}", slot.name)
            }
        }
    }

    pub(crate) fn slot(&self, handle: Handle) -> &ResourceSlot {
        assert!(
            (handle.id as usize) < self.slots.len(),
            "invalid resource handle: {:?}",
            handle
        );
        &self.slots[handle.id as usize]
    }

    pub(crate) fn slot_mut(&mut self, handle: Handle) -> &mut ResourceSlot {
        assert!(
            (handle.id as usize) < self.slots.len(),
            "invalid resource handle: {:?}",
            handle
        );
        &mut self.slots[handle.id as usize]
    }

    /// The backing texture of a resource.
    ///
    /// Panics when the resource is not allocated at this point of the frame;
    /// a pass asking for it outside its declared lifetime is a bug in the
    /// pass, not bad input data.
    pub fn texture(&self, handle: Handle) -> &Texture {
        let slot = self.slot(handle);
        match &slot.resource {
            GraphResource::Created { backing, .. } => backing.as_ref().unwrap_or_else(|| {
                panic!(
                    "transient resource {} is not allocated at this point of the frame",
                    slot.name
                )
            }),
            GraphResource::Imported { texture } => texture,
        }
    }

    /// Whether the resource currently has a backing texture.
    ///
    /// Diagnostic helper for tooling and tests; pass code should just use
    /// [`Self::texture`].
    pub fn is_allocated(&self, handle: Handle) -> bool {
        match &self.slot(handle).resource {
            GraphResource::Created { backing, .. } => backing.is_some(),
            GraphResource::Imported { .. } => true,
        }
    }

    pub fn desc(&self, handle: Handle) -> TextureDesc {
        self.slot(handle).resource.desc()
    }

    pub fn name(&self, handle: Handle) -> &str {
        &self.slot(handle).name
    }

    pub fn ref_count(&self, handle: Handle) -> u32 {
        self.slot(handle).ref_count
    }

    pub fn last_user(&self, handle: Handle) -> Option<usize> {
        self.slot(handle).last_user
    }

    pub fn is_imported(&self, handle: Handle) -> bool {
        self.slot(handle).resource.is_imported()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
