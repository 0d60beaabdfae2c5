use kestrel_rhi::Texture;

use crate::executor::FrameConstants;
use crate::graph_resource::Handle;
use crate::resource_registry::ResourceRegistry;

/// What an encode callback gets to see while its pass records commands.
pub struct PassContext<'a> {
    /// Resolves handles declared during setup to their backing textures.
    pub resources: &'a ResourceRegistry,
    pub frame: &'a FrameConstants,
}

impl<'a> PassContext<'a> {
    /// Shorthand for [`ResourceRegistry::texture`].
    pub fn texture(&self, handle: Handle) -> &Texture {
        self.resources.texture(handle)
    }
}
