use std::collections::HashMap;

use kestrel_rhi::{Device, Texture, TextureDesc};

/// Pool of textures released by earlier frames, keyed by description.
///
/// The executor frees a transient the moment its last consumer has run; the
/// texture lands here instead of going back to the device, so the next frame
/// (or a later pass wanting an identical description) reuses it without an
/// allocation.
pub struct TransientResourceCache {
    textures: HashMap<TextureDesc, Vec<Texture>>,
}

impl TransientResourceCache {
    pub fn new() -> Self {
        Self {
            textures: Default::default(),
        }
    }

    pub fn get(&mut self, desc: &TextureDesc) -> Option<Texture> {
        if let Some(vec) = self.textures.get_mut(desc) {
            vec.pop()
        } else {
            None
        }
    }

    pub fn store(&mut self, texture: Texture) {
        if let Some(vec) = self.textures.get_mut(&texture.desc) {
            vec.push(texture);
        } else {
            self.textures.insert(texture.desc, vec![texture]);
        }
    }

    pub fn len(&self) -> usize {
        self.textures.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.values().all(Vec::is_empty)
    }

    pub fn clean(self, device: &dyn Device) {
        for (_, textures) in self.textures {
            for texture in textures {
                device.destroy_texture(texture);
            }
        }
    }
}

impl Default for TransientResourceCache {
    fn default() -> Self {
        Self::new()
    }
}
