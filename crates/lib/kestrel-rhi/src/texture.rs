use bitflags::bitflags;

use crate::format::PixelFormat;

bitflags! {
    /// How a texture may be bound during the frame.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    pub struct TextureUsage: u32 {
        const SAMPLED       = 1 << 0;
        const RENDER_TARGET = 1 << 1;
        const DEPTH_TARGET  = 1 << 2;
        const STORAGE       = 1 << 3;
        const TRANSFER_SRC  = 1 << 4;
        const TRANSFER_DST  = 1 << 5;
    }
}

/// Where the backend should place the texture memory.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum StorageMode {
    /// Device-local, not host visible.
    Private,
    /// Host visible.
    Shared,
    /// Tile memory only, contents never leave the on-chip storage.
    Memoryless,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TextureDesc {
    pub extent: [u32; 2],
    pub format: PixelFormat,
    pub usage: TextureUsage,
    pub storage_mode: StorageMode,
}

impl TextureDesc {
    pub fn new_2d(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            extent: [width, height],
            format,
            usage: if format.is_depth() {
                TextureUsage::DEPTH_TARGET
            } else {
                TextureUsage::RENDER_TARGET
            },
            storage_mode: StorageMode::Private,
        }
    }

    pub fn usage_flags(mut self, usage: TextureUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn storage_mode(mut self, storage_mode: StorageMode) -> Self {
        self.storage_mode = storage_mode;
        self
    }

    pub fn width(&self) -> u32 {
        self.extent[0]
    }

    pub fn height(&self) -> u32 {
        self.extent[1]
    }
}

/// Backend texture identifier.
///
/// Opaque to everything above the RHI; only a backend knows what it refers to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RawTexture(pub u64);

/// A GPU texture together with the description it was created from.
#[derive(Debug)]
pub struct Texture {
    pub desc: TextureDesc,
    pub raw: RawTexture,
}
