mod error;
mod format;
mod texture;
mod buffer;
mod pipeline;
mod device;
mod headless;

pub use error::RhiError;
pub use format::PixelFormat;
pub use texture::{RawTexture, StorageMode, Texture, TextureDesc, TextureUsage};
pub use buffer::{Buffer, BufferDesc, BufferUsage, RawBuffer};
pub use pipeline::{
    ComputePipelineDesc, ComputePipelineHandle, RasterPipelineDesc, RasterPipelineHandle,
};
pub use device::{
    BlitEncoder, ColorAttachmentDesc, ComputeEncoder, DepthAttachmentDesc, Device, LoadAction,
    RenderEncoder, RenderEncoderDesc, StoreAction, MAX_COLOR_ATTACHMENTS,
};
pub use headless::{DeviceStats, HeadlessDevice};

// global logger macro
extern crate log as glog;
