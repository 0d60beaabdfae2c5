use arrayvec::ArrayVec;

use crate::buffer::{Buffer, BufferDesc};
use crate::error::RhiError;
use crate::pipeline::{
    ComputePipelineDesc, ComputePipelineHandle, RasterPipelineDesc, RasterPipelineHandle,
};
use crate::texture::{Texture, TextureDesc};

pub const MAX_COLOR_ATTACHMENTS: usize = 8;

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum LoadAction {
    Load,
    Clear,
    DontCare,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StoreAction {
    Store,
    DontCare,
}

/// One bound color target of a render encoder scope.
pub struct ColorAttachmentDesc<'a> {
    pub texture: &'a Texture,
    pub load: LoadAction,
    pub store: StoreAction,
    pub clear_color: [f32; 4],
}

pub struct DepthAttachmentDesc<'a> {
    pub texture: &'a Texture,
    pub load: LoadAction,
    pub store: StoreAction,
    pub clear_depth: f32,
}

/// Everything a backend needs to begin one render encoder scope.
///
/// Indexed by attachment slot; unbound slots are `None`.
pub struct RenderEncoderDesc<'a> {
    pub label: &'a str,
    pub color_attachments: ArrayVec<Option<ColorAttachmentDesc<'a>>, MAX_COLOR_ATTACHMENTS>,
    pub depth_attachment: Option<DepthAttachmentDesc<'a>>,
}

/// Command recording scope for raster work.
///
/// The scope begins when the backend hands the encoder out and ends when the
/// encoder is dropped. Commands must not be issued across scopes.
pub trait RenderEncoder {
    fn push_debug_group(&mut self, name: &str);
    fn pop_debug_group(&mut self);
    fn bind_pipeline(&mut self, pipeline: RasterPipelineHandle);
    fn bind_texture(&mut self, slot: u32, texture: &Texture);
    fn bind_buffer(&mut self, slot: u32, buffer: &Buffer);
    fn draw(&mut self, vertex_count: u32, instance_count: u32);
    fn draw_indexed(&mut self, index_count: u32, instance_count: u32);
}

pub trait ComputeEncoder {
    fn push_debug_group(&mut self, name: &str);
    fn pop_debug_group(&mut self);
    fn bind_pipeline(&mut self, pipeline: ComputePipelineHandle);
    fn bind_texture(&mut self, slot: u32, texture: &Texture);
    fn bind_buffer(&mut self, slot: u32, buffer: &Buffer);
    fn dispatch(&mut self, groups_x: u32, groups_y: u32, groups_z: u32);
}

pub trait BlitEncoder {
    fn push_debug_group(&mut self, name: &str);
    fn pop_debug_group(&mut self);
    fn copy_texture(&mut self, src: &Texture, dst: &Texture);
}

/// The GPU seen from the host side.
///
/// The renderer only ever talks to this trait; the concrete backend lives
/// behind it. [`crate::HeadlessDevice`] is the in-tree implementation used by
/// tests and the sandbox.
pub trait Device: Send + Sync {
    fn create_texture(&self, desc: TextureDesc, name: &str) -> Result<Texture, RhiError>;
    fn destroy_texture(&self, texture: Texture);

    fn create_buffer(&self, desc: BufferDesc, name: &str) -> Result<Buffer, RhiError>;
    fn destroy_buffer(&self, buffer: Buffer);

    fn create_raster_pipeline(
        &self,
        desc: &RasterPipelineDesc,
    ) -> Result<RasterPipelineHandle, RhiError>;
    fn create_compute_pipeline(
        &self,
        desc: &ComputePipelineDesc,
    ) -> Result<ComputePipelineHandle, RhiError>;

    fn begin_render_encoder(&self, desc: &RenderEncoderDesc) -> Box<dyn RenderEncoder>;
    fn begin_compute_encoder(&self, label: &str) -> Box<dyn ComputeEncoder>;
    fn begin_blit_encoder(&self, label: &str) -> Box<dyn BlitEncoder>;
}
