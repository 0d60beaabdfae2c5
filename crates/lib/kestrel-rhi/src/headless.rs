use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::{Buffer, BufferDesc, RawBuffer};
use crate::device::{
    BlitEncoder, ComputeEncoder, Device, RenderEncoder, RenderEncoderDesc,
};
use crate::error::RhiError;
use crate::pipeline::{
    ComputePipelineDesc, ComputePipelineHandle, RasterPipelineDesc, RasterPipelineHandle,
};
use crate::texture::{RawTexture, Texture, TextureDesc};

/// Counters accumulated by the headless device over its lifetime.
#[derive(Clone, Copy, Default, Debug)]
pub struct DeviceStats {
    pub textures_created: u64,
    pub textures_destroyed: u64,
    pub buffers_created: u64,
    pub buffers_destroyed: u64,
    pub encoders_begun: u64,
    pub draws: u64,
    pub dispatches: u64,
    pub copies: u64,
}

#[derive(Default)]
struct HeadlessState {
    stats: DeviceStats,
    alive_textures: HashSet<u64>,
    alive_buffers: HashSet<u64>,
}

/// A [`Device`] that allocates identifiers instead of GPU memory.
///
/// Encoder commands only bump counters. This is what tests and the sandbox
/// run against; the host-side scheduling is identical to what a real backend
/// would observe.
#[derive(Clone)]
pub struct HeadlessDevice {
    inner: Arc<HeadlessInner>,
}

struct HeadlessInner {
    next_id: AtomicU64,
    state: Mutex<HeadlessState>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HeadlessInner {
                // id 0 is reserved so a zeroed handle is never valid
                next_id: AtomicU64::new(1),
                state: Mutex::new(HeadlessState::default()),
            }),
        }
    }

    pub fn stats(&self) -> DeviceStats {
        self.inner.state.lock().stats
    }

    pub fn alive_texture_count(&self) -> usize {
        self.inner.state.lock().alive_textures.len()
    }

    pub fn is_texture_alive(&self, raw: RawTexture) -> bool {
        self.inner.state.lock().alive_textures.contains(&raw.0)
    }

    fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for HeadlessDevice {
    fn create_texture(&self, desc: TextureDesc, name: &str) -> Result<Texture, RhiError> {
        if desc.extent[0] == 0 || desc.extent[1] == 0 {
            return Err(RhiError::TextureCreation {
                name: name.to_string(),
                reason: "zero-sized extent".to_string(),
            });
        }

        let id = self.next_id();
        let mut state = self.inner.state.lock();
        state.stats.textures_created += 1;
        state.alive_textures.insert(id);

        glog::trace!("headless: create texture {} ({:?})", name, desc);

        Ok(Texture {
            desc,
            raw: RawTexture(id),
        })
    }

    fn destroy_texture(&self, texture: Texture) {
        let mut state = self.inner.state.lock();
        let was_alive = state.alive_textures.remove(&texture.raw.0);
        assert!(was_alive, "destroying a texture the device never created (or a double free): {:?}", texture.raw);
        state.stats.textures_destroyed += 1;
    }

    fn create_buffer(&self, desc: BufferDesc, name: &str) -> Result<Buffer, RhiError> {
        if desc.size == 0 {
            return Err(RhiError::BufferCreation {
                name: name.to_string(),
                reason: "zero-sized buffer".to_string(),
            });
        }

        let id = self.next_id();
        let mut state = self.inner.state.lock();
        state.stats.buffers_created += 1;
        state.alive_buffers.insert(id);

        Ok(Buffer {
            desc,
            raw: RawBuffer(id),
        })
    }

    fn destroy_buffer(&self, buffer: Buffer) {
        let mut state = self.inner.state.lock();
        let was_alive = state.alive_buffers.remove(&buffer.raw.0);
        assert!(was_alive, "destroying a buffer the device never created (or a double free): {:?}", buffer.raw);
        state.stats.buffers_destroyed += 1;
    }

    fn create_raster_pipeline(
        &self,
        desc: &RasterPipelineDesc,
    ) -> Result<RasterPipelineHandle, RhiError> {
        glog::trace!("headless: create raster pipeline from {}", desc.shader);
        Ok(RasterPipelineHandle(self.next_id()))
    }

    fn create_compute_pipeline(
        &self,
        desc: &ComputePipelineDesc,
    ) -> Result<ComputePipelineHandle, RhiError> {
        glog::trace!("headless: create compute pipeline from {}", desc.shader);
        Ok(ComputePipelineHandle(self.next_id()))
    }

    fn begin_render_encoder(&self, desc: &RenderEncoderDesc) -> Box<dyn RenderEncoder> {
        for attachment in desc.color_attachments.iter().flatten() {
            assert!(
                !attachment.texture.desc.format.is_depth(),
                "depth format bound as a color attachment in scope {}",
                desc.label
            );
        }
        if let Some(depth) = &desc.depth_attachment {
            assert!(
                depth.texture.desc.format.is_depth(),
                "color format bound as the depth attachment in scope {}",
                desc.label
            );
        }

        self.inner.state.lock().stats.encoders_begun += 1;
        Box::new(HeadlessEncoder {
            inner: self.inner.clone(),
        })
    }

    fn begin_compute_encoder(&self, _label: &str) -> Box<dyn ComputeEncoder> {
        self.inner.state.lock().stats.encoders_begun += 1;
        Box::new(HeadlessEncoder {
            inner: self.inner.clone(),
        })
    }

    fn begin_blit_encoder(&self, _label: &str) -> Box<dyn BlitEncoder> {
        self.inner.state.lock().stats.encoders_begun += 1;
        Box::new(HeadlessEncoder {
            inner: self.inner.clone(),
        })
    }
}

struct HeadlessEncoder {
    inner: Arc<HeadlessInner>,
}

impl RenderEncoder for HeadlessEncoder {
    fn push_debug_group(&mut self, _name: &str) {}
    fn pop_debug_group(&mut self) {}
    fn bind_pipeline(&mut self, _pipeline: RasterPipelineHandle) {}

    fn bind_texture(&mut self, _slot: u32, texture: &Texture) {
        let state = self.inner.state.lock();
        assert!(
            state.alive_textures.contains(&texture.raw.0),
            "binding a dead texture: {:?}",
            texture.raw
        );
    }

    fn bind_buffer(&mut self, _slot: u32, _buffer: &Buffer) {}

    fn draw(&mut self, _vertex_count: u32, _instance_count: u32) {
        self.inner.state.lock().stats.draws += 1;
    }

    fn draw_indexed(&mut self, _index_count: u32, _instance_count: u32) {
        self.inner.state.lock().stats.draws += 1;
    }
}

impl ComputeEncoder for HeadlessEncoder {
    fn push_debug_group(&mut self, _name: &str) {}
    fn pop_debug_group(&mut self) {}
    fn bind_pipeline(&mut self, _pipeline: ComputePipelineHandle) {}

    fn bind_texture(&mut self, _slot: u32, texture: &Texture) {
        let state = self.inner.state.lock();
        assert!(
            state.alive_textures.contains(&texture.raw.0),
            "binding a dead texture: {:?}",
            texture.raw
        );
    }

    fn bind_buffer(&mut self, _slot: u32, _buffer: &Buffer) {}

    fn dispatch(&mut self, _groups_x: u32, _groups_y: u32, _groups_z: u32) {
        self.inner.state.lock().stats.dispatches += 1;
    }
}

impl BlitEncoder for HeadlessEncoder {
    fn push_debug_group(&mut self, _name: &str) {}
    fn pop_debug_group(&mut self) {}

    fn copy_texture(&mut self, src: &Texture, dst: &Texture) {
        let mut state = self.inner.state.lock();
        assert!(state.alive_textures.contains(&src.raw.0), "copy from a dead texture");
        assert!(state.alive_textures.contains(&dst.raw.0), "copy to a dead texture");
        state.stats.copies += 1;
    }
}
