use std::sync::Arc;

use parking_lot::Mutex;

use kestrel_rhi::{Buffer, BufferDesc, BufferUsage, Device, RhiError, Texture};

/// Scene-side GPU data the passes consume.
///
/// Mesh loading, meshlet generation and the transform hierarchy all live
/// outside the renderer; by the time a frame runs they are opaque buffers.
pub struct SceneBuffers {
    pub vertex_buffer: Arc<Buffer>,
    pub index_buffer: Arc<Buffer>,
    /// Meshlet descriptors: bounds, cone, triangle ranges. Opaque here.
    pub meshlet_buffer: Arc<Buffer>,
    pub meshlet_count: u32,
    pub index_count: u32,
}

impl SceneBuffers {
    pub fn new(
        device: &Arc<dyn Device>,
        vertex_bytes: u64,
        index_count: u32,
        meshlet_count: u32,
    ) -> Result<Self, RhiError> {
        let vertex_buffer = device.create_buffer(
            BufferDesc::new(vertex_bytes, BufferUsage::VERTEX | BufferUsage::STORAGE),
            "scene_vertices",
        )?;
        let index_buffer = device.create_buffer(
            BufferDesc::new(u64::from(index_count) * 4, BufferUsage::INDEX),
            "scene_indices",
        )?;
        // 48 bytes per meshlet: center+radius, cone, vertex/triangle offsets
        let meshlet_buffer = device.create_buffer(
            BufferDesc::new(u64::from(meshlet_count) * 48, BufferUsage::STORAGE),
            "scene_meshlets",
        )?;

        Ok(Self {
            vertex_buffer: Arc::new(vertex_buffer),
            index_buffer: Arc::new(index_buffer),
            meshlet_buffer: Arc::new(meshlet_buffer),
            meshlet_count,
            index_count,
        })
    }
}

/// Intra-frame handoff between passes that are not connected through graph
/// resources: one pass publishes buffer handles, a later pass consumes them
/// in the same frame.
///
/// Only the passes that need the handoff hold a reference to this; it is not
/// ambient state every pass can see.
#[derive(Default)]
pub struct FrameScratch {
    /// Light list produced by the light culling pass.
    pub culled_lights: Option<Arc<Buffer>>,
    pub visible_light_count: u32,
}

impl FrameScratch {
    pub fn clear(&mut self) {
        self.culled_lights = None;
        self.visible_light_count = 0;
    }
}

/// Long-lived state shared with pass factories at registration time.
///
/// Factories clone what they need out of here into the pass instances they
/// build, so each pass only captures the slices of context it actually uses.
pub struct RenderContext {
    pub device: Arc<dyn Device>,
    pub scene: Arc<SceneBuffers>,
    /// Atmosphere cubemap. When absent, the sky pass substitutes a flat-color
    /// fallback texture instead of failing the build.
    pub environment: Option<Arc<Texture>>,
    pub scratch: Arc<Mutex<FrameScratch>>,
}

impl RenderContext {
    pub fn new(device: Arc<dyn Device>, scene: Arc<SceneBuffers>) -> Self {
        Self {
            device,
            scene,
            environment: None,
            scratch: Arc::new(Mutex::new(FrameScratch::default())),
        }
    }

    pub fn with_environment(mut self, environment: Arc<Texture>) -> Self {
        self.environment = Some(environment);
        self
    }
}
