use arrayvec::ArrayVec;

use crate::device::MAX_COLOR_ATTACHMENTS;
use crate::format::PixelFormat;

/// Description of a raster pipeline state object.
///
/// Shader cross-compilation happens outside the renderer; the RHI only sees
/// the path of an already-authored shader.
#[derive(Clone, Debug)]
pub struct RasterPipelineDesc {
    pub shader: String,
    pub color_formats: ArrayVec<PixelFormat, MAX_COLOR_ATTACHMENTS>,
    pub depth_format: Option<PixelFormat>,
}

impl RasterPipelineDesc {
    pub fn new(shader: impl Into<String>) -> Self {
        Self {
            shader: shader.into(),
            color_formats: ArrayVec::new(),
            depth_format: None,
        }
    }

    pub fn color_format(mut self, format: PixelFormat) -> Self {
        self.color_formats.push(format);
        self
    }

    pub fn depth_format(mut self, format: PixelFormat) -> Self {
        self.depth_format = Some(format);
        self
    }
}

#[derive(Clone, Debug)]
pub struct ComputePipelineDesc {
    pub shader: String,
}

impl ComputePipelineDesc {
    pub fn new(shader: impl Into<String>) -> Self {
        Self {
            shader: shader.into(),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RasterPipelineHandle(pub u64);

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ComputePipelineHandle(pub u64);
