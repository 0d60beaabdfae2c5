use thiserror::Error;

#[derive(Debug, Error)]
pub enum RhiError {
    #[error("failed to create texture {name}: {reason}")]
    TextureCreation { name: String, reason: String },

    #[error("failed to create buffer {name}: {reason}")]
    BufferCreation { name: String, reason: String },

    #[error("failed to create pipeline state: {0}")]
    PipelineCreation(String),

    #[error("device ran out of memory")]
    OutOfMemory,
}
