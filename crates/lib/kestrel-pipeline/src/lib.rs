extern crate log as glog;

mod asset;
mod registry;
mod builder;
mod host;

pub use asset::{
    is_reserved, resolve_format, resolve_size, AssetError, PassDecl, PipelineAsset,
    ResourceDecl, ResourceKind, RESERVED_SIGIL,
};
pub use registry::{
    OutputSlot, PassBuildContext, PassIo, PassRegistry, PassTypeMeta, PipelinePass,
};
pub use builder::{BuiltPipeline, PipelineBuilder};
pub use host::{ActivePipeline, PipelineHost};
