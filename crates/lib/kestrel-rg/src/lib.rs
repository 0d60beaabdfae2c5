mod graph;
mod graph_resource;
mod resource_registry;

mod pass;
mod pass_context;

mod executor;
mod transient_resource_cache;

#[cfg(test)]
mod graph_tests;

pub use graph_resource::Handle as RgHandle;
pub use graph::FrameGraph;
pub use pass::{ColorAttachment, DepthAttachment, PassBuilder, PassKind};
pub use pass_context::PassContext;
pub use executor::{Executor, FrameConstants};
pub use resource_registry::ResourceRegistry;
pub use transient_resource_cache::TransientResourceCache;

// global logger macro
extern crate log as glog;

