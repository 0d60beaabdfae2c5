use anyhow::Context;
use serde::de::DeserializeOwned;

use kestrel_pipeline::OutputSlot;
use kestrel_rg::{FrameGraph, PassBuilder, RgHandle};
use kestrel_rhi::{TextureDesc, TextureUsage};

pub mod geometry;
pub mod sky;
pub mod light_cull;
pub mod lighting;
pub mod tonemap;
pub mod present;

pub use geometry::GeometryPass;
pub use sky::SkyPass;
pub use light_cull::LightCullPass;
pub use lighting::LightingPass;
pub use tonemap::TonemapPass;
pub use present::PresentPass;

/// Deserialize a pass config object, treating an absent config as default.
pub(crate) fn parse_config<T>(value: &serde_json::Value) -> anyhow::Result<T>
where
    T: DeserializeOwned + Default,
{
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value.clone()).context("invalid pass config")
}

/// The description an output slot will end up with, whether the pass creates
/// it or writes into an existing resource.
pub(crate) fn output_desc(graph: &FrameGraph, slot: &OutputSlot) -> TextureDesc {
    match slot {
        OutputSlot::Target(handle) => graph.registry().desc(*handle),
        OutputSlot::Create { desc, .. } => *desc,
    }
}

/// Create or write the texture behind an output slot, applying `usage` when
/// this pass is the one creating it.
pub(crate) fn bind_output_texture(
    pass: &mut PassBuilder<'_>,
    slot: &OutputSlot,
    usage: TextureUsage,
) -> RgHandle {
    match slot {
        OutputSlot::Target(handle) => pass.write(*handle),
        OutputSlot::Create { name, desc } => pass.create(name, desc.usage_flags(usage)),
    }
}
