extern crate log as glog;

mod context;
pub mod passes;

#[cfg(test)]
mod render_tests;

pub use context::{FrameScratch, RenderContext, SceneBuffers};

use std::sync::Arc;

use anyhow::Context;

use kestrel_pipeline::{PassRegistry, PassTypeMeta};
use kestrel_rg::PassKind;
use kestrel_rhi::{Device, PixelFormat, TextureDesc, TextureUsage};

use passes::{GeometryPass, LightCullPass, LightingPass, PresentPass, SkyPass, TonemapPass};

/// Register every built-in pass type.
///
/// Factories capture the slices of `render_ctx` they need; the registry
/// itself stays free of renderer state.
pub fn register_builtin_passes(
    registry: &mut PassRegistry,
    render_ctx: &RenderContext,
) -> anyhow::Result<()> {
    registry.register(
        GeometryPass::TYPE_KEY,
        PassTypeMeta {
            display_name: "Geometry".to_string(),
            category: "Scene".to_string(),
            default_inputs: vec![],
            default_outputs: vec!["scene_color".to_string(), "scene_depth".to_string()],
            config_schema: None,
            kind: Some(PassKind::Render),
        },
        GeometryPass::factory(render_ctx),
    );

    // without atmosphere data the sky degrades to a flat color instead of
    // failing the whole pipeline
    let environment = match &render_ctx.environment {
        Some(environment) => environment.clone(),
        None => {
            glog::warn!("no atmosphere data loaded; sky passes will use a flat-color fallback");
            Arc::new(
                render_ctx
                    .device
                    .create_texture(
                        TextureDesc::new_2d(1, 1, PixelFormat::Rgba8)
                            .usage_flags(TextureUsage::SAMPLED),
                        "sky_fallback",
                    )
                    .context("sky fallback texture")?,
            )
        }
    };
    registry.register(
        SkyPass::TYPE_KEY,
        PassTypeMeta {
            display_name: "Sky".to_string(),
            category: "Scene".to_string(),
            default_inputs: vec!["scene_depth".to_string()],
            default_outputs: vec!["sky_color".to_string()],
            config_schema: None,
            kind: Some(PassKind::Render),
        },
        SkyPass::factory(environment),
    );

    registry.register(
        LightCullPass::TYPE_KEY,
        PassTypeMeta {
            display_name: "Light Culling".to_string(),
            category: "Lighting".to_string(),
            default_inputs: vec!["scene_depth".to_string()],
            default_outputs: vec!["light_grid".to_string()],
            config_schema: Some(serde_json::json!({
                "tile_size": "u32",
                "max_lights": "u32",
            })),
            kind: Some(PassKind::Compute),
        },
        LightCullPass::factory(render_ctx),
    );

    registry.register(
        LightingPass::TYPE_KEY,
        PassTypeMeta {
            display_name: "Lighting".to_string(),
            category: "Lighting".to_string(),
            default_inputs: vec![
                "scene_color".to_string(),
                "sky_color".to_string(),
                "light_grid".to_string(),
            ],
            default_outputs: vec!["lit_color".to_string()],
            config_schema: None,
            kind: Some(PassKind::Render),
        },
        LightingPass::factory(render_ctx),
    );

    registry.register(
        TonemapPass::TYPE_KEY,
        PassTypeMeta {
            display_name: "Tonemap".to_string(),
            category: "Post Process".to_string(),
            default_inputs: vec!["lit_color".to_string()],
            default_outputs: vec!["ldr_color".to_string()],
            config_schema: Some(serde_json::json!({ "exposure": "f32" })),
            kind: Some(PassKind::Compute),
        },
        TonemapPass::factory(),
    );

    registry.register(
        PresentPass::TYPE_KEY,
        PassTypeMeta {
            display_name: "Present".to_string(),
            category: "Output".to_string(),
            default_inputs: vec!["ldr_color".to_string()],
            default_outputs: vec!["$backbuffer".to_string()],
            config_schema: None,
            kind: Some(PassKind::Blit),
        },
        PresentPass::factory(),
    );

    Ok(())
}
