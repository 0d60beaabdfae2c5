use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use kestrel_rhi::{
    Device, HeadlessDevice, LoadAction, PixelFormat, StoreAction, StorageMode, TextureDesc,
    TextureUsage,
};

use crate::executor::{Executor, FrameConstants};
use crate::graph::FrameGraph;

fn frame() -> FrameConstants {
    FrameConstants {
        frame_index: 0,
        width: 1280,
        height: 720,
    }
}

fn color_desc() -> TextureDesc {
    TextureDesc::new_2d(1280, 720, PixelFormat::Rgba16Float)
        .usage_flags(TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED)
}

fn swapchain_texture(device: &HeadlessDevice) -> Arc<kestrel_rhi::Texture> {
    Arc::new(
        device
            .create_texture(
                TextureDesc::new_2d(1280, 720, PixelFormat::Bgra8)
                    .usage_flags(TextureUsage::RENDER_TARGET)
                    .storage_mode(StorageMode::Private),
                "swapchain",
            )
            .unwrap(),
    )
}

#[test]
fn unread_pass_without_side_effect_is_culled() {
    let device = HeadlessDevice::new();
    let mut graph = FrameGraph::new();

    let debug_ran = Arc::new(AtomicBool::new(false));
    {
        let debug_ran = debug_ran.clone();
        let mut pass = graph.add_pass("debug visualize");
        let target = pass.create("debug_target", color_desc());
        pass.set_color_attachment(
            0,
            target,
            LoadAction::Clear,
            StoreAction::Store,
            [0.0; 4],
        );
        pass.render(move |_ctx, _encoder| {
            debug_ran.store(true, Ordering::Relaxed);
            Ok(())
        });
    }

    let present_ran = Arc::new(AtomicBool::new(false));
    let swapchain = swapchain_texture(&device);
    let backbuffer = graph.import("$backbuffer", swapchain);
    {
        let present_ran = present_ran.clone();
        let mut pass = graph.add_pass("present");
        pass.write(backbuffer);
        pass.set_side_effect();
        pass.blit(move |_ctx, _encoder| {
            present_ran.store(true, Ordering::Relaxed);
            Ok(())
        });
    }

    graph.compile();
    assert_eq!(graph.pass_ref_count(0), 0);
    assert!(graph.pass_ref_count(1) >= 1);

    let mut executor = Executor::new(Arc::new(device.clone()));
    executor.execute(&mut graph, &frame()).unwrap();

    assert!(!debug_ran.load(Ordering::Relaxed));
    assert!(present_ran.load(Ordering::Relaxed));

    // the culled pass's transient must never have been backed
    let stats = device.stats();
    assert_eq!(stats.textures_created, 1); // just the swapchain import
}

#[test]
fn side_effect_pins_pass_with_no_readers() {
    let device = Arc::new(HeadlessDevice::new());
    let mut graph = FrameGraph::new();

    let ran = Arc::new(AtomicBool::new(false));
    {
        let ran = ran.clone();
        let mut pass = graph.add_pass("ui capture");
        let target = pass.create("capture_target", color_desc());
        pass.set_color_attachment(0, target, LoadAction::Clear, StoreAction::Store, [0.0; 4]);
        pass.set_side_effect();
        pass.render(move |_ctx, _encoder| {
            ran.store(true, Ordering::Relaxed);
            Ok(())
        });
    }

    graph.compile();
    assert!(graph.pass_ref_count(0) >= 1);

    let mut executor = Executor::new(device);
    executor.execute(&mut graph, &frame()).unwrap();
    assert!(ran.load(Ordering::Relaxed));
}

#[test]
fn transient_lifetime_spans_producer_to_last_user() {
    let device = HeadlessDevice::new();
    let mut graph = FrameGraph::new();

    // gbuffer -> lighting -> present: the gbuffer target must be gone by the
    // time the present pass runs, the lit target must still be there.
    let gbuffer;
    {
        let mut pass = graph.add_pass("gbuffer");
        gbuffer = pass.create("gbuffer_albedo", color_desc());
        pass.set_color_attachment(0, gbuffer, LoadAction::Clear, StoreAction::Store, [0.0; 4]);
        pass.render(move |ctx, _encoder| {
            assert!(ctx.resources.is_allocated(gbuffer));
            Ok(())
        });
    }

    let lit;
    {
        let mut pass = graph.add_pass("lighting");
        pass.read(gbuffer);
        lit = pass.create("lit_output", color_desc());
        pass.set_color_attachment(0, lit, LoadAction::Clear, StoreAction::Store, [0.0; 4]);
        pass.render(move |ctx, _encoder| {
            assert!(ctx.resources.is_allocated(gbuffer));
            assert!(ctx.resources.is_allocated(lit));
            Ok(())
        });
    }

    let swapchain = swapchain_texture(&device);
    let backbuffer = graph.import("$backbuffer", swapchain);
    {
        let mut pass = graph.add_pass("present");
        pass.read(lit);
        pass.write(backbuffer);
        pass.set_side_effect();
        pass.blit(move |ctx, _encoder| {
            // gbuffer's last user was the lighting pass; it is released by now
            assert!(!ctx.resources.is_allocated(gbuffer));
            assert!(ctx.resources.is_allocated(lit));
            Ok(())
        });
    }

    // nothing is backed before execution
    assert!(!graph.registry().is_allocated(gbuffer));
    assert!(!graph.registry().is_allocated(lit));

    graph.compile();
    let mut executor = Executor::new(Arc::new(device.clone()));
    executor.execute(&mut graph, &frame()).unwrap();

    // and nothing is backed after: both transients went back to the pool
    assert!(!graph.registry().is_allocated(gbuffer));
    assert!(!graph.registry().is_allocated(lit));
    assert_eq!(executor.cached_transient_count(), 2);
    assert_eq!(device.stats().textures_destroyed, 0);
}

#[test]
fn imported_resource_is_never_allocated_or_freed() {
    let device = HeadlessDevice::new();
    let mut graph = FrameGraph::new();

    let swapchain = swapchain_texture(&device);
    let raw = swapchain.raw;
    let created_before = device.stats().textures_created;

    let backbuffer = graph.import("$backbuffer", swapchain.clone());
    {
        let mut pass = graph.add_pass("present");
        pass.set_color_attachment(
            0,
            backbuffer,
            LoadAction::Clear,
            StoreAction::Store,
            [0.0; 4],
        );
        pass.set_side_effect();
        pass.render(move |ctx, _encoder| {
            assert_eq!(ctx.texture(backbuffer).raw, raw);
            Ok(())
        });
    }

    graph.compile();
    let mut executor = Executor::new(Arc::new(device.clone()));
    executor.execute(&mut graph, &frame()).unwrap();

    let stats = device.stats();
    assert_eq!(stats.textures_created, created_before);
    assert_eq!(stats.textures_destroyed, 0);
    assert_eq!(graph.registry().texture(backbuffer).raw, raw);
    assert!(device.is_texture_alive(raw));
}

#[test]
fn update_import_swaps_backing_behind_stable_handle() {
    let device = HeadlessDevice::new();
    let mut graph = FrameGraph::new();

    let first = swapchain_texture(&device);
    let second = swapchain_texture(&device);

    let backbuffer = graph.import("$backbuffer", first);
    graph.update_import(backbuffer, second.clone());

    assert_eq!(graph.registry().texture(backbuffer).raw, second.raw);
}

// One-hop liveness: a producer is retained as soon as any reader of its
// output exists, even when that reader is itself culled. Intended behavior,
// not a bug; culling is reference counting over producer edges, not a
// transitive mark-and-sweep.
#[test]
fn producer_feeding_only_a_dead_pass_is_retained() {
    let device = Arc::new(HeadlessDevice::new());
    let mut graph = FrameGraph::new();

    let producer_ran = Arc::new(AtomicBool::new(false));
    let shadow_map;
    {
        let producer_ran = producer_ran.clone();
        let mut pass = graph.add_pass("shadow map");
        shadow_map = pass.create(
            "shadow_depth",
            TextureDesc::new_2d(2048, 2048, PixelFormat::Depth32Float),
        );
        pass.set_depth_attachment(shadow_map, LoadAction::Clear, StoreAction::Store, 1.0);
        pass.render(move |_ctx, _encoder| {
            producer_ran.store(true, Ordering::Relaxed);
            Ok(())
        });
    }

    let reader_ran = Arc::new(AtomicBool::new(false));
    {
        let reader_ran = reader_ran.clone();
        let mut pass = graph.add_pass("shadowed lighting");
        pass.read(shadow_map);
        let lit = pass.create("lit_output", color_desc());
        pass.set_color_attachment(0, lit, LoadAction::Clear, StoreAction::Store, [0.0; 4]);
        pass.render(move |_ctx, _encoder| {
            reader_ran.store(true, Ordering::Relaxed);
            Ok(())
        });
    }

    graph.compile();

    // the reader is dead (nothing consumes it, no side effect) ...
    assert_eq!(graph.pass_ref_count(1), 0);
    // ... but the shadow pass stays live through the one-hop propagation
    assert!(graph.pass_ref_count(0) >= 1);

    let mut executor = Executor::new(device);
    executor.execute(&mut graph, &frame()).unwrap();

    assert!(producer_ran.load(Ordering::Relaxed));
    assert!(!reader_ran.load(Ordering::Relaxed));
}

#[test]
fn transient_pool_reuses_textures_across_frames() {
    let device = HeadlessDevice::new();
    let mut graph = FrameGraph::new();

    let color;
    {
        let mut pass = graph.add_pass("scene");
        color = pass.create("scene_color", color_desc());
        pass.set_color_attachment(0, color, LoadAction::Clear, StoreAction::Store, [0.0; 4]);
        pass.set_side_effect();
        pass.render(|_ctx, _encoder| Ok(()));
    }

    graph.compile();
    let mut executor = Executor::new(Arc::new(device.clone()));

    for frame_index in 0..3 {
        executor
            .execute(
                &mut graph,
                &FrameConstants {
                    frame_index,
                    width: 1280,
                    height: 720,
                },
            )
            .unwrap();
        executor.reset_transients(&mut graph);
    }

    // one allocation total, every later frame pulled it from the pool
    assert_eq!(device.stats().textures_created, 1);
}

#[test]
fn execute_counts_encoder_work() {
    let device = HeadlessDevice::new();
    let mut graph = FrameGraph::new();

    let draws = Arc::new(AtomicUsize::new(0));
    {
        let draws = draws.clone();
        let mut pass = graph.add_pass("geometry");
        let color = pass.create("scene_color", color_desc());
        pass.set_color_attachment(0, color, LoadAction::Clear, StoreAction::Store, [0.0; 4]);
        pass.set_side_effect();
        pass.render(move |_ctx, encoder| {
            encoder.draw(36, 1);
            encoder.draw(36, 1);
            draws.fetch_add(2, Ordering::Relaxed);
            Ok(())
        });
    }

    graph.compile();
    let mut executor = Executor::new(Arc::new(device.clone()));
    executor.execute(&mut graph, &frame()).unwrap();

    assert_eq!(draws.load(Ordering::Relaxed), 2);
    assert_eq!(device.stats().draws, 2);
    assert_eq!(device.stats().encoders_begun, 1);
}

#[test]
#[should_panic(expected = "invalid resource handle")]
fn reading_a_forged_handle_panics() {
    let mut graph = FrameGraph::new();
    let mut pass = graph.add_pass("broken");
    pass.read(crate::graph_resource::Handle { id: 42 });
    pass.render(|_ctx, _encoder| Ok(()));
}

#[test]
#[should_panic(expected = "not allocated")]
fn touching_a_released_transient_panics() {
    let device = Arc::new(HeadlessDevice::new());
    let mut graph = FrameGraph::new();

    let stale;
    {
        let mut pass = graph.add_pass("producer");
        stale = pass.create("stale", color_desc());
        pass.set_color_attachment(0, stale, LoadAction::Clear, StoreAction::Store, [0.0; 4]);
        pass.render(|_ctx, _encoder| Ok(()));
    }
    {
        let mut pass = graph.add_pass("consumer");
        pass.read(stale);
        pass.set_side_effect();
        pass.compute(|_ctx, _encoder| Ok(()));
    }

    graph.compile();
    let mut executor = Executor::new(device);
    executor.execute(&mut graph, &frame()).unwrap();

    // last user has run, the backing is gone
    graph.registry().texture(stale);
}
