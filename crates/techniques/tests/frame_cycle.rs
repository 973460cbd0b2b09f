//! Every technique driven through the frame cycle on the headless backend.

use glam::Vec3;

use showcase_core::FrameTiming;
use showcase_renderer::headless::{CommandLog, HeadlessContext, RecordedCommand};
use showcase_renderer::{
    Capability, CycleState, DeviceCapabilities, Extent, FrameCycle, FrameInput, GpuContext,
    Rect2D, RendererError, SetupOptions, Technique, Viewport,
};
use showcase_scene::{Camera, Eye, StereoParams};
use showcase_techniques::{PushConstants, SPHERE_COUNT, StereoUbo, TechniqueKind};

const EXTENT: Extent = Extent {
    width: 1280,
    height: 720,
};

fn frame_input(extent: Extent, frame_number: u64) -> FrameInput {
    FrameInput {
        camera: Camera::new(Vec3::new(0.0, 0.0, -10.0), Vec3::ZERO),
        extent,
        timing: FrameTiming::fixed(frame_number, 1.0 / 60.0),
    }
}

fn prepared<T: Technique>(technique: T, options: &SetupOptions) -> (HeadlessContext, FrameCycle<T>) {
    let mut ctx = HeadlessContext::new(EXTENT).with_fallback_models();
    let mut cycle = FrameCycle::new(technique);
    cycle.prepare(&mut ctx, options).expect("prepare");
    (ctx, cycle)
}

fn render<T: Technique>(
    ctx: &mut HeadlessContext,
    cycle: &mut FrameCycle<T>,
    frame_number: u64,
) -> CommandLog {
    let mut log = ctx.recorder();
    let input = frame_input(ctx.extent(), frame_number);
    cycle
        .render(ctx, &mut log, &input, frame_number)
        .expect("render");
    log
}

fn bound_set(log: &CommandLog) -> showcase_renderer::handles::DescriptorSetHandle {
    log.commands()
        .iter()
        .find_map(|c| match c {
            RecordedCommand::BindDescriptorSet { set, .. } => Some(*set),
            _ => None,
        })
        .expect("descriptor set bound")
}

fn bound_pipeline(log: &CommandLog) -> showcase_renderer::handles::PipelineHandle {
    log.commands()
        .iter()
        .find_map(|c| match c {
            RecordedCommand::BindPipeline(p) => Some(*p),
            _ => None,
        })
        .expect("pipeline bound")
}

fn viewports(log: &CommandLog) -> Vec<Viewport> {
    log.commands()
        .iter()
        .find_map(|c| match c {
            RecordedCommand::SetViewports(v) => Some(v.clone()),
            _ => None,
        })
        .expect("viewports set")
}

#[test]
fn test_every_technique_records_one_complete_pass() {
    for kind in TechniqueKind::all() {
        let (mut ctx, mut cycle) = prepared(kind.build(), &SetupOptions::default());
        let log = render(&mut ctx, &mut cycle, 0);

        assert!(log.is_complete(), "{}: {}", kind, log.summary());
        let passes = log
            .commands()
            .iter()
            .filter(|c| matches!(c, RecordedCommand::BeginRenderPass { .. }))
            .count();
        assert_eq!(passes, 1, "{}", kind);
        assert_eq!(log.commands()[0], RecordedCommand::Begin);
        assert!(log.draw_count() >= 1, "{}", kind);
    }
}

#[test]
fn test_single_viewport_covers_framebuffer_and_binds_setup_pipeline() {
    for kind in TechniqueKind::all().filter(|k| *k != TechniqueKind::MultiViewport) {
        let (mut ctx, mut cycle) = prepared(kind.build(), &SetupOptions::default());
        let log = render(&mut ctx, &mut cycle, 0);

        assert_eq!(viewports(&log), vec![Viewport::full(EXTENT)], "{}", kind);
        assert_eq!(ctx.pipeline_count(), 1, "{}", kind);
        let desc = ctx
            .pipeline_desc(bound_pipeline(&log))
            .expect("bound pipeline was built at setup");
        assert_eq!(desc.viewport_count, 1);
    }
}

#[test]
fn test_stereo_splits_framebuffer_in_halves() {
    let (mut ctx, mut cycle) = prepared(TechniqueKind::MultiViewport.build(), &SetupOptions::default());
    let log = render(&mut ctx, &mut cycle, 0);

    let vps = viewports(&log);
    assert_eq!(vps.len(), 2);
    assert_eq!(vps[0].width, EXTENT.width as f32 / 2.0);
    assert_eq!(vps[1].x, EXTENT.width as f32 / 2.0);
    assert_eq!(vps[1].width, EXTENT.width as f32 / 2.0);

    let scissors = log
        .commands()
        .iter()
        .find_map(|c| match c {
            RecordedCommand::SetScissors(s) => Some(s.clone()),
            _ => None,
        })
        .expect("scissors set");
    assert_eq!(scissors, Rect2D::split_horizontal(EXTENT).to_vec());

    let desc = ctx.pipeline_desc(bound_pipeline(&log)).expect("pipeline");
    assert_eq!(desc.viewport_count, 2);
}

#[test]
fn test_stereo_uniforms_match_frustum_math() {
    let (mut ctx, mut cycle) = prepared(TechniqueKind::MultiViewport.build(), &SetupOptions::default());
    let log = render(&mut ctx, &mut cycle, 0);

    let buffer = ctx.set_buffer(bound_set(&log), 0).expect("uniform binding");
    let bytes = ctx.buffer_contents(buffer).expect("buffer contents");
    let ubo: StereoUbo = bytemuck::pod_read_unaligned(&bytes);

    let params = StereoParams::default();
    let camera = frame_input(EXTENT, 0).camera;
    for (i, eye) in Eye::BOTH.into_iter().enumerate() {
        assert_eq!(
            ubo.projection[i],
            params.projection(eye, EXTENT.width, EXTENT.height)
        );
        assert_eq!(ubo.modelview[i], params.view(eye, &camera));
    }
}

#[test]
fn test_uniform_buffer_written_once_per_selected_slot() {
    let (mut ctx, mut cycle) = prepared(TechniqueKind::Barycentric.build(), &SetupOptions::default());
    assert_eq!(ctx.total_buffer_writes(), 0);

    let first = render(&mut ctx, &mut cycle, 0);
    let slot0 = ctx.set_buffer(bound_set(&first), 0).expect("slot 0 buffer");
    assert_eq!(ctx.buffer_writes(slot0), 1);
    assert_eq!(ctx.total_buffer_writes(), 1);

    let second = render(&mut ctx, &mut cycle, 1);
    let slot1 = ctx.set_buffer(bound_set(&second), 0).expect("slot 1 buffer");
    assert_ne!(slot0, slot1);
    assert_eq!(ctx.buffer_writes(slot0), 1);
    assert_eq!(ctx.buffer_writes(slot1), 1);

    render(&mut ctx, &mut cycle, 2);
    assert_eq!(ctx.buffer_writes(slot0), 2);
    assert_eq!(ctx.buffer_writes(slot1), 1);
}

#[test]
fn test_recording_structure_is_identical_across_runs() {
    for kind in TechniqueKind::all() {
        let (mut ctx_a, mut cycle_a) = prepared(kind.build(), &SetupOptions::default());
        let (mut ctx_b, mut cycle_b) = prepared(kind.build(), &SetupOptions::default());

        let a = render(&mut ctx_a, &mut cycle_a, 0);
        let b = render(&mut ctx_b, &mut cycle_b, 0);
        assert_eq!(a.structure(), b.structure(), "{}", kind);

        // Same slot two frames later: same structure again.
        render(&mut ctx_a, &mut cycle_a, 1);
        let again = render(&mut ctx_a, &mut cycle_a, 2);
        assert_eq!(a.structure(), again.structure(), "{}", kind);
    }
}

#[test]
fn test_resize_never_binds_destroyed_set() {
    for kind in TechniqueKind::all() {
        let (mut ctx, mut cycle) = prepared(kind.build(), &SetupOptions::default());
        let before = render(&mut ctx, &mut cycle, 0);
        let old_set = bound_set(&before);

        let resized = Extent::new(640, 480);
        ctx.set_extent(resized);
        cycle.resize(resized);
        assert_eq!(cycle.state(), CycleState::NeedsDescriptorRebuild);

        let after = render(&mut ctx, &mut cycle, 1);
        assert_eq!(cycle.state(), CycleState::Prepared);
        assert!(!ctx.is_set_live(old_set), "{}", kind);
        assert!(ctx.is_set_live(bound_set(&after)), "{}", kind);
        assert_eq!(ctx.live_pool_count(), 1, "{}", kind);

        let covered: f32 = viewports(&after).iter().map(|v| v.width).sum();
        assert_eq!(covered, resized.width as f32, "{}", kind);
    }
}

#[test]
fn test_push_constants_precede_each_sphere_draw() {
    let (mut ctx, mut cycle) = prepared(PushConstants::new(), &SetupOptions::default());
    let log = render(&mut ctx, &mut cycle, 0);
    let spheres = cycle.technique().spheres();
    assert_eq!(spheres.len(), SPHERE_COUNT);
    assert_eq!(log.draw_count(), SPHERE_COUNT);

    let commands = log.commands();
    let pushes: Vec<(usize, &Vec<u8>)> = commands
        .iter()
        .enumerate()
        .filter_map(|(i, c)| match c {
            RecordedCommand::PushConstants { data, .. } => Some((i, data)),
            _ => None,
        })
        .collect();
    assert_eq!(pushes.len(), SPHERE_COUNT);

    for (k, (index, data)) in pushes.iter().enumerate() {
        assert!(matches!(commands[index + 1], RecordedCommand::DrawModel(_)));
        assert_eq!(data.as_slice(), bytemuck::bytes_of(&spheres[k]));
    }
    for (i, (_, a)) in pushes.iter().enumerate() {
        for (_, b) in pushes.iter().skip(i + 1) {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn test_sphere_colors_replay_from_seed() {
    let seeded = |seed| SetupOptions {
        seed,
        ..SetupOptions::default()
    };
    let (_, a) = prepared(PushConstants::new(), &seeded(7));
    let (_, b) = prepared(PushConstants::new(), &seeded(7));
    let (_, c) = prepared(PushConstants::new(), &seeded(8));

    assert_eq!(a.technique().spheres(), b.technique().spheres());
    assert_ne!(a.technique().spheres(), c.technique().spheres());
}

#[test]
fn test_missing_capability_fails_before_setup() {
    let mut ctx = HeadlessContext::new(EXTENT)
        .with_fallback_models()
        .with_capabilities(DeviceCapabilities::from_list(&[Capability::GeometryShader]));
    let mut cycle = FrameCycle::new(TechniqueKind::MultiViewport.build());

    let err = cycle
        .prepare(&mut ctx, &SetupOptions::default())
        .expect_err("multi viewport is missing");
    assert!(matches!(
        err,
        RendererError::Unsupported {
            capability: Capability::MultiViewport,
            ..
        }
    ));
    assert_eq!(cycle.state(), CycleState::Unprepared);
    assert_eq!(ctx.pipeline_count(), 0);
}

#[test]
fn test_mesh_shader_dispatches_one_task_group() {
    let (mut ctx, mut cycle) = prepared(TechniqueKind::MeshShader.build(), &SetupOptions::default());
    let log = render(&mut ctx, &mut cycle, 0);
    assert!(
        log.commands()
            .contains(&RecordedCommand::DrawMeshTasks { x: 1, y: 1, z: 1 })
    );
}

#[test]
fn test_fluid_display_draws_quad_without_depth() {
    let (mut ctx, mut cycle) = prepared(TechniqueKind::FluidDisplay.build(), &SetupOptions::default());
    let log = render(&mut ctx, &mut cycle, 0);

    assert!(log.commands().contains(&RecordedCommand::Draw {
        vertex_count: 6,
        instance_count: 1
    }));
    match &log.commands()[1] {
        RecordedCommand::BeginRenderPass { clear, .. } => assert!(clear.depth_stencil.is_none()),
        other => panic!("expected begin-pass, got {:?}", other),
    }
    let desc = ctx.pipeline_desc(bound_pipeline(&log)).expect("pipeline");
    assert!(!desc.depth);
}

#[test]
fn test_models_fall_back_to_cube_without_assets() {
    let (mut ctx, mut cycle) = prepared(TechniqueKind::Barycentric.build(), &SetupOptions::default());
    let log = render(&mut ctx, &mut cycle, 0);
    let model = log
        .commands()
        .iter()
        .find_map(|c| match c {
            RecordedCommand::DrawModel(m) => Some(*m),
            _ => None,
        })
        .expect("model drawn");
    let info = ctx.model_info(model).expect("model info");
    assert!(info.synthesized);
    assert!(info.path.ends_with("models/monkey.gltf"));
}
