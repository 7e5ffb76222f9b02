//! End-to-end frames on the CPU backend.

use approx::assert_relative_eq;
use glam::{Mat4, Vec3, Vec4};

use postfx_core::{ErrorKind, Extent};
use postfx_plan::{BlitFilter, Effect, PixelFormat, SurfaceId};
use postfx_runtime::{
    CameraMatrices, FrameCtx, GeometryOutput, RenderDevice, SampleFilter, SceneImage,
    TextureDesc, TimingLog, WrapMode,
};
use postfx_runtime_cpu::Command;

use crate::harness::{config, expected_presented, Rig};

fn geometry(rig: &mut Rig, extent: Extent, depth: impl Fn(u32, u32) -> f32) -> GeometryOutput {
    let n = (extent.width * extent.height) as usize;
    let normals: Vec<f32> = std::iter::repeat([0.0, 0.0, 1.0]).take(n).flatten().collect();
    let depths: Vec<f32> = (0..extent.height)
        .flat_map(|y| (0..extent.width).map(move |x| (x, y)))
        .map(|(x, y)| depth(x, y))
        .collect();
    let desc = |format| TextureDesc {
        extent,
        format,
        filter: SampleFilter::Nearest,
        wrap: WrapMode::ClampToEdge,
    };
    GeometryOutput {
        normal: rig
            .device
            .create_texture(&desc(PixelFormat::Rgb16F), &normals)
            .unwrap(),
        depth: rig
            .device
            .create_texture(&desc(PixelFormat::Depth32F), &depths)
            .unwrap(),
    }
}

fn projection() -> Mat4 {
    Mat4::perspective_rh_gl(60f32.to_radians(), 1.0, 0.1, 100.0)
}

fn camera() -> CameraMatrices {
    CameraMatrices::new(Mat4::IDENTITY, projection())
}

/// Window-space depth of a point `distance` units in front of the camera.
fn depth_at(distance: f32) -> f32 {
    projection().project_point3(Vec3::new(0.0, 0.0, -distance)).z * 0.5 + 0.5
}

#[test]
fn all_toggles_off_presents_tonemapped_input() {
    let extent = Extent::new(8, 8);
    let mut rig = Rig::new(config(extent, extent), false);
    rig.cfg.tonemap.exposure = 1.5;
    rig.cfg.tonemap.gamma = 2.2;
    let hdr = Vec3::new(0.5, 0.25, 2.0);
    rig.fill_scene(hdr);

    rig.run();

    assert_eq!(
        rig.device.log().effects(),
        vec![Effect::TonemapGamma, Effect::Copy]
    );
    assert_eq!(rig.device.log().blit_count(), 0);
    let expected = expected_presented(hdr, &rig.cfg);
    for texel in rig.device.presented().texels() {
        assert_relative_eq!(*texel, expected, epsilon = 1e-6);
    }
}

#[test]
fn all_toggles_off_keeps_a_gradient_within_one_step() {
    let extent = Extent::new(16, 4);
    let mut rig = Rig::new(config(extent, extent), false);
    let texels: Vec<Vec4> = (0..extent.height)
        .flat_map(|_| (0..extent.width).map(|x| Vec4::new(x as f32 * 0.25, 0.5, 1.0, 1.0)))
        .collect();
    rig.write_scene(&texels);

    rig.run();

    for (src, out) in texels.iter().zip(rig.device.presented().texels()) {
        let expected = expected_presented(src.truncate(), &rig.cfg);
        assert_relative_eq!(*out, expected, epsilon = 1.0 / 255.0 + 1e-6);
    }
}

#[test]
fn flat_unoccluded_scene_has_no_occlusion() {
    let extent = Extent::new(32, 32);
    let mut cfg = config(extent, extent);
    cfg.ssao.enabled = true;
    cfg.ssao.sample_radius = 0.5;
    cfg.ssao.strength = 1.0;
    cfg.ssao.resolution_scale = 1.0;
    let mut rig = Rig::new(cfg, false);
    let geo = geometry(&mut rig, extent, |_, _| 0.9);

    let mut timings = TimingLog::new();
    let ao = rig
        .post
        .run_pre_lighting_pass(&mut rig.device, &geo, &camera(), &rig.cfg, &mut timings)
        .unwrap();

    assert_ne!(ao, rig.post.white_texture());
    assert_eq!(
        rig.device.log().effects(),
        vec![Effect::AmbientOcclusion, Effect::AmbientOcclusionBlur]
    );
    for texel in rig.device.read_texture(ao).unwrap().texels() {
        assert_relative_eq!(texel.x, 1.0, epsilon = 1e-6);
    }
    for texel in rig.surface(SurfaceId::SsaoRaw).texels() {
        assert_relative_eq!(texel.x, 1.0, epsilon = 1e-6);
    }
    assert!(timings.get("ssao").is_some());
    assert!(timings.get("ssao_blur").is_some());
}

#[test]
fn occlusion_stays_in_unit_range_on_a_bumpy_scene() {
    let extent = Extent::new(32, 32);
    let mut cfg = config(extent, extent);
    cfg.ssao.enabled = true;
    cfg.ssao.sample_radius = 0.5;
    cfg.ssao.strength = 1.0;
    cfg.ssao.resolution_scale = 1.0;
    let mut rig = Rig::new(cfg, false);
    let (near, far) = (depth_at(2.0), depth_at(2.3));
    let geo = geometry(&mut rig, extent, |x, y| {
        if (x / 4 + y / 4) % 2 == 0 {
            near
        } else {
            far
        }
    });

    let ao = rig
        .post
        .run_pre_lighting_pass(
            &mut rig.device,
            &geo,
            &camera(),
            &rig.cfg,
            &mut postfx_runtime::NoopDiagnostics,
        )
        .unwrap();

    let raw = rig.surface(SurfaceId::SsaoRaw);
    assert!(raw.texels().iter().all(|t| (0.0..=1.0).contains(&t.x)));
    assert!(
        raw.texels().iter().any(|t| t.x < 1.0),
        "recessed squares should be occluded by their neighbours"
    );
    let smoothed = rig.device.read_texture(ao).unwrap();
    assert!(smoothed.texels().iter().all(|t| (0.0..=1.0).contains(&t.x)));
}

#[test]
fn disabled_occlusion_returns_white_without_draws() {
    let extent = Extent::new(8, 8);
    let mut rig = Rig::new(config(extent, extent), false);
    let geo = geometry(&mut rig, extent, |_, _| 0.5);
    rig.device.clear_log();

    let mut timings = TimingLog::new();
    let ao = rig
        .post
        .run_pre_lighting_pass(&mut rig.device, &geo, &camera(), &rig.cfg, &mut timings)
        .unwrap();

    assert_eq!(ao, rig.post.white_texture());
    assert!(rig.device.log().commands().is_empty());
    assert_eq!(timings.sample_count(), 0);
    let white = rig.device.read_texture(ao).unwrap();
    assert_eq!(white.texels(), &[Vec4::ONE]);
}

#[test]
fn dim_input_leaves_bloom_without_effect() {
    let extent = Extent::new(16, 16);
    let mut cfg = config(extent, extent);
    cfg.bloom.enabled = true;
    cfg.bloom.threshold = 1.0;
    cfg.bloom.strength = 1.0;
    let mut rig = Rig::new(cfg, false);
    let hdr = Vec3::new(0.5, 0.25, 0.5);
    rig.fill_scene(hdr);

    rig.run();

    assert!(rig
        .surface(SurfaceId::BrightPass)
        .texels()
        .iter()
        .all(|t| t.truncate() == Vec3::ZERO));
    assert!(rig
        .surface(SurfaceId::BloomBlurred)
        .texels()
        .iter()
        .all(|t| t.truncate() == Vec3::ZERO));

    let expected = expected_presented(hdr, &rig.cfg);
    for texel in rig.device.presented().texels() {
        assert_relative_eq!(*texel, expected, epsilon = 1e-6);
    }
    assert_eq!(
        rig.device.log().effects(),
        vec![
            Effect::BrightPass,
            Effect::GaussianBlur,
            Effect::GaussianBlur,
            Effect::BloomComposite,
            Effect::TonemapGamma,
            Effect::Copy,
        ]
    );
}

#[test]
fn bright_input_blooms() {
    let extent = Extent::new(16, 16);
    let mut cfg = config(extent, extent);
    cfg.bloom.enabled = true;
    cfg.bloom.threshold = 1.0;
    cfg.bloom.strength = 0.5;
    let mut rig = Rig::new(cfg, false);
    rig.fill_scene(Vec3::splat(2.0));

    rig.run();

    let composite = rig.surface(SurfaceId::Scratch);
    for texel in composite.texels() {
        assert!(texel.x > 2.0, "composite should add bloom: {texel}");
    }
}

#[test]
fn multisampled_supersampled_input_resolves_before_any_effect() {
    let render = Extent::new(1920, 1080);
    let display = Extent::new(1280, 720);
    let mut rig = Rig::new(config(render, display), true);
    rig.fill_scene(Vec3::new(0.5, 0.5, 0.5));
    rig.device.clear_log();

    rig.run();

    let resolve = rig.post.pool().surface(SurfaceId::Resolve).unwrap();
    let screen = rig.post.pool().surface(SurfaceId::Screen).unwrap();
    let log = rig.device.log();
    assert_eq!(
        log.blits(),
        vec![
            (rig.scene, resolve, BlitFilter::Nearest),
            (resolve, screen, BlitFilter::Linear),
        ]
    );
    assert_eq!(log.first_draw(), Some(2));
    assert!(matches!(log.commands()[0], Command::Blit { .. }));
    assert_eq!(rig.device.presented().extent(), display);
}

#[test]
fn multisample_resolve_is_idempotent() {
    let extent = Extent::new(12, 6);
    let mut rig = Rig::new(config(extent, extent), true);
    let texels: Vec<Vec4> = (0..72)
        .map(|i| Vec4::new((i % 12) as f32 * 0.125, (i / 12) as f32 * 0.25, 0.5, 1.0))
        .collect();
    rig.write_scene(&texels);

    rig.run();
    let first_resolve = rig.surface(SurfaceId::Resolve).clone();
    let first_present = rig.device.presented().clone();
    rig.device.clear_log();
    rig.run();

    assert_eq!(rig.surface(SurfaceId::Resolve), &first_resolve);
    assert_eq!(rig.device.presented(), &first_present);
    assert_eq!(rig.device.log().blit_count(), 1);
}

#[test]
fn unfinalized_scene_surface_aborts_the_frame() {
    let extent = Extent::new(8, 8);
    let mut rig = Rig::new(config(extent, extent), false);
    let raw = rig
        .device
        .allocate_surface(&postfx_plan::SurfaceDesc::color(extent, PixelFormat::Rgba16F))
        .unwrap();

    let mut timings = TimingLog::new();
    let err = rig
        .post
        .run_post_process_pass(
            &mut rig.device,
            &SceneImage { surface: raw },
            &rig.cfg,
            FrameCtx::default(),
            &mut timings,
        )
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(timings.error_count(), 1);
    assert!(timings.last_error().is_some());
    assert_eq!(rig.device.log().draw_count(), 0);
}

#[test]
fn sync_timings_bracket_every_step_with_finish() {
    let extent = Extent::new(8, 8);
    let mut cfg = config(extent, extent);
    cfg.diagnostics.sync_timings = true;
    let mut rig = Rig::new(cfg, false);
    rig.run();

    let finishes = rig
        .device
        .log()
        .commands()
        .iter()
        .filter(|c| matches!(c, Command::Finish))
        .count();
    assert_eq!(finishes, 4);
}

#[test]
fn processor_rejects_a_presentation_surface_of_the_wrong_size() {
    let mut device = postfx_runtime_cpu::CpuDevice::new(Extent::new(640, 480));
    let cfg = config(Extent::new(8, 8), Extent::new(8, 8));
    let err = postfx_runtime::PostProcessor::new(&mut device, &cfg).unwrap_err();
    assert!(matches!(
        err,
        postfx_core::EngineError::SurfaceSizeMismatch { .. }
    ));
}

#[test]
fn destroy_releases_every_pool_surface_and_program() {
    let extent = Extent::new(8, 8);
    let mut rig = Rig::new(config(extent, extent), false);
    assert_eq!(rig.device.surface_count(), SurfaceId::ALL.len() + 1);

    rig.post.destroy(&mut rig.device);
    assert_eq!(rig.device.surface_count(), 1);
    // Only the scene's colour attachment remains.
    assert_eq!(rig.device.texture_count(), 1);
    assert_eq!(rig.device.program_count(), 0);
}
