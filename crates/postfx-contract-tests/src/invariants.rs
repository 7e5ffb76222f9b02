use glam::{Vec3, Vec4};

use postfx_core::{Extent, KernelProfile, PostFxConfig};
use postfx_plan::{Effect, SurfaceId};
use postfx_runtime::{PostProcessor, RenderDevice, RenderTarget};
use postfx_runtime_cpu::{Command, CpuDevice};

use crate::harness::{config, Rig};

/// Every combination of the optional post-tonemap stages, with and without bloom.
fn toggle_grid(extent: Extent) -> impl Iterator<Item = PostFxConfig> {
    (0u8..32).map(move |bits| {
        let mut cfg = config(extent, extent);
        cfg.chromatic_aberration.enabled = bits & 1 != 0;
        cfg.film_grain.enabled = bits & 2 != 0;
        cfg.vignette.enabled = bits & 4 != 0;
        cfg.fxaa.enabled = bits & 8 != 0;
        cfg.bloom.enabled = bits & 16 != 0;
        cfg
    })
}

#[test]
fn no_draw_samples_its_own_target() {
    let extent = Extent::new(8, 8);
    for cfg in toggle_grid(extent) {
        let mut rig = Rig::new(cfg, false);
        rig.fill_scene(Vec3::new(1.5, 0.5, 0.25));
        rig.run();

        for cmd in rig.device.log().commands() {
            let Command::Draw {
                effect,
                target: RenderTarget::Surface(target),
                inputs,
            } = cmd
            else {
                continue;
            };
            let target_color = rig.device.surface_color(*target).unwrap();
            assert!(
                inputs.iter().all(|(_, t)| *t != target_color),
                "{} reads its own target",
                effect.name()
            );
        }
    }
}

#[test]
fn tonemap_runs_once_and_copy_presents_last() {
    let extent = Extent::new(8, 8);
    for cfg in toggle_grid(extent) {
        let mut rig = Rig::new(cfg, false);
        rig.fill_scene(Vec3::splat(0.75));
        rig.run();

        let effects = rig.device.log().effects();
        let tonemaps = effects
            .iter()
            .filter(|e| **e == Effect::TonemapGamma)
            .count();
        assert_eq!(tonemaps, 1, "{effects:?}");

        let cosmetic = [
            rig.cfg.chromatic_aberration.enabled,
            rig.cfg.film_grain.enabled,
            rig.cfg.vignette.enabled,
            rig.cfg.fxaa.enabled,
        ]
        .iter()
        .filter(|on| **on)
        .count();
        let tonemap_at = effects
            .iter()
            .position(|e| *e == Effect::TonemapGamma)
            .unwrap();
        assert_eq!(effects.len() - tonemap_at - 2, cosmetic, "{effects:?}");

        let last = rig.device.log().commands().last().cloned();
        assert!(matches!(
            last,
            Some(Command::Draw {
                effect: Effect::Copy,
                target: RenderTarget::Presentation,
                ..
            })
        ));
    }
}

#[test]
fn cosmetic_stages_write_only_the_ping_pong_pair() {
    let extent = Extent::new(8, 8);
    let mut cfg = config(extent, extent);
    cfg.chromatic_aberration.enabled = true;
    cfg.film_grain.enabled = true;
    cfg.vignette.enabled = true;
    cfg.fxaa.enabled = true;
    let mut rig = Rig::new(cfg, false);
    rig.fill_scene(Vec3::splat(0.5));
    rig.run();

    let pool = rig.post.pool();
    let tonemapped = pool.surface(SurfaceId::Tonemapped).unwrap();
    let scratch = pool.surface(SurfaceId::Scratch).unwrap();
    let targets: Vec<RenderTarget> = rig
        .device
        .log()
        .commands()
        .iter()
        .filter_map(|c| match c {
            Command::Draw { target, .. } => Some(*target),
            _ => None,
        })
        .collect();
    assert_eq!(
        targets,
        vec![
            RenderTarget::Surface(tonemapped),
            RenderTarget::Surface(scratch),
            RenderTarget::Surface(tonemapped),
            RenderTarget::Surface(scratch),
            RenderTarget::Surface(tonemapped),
            RenderTarget::Presentation,
        ]
    );
}

#[test]
fn vignette_darkens_corners_towards_its_colour() {
    let extent = Extent::new(16, 16);
    let mut cfg = config(extent, extent);
    cfg.vignette.enabled = true;
    cfg.vignette.intensity = 0.25;
    cfg.vignette.colour = [0.0, 0.0, 0.0];
    let mut rig = Rig::new(cfg, false);
    rig.fill_scene(Vec3::splat(1.0));
    rig.run();

    let out = rig.device.presented();
    let corner = out.get(0, 0);
    let centre = out.get(8, 8);
    assert!(corner.x < centre.x, "corner {corner} centre {centre}");
}

#[test]
fn presented_output_is_display_referred() {
    let extent = Extent::new(8, 8);
    let mut cfg = config(extent, extent);
    cfg.bloom.enabled = true;
    cfg.film_grain.enabled = true;
    cfg.chromatic_aberration.enabled = true;
    let mut rig = Rig::new(cfg, false);
    let texels: Vec<Vec4> = (0..64)
        .map(|i| Vec4::new(i as f32 * 100.0, 0.0, (i % 3) as f32, 1.0))
        .collect();
    rig.write_scene(&texels);
    rig.run();

    for t in rig.device.presented().texels() {
        assert!(t.cmpge(Vec4::ZERO).all() && t.cmple(Vec4::ONE).all(), "{t}");
    }
}

#[test]
fn configured_seed_fixes_the_sampling_data() {
    let extent = Extent::new(8, 8);
    let mut cfg = config(extent, extent);
    cfg.ssao.seed = Some(1234);
    cfg.ssao.kernel_size = 16;

    let mut a_dev = CpuDevice::new(extent);
    let mut b_dev = CpuDevice::new(extent);
    let a = PostProcessor::new(&mut a_dev, &cfg).unwrap();
    let b = PostProcessor::new(&mut b_dev, &cfg).unwrap();

    assert_eq!(a.seed(), 1234);
    assert_eq!(a.kernel(), b.kernel());
    assert_eq!(
        a_dev.read_texture(a.noise_texture()).unwrap(),
        b_dev.read_texture(b.noise_texture()).unwrap()
    );
}

#[test]
fn processor_kernel_honours_size_and_profile() {
    let extent = Extent::new(8, 8);
    let min_cos = 0.2 / 2.04f32.sqrt();
    for (profile, size) in [
        (KernelProfile::ClampedHemisphere, 64),
        (KernelProfile::Hemisphere, 8),
    ] {
        let mut cfg = config(extent, extent);
        cfg.ssao.kernel_size = size;
        cfg.ssao.kernel_profile = profile;
        let mut device = CpuDevice::new(extent);
        let post = PostProcessor::new(&mut device, &cfg).unwrap();

        let kernel = post.kernel();
        assert_eq!(kernel.len(), size as usize);
        assert_eq!(kernel.profile(), profile);
        for s in kernel.samples() {
            assert!(s.z >= 0.0);
            assert!(s.length() <= 1.0 + 1e-5);
            if profile == KernelProfile::ClampedHemisphere {
                assert!(s.z / s.length() >= min_cos - 1e-5, "{s}");
            }
        }
    }
}
