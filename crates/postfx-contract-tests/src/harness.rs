//! Shared setup for end-to-end tests on the CPU backend.

use glam::{Vec3, Vec4};

use postfx_core::{Extent, PostFxConfig};
use postfx_plan::{PixelFormat, SurfaceDesc, SurfaceId};
use postfx_runtime::{
    FrameCtx, NoopDiagnostics, PostProcessor, RenderDevice, SceneImage, SurfaceHandle,
};
use postfx_runtime_cpu::{effects, quantize, CpuDevice, Image};

/// Opt-in log output: `RUST_LOG=postfx_runtime=debug cargo test`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn config(render: Extent, display: Extent) -> PostFxConfig {
    let mut cfg = PostFxConfig::all_disabled();
    cfg.resolution.render = render;
    cfg.resolution.display = display;
    cfg.ssao.seed = Some(7);
    cfg
}

pub struct Rig {
    pub device: CpuDevice,
    pub post: PostProcessor,
    pub scene: SurfaceHandle,
    pub cfg: PostFxConfig,
}

impl Rig {
    /// Processor plus a finalized RGBA16F scene surface at render resolution.
    pub fn new(cfg: PostFxConfig, multisampled: bool) -> Self {
        init_tracing();
        let mut device = CpuDevice::new(cfg.resolution.display);
        let post = PostProcessor::new(&mut device, &cfg).expect("post processor");
        let mut desc = SurfaceDesc::color(cfg.resolution.render, PixelFormat::Rgba16F)
            .with_depth_stencil();
        if multisampled {
            desc = desc.with_multisampling();
        }
        let scene = device.allocate_surface(&desc).expect("scene surface");
        device.finalize_surface(scene).expect("finalize scene");
        Self {
            device,
            post,
            scene,
            cfg,
        }
    }

    pub fn fill_scene(&mut self, rgb: Vec3) {
        self.device
            .fill_surface(self.scene, rgb.extend(1.0))
            .expect("fill scene");
    }

    pub fn write_scene(&mut self, texels: &[Vec4]) {
        self.device
            .write_surface(self.scene, texels)
            .expect("write scene");
    }

    pub fn run(&mut self) {
        let scene = SceneImage {
            surface: self.scene,
        };
        self.post
            .run_post_process_pass(
                &mut self.device,
                &scene,
                &self.cfg,
                FrameCtx::default(),
                &mut NoopDiagnostics,
            )
            .expect("post-process frame");
    }

    pub fn surface(&self, id: SurfaceId) -> &Image {
        let h = self.post.pool().surface(id).expect("pool surface");
        self.device.read_surface(h).expect("read surface")
    }
}

/// What the pipeline should present for `hdr` with no cosmetic filters.
pub fn expected_presented(hdr: Vec3, cfg: &PostFxConfig) -> Vec4 {
    let hdr = quantize(PixelFormat::Rgba16F, hdr.extend(1.0)).truncate();
    let sdr = effects::tonemap(hdr, cfg.tonemap.exposure, 1.0 / cfg.tonemap.gamma).extend(1.0);
    quantize(PixelFormat::Rgba8, sdr)
}
