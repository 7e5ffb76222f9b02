//! The per-frame driver: builds a plan from the configuration, then executes it step by step
//! against a [`RenderDevice`].

use std::time::Instant;

use postfx_core::{EngineError, Extent, PostFxConfig};
use postfx_plan::{
    plan_post_process, plan_pre_lighting, DrawStep, Effect, FramePlan, ImageRef, PixelFormat,
    PoolLayout, PreLightingPlan, SceneImageDesc, Step, Target,
};

use crate::device::{
    ProgramHandle, RenderDevice, RenderTarget, SampleFilter, SurfaceHandle, TextureDesc,
    TextureHandle, WrapMode,
};
use crate::diagnostics::DiagnosticsSink;
use crate::kernel::{SampleKernel, SamplingSet};
use crate::params::{self, CameraMatrices, EffectParams};
use crate::pool::ResourcePool;

/// G-buffer outputs the ambient-occlusion stage reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryOutput {
    /// World-space normals in RGB.
    pub normal: TextureHandle,
    /// Window-space depth in [0, 1], red channel.
    pub depth: TextureHandle,
}

/// The lit scene as rendered this frame. May be multisampled and sized to render resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneImage {
    pub surface: SurfaceHandle,
}

/// Per-frame context supplied by the host.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameCtx {
    /// Seconds since the host started.
    pub time: f64,
    pub frame: u64,
    /// Optional mask for the vignette stage.
    pub vignette_mask: Option<TextureHandle>,
}

#[derive(Clone, Copy)]
struct Bindings<'a> {
    scene: Option<(SurfaceHandle, Extent)>,
    geometry: Option<&'a GeometryOutput>,
    camera: Option<&'a CameraMatrices>,
    frame: FrameCtx,
}

/// Owns the resource pool, the loaded programs and the construction-time sampling data.
#[derive(Debug)]
pub struct PostProcessor {
    layout: PoolLayout,
    pool: ResourcePool,
    programs: Vec<(Effect, ProgramHandle)>,
    sampling: SamplingSet,
    noise: TextureHandle,
    white: TextureHandle,
}

impl PostProcessor {
    /// Validate `cfg`, load every program, generate the sampling data and allocate the pool.
    ///
    /// Resolution, kernel size and AO scale are fixed here; later changes to those fields are
    /// ignored until the processor is recreated.
    pub fn new(device: &mut dyn RenderDevice, cfg: &PostFxConfig) -> Result<Self, EngineError> {
        cfg.validate()?;

        let layout = PoolLayout::from_config(cfg);
        let present = device.presentation_extent();
        if present != layout.display() {
            return Err(EngineError::SurfaceSizeMismatch {
                what: "presentation surface".to_string(),
                expected: (layout.display().width, layout.display().height),
                found: (present.width, present.height),
            });
        }

        let mut programs = Vec::with_capacity(Effect::ALL.len());
        let mut textures = Vec::with_capacity(2);
        let acquired = Self::acquire(device, cfg, &layout, &mut programs, &mut textures);
        let (sampling, noise, white, pool) = match acquired {
            Ok(parts) => parts,
            Err(e) => {
                tracing::error!(error = %e, "post processor construction failed");
                for (_, p) in programs {
                    device.destroy_program(p);
                }
                for t in textures {
                    device.destroy_texture(t);
                }
                return Err(e);
            }
        };

        tracing::info!(
            render = %layout.render(),
            display = %layout.display(),
            "post processor ready"
        );

        Ok(Self {
            layout,
            pool,
            programs,
            sampling,
            noise,
            white,
        })
    }

    /// Load programs, upload the sampling textures and allocate the pool. Every program and
    /// texture created is recorded in `programs` / `textures` so the caller can release them on
    /// failure; the pool releases its own surfaces.
    fn acquire(
        device: &mut dyn RenderDevice,
        cfg: &PostFxConfig,
        layout: &PoolLayout,
        programs: &mut Vec<(Effect, ProgramHandle)>,
        textures: &mut Vec<TextureHandle>,
    ) -> Result<(SamplingSet, TextureHandle, TextureHandle, ResourcePool), EngineError> {
        for effect in Effect::ALL {
            let program = device.load_program(effect)?;
            tracing::debug!(effect = effect.name(), "program loaded");
            programs.push((effect, program));
        }

        let sampling = SamplingSet::from_settings(&cfg.ssao);
        tracing::info!(
            seed = sampling.seed,
            samples = sampling.kernel.len(),
            profile = ?sampling.kernel.profile(),
            "ambient occlusion sampling generated"
        );

        let noise =
            device.create_texture(&sampling.noise.texture_desc(), &sampling.noise.to_rgb())?;
        textures.push(noise);
        let white_desc = TextureDesc {
            extent: Extent::new(1, 1),
            format: PixelFormat::Rgba8,
            filter: SampleFilter::Nearest,
            wrap: WrapMode::ClampToEdge,
        };
        let white = device.create_texture(&white_desc, &[1.0, 1.0, 1.0, 1.0])?;
        textures.push(white);

        let pool = ResourcePool::allocate(device, layout)?;
        Ok((sampling, noise, white, pool))
    }

    pub fn layout(&self) -> &PoolLayout {
        &self.layout
    }

    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    pub fn kernel(&self) -> &SampleKernel {
        &self.sampling.kernel
    }

    /// Seed the kernel and noise tile were generated from.
    pub fn seed(&self) -> u64 {
        self.sampling.seed
    }

    /// The all-white occlusion texture returned when AO is disabled.
    pub fn white_texture(&self) -> TextureHandle {
        self.white
    }

    pub fn noise_texture(&self) -> TextureHandle {
        self.noise
    }

    /// Ambient occlusion. Must run before lighting.
    ///
    /// Returns the smoothed occlusion texture, or the white fallback without touching the
    /// device when AO is disabled.
    pub fn run_pre_lighting_pass(
        &self,
        device: &mut dyn RenderDevice,
        geometry: &GeometryOutput,
        camera: &CameraMatrices,
        cfg: &PostFxConfig,
        diagnostics: &mut dyn DiagnosticsSink,
    ) -> Result<TextureHandle, EngineError> {
        let (plan, output) = match plan_pre_lighting(cfg) {
            PreLightingPlan::Disabled => {
                tracing::trace!("ambient occlusion disabled; using white fallback");
                return Ok(self.white);
            }
            PreLightingPlan::Occlusion { plan, output } => (plan, output),
        };

        let bindings = Bindings {
            scene: None,
            geometry: Some(geometry),
            camera: Some(camera),
            frame: FrameCtx::default(),
        };
        let result = match self.execute(device, &plan, &bindings, cfg, diagnostics) {
            Ok(()) => self.pool.color(device, output),
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            diagnostics.frame_error(e);
        }
        result
    }

    /// Resolve, bloom, tonemap, cosmetic filters, then present. Writes the presentation surface.
    pub fn run_post_process_pass(
        &self,
        device: &mut dyn RenderDevice,
        scene: &SceneImage,
        cfg: &PostFxConfig,
        frame: FrameCtx,
        diagnostics: &mut dyn DiagnosticsSink,
    ) -> Result<(), EngineError> {
        let result = self.post_process(device, scene, cfg, frame, diagnostics);
        if let Err(e) = &result {
            tracing::error!(frame = frame.frame, error = %e, "post-process frame aborted");
            diagnostics.frame_error(e);
        }
        result
    }

    fn post_process(
        &self,
        device: &mut dyn RenderDevice,
        scene: &SceneImage,
        cfg: &PostFxConfig,
        frame: FrameCtx,
        diagnostics: &mut dyn DiagnosticsSink,
    ) -> Result<(), EngineError> {
        let desc = device.surface_desc(scene.surface)?;
        let scene_desc = SceneImageDesc {
            extent: desc.extent,
            multisampled: desc.multisampled,
        };
        let plan = plan_post_process(
            scene_desc,
            cfg,
            &self.layout,
            frame.vignette_mask.is_some(),
        )?;

        let bindings = Bindings {
            scene: Some((scene.surface, desc.extent)),
            geometry: None,
            camera: None,
            frame,
        };
        self.execute(device, &plan, &bindings, cfg, diagnostics)
    }

    /// Release pool surfaces, owned textures and every loaded program.
    pub fn destroy(&mut self, device: &mut dyn RenderDevice) {
        self.pool.destroy(device);
        device.destroy_texture(self.noise);
        device.destroy_texture(self.white);
        for (_, p) in self.programs.drain(..) {
            device.destroy_program(p);
        }
        tracing::info!("post processor destroyed");
    }

    fn program(&self, effect: Effect) -> Result<ProgramHandle, EngineError> {
        self.programs
            .iter()
            .find(|(e, _)| *e == effect)
            .map(|(_, p)| *p)
            .ok_or(EngineError::ShaderNotFound {
                effect: effect.name(),
                path: None,
            })
    }

    fn execute(
        &self,
        device: &mut dyn RenderDevice,
        plan: &FramePlan,
        bindings: &Bindings<'_>,
        cfg: &PostFxConfig,
        diagnostics: &mut dyn DiagnosticsSink,
    ) -> Result<(), EngineError> {
        plan.validate()?;
        let sync = cfg.diagnostics.sync_timings;

        for step in &plan.steps {
            let label = match step {
                Step::Blit { dst, .. } => format!("blit.{}", dst.name()),
                Step::Draw(d) => d.label(),
            };
            let _span = tracing::debug_span!("postfx.stage", stage = %label).entered();

            if sync {
                device.finish();
            }
            let start = Instant::now();

            match step {
                Step::Blit { src, dst, filter } => {
                    let src_surface = self.surface_for(*src, bindings)?;
                    let dst_surface = self.pool.surface(*dst)?;
                    tracing::debug!(src = ?src, dst = dst.name(), filter = ?filter, "blit");
                    device.blit(src_surface, dst_surface, *filter)?;
                }
                Step::Draw(d) => self.draw(device, d, bindings, cfg)?,
            }

            if sync {
                device.finish();
            }
            diagnostics.stage_timing(&label, start.elapsed());
        }
        Ok(())
    }

    fn draw(
        &self,
        device: &mut dyn RenderDevice,
        step: &DrawStep,
        bindings: &Bindings<'_>,
        cfg: &PostFxConfig,
    ) -> Result<(), EngineError> {
        let stage = step.effect.name();
        let mut inputs = Vec::with_capacity(step.inputs.len());
        for (name, image) in &step.inputs {
            inputs.push((*name, self.texture_for(device, stage, name, *image, bindings)?));
        }

        let (target, target_extent) = match step.target {
            Target::Surface(id) => (
                RenderTarget::Surface(self.pool.surface(id)?),
                self.layout.extent(id),
            ),
            Target::Presentation => (RenderTarget::Presentation, self.layout.display()),
        };

        let input_extent = step
            .inputs
            .first()
            .map(|(_, img)| self.image_extent(*img, bindings, target_extent))
            .unwrap_or(target_extent);

        let params = self.params_for(step, cfg, bindings, target_extent, input_extent)?;
        tracing::debug!(
            stage = %step.label(),
            target = ?step.target,
            extent = %target_extent,
            "draw"
        );
        tracing::trace!(uniforms = params.len(), "uploading parameters");
        device.draw_fullscreen(self.program(step.effect)?, target, &inputs, &params)
    }

    fn params_for(
        &self,
        step: &DrawStep,
        cfg: &PostFxConfig,
        bindings: &Bindings<'_>,
        target_extent: Extent,
        input_extent: Extent,
    ) -> Result<EffectParams, EngineError> {
        let p = match step.effect {
            Effect::AmbientOcclusion => {
                let camera = bindings.camera.ok_or(EngineError::MissingInput {
                    stage: step.effect.name(),
                    input: "camera",
                })?;
                params::ambient_occlusion(cfg, &self.sampling.kernel, camera, target_extent)
            }
            Effect::AmbientOcclusionBlur => params::ambient_occlusion_blur(cfg),
            Effect::BrightPass => params::bright_pass(cfg),
            Effect::GaussianBlur => {
                let axis = step
                    .axis
                    .ok_or_else(|| EngineError::other("gaussian blur step has no axis"))?;
                params::gaussian_blur(axis, target_extent, cfg.resolution.bloom_scale)
            }
            Effect::BloomComposite => params::bloom_composite(cfg),
            Effect::TonemapGamma => params::tonemap_gamma(cfg),
            Effect::ChromaticAberration => params::chromatic_aberration(cfg, input_extent),
            Effect::FilmGrain => params::film_grain(cfg, bindings.frame.time),
            Effect::Vignette => {
                let uses_mask = step.inputs.iter().any(|(n, _)| *n == "vignette_mask");
                params::vignette(cfg, uses_mask)
            }
            Effect::Fxaa => params::fxaa(cfg, input_extent),
            Effect::Copy => EffectParams::new(),
        };
        Ok(p)
    }

    fn surface_for(
        &self,
        image: ImageRef,
        bindings: &Bindings<'_>,
    ) -> Result<SurfaceHandle, EngineError> {
        match image {
            ImageRef::SceneColor => bindings
                .scene
                .map(|(s, _)| s)
                .ok_or_else(|| EngineError::other("no scene image bound for this pass")),
            ImageRef::Surface(id) => self.pool.surface(id),
            other => Err(EngineError::other(format!(
                "{other:?} is not a framebuffer and cannot be blitted"
            ))),
        }
    }

    fn texture_for(
        &self,
        device: &dyn RenderDevice,
        stage: &'static str,
        input: &'static str,
        image: ImageRef,
        bindings: &Bindings<'_>,
    ) -> Result<TextureHandle, EngineError> {
        let missing = EngineError::MissingInput { stage, input };
        match image {
            ImageRef::SceneColor => {
                let (surface, _) = bindings.scene.ok_or(missing)?;
                device.surface_color(surface)
            }
            ImageRef::SceneNormal => bindings.geometry.map(|g| g.normal).ok_or(missing),
            ImageRef::SceneDepth => bindings.geometry.map(|g| g.depth).ok_or(missing),
            ImageRef::NoiseTile => Ok(self.noise),
            ImageRef::VignetteMask => bindings.frame.vignette_mask.ok_or(missing),
            ImageRef::Surface(id) => self.pool.color(device, id),
        }
    }

    fn image_extent(&self, image: ImageRef, bindings: &Bindings<'_>, fallback: Extent) -> Extent {
        match image {
            ImageRef::Surface(id) => self.layout.extent(id),
            ImageRef::SceneColor => bindings.scene.map(|(_, e)| e).unwrap_or(fallback),
            _ => fallback,
        }
    }
}
