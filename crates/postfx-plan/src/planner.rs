//! Per-frame planning: which stages run, in what order, reading and writing which surfaces.

use postfx_core::{EngineError, Extent, PostFxConfig};

use crate::{
    BlitFilter, BlurAxis, DrawStep, Effect, FramePlan, ImageRef, PoolLayout, Step, SurfaceId,
    Target,
};

/// What the scene renderer hands over for post-processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneImageDesc {
    pub extent: Extent,
    pub multisampled: bool,
}

/// Two-slot rotation used by the cosmetic chain.
///
/// `source()` is the surface most recently written; `target()` is always the other slot, so a
/// stage never reads and writes the same surface. Call `flip()` after each write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingPong {
    slots: [SurfaceId; 2],
    current: usize,
}

impl PingPong {
    /// `slots[0]` holds the current image on entry.
    pub fn new(slots: [SurfaceId; 2]) -> Self {
        Self { slots, current: 0 }
    }

    pub fn source(&self) -> SurfaceId {
        self.slots[self.current]
    }

    pub fn target(&self) -> SurfaceId {
        self.slots[1 - self.current]
    }

    pub fn flip(&mut self) {
        self.current = 1 - self.current;
    }
}

/// Transient per-frame state: the image the next stage reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameState {
    pub source: ImageRef,
    pub source_extent: Extent,
}

pub type Predicate = fn(&PostFxConfig) -> bool;

fn chromatic_aberration_enabled(cfg: &PostFxConfig) -> bool {
    cfg.chromatic_aberration.enabled
}

fn film_grain_enabled(cfg: &PostFxConfig) -> bool {
    cfg.film_grain.enabled
}

fn vignette_enabled(cfg: &PostFxConfig) -> bool {
    cfg.vignette.enabled
}

fn fxaa_enabled(cfg: &PostFxConfig) -> bool {
    cfg.fxaa.enabled
}

/// SDR-space filters in fixed order, each behind its toggle.
pub const COSMETIC_CHAIN: [(Effect, Predicate); 4] = [
    (Effect::ChromaticAberration, chromatic_aberration_enabled),
    (Effect::FilmGrain, film_grain_enabled),
    (Effect::Vignette, vignette_enabled),
    (Effect::Fxaa, fxaa_enabled),
];

fn draw(
    effect: Effect,
    target: Target,
    inputs: Vec<(&'static str, ImageRef)>,
) -> Step {
    Step::Draw(DrawStep {
        effect,
        axis: None,
        target,
        inputs,
    })
}

fn blur(axis: BlurAxis, src: SurfaceId, dst: SurfaceId) -> Step {
    Step::Draw(DrawStep {
        effect: Effect::GaussianBlur,
        axis: Some(axis),
        target: Target::Surface(dst),
        inputs: vec![("bloom_texture", ImageRef::Surface(src))],
    })
}

/// Outcome of planning the pre-lighting (ambient occlusion) pass.
#[derive(Debug, Clone, PartialEq)]
pub enum PreLightingPlan {
    /// AO is off: use the white fallback, issue no GPU work.
    Disabled,
    Occlusion { plan: FramePlan, output: SurfaceId },
}

pub fn plan_pre_lighting(cfg: &PostFxConfig) -> PreLightingPlan {
    if !cfg.ssao.enabled {
        return PreLightingPlan::Disabled;
    }

    let steps = vec![
        draw(
            Effect::AmbientOcclusion,
            Target::Surface(SurfaceId::SsaoRaw),
            vec![
                ("normalTexture", ImageRef::SceneNormal),
                ("depthTexture", ImageRef::SceneDepth),
                ("noiseTexture", ImageRef::NoiseTile),
            ],
        ),
        draw(
            Effect::AmbientOcclusionBlur,
            Target::Surface(SurfaceId::SsaoBlur),
            vec![("ssaoInput", ImageRef::Surface(SurfaceId::SsaoRaw))],
        ),
    ];

    PreLightingPlan::Occlusion {
        plan: FramePlan { steps },
        output: SurfaceId::SsaoBlur,
    }
}

/// Build the post-process plan for one frame.
///
/// Order: multisample resolve, resolution resolve, bloom, tonemap (exactly once), cosmetic
/// filters via ping-pong, final copy into the presentation surface.
pub fn plan_post_process(
    scene: SceneImageDesc,
    cfg: &PostFxConfig,
    layout: &PoolLayout,
    has_vignette_mask: bool,
) -> Result<FramePlan, EngineError> {
    let mut steps = Vec::new();
    let mut state = FrameState {
        source: ImageRef::SceneColor,
        source_extent: scene.extent,
    };

    // 1) Multisample resolve (nearest, same logical size).
    if scene.multisampled {
        let resolve = layout.extent(SurfaceId::Resolve);
        if scene.extent != resolve {
            return Err(EngineError::SurfaceSizeMismatch {
                what: "multisample resolve".to_string(),
                expected: (resolve.width, resolve.height),
                found: (scene.extent.width, scene.extent.height),
            });
        }
        steps.push(Step::Blit {
            src: state.source,
            dst: SurfaceId::Resolve,
            filter: BlitFilter::Nearest,
        });
        state.source = ImageRef::Surface(SurfaceId::Resolve);
    }

    // 2) Resolution resolve (linear; supersampling or upsampling).
    let screen = layout.extent(SurfaceId::Screen);
    if state.source_extent != screen {
        steps.push(Step::Blit {
            src: state.source,
            dst: SurfaceId::Screen,
            filter: BlitFilter::Linear,
        });
        state.source = ImageRef::Surface(SurfaceId::Screen);
        state.source_extent = screen;
    }

    // 3) Bloom sub-chain.
    if cfg.bloom.enabled {
        steps.push(draw(
            Effect::BrightPass,
            Target::Surface(SurfaceId::BrightPass),
            vec![("scene_capture", state.source)],
        ));
        steps.push(blur(
            BlurAxis::Vertical,
            SurfaceId::BrightPass,
            SurfaceId::BloomVertical,
        ));
        steps.push(blur(
            BlurAxis::Horizontal,
            SurfaceId::BloomVertical,
            SurfaceId::BloomBlurred,
        ));
        steps.push(draw(
            Effect::BloomComposite,
            Target::Surface(SurfaceId::Scratch),
            vec![
                ("scene_texture", state.source),
                ("bloom_texture", ImageRef::Surface(SurfaceId::BloomBlurred)),
            ],
        ));
        state.source = ImageRef::Surface(SurfaceId::Scratch);
    }

    // 4) HDR -> SDR boundary.
    steps.push(draw(
        Effect::TonemapGamma,
        Target::Surface(SurfaceId::Tonemapped),
        vec![("input_texture", state.source)],
    ));

    // 5) Cosmetic filters.
    let mut pp = PingPong::new([SurfaceId::Tonemapped, SurfaceId::Scratch]);
    for (effect, enabled) in COSMETIC_CHAIN {
        if !enabled(cfg) {
            continue;
        }
        let mut inputs = vec![("input_texture", ImageRef::Surface(pp.source()))];
        if effect == Effect::Vignette && has_vignette_mask {
            inputs.push(("vignette_mask", ImageRef::VignetteMask));
        }
        steps.push(draw(effect, Target::Surface(pp.target()), inputs));
        pp.flip();
    }

    // 6) Present.
    steps.push(draw(
        Effect::Copy,
        Target::Presentation,
        vec![("input_texture", ImageRef::Surface(pp.source()))],
    ));

    let plan = FramePlan { steps };
    plan.validate()?;
    tracing::trace!(steps = plan.steps.len(), "planned post-process frame");
    Ok(plan)
}
