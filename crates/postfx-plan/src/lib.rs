#![forbid(unsafe_code)]

//! postfx frame-plan vocabulary.
//!
//! This crate is **contract-only**: no GL handles, no pixels. It names the offscreen surfaces
//! the pipeline owns, the effect stages and the images each one declares, and turns a
//! configuration into an ordered list of steps (`FramePlan`) that a runtime executes.
//!
//! Planning is pure: toggles are evaluated once per frame when the plan is built, so a toggle
//! written while a frame is running takes effect on the next frame, not the next stage. Scalar
//! parameters are not part of the plan; runtimes read them when each step runs.
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

pub mod layout;
pub mod planner;

pub use layout::{PixelFormat, PoolLayout, SurfaceDesc};
pub use planner::{
    plan_post_process, plan_pre_lighting, FrameState, PingPong, PreLightingPlan, SceneImageDesc,
    COSMETIC_CHAIN,
};

use postfx_core::EngineError;

/// Offscreen surfaces owned by the resource pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SurfaceId {
    SsaoRaw,
    SsaoBlur,
    Resolve,
    Screen,
    BrightPass,
    BloomVertical,
    BloomBlurred,
    /// Bloom composite output and second ping-pong slot.
    Scratch,
    /// Tonemap output and first ping-pong slot.
    Tonemapped,
}

impl SurfaceId {
    pub const ALL: [SurfaceId; 9] = [
        SurfaceId::SsaoRaw,
        SurfaceId::SsaoBlur,
        SurfaceId::Resolve,
        SurfaceId::Screen,
        SurfaceId::BrightPass,
        SurfaceId::BloomVertical,
        SurfaceId::BloomBlurred,
        SurfaceId::Scratch,
        SurfaceId::Tonemapped,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SurfaceId::SsaoRaw => "ssao_raw",
            SurfaceId::SsaoBlur => "ssao_blur",
            SurfaceId::Resolve => "resolve",
            SurfaceId::Screen => "screen",
            SurfaceId::BrightPass => "bright_pass",
            SurfaceId::BloomVertical => "bloom_vertical",
            SurfaceId::BloomBlurred => "bloom_blurred",
            SurfaceId::Scratch => "scratch",
            SurfaceId::Tonemapped => "tonemapped",
        }
    }
}

/// A readable image referenced by a step.
///
/// Everything except `Surface` is supplied by a collaborator (scene renderer, kernel generator,
/// host) and is never written by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageRef {
    SceneColor,
    SceneNormal,
    SceneDepth,
    NoiseTile,
    VignetteMask,
    Surface(SurfaceId),
}

/// Where a draw writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Surface(SurfaceId),
    /// The window / default framebuffer.
    Presentation,
}

impl Target {
    pub fn surface(self) -> Option<SurfaceId> {
        match self {
            Target::Surface(id) => Some(id),
            Target::Presentation => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlitFilter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlurAxis {
    Vertical,
    Horizontal,
}

/// A sampler a stage's program declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputDecl {
    pub name: &'static str,
    pub optional: bool,
}

const fn required(name: &'static str) -> InputDecl {
    InputDecl {
        name,
        optional: false,
    }
}

/// Full-screen effect stages. One program per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Effect {
    AmbientOcclusion,
    AmbientOcclusionBlur,
    BrightPass,
    GaussianBlur,
    BloomComposite,
    TonemapGamma,
    ChromaticAberration,
    FilmGrain,
    Vignette,
    Fxaa,
    Copy,
}

impl Effect {
    pub const ALL: [Effect; 11] = [
        Effect::AmbientOcclusion,
        Effect::AmbientOcclusionBlur,
        Effect::BrightPass,
        Effect::GaussianBlur,
        Effect::BloomComposite,
        Effect::TonemapGamma,
        Effect::ChromaticAberration,
        Effect::FilmGrain,
        Effect::Vignette,
        Effect::Fxaa,
        Effect::Copy,
    ];

    /// Stable logical name; shader loaders key on it.
    pub fn name(self) -> &'static str {
        match self {
            Effect::AmbientOcclusion => "ssao",
            Effect::AmbientOcclusionBlur => "ssao_blur",
            Effect::BrightPass => "bloom_bright_pass",
            Effect::GaussianBlur => "bloom_gaussian_blur",
            Effect::BloomComposite => "bloom_composite",
            Effect::TonemapGamma => "tonemap_gamma",
            Effect::ChromaticAberration => "chromatic_aberration",
            Effect::FilmGrain => "film_grain",
            Effect::Vignette => "vignette",
            Effect::Fxaa => "fxaa",
            Effect::Copy => "copy",
        }
    }

    /// Samplers the program declares, in texture-unit order.
    pub fn inputs(self) -> &'static [InputDecl] {
        const AO: &[InputDecl] = &[
            required("normalTexture"),
            required("depthTexture"),
            required("noiseTexture"),
        ];
        const AO_BLUR: &[InputDecl] = &[required("ssaoInput")];
        const BRIGHT: &[InputDecl] = &[required("scene_capture")];
        const BLUR: &[InputDecl] = &[required("bloom_texture")];
        const COMPOSITE: &[InputDecl] = &[required("scene_texture"), required("bloom_texture")];
        const SINGLE: &[InputDecl] = &[required("input_texture")];
        const VIGNETTE: &[InputDecl] = &[
            required("input_texture"),
            InputDecl {
                name: "vignette_mask",
                optional: true,
            },
        ];
        match self {
            Effect::AmbientOcclusion => AO,
            Effect::AmbientOcclusionBlur => AO_BLUR,
            Effect::BrightPass => BRIGHT,
            Effect::GaussianBlur => BLUR,
            Effect::BloomComposite => COMPOSITE,
            Effect::Vignette => VIGNETTE,
            Effect::TonemapGamma
            | Effect::ChromaticAberration
            | Effect::FilmGrain
            | Effect::Fxaa
            | Effect::Copy => SINGLE,
        }
    }

    /// Cosmetic SDR-space filters that take part in ping-pong.
    pub fn is_cosmetic(self) -> bool {
        matches!(
            self,
            Effect::ChromaticAberration | Effect::FilmGrain | Effect::Vignette | Effect::Fxaa
        )
    }
}

/// A full-screen draw.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawStep {
    pub effect: Effect,
    /// Only set for `Effect::GaussianBlur`.
    pub axis: Option<BlurAxis>,
    pub target: Target,
    pub inputs: Vec<(&'static str, ImageRef)>,
}

impl DrawStep {
    /// Human-readable label used for logs and timings (`bloom_gaussian_blur.vertical`).
    pub fn label(&self) -> String {
        match self.axis {
            Some(BlurAxis::Vertical) => format!("{}.vertical", self.effect.name()),
            Some(BlurAxis::Horizontal) => format!("{}.horizontal", self.effect.name()),
            None => self.effect.name().to_string(),
        }
    }

    pub fn reads(&self, surface: SurfaceId) -> bool {
        self.inputs
            .iter()
            .any(|(_, img)| *img == ImageRef::Surface(surface))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Colour-only framebuffer blit, scaled to the destination size.
    Blit {
        src: ImageRef,
        dst: SurfaceId,
        filter: BlitFilter,
    },
    Draw(DrawStep),
}

/// Ordered steps for one invocation of a pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FramePlan {
    pub steps: Vec<Step>,
}

impl FramePlan {
    pub fn draws(&self) -> impl Iterator<Item = &DrawStep> {
        self.steps.iter().filter_map(|s| match s {
            Step::Draw(d) => Some(d),
            Step::Blit { .. } => None,
        })
    }

    pub fn blits(&self) -> impl Iterator<Item = (ImageRef, SurfaceId, BlitFilter)> + '_ {
        self.steps.iter().filter_map(|s| match s {
            Step::Blit { src, dst, filter } => Some((*src, *dst, *filter)),
            Step::Draw(_) => None,
        })
    }

    pub fn count_effect(&self, effect: Effect) -> usize {
        self.draws().filter(|d| d.effect == effect).count()
    }

    /// Index of the first draw step, if any.
    pub fn first_draw_index(&self) -> Option<usize> {
        self.steps.iter().position(|s| matches!(s, Step::Draw(_)))
    }

    /// Structural checks: no step reads the surface it writes, and every draw supplies
    /// the samplers its effect declares.
    pub fn validate(&self) -> Result<(), EngineError> {
        for step in &self.steps {
            match step {
                Step::Blit { src, dst, .. } => {
                    if *src == ImageRef::Surface(*dst) {
                        return Err(EngineError::AliasedTarget {
                            stage: "blit",
                            surface: dst.name().to_string(),
                        });
                    }
                }
                Step::Draw(d) => {
                    if let Some(t) = d.target.surface() {
                        if d.reads(t) {
                            return Err(EngineError::AliasedTarget {
                                stage: d.effect.name(),
                                surface: t.name().to_string(),
                            });
                        }
                    }
                    for decl in d.effect.inputs() {
                        if decl.optional {
                            continue;
                        }
                        if !d.inputs.iter().any(|(n, _)| *n == decl.name) {
                            return Err(EngineError::MissingInput {
                                stage: d.effect.name(),
                                input: decl.name,
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
