//! Pipeline configuration: toggles and scalar parameters for every effect.
//!
//! A `PostFxConfig` is owned by the host. Debug tooling writes into it between frames via
//! [`PostFxConfig::set_param`]; the orchestrator only ever reads it by reference.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Upper bound on the hemisphere kernel size (matches the `samples[]` uniform array length).
pub const MAX_KERNEL_SIZE: u32 = 64;

/// Upper bound on the AO blur half-radius.
pub const MAX_AO_BLUR_RADIUS: u32 = 8;

/// Width/height in texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Scale both axes, flooring and clamping to at least one texel.
    pub fn scaled(self, factor: f32) -> Self {
        let s = |v: u32| ((v as f32 * factor).floor() as u32).max(1);
        Self {
            width: s(self.width),
            height: s(self.height),
        }
    }

    /// Reciprocal resolution, as sampled by texel-offset uniforms.
    pub fn texel_size(self) -> [f32; 2] {
        [
            1.0 / self.width.max(1) as f32,
            1.0 / self.height.max(1) as f32,
        ]
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Extent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionSettings {
    /// Internal render resolution (may be supersampled relative to `display`).
    pub render: Extent,
    /// Window / presentation resolution.
    pub display: Extent,
    /// Working resolution of the bloom chain relative to `display`.
    pub bloom_scale: f32,
}

impl Default for ResolutionSettings {
    fn default() -> Self {
        Self {
            render: Extent::new(1280, 720),
            display: Extent::new(1280, 720),
            bloom_scale: 1.0,
        }
    }
}

/// Distribution of the raw z draw for hemisphere kernel samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelProfile {
    /// z uniform in [0, 1].
    Hemisphere,
    /// z uniform in [0, 1] clamped to [0.2, 1]; avoids near-perpendicular samples.
    ClampedHemisphere,
}

impl KernelProfile {
    pub fn min_z(self) -> f32 {
        match self {
            KernelProfile::Hemisphere => 0.0,
            KernelProfile::ClampedHemisphere => 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsaoSettings {
    pub enabled: bool,
    pub sample_radius: f32,
    pub strength: f32,
    /// Construction-time only.
    pub kernel_size: u32,
    /// Construction-time only.
    pub kernel_profile: KernelProfile,
    /// Half-width of the box blur (2 => 5x5).
    pub blur_radius: u32,
    /// AO buffers relative to render resolution. Construction-time only.
    pub resolution_scale: f32,
    /// Explicit kernel/noise seed. `None` derives one from the clock.
    pub seed: Option<u64>,
}

impl Default for SsaoSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_radius: 2.0,
            strength: 3.0,
            kernel_size: 32,
            kernel_profile: KernelProfile::ClampedHemisphere,
            blur_radius: 2,
            resolution_scale: 0.5,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomSettings {
    pub enabled: bool,
    pub threshold: f32,
    pub strength: f32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 1.0,
            strength: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneMapSettings {
    pub gamma: f32,
    pub exposure: f32,
}

impl Default for ToneMapSettings {
    fn default() -> Self {
        Self {
            gamma: 2.2,
            exposure: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VignetteSettings {
    pub enabled: bool,
    pub intensity: f32,
    pub colour: [f32; 3],
}

impl Default for VignetteSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            intensity: 0.25,
            colour: [0.0, 0.0, 0.0],
        }
    }
}

/// Shared shape of the single-intensity cosmetic filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub enabled: bool,
    pub intensity: f32,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            intensity: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FxaaSettings {
    pub enabled: bool,
}

impl Default for FxaaSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsSettings {
    /// Block on the device before reading stage timers.
    pub sync_timings: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostFxConfig {
    pub resolution: ResolutionSettings,
    pub ssao: SsaoSettings,
    pub bloom: BloomSettings,
    pub tonemap: ToneMapSettings,
    pub vignette: VignetteSettings,
    pub chromatic_aberration: FilterSettings,
    pub film_grain: FilterSettings,
    pub fxaa: FxaaSettings,
    pub diagnostics: DiagnosticsSettings,
}

/// Every name accepted by [`PostFxConfig::set_param`] / [`PostFxConfig::param`].
const PARAM_NAMES: &[&str] = &[
    "ssao.enabled",
    "ssao.sample_radius",
    "ssao.strength",
    "ssao.blur_radius",
    "bloom.enabled",
    "bloom.threshold",
    "bloom.strength",
    "tonemap.gamma",
    "tonemap.exposure",
    "vignette.enabled",
    "vignette.intensity",
    "vignette.colour.r",
    "vignette.colour.g",
    "vignette.colour.b",
    "chromatic_aberration.enabled",
    "chromatic_aberration.intensity",
    "film_grain.enabled",
    "film_grain.intensity",
    "fxaa.enabled",
    "diagnostics.sync_timings",
];

fn flag(v: f32) -> bool {
    v >= 0.5
}

fn from_flag(b: bool) -> f32 {
    if b {
        1.0
    } else {
        0.0
    }
}

impl PostFxConfig {
    /// Every optional effect off; tonemapping still runs.
    pub fn all_disabled() -> Self {
        let mut cfg = Self::default();
        cfg.ssao.enabled = false;
        cfg.bloom.enabled = false;
        cfg.vignette.enabled = false;
        cfg.chromatic_aberration.enabled = false;
        cfg.film_grain.enabled = false;
        cfg.fxaa.enabled = false;
        cfg
    }

    /// Parse a JSON document. Missing sections fall back to defaults.
    pub fn from_json_str(s: &str) -> Result<Self, EngineError> {
        let cfg: PostFxConfig = serde_json::from_str(s).map_err(|e| EngineError::Json {
            path: PathBuf::from("<inline>"),
            source: e,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Structural checks for values that cannot degrade gracefully (sizes, kernel bounds).
    pub fn validate(&self) -> Result<(), EngineError> {
        let r = &self.resolution;
        if r.render.is_empty() {
            return Err(EngineError::invalid_config(format!(
                "render resolution must be non-zero (got {})",
                r.render
            )));
        }
        if r.display.is_empty() {
            return Err(EngineError::invalid_config(format!(
                "display resolution must be non-zero (got {})",
                r.display
            )));
        }
        if !(r.bloom_scale.is_finite() && r.bloom_scale > 0.0) {
            return Err(EngineError::invalid_config(format!(
                "resolution.bloom_scale must be > 0 (got {})",
                r.bloom_scale
            )));
        }
        let s = &self.ssao;
        if s.kernel_size == 0 || s.kernel_size > MAX_KERNEL_SIZE {
            return Err(EngineError::invalid_config(format!(
                "ssao.kernel_size must be in 1..={MAX_KERNEL_SIZE} (got {})",
                s.kernel_size
            )));
        }
        if !(s.resolution_scale.is_finite() && s.resolution_scale > 0.0) {
            return Err(EngineError::invalid_config(format!(
                "ssao.resolution_scale must be > 0 (got {})",
                s.resolution_scale
            )));
        }
        Ok(())
    }

    /// Names writable through [`set_param`](Self::set_param).
    pub fn param_names() -> &'static [&'static str] {
        PARAM_NAMES
    }

    /// Write a single named parameter. Booleans are set when `value >= 0.5`.
    pub fn set_param(&mut self, name: &str, value: f32) -> Result<(), EngineError> {
        match name {
            "ssao.enabled" => self.ssao.enabled = flag(value),
            "ssao.sample_radius" => self.ssao.sample_radius = value,
            "ssao.strength" => self.ssao.strength = value,
            "ssao.blur_radius" => {
                self.ssao.blur_radius = (value.max(0.0).round() as u32).min(MAX_AO_BLUR_RADIUS)
            }
            "bloom.enabled" => self.bloom.enabled = flag(value),
            "bloom.threshold" => self.bloom.threshold = value,
            "bloom.strength" => self.bloom.strength = value,
            "tonemap.gamma" => self.tonemap.gamma = value,
            "tonemap.exposure" => self.tonemap.exposure = value,
            "vignette.enabled" => self.vignette.enabled = flag(value),
            "vignette.intensity" => self.vignette.intensity = value,
            "vignette.colour.r" => self.vignette.colour[0] = value,
            "vignette.colour.g" => self.vignette.colour[1] = value,
            "vignette.colour.b" => self.vignette.colour[2] = value,
            "chromatic_aberration.enabled" => self.chromatic_aberration.enabled = flag(value),
            "chromatic_aberration.intensity" => self.chromatic_aberration.intensity = value,
            "film_grain.enabled" => self.film_grain.enabled = flag(value),
            "film_grain.intensity" => self.film_grain.intensity = value,
            "fxaa.enabled" => self.fxaa.enabled = flag(value),
            "diagnostics.sync_timings" => self.diagnostics.sync_timings = flag(value),
            _ => return Err(EngineError::UnknownParam(name.to_string())),
        }
        tracing::trace!(param = name, value, "config param updated");
        Ok(())
    }

    /// Read a single named parameter (booleans as 0.0 / 1.0).
    pub fn param(&self, name: &str) -> Result<f32, EngineError> {
        let v = match name {
            "ssao.enabled" => from_flag(self.ssao.enabled),
            "ssao.sample_radius" => self.ssao.sample_radius,
            "ssao.strength" => self.ssao.strength,
            "ssao.blur_radius" => self.ssao.blur_radius as f32,
            "bloom.enabled" => from_flag(self.bloom.enabled),
            "bloom.threshold" => self.bloom.threshold,
            "bloom.strength" => self.bloom.strength,
            "tonemap.gamma" => self.tonemap.gamma,
            "tonemap.exposure" => self.tonemap.exposure,
            "vignette.enabled" => from_flag(self.vignette.enabled),
            "vignette.intensity" => self.vignette.intensity,
            "vignette.colour.r" => self.vignette.colour[0],
            "vignette.colour.g" => self.vignette.colour[1],
            "vignette.colour.b" => self.vignette.colour[2],
            "chromatic_aberration.enabled" => from_flag(self.chromatic_aberration.enabled),
            "chromatic_aberration.intensity" => self.chromatic_aberration.intensity,
            "film_grain.enabled" => from_flag(self.film_grain.enabled),
            "film_grain.intensity" => self.film_grain.intensity,
            "fxaa.enabled" => from_flag(self.fxaa.enabled),
            "diagnostics.sync_timings" => from_flag(self.diagnostics.sync_timings),
            _ => return Err(EngineError::UnknownParam(name.to_string())),
        };
        Ok(v)
    }
}

/// Load and validate a config file.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<PostFxConfig, EngineError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| EngineError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let cfg: PostFxConfig = serde_json::from_str(&text).map_err(|e| EngineError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    cfg.validate().map_err(|e| match e {
        EngineError::InvalidConfig { msg, .. } => EngineError::InvalidConfig {
            path: Some(path.to_path_buf()),
            msg,
        },
        other => other,
    })?;
    tracing::info!(path = %path.display(), "loaded postfx config");
    Ok(cfg)
}
