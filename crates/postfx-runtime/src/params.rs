//! Named parameter bags and the per-stage builders that fill them from the configuration.
//!
//! Builders are where out-of-range values degrade: negative intensities become zero, a
//! non-positive gamma falls back to 2.2. Nothing here returns an error.

use glam::{Mat4, Vec2, Vec3};

use postfx_core::{Extent, PostFxConfig, MAX_AO_BLUR_RADIUS};
use postfx_plan::BlurAxis;

use crate::kernel::{SampleKernel, NOISE_TILE_SIZE};

/// Gamma used when the configured value is unusable.
pub const FALLBACK_GAMMA: f32 = 2.2;

/// Depth bias applied when comparing reconstructed and sample depth.
pub const AO_DEPTH_BIAS: f32 = 0.025;

/// A single uniform value.
#[derive(Debug, Clone, PartialEq)]
pub enum Uniform {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Mat4(Mat4),
    Vec3Array(Vec<Vec3>),
}

impl From<bool> for Uniform {
    fn from(v: bool) -> Self {
        Uniform::Bool(v)
    }
}

impl From<i32> for Uniform {
    fn from(v: i32) -> Self {
        Uniform::Int(v)
    }
}

impl From<f32> for Uniform {
    fn from(v: f32) -> Self {
        Uniform::Float(v)
    }
}

impl From<Vec2> for Uniform {
    fn from(v: Vec2) -> Self {
        Uniform::Vec2(v)
    }
}

impl From<Vec3> for Uniform {
    fn from(v: Vec3) -> Self {
        Uniform::Vec3(v)
    }
}

impl From<Mat4> for Uniform {
    fn from(v: Mat4) -> Self {
        Uniform::Mat4(v)
    }
}

impl From<Vec<Vec3>> for Uniform {
    fn from(v: Vec<Vec3>) -> Self {
        Uniform::Vec3Array(v)
    }
}

/// Ordered name -> value bag uploaded by [`RenderDevice::draw_fullscreen`](crate::RenderDevice::draw_fullscreen).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectParams {
    entries: Vec<(&'static str, Uniform)>,
}

impl EffectParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `name`.
    pub fn set(&mut self, name: &'static str, value: impl Into<Uniform>) -> &mut Self {
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
        self
    }

    pub fn with(mut self, name: &'static str, value: impl Into<Uniform>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Uniform> {
        self.entries.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Uniform)> {
        self.entries.iter().map(|(n, v)| (*n, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn float(&self, name: &str) -> Option<f32> {
        match self.get(name)? {
            Uniform::Float(v) => Some(*v),
            Uniform::Int(v) => Some(*v as f32),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i32> {
        match self.get(name)? {
            Uniform::Int(v) => Some(*v),
            Uniform::Bool(b) => Some(*b as i32),
            _ => None,
        }
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            Uniform::Bool(b) => Some(*b),
            Uniform::Int(v) => Some(*v != 0),
            _ => None,
        }
    }

    pub fn vec2(&self, name: &str) -> Option<Vec2> {
        match self.get(name)? {
            Uniform::Vec2(v) => Some(*v),
            _ => None,
        }
    }

    pub fn vec3(&self, name: &str) -> Option<Vec3> {
        match self.get(name)? {
            Uniform::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn mat4(&self, name: &str) -> Option<Mat4> {
        match self.get(name)? {
            Uniform::Mat4(m) => Some(*m),
            _ => None,
        }
    }

    pub fn vec3_array(&self, name: &str) -> Option<&[Vec3]> {
        match self.get(name)? {
            Uniform::Vec3Array(v) => Some(v),
            _ => None,
        }
    }
}

/// View and projection of the active camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrices {
    pub view: Mat4,
    pub projection: Mat4,
}

impl CameraMatrices {
    pub fn new(view: Mat4, projection: Mat4) -> Self {
        Self { view, projection }
    }
}

fn non_negative(name: &'static str, v: f32) -> f32 {
    if v >= 0.0 {
        v
    } else {
        tracing::warn!(param = name, value = v, "negative parameter clamped to 0");
        0.0
    }
}

fn usable_gamma(gamma: f32) -> f32 {
    if gamma.is_finite() && gamma > 0.0 {
        gamma
    } else {
        tracing::warn!(gamma, fallback = FALLBACK_GAMMA, "unusable gamma");
        FALLBACK_GAMMA
    }
}

/// Separable blur half-width: wider as the working buffer shrinks.
pub fn blur_kernel_radius(bloom_scale: f32) -> i32 {
    if bloom_scale >= 1.0 {
        4
    } else if bloom_scale >= 0.5 {
        6
    } else {
        8
    }
}

/// Normalized gaussian weights for offsets `0..=radius` (sigma = radius / 2).
pub fn gaussian_weights(radius: i32) -> Vec<f32> {
    let radius = radius.max(0);
    if radius == 0 {
        return vec![1.0];
    }
    let sigma = radius as f32 * 0.5;
    let raw: Vec<f32> = (0..=radius)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let total = raw[0] + 2.0 * raw[1..].iter().sum::<f32>();
    raw.into_iter().map(|w| w / total).collect()
}

pub fn ambient_occlusion(
    cfg: &PostFxConfig,
    kernel: &SampleKernel,
    camera: &CameraMatrices,
    target: Extent,
) -> EffectParams {
    let radius = non_negative("ssao.sample_radius", cfg.ssao.sample_radius);
    let tile = NOISE_TILE_SIZE as f32;
    EffectParams::new()
        .with(
            "noiseScale",
            Vec2::new(target.width as f32 / tile, target.height as f32 / tile),
        )
        .with(
            "ssaoStrength",
            non_negative("ssao.strength", cfg.ssao.strength),
        )
        .with("sampleRadius", radius)
        .with("sampleRadius2", radius * radius)
        .with("depthBias", AO_DEPTH_BIAS)
        .with("numKernelSamples", kernel.len() as i32)
        .with("samples", kernel.samples().to_vec())
        .with("view", camera.view)
        .with("projection", camera.projection)
        .with("viewInverse", camera.view.inverse())
        .with("projectionInverse", camera.projection.inverse())
}

pub fn ambient_occlusion_blur(cfg: &PostFxConfig) -> EffectParams {
    let radius = cfg.ssao.blur_radius.min(MAX_AO_BLUR_RADIUS);
    EffectParams::new().with("numSamplesAroundTexel", radius as i32)
}

pub fn bright_pass(cfg: &PostFxConfig) -> EffectParams {
    EffectParams::new().with(
        "threshold",
        non_negative("bloom.threshold", cfg.bloom.threshold),
    )
}

pub fn gaussian_blur(axis: BlurAxis, target: Extent, bloom_scale: f32) -> EffectParams {
    let [dx, dy] = target.texel_size();
    EffectParams::new()
        .with("isVerticalBlur", axis == BlurAxis::Vertical)
        .with("read_offset", Vec2::new(dx, dy))
        .with("kernel_radius", blur_kernel_radius(bloom_scale))
}

pub fn bloom_composite(cfg: &PostFxConfig) -> EffectParams {
    EffectParams::new().with("strength", non_negative("bloom.strength", cfg.bloom.strength))
}

pub fn tonemap_gamma(cfg: &PostFxConfig) -> EffectParams {
    EffectParams::new()
        .with(
            "exposure",
            non_negative("tonemap.exposure", cfg.tonemap.exposure),
        )
        .with("gamma_inverse", 1.0 / usable_gamma(cfg.tonemap.gamma))
}

pub fn chromatic_aberration(cfg: &PostFxConfig, input: Extent) -> EffectParams {
    let [dx, dy] = input.texel_size();
    EffectParams::new()
        .with(
            "intensity",
            non_negative(
                "chromatic_aberration.intensity",
                cfg.chromatic_aberration.intensity,
            ) * 100.0,
        )
        .with("texel_size", Vec2::new(dx, dy))
}

/// `elapsed` is host time in seconds; it is wrapped to keep float precision.
pub fn film_grain(cfg: &PostFxConfig, elapsed: f64) -> EffectParams {
    EffectParams::new()
        .with(
            "intensity",
            non_negative("film_grain.intensity", cfg.film_grain.intensity) * 100.0,
        )
        .with("time", elapsed.rem_euclid(100.0) as f32)
}

pub fn vignette(cfg: &PostFxConfig, uses_mask: bool) -> EffectParams {
    EffectParams::new()
        .with("colour", Vec3::from_array(cfg.vignette.colour))
        .with(
            "intensity",
            non_negative("vignette.intensity", cfg.vignette.intensity),
        )
        .with("usesMask", uses_mask)
}

pub fn fxaa(cfg: &PostFxConfig, input: Extent) -> EffectParams {
    let [dx, dy] = input.texel_size();
    EffectParams::new()
        .with("texel_size", Vec2::new(dx, dy))
        .with("enable_FXAA", cfg.fxaa.enabled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn set_replaces_existing_entry() {
        let mut p = EffectParams::new();
        p.set("threshold", 1.0);
        p.set("threshold", 2.0);
        assert_eq!(p.len(), 1);
        assert_eq!(p.float("threshold"), Some(2.0));
    }

    #[test]
    fn bad_gamma_falls_back() {
        let mut cfg = PostFxConfig::default();
        for g in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            cfg.tonemap.gamma = g;
            let p = tonemap_gamma(&cfg);
            assert_relative_eq!(p.float("gamma_inverse").unwrap(), 1.0 / FALLBACK_GAMMA);
        }
    }

    #[test]
    fn negative_intensities_clamp_to_zero() {
        let mut cfg = PostFxConfig::default();
        cfg.chromatic_aberration.intensity = -3.0;
        cfg.film_grain.intensity = -0.1;
        cfg.bloom.threshold = -1.0;
        cfg.vignette.intensity = f32::NAN;
        assert_eq!(chromatic_aberration(&cfg, Extent::new(4, 4)).float("intensity"), Some(0.0));
        assert_eq!(film_grain(&cfg, 1.0).float("intensity"), Some(0.0));
        assert_eq!(bright_pass(&cfg).float("threshold"), Some(0.0));
        assert_eq!(vignette(&cfg, false).float("intensity"), Some(0.0));
    }

    #[test]
    fn cosmetic_intensities_are_scaled_by_100() {
        let cfg = PostFxConfig::default();
        assert_relative_eq!(
            chromatic_aberration(&cfg, Extent::new(4, 4))
                .float("intensity")
                .unwrap(),
            25.0
        );
        assert_relative_eq!(film_grain(&cfg, 0.0).float("intensity").unwrap(), 25.0);
    }

    #[test]
    fn film_grain_time_wraps() {
        let cfg = PostFxConfig::default();
        assert_relative_eq!(
            film_grain(&cfg, 1234.5).float("time").unwrap(),
            34.5,
            epsilon = 1e-3
        );
    }

    #[test]
    fn blur_radius_grows_as_scale_shrinks() {
        assert_eq!(blur_kernel_radius(1.0), 4);
        assert_eq!(blur_kernel_radius(0.5), 6);
        assert_eq!(blur_kernel_radius(0.25), 8);
    }

    #[test]
    fn gaussian_weights_sum_to_one() {
        for r in [0, 4, 6, 8] {
            let w = gaussian_weights(r);
            let total = w[0] + 2.0 * w[1..].iter().sum::<f32>();
            assert_relative_eq!(total, 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn blur_offsets_follow_target_size() {
        let p = gaussian_blur(BlurAxis::Vertical, Extent::new(640, 360), 0.5);
        assert_eq!(p.flag("isVerticalBlur"), Some(true));
        assert_eq!(p.vec2("read_offset"), Some(Vec2::new(1.0 / 640.0, 1.0 / 360.0)));
        assert_eq!(p.int("kernel_radius"), Some(6));
    }
}
