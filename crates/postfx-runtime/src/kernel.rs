//! Construction-time random data for ambient occlusion: the hemisphere sample kernel and the
//! tiled rotation noise. Both are in tangent space (surface normal = +Z) and immutable.

use std::time::{SystemTime, UNIX_EPOCH};

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use postfx_core::{Extent, KernelProfile, SsaoSettings};
use postfx_plan::PixelFormat;

use crate::device::{SampleFilter, TextureDesc, WrapMode};

/// Side length of the square noise tile, in texels.
pub const NOISE_TILE_SIZE: u32 = 4;

/// Seed for kernel and noise generation: the configured one, or a clock-derived one.
pub fn sampling_seed(settings: &SsaoSettings) -> u64 {
    settings.seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    })
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Distance scale for sample `index` of `count`: quadratic ease from 0.1 to 1.
pub fn sample_scale(index: usize, count: usize) -> f32 {
    let t = index as f32 / count.max(1) as f32;
    lerp(0.1, 1.0, t * t)
}

/// Hemisphere sample offsets, clustered towards the origin.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleKernel {
    samples: Vec<Vec3>,
    profile: KernelProfile,
}

impl SampleKernel {
    pub fn generate(count: usize, profile: KernelProfile, rng: &mut impl Rng) -> Self {
        let min_z = profile.min_z();
        let samples = (0..count)
            .map(|i| {
                let raw = Vec3::new(
                    rng.random_range(-1.0..=1.0),
                    rng.random_range(-1.0..=1.0),
                    rng.random_range(0.0..=1.0f32).max(min_z),
                );
                // A zero-length draw has no direction; point it along the normal.
                let dir = raw.try_normalize().unwrap_or(Vec3::Z);
                dir * sample_scale(i, count)
            })
            .collect();
        Self { samples, profile }
    }

    pub fn samples(&self) -> &[Vec3] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn profile(&self) -> KernelProfile {
        self.profile
    }
}

/// 4x4 random rotation vectors (z = 0), tiled across the screen with repeat wrapping.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseTile {
    texels: Vec<Vec3>,
}

impl NoiseTile {
    pub fn generate(rng: &mut impl Rng) -> Self {
        let n = (NOISE_TILE_SIZE * NOISE_TILE_SIZE) as usize;
        let texels = (0..n)
            .map(|_| {
                Vec3::new(
                    rng.random_range(-1.0..=1.0),
                    rng.random_range(-1.0..=1.0),
                    0.0,
                )
            })
            .collect();
        Self { texels }
    }

    pub fn texels(&self) -> &[Vec3] {
        &self.texels
    }

    /// Texture description: RGB16F, nearest, repeat.
    pub fn texture_desc(&self) -> TextureDesc {
        TextureDesc {
            extent: Extent::new(NOISE_TILE_SIZE, NOISE_TILE_SIZE),
            format: PixelFormat::Rgb16F,
            filter: SampleFilter::Nearest,
            wrap: WrapMode::Repeat,
        }
    }

    /// Flattened RGB floats for upload.
    pub fn to_rgb(&self) -> Vec<f32> {
        self.texels.iter().flat_map(|v| v.to_array()).collect()
    }
}

/// Kernel and noise tile produced together from one seed.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingSet {
    pub seed: u64,
    pub kernel: SampleKernel,
    pub noise: NoiseTile,
}

impl SamplingSet {
    pub fn from_settings(settings: &SsaoSettings) -> Self {
        Self::with_seed(settings, sampling_seed(settings))
    }

    pub fn with_seed(settings: &SsaoSettings, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let kernel = SampleKernel::generate(
            settings.kernel_size as usize,
            settings.kernel_profile,
            &mut rng,
        );
        let noise = NoiseTile::generate(&mut rng);
        Self {
            seed,
            kernel,
            noise,
        }
    }
}
