//! Software implementations of every effect, sharing sampler and uniform names with the GLSL
//! programs in `postfx-runtime-glow`.

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4, Vec4Swizzles};

use postfx_core::Extent;
use postfx_plan::Effect;
use postfx_runtime::params::{gaussian_weights, AO_DEPTH_BIAS};
use postfx_runtime::EffectParams;

use crate::image::Image;
use crate::Texture;

const LUMA_BT709: Vec3 = Vec3::new(0.2126, 0.7152, 0.0722);
const LUMA_FXAA: Vec3 = Vec3::new(0.299, 0.587, 0.114);

const FXAA_SPAN_MAX: f32 = 8.0;
const FXAA_REDUCE_MUL: f32 = 1.0 / 8.0;
const FXAA_REDUCE_MIN: f32 = 1.0 / 128.0;

/// Bound samplers for one draw.
pub(crate) struct Inputs<'a> {
    pub(crate) bound: Vec<(&'static str, &'a Texture)>,
}

impl Inputs<'_> {
    fn texture(&self, name: &str) -> Option<&Texture> {
        self.bound.iter().find(|(n, _)| *n == name).map(|(_, t)| *t)
    }

    /// Unbound samplers read as transparent black.
    fn sample(&self, name: &str, uv: Vec2) -> Vec4 {
        match self.texture(name) {
            Some(t) => t.image.sample(uv, t.filter, t.wrap),
            None => Vec4::ZERO,
        }
    }

    fn extent(&self, name: &str) -> Extent {
        self.texture(name)
            .map(|t| t.image.extent())
            .unwrap_or(Extent::new(1, 1))
    }
}

fn smoothstep(e0: f32, e1: f32, x: f32) -> f32 {
    let t = ((x - e0) / (e1 - e0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// GLSL `mod`.
fn glsl_mod(x: f32, y: f32) -> f32 {
    x - y * (x / y).floor()
}

/// Shade every pixel of a `target`-sized image.
pub(crate) fn render(
    effect: Effect,
    inputs: &Inputs<'_>,
    params: &EffectParams,
    target: Extent,
) -> Vec<Vec4> {
    let pixels = Image::pixel_centres(target);
    match effect {
        Effect::AmbientOcclusion => {
            let ao = AmbientOcclusion::new(inputs, params);
            pixels.map(|uv| ao.shade(uv)).collect()
        }
        Effect::AmbientOcclusionBlur => {
            let r = params.int("numSamplesAroundTexel").unwrap_or(0).max(0);
            let texel = Vec2::from(inputs.extent("ssaoInput").texel_size());
            pixels
                .map(|uv| {
                    let mut sum = 0.0;
                    for y in -r..=r {
                        for x in -r..=r {
                            let off = Vec2::new(x as f32, y as f32) * texel;
                            sum += inputs.sample("ssaoInput", uv + off).x;
                        }
                    }
                    let v = sum / ((2 * r + 1) * (2 * r + 1)) as f32;
                    Vec4::new(v, v, v, 1.0)
                })
                .collect()
        }
        Effect::BrightPass => {
            let threshold = params.float("threshold").unwrap_or(0.0);
            pixels
                .map(|uv| {
                    let c = inputs.sample("scene_capture", uv).xyz();
                    if c.dot(LUMA_BT709) > threshold {
                        c.extend(1.0)
                    } else {
                        Vec4::new(0.0, 0.0, 0.0, 1.0)
                    }
                })
                .collect()
        }
        Effect::GaussianBlur => {
            let vertical = params.flag("isVerticalBlur").unwrap_or(false);
            let offset = params.vec2("read_offset").unwrap_or(Vec2::ZERO);
            let weights = gaussian_weights(params.int("kernel_radius").unwrap_or(0));
            let step = if vertical {
                Vec2::new(0.0, offset.y)
            } else {
                Vec2::new(offset.x, 0.0)
            };
            pixels
                .map(|uv| {
                    let mut sum = inputs.sample("bloom_texture", uv).xyz() * weights[0];
                    for (i, w) in weights.iter().enumerate().skip(1) {
                        let d = step * i as f32;
                        sum += (inputs.sample("bloom_texture", uv + d).xyz()
                            + inputs.sample("bloom_texture", uv - d).xyz())
                            * *w;
                    }
                    sum.extend(1.0)
                })
                .collect()
        }
        Effect::BloomComposite => {
            let strength = params.float("strength").unwrap_or(0.0);
            pixels
                .map(|uv| {
                    let scene = inputs.sample("scene_texture", uv).xyz();
                    let bloom = inputs.sample("bloom_texture", uv).xyz();
                    (scene + bloom * strength).extend(1.0)
                })
                .collect()
        }
        Effect::TonemapGamma => {
            let exposure = params.float("exposure").unwrap_or(0.0);
            let gamma_inverse = params.float("gamma_inverse").unwrap_or(1.0);
            pixels
                .map(|uv| {
                    let hdr = inputs.sample("input_texture", uv).xyz();
                    tonemap(hdr, exposure, gamma_inverse).extend(1.0)
                })
                .collect()
        }
        Effect::ChromaticAberration => {
            let intensity = params.float("intensity").unwrap_or(0.0);
            let texel = params.vec2("texel_size").unwrap_or(Vec2::ZERO);
            pixels
                .map(|uv| {
                    let off = (uv - Vec2::splat(0.5)) * texel * intensity;
                    let base = inputs.sample("input_texture", uv);
                    let r = inputs.sample("input_texture", uv + off).x;
                    let b = inputs.sample("input_texture", uv - off).z;
                    Vec4::new(r, base.y, b, base.w)
                })
                .collect()
        }
        Effect::FilmGrain => {
            let intensity = params.float("intensity").unwrap_or(0.0);
            let time = params.float("time").unwrap_or(0.0);
            pixels
                .map(|uv| {
                    let c = inputs.sample("input_texture", uv);
                    let x = (uv.x + 4.0) * (uv.y + 4.0) * (time * 10.0);
                    let grain = (glsl_mod(
                        (glsl_mod(x, 13.0) + 1.0) * (glsl_mod(x, 123.0) + 1.0),
                        0.01,
                    ) - 0.005)
                        * intensity;
                    (c.xyz() + Vec3::splat(grain)).extend(c.w)
                })
                .collect()
        }
        Effect::Vignette => {
            let colour = params.vec3("colour").unwrap_or(Vec3::ZERO);
            let intensity = params.float("intensity").unwrap_or(0.0);
            let uses_mask = params.flag("usesMask").unwrap_or(false);
            pixels
                .map(|uv| {
                    let c = inputs.sample("input_texture", uv);
                    let keep = if uses_mask {
                        inputs.sample("vignette_mask", uv).x
                    } else {
                        let q = uv * (Vec2::ONE - Vec2::new(uv.y, uv.x));
                        (q.x * q.y * 15.0).powf(intensity)
                    };
                    let keep = keep.clamp(0.0, 1.0);
                    colour.lerp(c.xyz(), keep).extend(c.w)
                })
                .collect()
        }
        Effect::Fxaa => {
            let texel = params.vec2("texel_size").unwrap_or(Vec2::ZERO);
            let enabled = params.flag("enable_FXAA").unwrap_or(false);
            pixels
                .map(|uv| {
                    if enabled {
                        fxaa(inputs, uv, texel)
                    } else {
                        inputs.sample("input_texture", uv)
                    }
                })
                .collect()
        }
        Effect::Copy => pixels
            .map(|uv| inputs.sample("input_texture", uv))
            .collect(),
    }
}

/// Exposure tone mapping followed by gamma encoding.
pub fn tonemap(hdr: Vec3, exposure: f32, gamma_inverse: f32) -> Vec3 {
    let mapped = Vec3::ONE - (-hdr * exposure).exp();
    mapped.powf(gamma_inverse)
}

fn fxaa(inputs: &Inputs<'_>, uv: Vec2, texel: Vec2) -> Vec4 {
    let tex = |p: Vec2| inputs.sample("input_texture", p);
    let luma = |c: Vec4| c.xyz().dot(LUMA_FXAA);

    let m = tex(uv);
    let nw = luma(tex(uv + Vec2::new(-1.0, -1.0) * texel));
    let ne = luma(tex(uv + Vec2::new(1.0, -1.0) * texel));
    let sw = luma(tex(uv + Vec2::new(-1.0, 1.0) * texel));
    let se = luma(tex(uv + Vec2::new(1.0, 1.0) * texel));
    let lm = luma(m);

    let luma_min = lm.min(nw.min(ne).min(sw.min(se)));
    let luma_max = lm.max(nw.max(ne).max(sw.max(se)));

    let dir = Vec2::new(-((nw + ne) - (sw + se)), (nw + sw) - (ne + se));
    let reduce = ((nw + ne + sw + se) * 0.25 * FXAA_REDUCE_MUL).max(FXAA_REDUCE_MIN);
    let rcp_min = 1.0 / (dir.x.abs().min(dir.y.abs()) + reduce);
    let dir = (dir * rcp_min).clamp(Vec2::splat(-FXAA_SPAN_MAX), Vec2::splat(FXAA_SPAN_MAX))
        * texel;

    let a = (tex(uv + dir * (1.0 / 3.0 - 0.5)) + tex(uv + dir * (2.0 / 3.0 - 0.5))) * 0.5;
    let b = a * 0.5 + (tex(uv + dir * -0.5) + tex(uv + dir * 0.5)) * 0.25;
    let lb = luma(b);
    let out = if lb < luma_min || lb > luma_max { a } else { b };
    out.xyz().extend(m.w)
}

struct AmbientOcclusion<'a> {
    inputs: &'a Inputs<'a>,
    samples: Vec<Vec3>,
    projection: Mat4,
    projection_inverse: Mat4,
    view_normal: Mat3,
    noise_scale: Vec2,
    radius: f32,
    strength: f32,
    bias: f32,
}

impl<'a> AmbientOcclusion<'a> {
    fn new(inputs: &'a Inputs<'a>, params: &EffectParams) -> Self {
        let n = params.int("numKernelSamples").unwrap_or(0).max(0) as usize;
        let samples = params
            .vec3_array("samples")
            .map(|s| s[..n.min(s.len())].to_vec())
            .unwrap_or_default();
        let projection = params.mat4("projection").unwrap_or(Mat4::IDENTITY);
        Self {
            inputs,
            samples,
            projection,
            projection_inverse: params
                .mat4("projectionInverse")
                .unwrap_or_else(|| projection.inverse()),
            view_normal: Mat3::from_mat4(params.mat4("view").unwrap_or(Mat4::IDENTITY)),
            noise_scale: params.vec2("noiseScale").unwrap_or(Vec2::ONE),
            radius: params.float("sampleRadius").unwrap_or(0.0),
            strength: params.float("ssaoStrength").unwrap_or(0.0),
            bias: params.float("depthBias").unwrap_or(AO_DEPTH_BIAS),
        }
    }

    fn view_position(&self, uv: Vec2) -> Vec3 {
        let depth = self.inputs.sample("depthTexture", uv).x;
        let ndc = Vec4::new(uv.x * 2.0 - 1.0, uv.y * 2.0 - 1.0, depth * 2.0 - 1.0, 1.0);
        let view = self.projection_inverse * ndc;
        view.xyz() / view.w
    }

    fn shade(&self, uv: Vec2) -> Vec4 {
        if self.samples.is_empty() {
            return Vec4::ONE;
        }

        let frag = self.view_position(uv);
        let normal = (self.view_normal * self.inputs.sample("normalTexture", uv).xyz())
            .try_normalize()
            .unwrap_or(Vec3::Z);
        let rvec = self.inputs.sample("noiseTexture", uv * self.noise_scale).xyz();
        let tangent = (rvec - normal * rvec.dot(normal))
            .try_normalize()
            .unwrap_or_else(|| normal.any_orthonormal_vector());
        let bitangent = normal.cross(tangent);

        let mut occlusion = 0.0;
        for s in &self.samples {
            let sample = frag + (tangent * s.x + bitangent * s.y + normal * s.z) * self.radius;
            let clip = self.projection * sample.extend(1.0);
            if clip.w.abs() <= f32::EPSILON {
                continue;
            }
            let suv = clip.xy() / clip.w * 0.5 + Vec2::splat(0.5);
            let scene_z = self.view_position(suv).z;
            if scene_z >= sample.z + self.bias {
                occlusion += smoothstep(0.0, 1.0, self.radius / (frag.z - scene_z).abs());
            }
        }

        let visibility = (1.0 - occlusion / self.samples.len() as f32)
            .max(0.0)
            .powf(self.strength)
            .clamp(0.0, 1.0);
        Vec4::new(visibility, visibility, visibility, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn tonemap_maps_zero_to_black_and_saturates() {
        assert_eq!(tonemap(Vec3::ZERO, 1.0, 1.0 / 2.2), Vec3::ZERO);
        let bright = tonemap(Vec3::splat(100.0), 1.0, 1.0 / 2.2);
        assert_relative_eq!(bright.x, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn zero_exposure_is_black() {
        assert_eq!(tonemap(Vec3::splat(3.0), 0.0, 1.0), Vec3::ZERO);
    }

    #[test]
    fn glsl_mod_is_floored() {
        assert_relative_eq!(glsl_mod(-1.0, 13.0), 12.0);
        assert_relative_eq!(glsl_mod(27.0, 13.0), 1.0);
    }

    #[test]
    fn smoothstep_saturates_on_infinite_input() {
        assert_eq!(smoothstep(0.0, 1.0, f32::INFINITY), 1.0);
        assert_eq!(smoothstep(0.0, 1.0, 0.0), 0.0);
    }
}
