//! Built-in GLSL for every effect, plus optional on-disk overrides.
//!
//! Override files are looked up as `<dir>/<effect name>.frag`, e.g. `shaders/fxaa.frag`. Every
//! program shares [`FULLSCREEN_VERT`].

use std::fs;
use std::path::{Path, PathBuf};

use postfx_core::EngineError;
use postfx_plan::Effect;

#[derive(Debug, Clone)]
pub struct ShaderSource {
    pub vert: String,
    pub frag: String,
    /// Where the fragment source came from (`builtin:<name>` or a path), for logs.
    pub origin: String,
}

/// Resolves the fragment source for each effect.
#[derive(Debug, Clone, Default)]
pub struct ShaderLibrary {
    dir: Option<PathBuf>,
    builtin_fallback: bool,
}

impl ShaderLibrary {
    /// Built-in sources only.
    pub fn builtin() -> Self {
        Self {
            dir: None,
            builtin_fallback: true,
        }
    }

    /// Files in `dir` replace the built-in source of the same effect; others stay built-in.
    pub fn with_overrides(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            builtin_fallback: true,
        }
    }

    /// Every effect must have a file in `dir`.
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            builtin_fallback: false,
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn source(&self, effect: Effect) -> Result<ShaderSource, EngineError> {
        if let Some(dir) = &self.dir {
            let path = dir.join(format!("{}.frag", effect.name()));
            if path.is_file() {
                let frag = fs::read_to_string(&path).map_err(|e| EngineError::Io {
                    path: path.clone(),
                    source: e,
                })?;
                tracing::debug!(effect = effect.name(), path = %path.display(), "shader override");
                return Ok(ShaderSource {
                    vert: FULLSCREEN_VERT.to_string(),
                    frag,
                    origin: path.display().to_string(),
                });
            }
            if !self.builtin_fallback {
                return Err(EngineError::ShaderNotFound {
                    effect: effect.name(),
                    path: Some(path),
                });
            }
        }
        Ok(ShaderSource {
            vert: FULLSCREEN_VERT.to_string(),
            frag: builtin_frag(effect).to_string(),
            origin: format!("builtin:{}", effect.name()),
        })
    }
}

pub fn builtin_frag(effect: Effect) -> &'static str {
    match effect {
        Effect::AmbientOcclusion => SSAO_FRAG,
        Effect::AmbientOcclusionBlur => SSAO_BLUR_FRAG,
        Effect::BrightPass => BRIGHT_PASS_FRAG,
        Effect::GaussianBlur => GAUSSIAN_BLUR_FRAG,
        Effect::BloomComposite => BLOOM_COMPOSITE_FRAG,
        Effect::TonemapGamma => TONEMAP_GAMMA_FRAG,
        Effect::ChromaticAberration => CHROMATIC_ABERRATION_FRAG,
        Effect::FilmGrain => FILM_GRAIN_FRAG,
        Effect::Vignette => VIGNETTE_FRAG,
        Effect::Fxaa => FXAA_FRAG,
        Effect::Copy => COPY_FRAG,
    }
}

pub const FULLSCREEN_VERT: &str = r#"#version 330 core
layout (location = 0) in vec2 a_pos;
layout (location = 1) in vec2 a_uv;
out vec2 v_uv;
void main() {
    v_uv = a_uv;
    gl_Position = vec4(a_pos, 0.0, 1.0);
}
"#;

pub const COPY_FRAG: &str = r#"#version 330 core
in vec2 v_uv;
out vec4 frag_colour;
uniform sampler2D input_texture;
void main() { frag_colour = texture(input_texture, v_uv); }
"#;

pub const SSAO_FRAG: &str = r#"#version 330 core
in vec2 v_uv;
out vec4 frag_colour;

uniform sampler2D normalTexture;
uniform sampler2D depthTexture;
uniform sampler2D noiseTexture;

uniform vec2 noiseScale;
uniform float ssaoStrength;
uniform float sampleRadius;
uniform float sampleRadius2;
uniform float depthBias;
uniform int numKernelSamples;
uniform vec3 samples[64];
uniform mat4 view;
uniform mat4 projection;
uniform mat4 viewInverse;
uniform mat4 projectionInverse;

vec3 view_position(vec2 uv) {
    float depth = texture(depthTexture, uv).r;
    vec4 ndc = vec4(uv * 2.0 - 1.0, depth * 2.0 - 1.0, 1.0);
    vec4 p = projectionInverse * ndc;
    return p.xyz / p.w;
}

vec3 any_orthonormal(vec3 n) {
    float s = n.z >= 0.0 ? 1.0 : -1.0;
    float a = -1.0 / (s + n.z);
    float b = n.x * n.y * a;
    return vec3(b, s + n.y * n.y * a, -n.y);
}

void main() {
    int n = min(numKernelSamples, 64);
    if (n <= 0) {
        frag_colour = vec4(1.0);
        return;
    }

    vec3 frag = view_position(v_uv);
    vec3 normal = mat3(view) * texture(normalTexture, v_uv).xyz;
    normal = length(normal) > 1e-6 ? normalize(normal) : vec3(0.0, 0.0, 1.0);
    vec3 rvec = texture(noiseTexture, v_uv * noiseScale).xyz;
    vec3 tangent = rvec - normal * dot(rvec, normal);
    tangent = length(tangent) > 1e-6 ? normalize(tangent) : any_orthonormal(normal);
    vec3 bitangent = cross(normal, tangent);
    mat3 tbn = mat3(tangent, bitangent, normal);

    float occlusion = 0.0;
    for (int i = 0; i < n; ++i) {
        vec3 s = frag + tbn * samples[i] * sampleRadius;
        vec4 clip = projection * vec4(s, 1.0);
        if (abs(clip.w) <= 1.1920929e-7) {
            continue;
        }
        vec2 suv = clip.xy / clip.w * 0.5 + 0.5;
        float scene_z = view_position(suv).z;
        if (scene_z >= s.z + depthBias) {
            occlusion += smoothstep(0.0, 1.0, sampleRadius / abs(frag.z - scene_z));
        }
    }

    float v = clamp(pow(max(1.0 - occlusion / float(n), 0.0), ssaoStrength), 0.0, 1.0);
    frag_colour = vec4(v, v, v, 1.0);
}
"#;

pub const SSAO_BLUR_FRAG: &str = r#"#version 330 core
in vec2 v_uv;
out vec4 frag_colour;
uniform sampler2D ssaoInput;
uniform int numSamplesAroundTexel;
void main() {
    vec2 texel = 1.0 / vec2(textureSize(ssaoInput, 0));
    int r = max(numSamplesAroundTexel, 0);
    float sum = 0.0;
    for (int y = -r; y <= r; ++y) {
        for (int x = -r; x <= r; ++x) {
            sum += texture(ssaoInput, v_uv + vec2(float(x), float(y)) * texel).r;
        }
    }
    float v = sum / float((2 * r + 1) * (2 * r + 1));
    frag_colour = vec4(v, v, v, 1.0);
}
"#;

pub const BRIGHT_PASS_FRAG: &str = r#"#version 330 core
in vec2 v_uv;
out vec4 frag_colour;
uniform sampler2D scene_capture;
uniform float threshold;
void main() {
    vec3 c = texture(scene_capture, v_uv).rgb;
    float luma = dot(c, vec3(0.2126, 0.7152, 0.0722));
    frag_colour = luma > threshold ? vec4(c, 1.0) : vec4(0.0, 0.0, 0.0, 1.0);
}
"#;

pub const GAUSSIAN_BLUR_FRAG: &str = r#"#version 330 core
in vec2 v_uv;
out vec4 frag_colour;
uniform sampler2D bloom_texture;
uniform bool isVerticalBlur;
uniform vec2 read_offset;
uniform int kernel_radius;

float weight(int i, float sigma) {
    return exp(-float(i * i) / (2.0 * sigma * sigma));
}

void main() {
    int r = max(kernel_radius, 0);
    if (r == 0) {
        frag_colour = vec4(texture(bloom_texture, v_uv).rgb, 1.0);
        return;
    }
    vec2 dir = isVerticalBlur ? vec2(0.0, read_offset.y) : vec2(read_offset.x, 0.0);
    float sigma = float(r) * 0.5;
    float total = weight(0, sigma);
    for (int i = 1; i <= r; ++i) {
        total += 2.0 * weight(i, sigma);
    }
    vec3 sum = texture(bloom_texture, v_uv).rgb * (weight(0, sigma) / total);
    for (int i = 1; i <= r; ++i) {
        vec2 d = dir * float(i);
        sum += (texture(bloom_texture, v_uv + d).rgb + texture(bloom_texture, v_uv - d).rgb)
            * (weight(i, sigma) / total);
    }
    frag_colour = vec4(sum, 1.0);
}
"#;

pub const BLOOM_COMPOSITE_FRAG: &str = r#"#version 330 core
in vec2 v_uv;
out vec4 frag_colour;
uniform sampler2D scene_texture;
uniform sampler2D bloom_texture;
uniform float strength;
void main() {
    vec3 scene = texture(scene_texture, v_uv).rgb;
    vec3 bloom = texture(bloom_texture, v_uv).rgb;
    frag_colour = vec4(scene + bloom * strength, 1.0);
}
"#;

pub const TONEMAP_GAMMA_FRAG: &str = r#"#version 330 core
in vec2 v_uv;
out vec4 frag_colour;
uniform sampler2D input_texture;
uniform float exposure;
uniform float gamma_inverse;
void main() {
    vec3 hdr = texture(input_texture, v_uv).rgb;
    vec3 mapped = vec3(1.0) - exp(-hdr * exposure);
    frag_colour = vec4(pow(mapped, vec3(gamma_inverse)), 1.0);
}
"#;

pub const CHROMATIC_ABERRATION_FRAG: &str = r#"#version 330 core
in vec2 v_uv;
out vec4 frag_colour;
uniform sampler2D input_texture;
uniform float intensity;
uniform vec2 texel_size;
void main() {
    vec2 off = (v_uv - 0.5) * texel_size * intensity;
    vec4 base = texture(input_texture, v_uv);
    float r = texture(input_texture, v_uv + off).r;
    float b = texture(input_texture, v_uv - off).b;
    frag_colour = vec4(r, base.g, b, base.a);
}
"#;

pub const FILM_GRAIN_FRAG: &str = r#"#version 330 core
in vec2 v_uv;
out vec4 frag_colour;
uniform sampler2D input_texture;
uniform float intensity;
uniform float time;
void main() {
    vec4 c = texture(input_texture, v_uv);
    float x = (v_uv.x + 4.0) * (v_uv.y + 4.0) * (time * 10.0);
    float grain = (mod((mod(x, 13.0) + 1.0) * (mod(x, 123.0) + 1.0), 0.01) - 0.005) * intensity;
    frag_colour = vec4(c.rgb + vec3(grain), c.a);
}
"#;

pub const VIGNETTE_FRAG: &str = r#"#version 330 core
in vec2 v_uv;
out vec4 frag_colour;
uniform sampler2D input_texture;
uniform sampler2D vignette_mask;
uniform vec3 colour;
uniform float intensity;
uniform bool usesMask;
void main() {
    vec4 c = texture(input_texture, v_uv);
    float keep;
    if (usesMask) {
        keep = texture(vignette_mask, v_uv).r;
    } else {
        vec2 q = v_uv * (1.0 - v_uv.yx);
        keep = pow(q.x * q.y * 15.0, intensity);
    }
    frag_colour = vec4(mix(colour, c.rgb, clamp(keep, 0.0, 1.0)), c.a);
}
"#;

pub const FXAA_FRAG: &str = r#"#version 330 core
in vec2 v_uv;
out vec4 frag_colour;
uniform sampler2D input_texture;
uniform vec2 texel_size;
uniform bool enable_FXAA;

const float SPAN_MAX = 8.0;
const float REDUCE_MUL = 1.0 / 8.0;
const float REDUCE_MIN = 1.0 / 128.0;
const vec3 LUMA = vec3(0.299, 0.587, 0.114);

float luma_at(vec2 uv) {
    return dot(texture(input_texture, uv).rgb, LUMA);
}

void main() {
    vec4 m = texture(input_texture, v_uv);
    if (!enable_FXAA) {
        frag_colour = m;
        return;
    }

    float nw = luma_at(v_uv + vec2(-1.0, -1.0) * texel_size);
    float ne = luma_at(v_uv + vec2(1.0, -1.0) * texel_size);
    float sw = luma_at(v_uv + vec2(-1.0, 1.0) * texel_size);
    float se = luma_at(v_uv + vec2(1.0, 1.0) * texel_size);
    float lm = dot(m.rgb, LUMA);

    float luma_min = min(lm, min(min(nw, ne), min(sw, se)));
    float luma_max = max(lm, max(max(nw, ne), max(sw, se)));

    vec2 dir = vec2(-((nw + ne) - (sw + se)), (nw + sw) - (ne + se));
    float reduce = max((nw + ne + sw + se) * 0.25 * REDUCE_MUL, REDUCE_MIN);
    float rcp_min = 1.0 / (min(abs(dir.x), abs(dir.y)) + reduce);
    dir = clamp(dir * rcp_min, vec2(-SPAN_MAX), vec2(SPAN_MAX)) * texel_size;

    vec4 a = 0.5 * (texture(input_texture, v_uv + dir * (1.0 / 3.0 - 0.5))
        + texture(input_texture, v_uv + dir * (2.0 / 3.0 - 0.5)));
    vec4 b = a * 0.5 + 0.25 * (texture(input_texture, v_uv - dir * 0.5)
        + texture(input_texture, v_uv + dir * 0.5));
    float lb = dot(b.rgb, LUMA);
    vec4 result = (lb < luma_min || lb > luma_max) ? a : b;
    frag_colour = vec4(result.rgb, m.a);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    use glam::{Mat4, Vec3};
    use postfx_core::{Extent, PostFxConfig};
    use postfx_plan::BlurAxis;
    use postfx_runtime::params;
    use postfx_runtime::{CameraMatrices, EffectParams, SampleKernel};
    use postfx_core::KernelProfile;
    use rand::{rngs::StdRng, SeedableRng};

    fn params_for(effect: Effect) -> EffectParams {
        let cfg = PostFxConfig::default();
        let extent = Extent::new(64, 32);
        match effect {
            Effect::AmbientOcclusion => {
                let mut rng = StdRng::seed_from_u64(3);
                let kernel = SampleKernel::generate(8, KernelProfile::Hemisphere, &mut rng);
                let camera = CameraMatrices::new(
                    Mat4::look_at_rh(Vec3::Z, Vec3::ZERO, Vec3::Y),
                    Mat4::perspective_rh_gl(1.0, 2.0, 0.1, 100.0),
                );
                params::ambient_occlusion(&cfg, &kernel, &camera, extent)
            }
            Effect::AmbientOcclusionBlur => params::ambient_occlusion_blur(&cfg),
            Effect::BrightPass => params::bright_pass(&cfg),
            Effect::GaussianBlur => params::gaussian_blur(BlurAxis::Horizontal, extent, 1.0),
            Effect::BloomComposite => params::bloom_composite(&cfg),
            Effect::TonemapGamma => params::tonemap_gamma(&cfg),
            Effect::ChromaticAberration => params::chromatic_aberration(&cfg, extent),
            Effect::FilmGrain => params::film_grain(&cfg, 12.5),
            Effect::Vignette => params::vignette(&cfg, false),
            Effect::Fxaa => params::fxaa(&cfg, extent),
            Effect::Copy => EffectParams::new(),
        }
    }

    #[test]
    fn builtin_sources_declare_every_sampler() {
        for effect in Effect::ALL {
            let src = builtin_frag(effect);
            for decl in effect.inputs() {
                let needle = format!("uniform sampler2D {};", decl.name);
                assert!(src.contains(&needle), "{}: missing {needle}", effect.name());
            }
        }
    }

    #[test]
    fn builtin_sources_declare_every_uploaded_uniform() {
        for effect in Effect::ALL {
            let src = builtin_frag(effect);
            for (name, _) in params_for(effect).iter() {
                let declared = src
                    .lines()
                    .filter(|l| l.trim_start().starts_with("uniform "))
                    .any(|l| {
                        l.trim_end_matches(';')
                            .split_whitespace()
                            .last()
                            .map(|ident| ident.split('[').next() == Some(name))
                            .unwrap_or(false)
                    });
                assert!(declared, "{}: uniform {name} not declared", effect.name());
            }
        }
    }

    #[test]
    fn builtin_library_never_fails() {
        let lib = ShaderLibrary::builtin();
        for effect in Effect::ALL {
            let src = lib.source(effect).unwrap();
            assert_eq!(src.vert, FULLSCREEN_VERT);
            assert!(src.origin.starts_with("builtin:"));
        }
    }

    #[test]
    fn strict_directory_reports_missing_files() {
        let dir = std::env::temp_dir().join(format!("postfx-shaders-missing-{}", std::process::id()));
        let lib = ShaderLibrary::from_dir(&dir);
        let err = lib.source(Effect::Fxaa).unwrap_err();
        assert!(matches!(err, EngineError::ShaderNotFound { effect: "fxaa", .. }));
        assert_eq!(err.kind(), postfx_core::ErrorKind::Resource);
    }

    #[test]
    fn override_file_replaces_builtin() {
        let dir = std::env::temp_dir().join(format!("postfx-shaders-override-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("copy.frag"), "// custom copy").unwrap();

        let lib = ShaderLibrary::with_overrides(&dir);
        assert_eq!(lib.source(Effect::Copy).unwrap().frag, "// custom copy");
        assert_eq!(lib.source(Effect::Fxaa).unwrap().frag, FXAA_FRAG);

        fs::remove_dir_all(&dir).unwrap();
    }
}
