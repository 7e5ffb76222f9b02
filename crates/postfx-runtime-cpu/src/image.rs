use glam::{Vec2, Vec4};
use half::f16;

use postfx_core::{EngineError, Extent};
use postfx_plan::PixelFormat;
use postfx_runtime::{SampleFilter, WrapMode};

/// Round-trip `v` through the storage precision of `format`, filling absent channels the way a
/// GPU sampler does (`0` for missing colour, `1` for missing alpha).
pub fn quantize(format: PixelFormat, v: Vec4) -> Vec4 {
    let unorm8 = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() / 255.0;
    let half = |c: f32| f16::from_f32(c).to_f32();
    match format {
        PixelFormat::R8 => Vec4::new(unorm8(v.x), 0.0, 0.0, 1.0),
        PixelFormat::Rgba8 => Vec4::new(unorm8(v.x), unorm8(v.y), unorm8(v.z), unorm8(v.w)),
        PixelFormat::Rgb16F => Vec4::new(half(v.x), half(v.y), half(v.z), 1.0),
        PixelFormat::Rgba16F => Vec4::new(half(v.x), half(v.y), half(v.z), half(v.w)),
        PixelFormat::Depth32F => Vec4::new(v.x, 0.0, 0.0, 1.0),
    }
}

/// Row-major, bottom row first.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    extent: Extent,
    format: PixelFormat,
    texels: Vec<Vec4>,
}

impl Image {
    pub fn new(extent: Extent, format: PixelFormat) -> Self {
        Self::filled(extent, format, Vec4::ZERO)
    }

    pub fn filled(extent: Extent, format: PixelFormat, value: Vec4) -> Self {
        let n = extent.width as usize * extent.height as usize;
        Self {
            extent,
            format,
            texels: vec![quantize(format, value); n],
        }
    }

    /// Build from packed floats with `format.channels()` values per texel.
    pub fn from_channels(
        extent: Extent,
        format: PixelFormat,
        data: &[f32],
    ) -> Result<Self, EngineError> {
        let ch = format.channels();
        let n = extent.width as usize * extent.height as usize;
        if data.len() != n * ch {
            return Err(EngineError::other(format!(
                "texture data has {} floats, {extent} {format:?} needs {}",
                data.len(),
                n * ch
            )));
        }
        let texels = data
            .chunks_exact(ch)
            .map(|c| {
                let v = match ch {
                    1 => Vec4::new(c[0], 0.0, 0.0, 1.0),
                    3 => Vec4::new(c[0], c[1], c[2], 1.0),
                    _ => Vec4::new(c[0], c[1], c[2], c[3]),
                };
                quantize(format, v)
            })
            .collect();
        Ok(Self {
            extent,
            format,
            texels,
        })
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn texels(&self) -> &[Vec4] {
        &self.texels
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.extent.width as usize + x as usize
    }

    pub fn get(&self, x: u32, y: u32) -> Vec4 {
        self.texels[self.index(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, v: Vec4) {
        let i = self.index(x, y);
        self.texels[i] = quantize(self.format, v);
    }

    /// Replace every texel, quantizing to this image's format.
    pub fn write_all(&mut self, values: &[Vec4]) {
        let format = self.format;
        for (dst, src) in self.texels.iter_mut().zip(values) {
            *dst = quantize(format, *src);
        }
    }

    fn fetch(&self, x: i64, y: i64, wrap: WrapMode) -> Vec4 {
        let w = self.extent.width as i64;
        let h = self.extent.height as i64;
        let (x, y) = match wrap {
            WrapMode::ClampToEdge => (x.clamp(0, w - 1), y.clamp(0, h - 1)),
            WrapMode::Repeat => (x.rem_euclid(w), y.rem_euclid(h)),
        };
        self.get(x as u32, y as u32)
    }

    /// Sample at normalized coordinates; texel centres sit at `(i + 0.5) / size`.
    pub fn sample(&self, uv: Vec2, filter: SampleFilter, wrap: WrapMode) -> Vec4 {
        let x = uv.x * self.extent.width as f32;
        let y = uv.y * self.extent.height as f32;
        match filter {
            SampleFilter::Nearest => self.fetch(x.floor() as i64, y.floor() as i64, wrap),
            SampleFilter::Linear => {
                let x = x - 0.5;
                let y = y - 0.5;
                let x0 = x.floor();
                let y0 = y.floor();
                let fx = x - x0;
                let fy = y - y0;
                let (x0, y0) = (x0 as i64, y0 as i64);
                let a = self.fetch(x0, y0, wrap);
                let b = self.fetch(x0 + 1, y0, wrap);
                let c = self.fetch(x0, y0 + 1, wrap);
                let d = self.fetch(x0 + 1, y0 + 1, wrap);
                a.lerp(b, fx).lerp(c.lerp(d, fx), fy)
            }
        }
    }

    /// Texel-centre coordinates for every pixel, in storage order.
    pub fn pixel_centres(extent: Extent) -> impl Iterator<Item = Vec2> {
        let w = extent.width;
        let h = extent.height;
        (0..h).flat_map(move |y| {
            (0..w).map(move |x| {
                Vec2::new(
                    (x as f32 + 0.5) / w as f32,
                    (y as f32 + 0.5) / h as f32,
                )
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn unorm8_quantizes_and_clamps() {
        let v = quantize(PixelFormat::Rgba8, Vec4::new(2.0, -1.0, 0.5, 1.0));
        assert_eq!(v.x, 1.0);
        assert_eq!(v.y, 0.0);
        assert_relative_eq!(v.z, 128.0 / 255.0);
    }

    #[test]
    fn single_channel_reads_like_a_gpu() {
        let v = quantize(PixelFormat::R8, Vec4::new(1.0, 0.7, 0.7, 0.2));
        assert_eq!(v, Vec4::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn linear_sampling_at_texel_centres_is_exact() {
        let img = Image::from_channels(
            Extent::new(2, 1),
            PixelFormat::Rgba16F,
            &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0],
        )
        .unwrap();
        let left = img.sample(Vec2::new(0.25, 0.5), SampleFilter::Linear, WrapMode::ClampToEdge);
        let mid = img.sample(Vec2::new(0.5, 0.5), SampleFilter::Linear, WrapMode::ClampToEdge);
        assert_eq!(left.x, 0.0);
        assert_relative_eq!(mid.x, 0.5);
    }

    #[test]
    fn repeat_wraps_coordinates() {
        let img = Image::from_channels(
            Extent::new(2, 1),
            PixelFormat::Depth32F,
            &[0.25, 0.75],
        )
        .unwrap();
        let wrapped = img.sample(Vec2::new(1.25, 0.5), SampleFilter::Nearest, WrapMode::Repeat);
        assert_eq!(wrapped.x, 0.25);
        let clamped = img.sample(
            Vec2::new(1.25, 0.5),
            SampleFilter::Nearest,
            WrapMode::ClampToEdge,
        );
        assert_eq!(clamped.x, 0.75);
    }

    #[test]
    fn wrong_data_length_is_rejected() {
        let err = Image::from_channels(Extent::new(2, 2), PixelFormat::Rgb16F, &[0.0; 4]);
        assert!(err.is_err());
    }
}
