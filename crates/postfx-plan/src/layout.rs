use postfx_core::{Extent, PostFxConfig};

use crate::SurfaceId;

/// Colour attachment formats used by the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit normalized single channel (occlusion).
    R8,
    /// 8-bit normalized RGBA (display-ready SDR).
    Rgba8,
    /// 16-bit float RGB (noise tile, normals).
    Rgb16F,
    /// 16-bit float RGBA (HDR intermediates).
    Rgba16F,
    /// 32-bit float depth, sampled through the red channel.
    Depth32F,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::R8 | PixelFormat::Depth32F => 1,
            PixelFormat::Rgb16F => 3,
            PixelFormat::Rgba8 | PixelFormat::Rgba16F => 4,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            PixelFormat::Rgb16F | PixelFormat::Rgba16F | PixelFormat::Depth32F
        )
    }
}

/// Fixed description of an offscreen surface. Never changes after allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceDesc {
    pub extent: Extent,
    pub color: Option<PixelFormat>,
    pub depth_stencil: bool,
    pub multisampled: bool,
}

impl SurfaceDesc {
    pub fn color(extent: Extent, format: PixelFormat) -> Self {
        Self {
            extent,
            color: Some(format),
            depth_stencil: false,
            multisampled: false,
        }
    }

    pub fn with_depth_stencil(mut self) -> Self {
        self.depth_stencil = true;
        self
    }

    pub fn with_multisampling(mut self) -> Self {
        self.multisampled = true;
        self
    }
}

/// Sizes and formats for every pool slot, derived once from the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolLayout {
    entries: Vec<(SurfaceId, SurfaceDesc)>,
    render: Extent,
    display: Extent,
}

impl PoolLayout {
    pub fn from_config(cfg: &PostFxConfig) -> Self {
        let render = cfg.resolution.render;
        let display = cfg.resolution.display;
        let ssao = render.scaled(cfg.ssao.resolution_scale);
        let bloom = display.scaled(cfg.resolution.bloom_scale);

        let entries = SurfaceId::ALL
            .iter()
            .map(|&id| {
                let desc = match id {
                    SurfaceId::SsaoRaw | SurfaceId::SsaoBlur => {
                        SurfaceDesc::color(ssao, PixelFormat::R8)
                    }
                    SurfaceId::Resolve => {
                        SurfaceDesc::color(render, PixelFormat::Rgba16F).with_depth_stencil()
                    }
                    SurfaceId::Screen => {
                        SurfaceDesc::color(display, PixelFormat::Rgba16F).with_depth_stencil()
                    }
                    SurfaceId::BrightPass | SurfaceId::BloomVertical | SurfaceId::BloomBlurred => {
                        SurfaceDesc::color(bloom, PixelFormat::Rgba16F)
                    }
                    SurfaceId::Scratch => SurfaceDesc::color(display, PixelFormat::Rgba16F),
                    SurfaceId::Tonemapped => {
                        SurfaceDesc::color(display, PixelFormat::Rgba8).with_depth_stencil()
                    }
                };
                (id, desc)
            })
            .collect();

        Self {
            entries,
            render,
            display,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(SurfaceId, SurfaceDesc)> {
        self.entries.iter()
    }

    pub fn desc(&self, id: SurfaceId) -> SurfaceDesc {
        // Entries are built in `SurfaceId::ALL` order, which matches discriminant order.
        self.entries[id as usize].1
    }

    pub fn extent(&self, id: SurfaceId) -> Extent {
        self.desc(id).extent
    }

    pub fn render(&self) -> Extent {
        self.render
    }

    pub fn display(&self) -> Extent {
        self.display
    }
}
