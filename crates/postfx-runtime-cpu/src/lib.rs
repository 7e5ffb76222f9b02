#![forbid(unsafe_code)]

//! Software reference backend.
//!
//! `CpuDevice` implements [`RenderDevice`] with `f32` images, quantized on write to each
//! surface's pixel format, and runs every effect on the CPU with the same sampler and uniform
//! names as the GLSL programs. It also records every draw and blit in a [`CommandLog`], which is
//! what headless tools and the contract tests inspect.
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

pub mod effects;
pub mod image;

use std::collections::BTreeMap;

use glam::Vec4;

use postfx_core::{EngineError, Extent};
use postfx_plan::{BlitFilter, Effect, PixelFormat, SurfaceDesc};
use postfx_runtime::{
    EffectParams, ProgramHandle, RenderDevice, RenderTarget, SampleFilter, SurfaceHandle,
    TextureDesc, TextureHandle, WrapMode,
};

pub use image::{quantize, Image};

/// One recorded device command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Draw {
        effect: Effect,
        target: RenderTarget,
        inputs: Vec<(&'static str, TextureHandle)>,
    },
    Blit {
        src: SurfaceHandle,
        dst: SurfaceHandle,
        filter: BlitFilter,
    },
    Finish,
}

/// Ordered record of the work submitted to a [`CpuDevice`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandLog {
    commands: Vec<Command>,
}

impl CommandLog {
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Draw { .. }))
            .count()
    }

    pub fn blit_count(&self) -> usize {
        self.blits().len()
    }

    pub fn effects(&self) -> Vec<Effect> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::Draw { effect, .. } => Some(*effect),
                _ => None,
            })
            .collect()
    }

    pub fn blits(&self) -> Vec<(SurfaceHandle, SurfaceHandle, BlitFilter)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::Blit { src, dst, filter } => Some((*src, *dst, *filter)),
                _ => None,
            })
            .collect()
    }

    /// Index of the first draw, if any.
    pub fn first_draw(&self) -> Option<usize> {
        self.commands
            .iter()
            .position(|c| matches!(c, Command::Draw { .. }))
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Texture {
    pub(crate) image: Image,
    pub(crate) filter: SampleFilter,
    pub(crate) wrap: WrapMode,
    owner: Option<SurfaceHandle>,
}

#[derive(Debug, Clone)]
struct Surface {
    desc: SurfaceDesc,
    color: TextureHandle,
    finalized: bool,
}

/// Headless [`RenderDevice`].
#[derive(Debug)]
pub struct CpuDevice {
    surfaces: BTreeMap<SurfaceHandle, Surface>,
    textures: BTreeMap<TextureHandle, Texture>,
    programs: BTreeMap<ProgramHandle, Effect>,
    next_id: u32,
    presentation: Image,
    log: CommandLog,
}

fn surface_name(h: SurfaceHandle) -> String {
    format!("surface#{}", h.0)
}

impl CpuDevice {
    /// A device whose presentation surface is `display` sized.
    pub fn new(display: Extent) -> Self {
        Self {
            surfaces: BTreeMap::new(),
            textures: BTreeMap::new(),
            programs: BTreeMap::new(),
            next_id: 1,
            presentation: Image::new(display, PixelFormat::Rgba8),
            log: CommandLog::default(),
        }
    }

    fn mint(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn log(&self) -> &CommandLog {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// The last image written to the presentation surface.
    pub fn presented(&self) -> &Image {
        &self.presentation
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    fn surface(&self, h: SurfaceHandle) -> Result<&Surface, EngineError> {
        self.surfaces
            .get(&h)
            .ok_or_else(|| EngineError::UnknownSurface(surface_name(h)))
    }

    fn finalized(&self, h: SurfaceHandle) -> Result<&Surface, EngineError> {
        let s = self.surface(h)?;
        if !s.finalized {
            return Err(EngineError::SurfaceNotFinalized {
                surface: surface_name(h),
            });
        }
        Ok(s)
    }

    fn texture(&self, t: TextureHandle) -> Result<&Texture, EngineError> {
        self.textures
            .get(&t)
            .ok_or(EngineError::UnknownTexture(t.0))
    }

    /// Colour contents of a surface, regardless of finalization.
    pub fn read_surface(&self, h: SurfaceHandle) -> Result<&Image, EngineError> {
        let s = self.surface(h)?;
        Ok(&self.texture(s.color)?.image)
    }

    pub fn read_texture(&self, t: TextureHandle) -> Result<&Image, EngineError> {
        Ok(&self.texture(t)?.image)
    }

    /// Write RGBA floats into a surface's colour attachment, as a scene renderer would.
    pub fn write_surface(&mut self, h: SurfaceHandle, rgba: &[Vec4]) -> Result<(), EngineError> {
        let color = self.surface(h)?.color;
        let tex = self
            .textures
            .get_mut(&color)
            .ok_or(EngineError::UnknownTexture(color.0))?;
        let expected = tex.image.texels().len();
        if rgba.len() != expected {
            return Err(EngineError::other(format!(
                "write_surface: {} texels for a {} surface",
                rgba.len(),
                tex.image.extent()
            )));
        }
        tex.image.write_all(rgba);
        Ok(())
    }

    /// Fill a surface's colour attachment with one value.
    pub fn fill_surface(&mut self, h: SurfaceHandle, value: Vec4) -> Result<(), EngineError> {
        let n = self.read_surface(h)?.texels().len();
        self.write_surface(h, &vec![value; n])
    }
}

impl RenderDevice for CpuDevice {
    fn allocate_surface(&mut self, desc: &SurfaceDesc) -> Result<SurfaceHandle, EngineError> {
        let format = desc.color.ok_or_else(|| {
            EngineError::GlCreate("surfaces without a colour attachment are not supported".into())
        })?;
        if desc.extent.is_empty() {
            return Err(EngineError::GlCreate(format!(
                "cannot allocate a {} surface",
                desc.extent
            )));
        }

        let h = SurfaceHandle(self.mint());
        let color = TextureHandle(self.mint());
        self.textures.insert(
            color,
            Texture {
                image: Image::new(desc.extent, format),
                filter: SampleFilter::Linear,
                wrap: WrapMode::ClampToEdge,
                owner: Some(h),
            },
        );
        self.surfaces.insert(
            h,
            Surface {
                desc: *desc,
                color,
                finalized: false,
            },
        );
        tracing::trace!(surface = h.0, extent = %desc.extent, "cpu surface allocated");
        Ok(h)
    }

    fn finalize_surface(&mut self, h: SurfaceHandle) -> Result<(), EngineError> {
        let s = self
            .surfaces
            .get_mut(&h)
            .ok_or_else(|| EngineError::UnknownSurface(surface_name(h)))?;
        s.finalized = true;
        Ok(())
    }

    fn surface_desc(&self, h: SurfaceHandle) -> Result<SurfaceDesc, EngineError> {
        Ok(self.surface(h)?.desc)
    }

    fn surface_color(&self, h: SurfaceHandle) -> Result<TextureHandle, EngineError> {
        let s = self.surface(h)?;
        if s.desc.multisampled {
            return Err(EngineError::other(format!(
                "{} is multisampled and must be resolved before sampling",
                surface_name(h)
            )));
        }
        Ok(s.color)
    }

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        texels: &[f32],
    ) -> Result<TextureHandle, EngineError> {
        let image = Image::from_channels(desc.extent, desc.format, texels)?;
        let t = TextureHandle(self.mint());
        self.textures.insert(
            t,
            Texture {
                image,
                filter: desc.filter,
                wrap: desc.wrap,
                owner: None,
            },
        );
        Ok(t)
    }

    fn load_program(&mut self, effect: Effect) -> Result<ProgramHandle, EngineError> {
        let p = ProgramHandle(self.mint());
        self.programs.insert(p, effect);
        Ok(p)
    }

    fn blit(
        &mut self,
        src: SurfaceHandle,
        dst: SurfaceHandle,
        filter: BlitFilter,
    ) -> Result<(), EngineError> {
        if src == dst {
            return Err(EngineError::AliasedTarget {
                stage: "blit",
                surface: surface_name(dst),
            });
        }
        let src_color = self.finalized(src)?.color;
        let dst_color = self.finalized(dst)?.color;
        let dst_extent = self.texture(dst_color)?.image.extent();

        let sampler = match filter {
            BlitFilter::Nearest => SampleFilter::Nearest,
            BlitFilter::Linear => SampleFilter::Linear,
        };
        let src_image = &self.texture(src_color)?.image;
        let out: Vec<Vec4> = Image::pixel_centres(dst_extent)
            .map(|uv| src_image.sample(uv, sampler, WrapMode::ClampToEdge))
            .collect();

        let tex = self
            .textures
            .get_mut(&dst_color)
            .ok_or(EngineError::UnknownTexture(dst_color.0))?;
        tex.image.write_all(&out);
        self.log.commands.push(Command::Blit { src, dst, filter });
        Ok(())
    }

    fn draw_fullscreen(
        &mut self,
        program: ProgramHandle,
        target: RenderTarget,
        inputs: &[(&'static str, TextureHandle)],
        params: &EffectParams,
    ) -> Result<(), EngineError> {
        let effect = *self
            .programs
            .get(&program)
            .ok_or_else(|| EngineError::other(format!("unknown program handle {}", program.0)))?;
        let stage = effect.name();

        let (target_surface, target_extent) = match target {
            RenderTarget::Surface(h) => {
                let s = self.finalized(h)?;
                (Some((h, s.color)), s.desc.extent)
            }
            RenderTarget::Presentation => (None, self.presentation.extent()),
        };

        for decl in effect.inputs() {
            if !decl.optional && !inputs.iter().any(|(n, _)| *n == decl.name) {
                return Err(EngineError::MissingInput {
                    stage,
                    input: decl.name,
                });
            }
        }

        let mut bound = Vec::with_capacity(inputs.len());
        for (name, t) in inputs {
            let tex = self.texture(*t)?;
            if let Some(owner) = tex.owner {
                self.finalized(owner)?;
                if Some(owner) == target_surface.map(|(h, _)| h) {
                    return Err(EngineError::AliasedTarget {
                        stage,
                        surface: surface_name(owner),
                    });
                }
            }
            bound.push((*name, tex));
        }

        let out = effects::render(effect, &effects::Inputs { bound }, params, target_extent);

        match target_surface {
            Some((_, color)) => {
                let tex = self
                    .textures
                    .get_mut(&color)
                    .ok_or(EngineError::UnknownTexture(color.0))?;
                tex.image.write_all(&out);
            }
            None => self.presentation.write_all(&out),
        }

        self.log.commands.push(Command::Draw {
            effect,
            target,
            inputs: inputs.to_vec(),
        });
        Ok(())
    }

    fn finish(&mut self) {
        self.log.commands.push(Command::Finish);
    }

    fn presentation_extent(&self) -> Extent {
        self.presentation.extent()
    }

    fn destroy_surface(&mut self, h: SurfaceHandle) {
        if let Some(s) = self.surfaces.remove(&h) {
            self.textures.remove(&s.color);
        }
    }

    fn destroy_texture(&mut self, t: TextureHandle) {
        self.textures.remove(&t);
    }

    fn destroy_program(&mut self, p: ProgramHandle) {
        self.programs.remove(&p);
    }
}
