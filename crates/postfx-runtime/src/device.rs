//! The graphics-device contract every backend implements.
//!
//! The orchestrator never talks to a graphics API directly. Scene-renderer outputs, loaded
//! programs, fallback textures and pool surfaces are all opaque handles minted by one
//! `RenderDevice`; passing a handle to a device that did not create it is undefined.

use postfx_core::{EngineError, Extent};
use postfx_plan::{BlitFilter, Effect, PixelFormat, SurfaceDesc};

use crate::params::EffectParams;

/// Offscreen framebuffer with its attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceHandle(pub u32);

/// Sampleable 2D image (a surface's colour attachment or a standalone texture).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

/// Compiled program for one [`Effect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFilter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapMode {
    ClampToEdge,
    Repeat,
}

/// Standalone texture created from host data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub extent: Extent,
    pub format: PixelFormat,
    pub filter: SampleFilter,
    pub wrap: WrapMode,
}

impl TextureDesc {
    /// Number of `f32` values `create_texture` expects.
    pub fn texel_len(&self) -> usize {
        self.extent.width as usize * self.extent.height as usize * self.format.channels()
    }
}

/// Where a full-screen draw writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    Surface(SurfaceHandle),
    /// The window / default framebuffer at display resolution.
    Presentation,
}

/// Graphics backend used by [`PostProcessor`](crate::PostProcessor).
///
/// All calls happen on the single graphics thread, in submission order.
pub trait RenderDevice {
    /// Reserve storage for a surface. The surface is unusable until finalized.
    fn allocate_surface(&mut self, desc: &SurfaceDesc) -> Result<SurfaceHandle, EngineError>;

    /// Complete the framebuffer. Binding an unfinalized surface fails with
    /// `EngineError::SurfaceNotFinalized`.
    fn finalize_surface(&mut self, surface: SurfaceHandle) -> Result<(), EngineError>;

    fn surface_desc(&self, surface: SurfaceHandle) -> Result<SurfaceDesc, EngineError>;

    /// The sampleable colour attachment of a single-sample surface.
    fn surface_color(&self, surface: SurfaceHandle) -> Result<TextureHandle, EngineError>;

    /// Create a texture from `desc.texel_len()` floats, rows bottom-up.
    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        texels: &[f32],
    ) -> Result<TextureHandle, EngineError>;

    fn load_program(&mut self, effect: Effect) -> Result<ProgramHandle, EngineError>;

    /// Colour-only blit scaling `src` to the size of `dst`.
    fn blit(
        &mut self,
        src: SurfaceHandle,
        dst: SurfaceHandle,
        filter: BlitFilter,
    ) -> Result<(), EngineError>;

    /// Bind `target`, set the viewport to its size, bind `inputs` to consecutive texture
    /// units by sampler name, upload `params` by name and draw the full-screen primitive.
    fn draw_fullscreen(
        &mut self,
        program: ProgramHandle,
        target: RenderTarget,
        inputs: &[(&'static str, TextureHandle)],
        params: &EffectParams,
    ) -> Result<(), EngineError>;

    /// Block until all submitted work has completed.
    fn finish(&mut self);

    fn presentation_extent(&self) -> Extent;

    fn destroy_surface(&mut self, surface: SurfaceHandle);

    fn destroy_texture(&mut self, texture: TextureHandle);

    fn destroy_program(&mut self, program: ProgramHandle);
}
