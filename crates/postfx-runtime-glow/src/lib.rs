//! postfx runtime (glow/OpenGL backend)
//
// This crate contains only the GL side of the device contract:
// - surfaces as FBO + colour texture (or multisample renderbuffer) + optional depth/stencil
// - program compilation from built-in or on-disk GLSL
// - full-screen triangle draws with uniforms uploaded by name
//
// It does NOT create windows or contexts; the host owns the GL context lifecycle.
#![allow(clippy::missing_safety_doc)]
#![deny(missing_debug_implementations)]

pub mod shaders;

use std::collections::HashMap;

use glow::HasContext;

use postfx_core::Extent;
use postfx_plan::{BlitFilter, Effect, PixelFormat, SurfaceDesc};
use postfx_runtime::{
    EffectParams, ProgramHandle, RenderDevice, RenderTarget, SampleFilter, SurfaceHandle,
    TextureDesc, TextureHandle, Uniform, WrapMode,
};

pub use postfx_core::EngineError;
pub use shaders::{ShaderLibrary, ShaderSource, FULLSCREEN_VERT};

/// Sample count for multisampled surfaces.
pub const MSAA_SAMPLES: i32 = 4;

/// `(internal format, pixel format, component type)` for a texture of `format`.
pub fn gl_formats(format: PixelFormat) -> (i32, u32, u32) {
    match format {
        PixelFormat::R8 => (glow::R8 as i32, glow::RED, glow::UNSIGNED_BYTE),
        PixelFormat::Rgba8 => (glow::RGBA8 as i32, glow::RGBA, glow::UNSIGNED_BYTE),
        PixelFormat::Rgb16F => (glow::RGB16F as i32, glow::RGB, glow::HALF_FLOAT),
        PixelFormat::Rgba16F => (glow::RGBA16F as i32, glow::RGBA, glow::HALF_FLOAT),
        PixelFormat::Depth32F => (
            glow::DEPTH_COMPONENT32F as i32,
            glow::DEPTH_COMPONENT,
            glow::FLOAT,
        ),
    }
}

/// Pack host floats into the byte layout `gl_formats(format)` uploads.
pub fn pack_texels(format: PixelFormat, texels: &[f32]) -> Vec<u8> {
    match format {
        PixelFormat::R8 | PixelFormat::Rgba8 => texels
            .iter()
            .map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect(),
        PixelFormat::Rgb16F | PixelFormat::Rgba16F => {
            let bits: Vec<u16> = texels
                .iter()
                .map(|c| half::f16::from_f32(*c).to_bits())
                .collect();
            bytemuck::cast_slice(&bits).to_vec()
        }
        PixelFormat::Depth32F => bytemuck::cast_slice(texels).to_vec(),
    }
}

fn gl_filter(filter: SampleFilter) -> i32 {
    match filter {
        SampleFilter::Nearest => glow::NEAREST as i32,
        SampleFilter::Linear => glow::LINEAR as i32,
    }
}

fn gl_wrap(wrap: WrapMode) -> i32 {
    match wrap {
        WrapMode::ClampToEdge => glow::CLAMP_TO_EDGE as i32,
        WrapMode::Repeat => glow::REPEAT as i32,
    }
}

fn surface_name(h: SurfaceHandle) -> String {
    format!("surface#{}", h.0)
}

/// Offscreen framebuffer and its attachments.
#[derive(Debug)]
struct GlSurface {
    desc: SurfaceDesc,
    fbo: glow::NativeFramebuffer,
    /// Sampleable colour attachment (single-sample surfaces only).
    color: Option<TextureHandle>,
    renderbuffers: Vec<glow::NativeRenderbuffer>,
    finalized: bool,
}

#[derive(Debug)]
struct GlTexture {
    tex: glow::NativeTexture,
    extent: Extent,
    owner: Option<SurfaceHandle>,
}

unsafe fn create_texture_object(
    gl: &glow::Context,
    desc: &TextureDesc,
    data: Option<&[u8]>,
) -> Result<glow::NativeTexture, EngineError> {
    let tex = gl
        .create_texture()
        .map_err(|e| EngineError::GlCreate(format!("create_texture failed: {e:?}")))?;
    let (internal, format, ty) = gl_formats(desc.format);

    gl.bind_texture(glow::TEXTURE_2D, Some(tex));
    gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, gl_filter(desc.filter));
    gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, gl_filter(desc.filter));
    gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, gl_wrap(desc.wrap));
    gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, gl_wrap(desc.wrap));
    gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
    gl.tex_image_2d(
        glow::TEXTURE_2D,
        0,
        internal,
        desc.extent.width.max(1) as i32,
        desc.extent.height.max(1) as i32,
        0,
        format,
        ty,
        data,
    );
    gl.bind_texture(glow::TEXTURE_2D, None);
    Ok(tex)
}

unsafe fn create_renderbuffer(
    gl: &glow::Context,
    internal: u32,
    extent: Extent,
    multisampled: bool,
) -> Result<glow::NativeRenderbuffer, EngineError> {
    let rbo = gl
        .create_renderbuffer()
        .map_err(|e| EngineError::GlCreate(format!("create_renderbuffer failed: {e:?}")))?;
    gl.bind_renderbuffer(glow::RENDERBUFFER, Some(rbo));
    let (w, h) = (extent.width as i32, extent.height as i32);
    if multisampled {
        gl.renderbuffer_storage_multisample(glow::RENDERBUFFER, MSAA_SAMPLES, internal, w, h);
    } else {
        gl.renderbuffer_storage(glow::RENDERBUFFER, internal, w, h);
    }
    gl.bind_renderbuffer(glow::RENDERBUFFER, None);
    Ok(rbo)
}

pub unsafe fn compile_program(
    gl: &glow::Context,
    vert_src: &str,
    frag_src: &str,
) -> Result<glow::NativeProgram, EngineError> {
    let vs = gl
        .create_shader(glow::VERTEX_SHADER)
        .map_err(|e| EngineError::GlCreate(format!("create_shader(VS) failed: {e:?}")))?;
    gl.shader_source(vs, vert_src);
    gl.compile_shader(vs);
    if !gl.get_shader_compile_status(vs) {
        let log = gl.get_shader_info_log(vs);
        gl.delete_shader(vs);
        return Err(EngineError::VertexCompile(log));
    }

    let fs = gl
        .create_shader(glow::FRAGMENT_SHADER)
        .map_err(|e| EngineError::GlCreate(format!("create_shader(FS) failed: {e:?}")))?;
    gl.shader_source(fs, frag_src);
    gl.compile_shader(fs);
    if !gl.get_shader_compile_status(fs) {
        let log = gl.get_shader_info_log(fs);
        gl.delete_shader(vs);
        gl.delete_shader(fs);
        return Err(EngineError::FragmentCompile(log));
    }

    let program = gl
        .create_program()
        .map_err(|e| EngineError::GlCreate(format!("create_program failed: {e:?}")))?;
    gl.attach_shader(program, vs);
    gl.attach_shader(program, fs);
    gl.link_program(program);

    gl.detach_shader(program, vs);
    gl.detach_shader(program, fs);
    gl.delete_shader(vs);
    gl.delete_shader(fs);

    if !gl.get_program_link_status(program) {
        let log = gl.get_program_info_log(program);
        gl.delete_program(program);
        return Err(EngineError::Link(log));
    }

    Ok(program)
}

unsafe fn upload_uniform(
    gl: &glow::Context,
    program: glow::NativeProgram,
    name: &str,
    value: &Uniform,
) {
    let Some(loc) = gl.get_uniform_location(program, name) else {
        // Declared but optimized out, or not declared by an override shader.
        tracing::trace!(uniform = name, "no uniform location");
        return;
    };
    let loc = Some(&loc);
    match value {
        Uniform::Bool(b) => gl.uniform_1_i32(loc, i32::from(*b)),
        Uniform::Int(i) => gl.uniform_1_i32(loc, *i),
        Uniform::Float(f) => gl.uniform_1_f32(loc, *f),
        Uniform::Vec2(v) => gl.uniform_2_f32(loc, v.x, v.y),
        Uniform::Vec3(v) => gl.uniform_3_f32(loc, v.x, v.y, v.z),
        Uniform::Mat4(m) => gl.uniform_matrix_4_f32_slice(loc, false, &m.to_cols_array()),
        Uniform::Vec3Array(vs) => gl.uniform_3_f32_slice(loc, bytemuck::cast_slice(vs)),
    }
}

#[derive(Debug)]
pub struct FullscreenTriangle {
    vao: glow::NativeVertexArray,
    vbo: glow::NativeBuffer,
}

impl FullscreenTriangle {
    pub unsafe fn new(gl: &glow::Context) -> Result<Self, EngineError> {
        // xy, uv
        let verts: [f32; 12] = [
            -1.0, -1.0, 0.0, 0.0, 3.0, -1.0, 2.0, 0.0, -1.0, 3.0, 0.0, 2.0,
        ];

        let vao = gl
            .create_vertex_array()
            .map_err(|e| EngineError::GlCreate(format!("create_vertex_array: {e}")))?;
        let vbo = gl
            .create_buffer()
            .map_err(|e| EngineError::GlCreate(format!("create_buffer: {e}")))?;

        gl.bind_vertex_array(Some(vao));
        gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
        gl.buffer_data_u8_slice(
            glow::ARRAY_BUFFER,
            bytemuck::cast_slice(&verts),
            glow::STATIC_DRAW,
        );

        gl.enable_vertex_attrib_array(0);
        gl.vertex_attrib_pointer_f32(0, 2, glow::FLOAT, false, 4 * 4, 0);
        gl.enable_vertex_attrib_array(1);
        gl.vertex_attrib_pointer_f32(1, 2, glow::FLOAT, false, 4 * 4, 2 * 4);

        gl.bind_buffer(glow::ARRAY_BUFFER, None);
        gl.bind_vertex_array(None);

        Ok(Self { vao, vbo })
    }

    pub unsafe fn draw(&self, gl: &glow::Context) {
        gl.bind_vertex_array(Some(self.vao));
        gl.draw_arrays(glow::TRIANGLES, 0, 3);
        gl.bind_vertex_array(None);
    }

    pub unsafe fn destroy(&mut self, gl: &glow::Context) {
        gl.delete_vertex_array(self.vao);
        gl.delete_buffer(self.vbo);
    }
}

/// OpenGL implementation of [`RenderDevice`].
///
/// Owns the `glow::Context` it was given; every call must happen on the thread where that
/// context is current. GL objects are only released by the `destroy_*` methods and
/// [`GlowDevice::destroy`].
pub struct GlowDevice {
    gl: glow::Context,
    fs_tri: FullscreenTriangle,
    shaders: ShaderLibrary,
    presentation: Extent,
    surfaces: HashMap<SurfaceHandle, GlSurface>,
    textures: HashMap<TextureHandle, GlTexture>,
    programs: HashMap<ProgramHandle, (Effect, glow::NativeProgram)>,
    next_id: u32,
}

impl std::fmt::Debug for GlowDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlowDevice")
            .field("gl", &"<gl context>")
            .field("presentation", &self.presentation)
            .field("shaders", &self.shaders)
            .field("surfaces", &self.surfaces.len())
            .field("textures", &self.textures.len())
            .field("programs", &self.programs.len())
            .finish()
    }
}

impl GlowDevice {
    /// Wrap a current context whose default framebuffer is `presentation` sized.
    ///
    /// # Safety
    /// The context must be current on this thread for the lifetime of the device.
    pub unsafe fn new(
        gl: glow::Context,
        presentation: Extent,
        shaders: ShaderLibrary,
    ) -> Result<Self, EngineError> {
        let fs_tri = FullscreenTriangle::new(&gl)?;
        tracing::info!(
            presentation = %presentation,
            shader_dir = ?shaders.dir(),
            "glow device ready"
        );
        Ok(Self {
            gl,
            fs_tri,
            shaders,
            presentation,
            surfaces: HashMap::new(),
            textures: HashMap::new(),
            programs: HashMap::new(),
            next_id: 1,
        })
    }

    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    /// Underlying GL texture, for hosts that sample pipeline outputs in their own passes.
    pub fn native_texture(&self, t: TextureHandle) -> Option<glow::NativeTexture> {
        self.textures.get(&t).map(|t| t.tex)
    }

    pub fn texture_extent(&self, t: TextureHandle) -> Option<Extent> {
        self.textures.get(&t).map(|t| t.extent)
    }

    /// Underlying framebuffer, for hosts that render the scene into a surface.
    pub fn native_framebuffer(&self, h: SurfaceHandle) -> Option<glow::NativeFramebuffer> {
        self.surfaces.get(&h).map(|s| s.fbo)
    }

    /// Register a texture the host created (G-buffer normals/depth, vignette mask).
    pub fn import_texture(&mut self, tex: glow::NativeTexture, extent: Extent) -> TextureHandle {
        let t = TextureHandle(self.mint());
        self.textures.insert(
            t,
            GlTexture {
                tex,
                extent,
                owner: None,
            },
        );
        t
    }

    /// Release every remaining GL object and return the context.
    pub unsafe fn destroy(mut self) -> glow::Context {
        let surfaces: Vec<SurfaceHandle> = self.surfaces.keys().copied().collect();
        for h in surfaces {
            self.destroy_surface(h);
        }
        for (_, t) in self.textures.drain() {
            if t.owner.is_none() {
                self.gl.delete_texture(t.tex);
            }
        }
        for (_, (_, p)) in self.programs.drain() {
            self.gl.delete_program(p);
        }
        self.fs_tri.destroy(&self.gl);
        self.gl
    }

    fn mint(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn surface(&self, h: SurfaceHandle) -> Result<&GlSurface, EngineError> {
        self.surfaces
            .get(&h)
            .ok_or_else(|| EngineError::UnknownSurface(surface_name(h)))
    }

    fn finalized(&self, h: SurfaceHandle) -> Result<&GlSurface, EngineError> {
        let s = self.surface(h)?;
        if !s.finalized {
            return Err(EngineError::SurfaceNotFinalized {
                surface: surface_name(h),
            });
        }
        Ok(s)
    }

    unsafe fn build_surface(
        &mut self,
        h: SurfaceHandle,
        desc: &SurfaceDesc,
        format: PixelFormat,
    ) -> Result<GlSurface, EngineError> {
        let fbo = self
            .gl
            .create_framebuffer()
            .map_err(|e| EngineError::GlCreate(format!("create_framebuffer failed: {e:?}")))?;
        let mut surface = GlSurface {
            desc: *desc,
            fbo,
            color: None,
            renderbuffers: Vec::new(),
            finalized: false,
        };

        self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
        let attached = self.attach_storage(h, format, &mut surface);
        self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);

        match attached {
            Ok(()) => Ok(surface),
            Err(e) => {
                self.release(surface);
                Err(e)
            }
        }
    }

    /// Attach colour and depth/stencil storage to the currently bound framebuffer.
    unsafe fn attach_storage(
        &mut self,
        h: SurfaceHandle,
        format: PixelFormat,
        surface: &mut GlSurface,
    ) -> Result<(), EngineError> {
        let desc = surface.desc;
        if desc.multisampled {
            let (internal, _, _) = gl_formats(format);
            let rbo = create_renderbuffer(&self.gl, internal as u32, desc.extent, true)?;
            surface.renderbuffers.push(rbo);
            self.gl.framebuffer_renderbuffer(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::RENDERBUFFER,
                Some(rbo),
            );
        } else {
            let tex_desc = TextureDesc {
                extent: desc.extent,
                format,
                filter: SampleFilter::Linear,
                wrap: WrapMode::ClampToEdge,
            };
            let tex = create_texture_object(&self.gl, &tex_desc, None)?;
            let t = TextureHandle(self.mint());
            self.textures.insert(
                t,
                GlTexture {
                    tex,
                    extent: desc.extent,
                    owner: Some(h),
                },
            );
            surface.color = Some(t);
            self.gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(tex),
                0,
            );
        }

        if desc.depth_stencil {
            let rbo = create_renderbuffer(
                &self.gl,
                glow::DEPTH24_STENCIL8,
                desc.extent,
                desc.multisampled,
            )?;
            surface.renderbuffers.push(rbo);
            self.gl.framebuffer_renderbuffer(
                glow::FRAMEBUFFER,
                glow::DEPTH_STENCIL_ATTACHMENT,
                glow::RENDERBUFFER,
                Some(rbo),
            );
        }
        Ok(())
    }

    unsafe fn release(&mut self, surface: GlSurface) {
        if let Some(t) = surface.color {
            if let Some(tex) = self.textures.remove(&t) {
                self.gl.delete_texture(tex.tex);
            }
        }
        for rbo in surface.renderbuffers {
            self.gl.delete_renderbuffer(rbo);
        }
        self.gl.delete_framebuffer(surface.fbo);
    }
}

impl RenderDevice for GlowDevice {
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
        let surface = unsafe { self.build_surface(h, desc, format)? };
        self.surfaces.insert(h, surface);
        tracing::trace!(surface = h.0, extent = %desc.extent, "gl surface allocated");
        Ok(h)
    }

    fn finalize_surface(&mut self, h: SurfaceHandle) -> Result<(), EngineError> {
        let fbo = self.surface(h)?.fbo;
        let status = unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
            let status = self.gl.check_framebuffer_status(glow::FRAMEBUFFER);
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            status
        };
        if status != glow::FRAMEBUFFER_COMPLETE {
            return Err(EngineError::GlCreate(format!(
                "framebuffer {} incomplete: 0x{status:x}",
                surface_name(h)
            )));
        }
        if let Some(s) = self.surfaces.get_mut(&h) {
            s.finalized = true;
        }
        Ok(())
    }

    fn surface_desc(&self, h: SurfaceHandle) -> Result<SurfaceDesc, EngineError> {
        Ok(self.surface(h)?.desc)
    }

    fn surface_color(&self, h: SurfaceHandle) -> Result<TextureHandle, EngineError> {
        self.surface(h)?.color.ok_or_else(|| {
            EngineError::other(format!(
                "{} is multisampled and must be resolved before sampling",
                surface_name(h)
            ))
        })
    }

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        texels: &[f32],
    ) -> Result<TextureHandle, EngineError> {
        if texels.len() != desc.texel_len() {
            return Err(EngineError::other(format!(
                "texture data has {} floats, {} {:?} needs {}",
                texels.len(),
                desc.extent,
                desc.format,
                desc.texel_len()
            )));
        }
        let bytes = pack_texels(desc.format, texels);
        let tex = unsafe { create_texture_object(&self.gl, desc, Some(&bytes))? };
        Ok(self.import_texture(tex, desc.extent))
    }

    fn load_program(&mut self, effect: Effect) -> Result<ProgramHandle, EngineError> {
        let src = self.shaders.source(effect)?;
        let program = unsafe { compile_program(&self.gl, &src.vert, &src.frag)? };
        tracing::debug!(effect = effect.name(), origin = %src.origin, "program compiled");
        let p = ProgramHandle(self.mint());
        self.programs.insert(p, (effect, program));
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
        let s = self.finalized(src)?;
        let (src_fbo, se) = (s.fbo, s.desc.extent);
        let d = self.finalized(dst)?;
        let (dst_fbo, de) = (d.fbo, d.desc.extent);
        let gl_filter = match filter {
            BlitFilter::Nearest => glow::NEAREST,
            BlitFilter::Linear => glow::LINEAR,
        };
        unsafe {
            let gl = &self.gl;
            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, Some(src_fbo));
            gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, Some(dst_fbo));
            gl.blit_framebuffer(
                0,
                0,
                se.width as i32,
                se.height as i32,
                0,
                0,
                de.width as i32,
                de.height as i32,
                glow::COLOR_BUFFER_BIT,
                gl_filter,
            );
            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, None);
            gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, None);
        }
        Ok(())
    }

    fn draw_fullscreen(
        &mut self,
        program: ProgramHandle,
        target: RenderTarget,
        inputs: &[(&'static str, TextureHandle)],
        params: &EffectParams,
    ) -> Result<(), EngineError> {
        let (effect, prog) = *self
            .programs
            .get(&program)
            .ok_or_else(|| EngineError::other(format!("unknown program handle {}", program.0)))?;
        let stage = effect.name();

        let (fbo, extent, target_surface) = match target {
            RenderTarget::Surface(h) => {
                let s = self.finalized(h)?;
                (Some(s.fbo), s.desc.extent, Some(h))
            }
            RenderTarget::Presentation => (None, self.presentation, None),
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
            let tex = self
                .textures
                .get(t)
                .ok_or(EngineError::UnknownTexture(t.0))?;
            if let Some(owner) = tex.owner {
                self.finalized(owner)?;
                if Some(owner) == target_surface {
                    return Err(EngineError::AliasedTarget {
                        stage,
                        surface: surface_name(owner),
                    });
                }
            }
            bound.push((*name, tex.tex));
        }

        unsafe {
            let gl = &self.gl;
            gl.bind_framebuffer(glow::FRAMEBUFFER, fbo);
            gl.viewport(0, 0, extent.width as i32, extent.height as i32);
            gl.disable(glow::DEPTH_TEST);
            gl.disable(glow::BLEND);
            gl.use_program(Some(prog));

            for (unit, (name, tex)) in bound.iter().enumerate() {
                gl.active_texture(glow::TEXTURE0 + unit as u32);
                gl.bind_texture(glow::TEXTURE_2D, Some(*tex));
                if let Some(loc) = gl.get_uniform_location(prog, name) {
                    gl.uniform_1_i32(Some(&loc), unit as i32);
                }
            }
            for (name, value) in params.iter() {
                upload_uniform(gl, prog, name, value);
            }

            self.fs_tri.draw(gl);

            for unit in 0..bound.len() {
                gl.active_texture(glow::TEXTURE0 + unit as u32);
                gl.bind_texture(glow::TEXTURE_2D, None);
            }
            gl.active_texture(glow::TEXTURE0);
            gl.use_program(None);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
        Ok(())
    }

    fn finish(&mut self) {
        unsafe { self.gl.finish() }
    }

    fn presentation_extent(&self) -> Extent {
        self.presentation
    }

    fn destroy_surface(&mut self, h: SurfaceHandle) {
        if let Some(s) = self.surfaces.remove(&h) {
            unsafe { self.release(s) }
        }
    }

    fn destroy_texture(&mut self, t: TextureHandle) {
        if let Some(tex) = self.textures.remove(&t) {
            unsafe { self.gl.delete_texture(tex.tex) }
        }
    }

    fn destroy_program(&mut self, p: ProgramHandle) {
        if let Some((_, prog)) = self.programs.remove(&p) {
            unsafe { self.gl.delete_program(prog) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unorm_textures_pack_one_byte_per_channel() {
        let bytes = pack_texels(PixelFormat::Rgba8, &[0.0, 1.0, 0.5, 2.0]);
        assert_eq!(bytes, vec![0, 255, 128, 255]);
    }

    #[test]
    fn half_float_textures_pack_two_bytes_per_channel() {
        let bytes = pack_texels(PixelFormat::Rgb16F, &[1.0, -1.0, 0.5]);
        assert_eq!(bytes.len(), 6);
        let one = half::f16::from_f32(1.0).to_bits().to_ne_bytes();
        assert_eq!(&bytes[..2], &one);
    }

    #[test]
    fn depth_textures_upload_raw_floats() {
        let bytes = pack_texels(PixelFormat::Depth32F, &[0.25]);
        assert_eq!(bytes, 0.25f32.to_ne_bytes().to_vec());
    }

    #[test]
    fn hdr_formats_use_half_float_storage() {
        assert_eq!(gl_formats(PixelFormat::Rgba16F).2, glow::HALF_FLOAT);
        assert_eq!(gl_formats(PixelFormat::R8).1, glow::RED);
    }
}
