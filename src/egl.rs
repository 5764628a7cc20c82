//! Production driver: dynamically loaded EGL + GBM + GL
//!
//! Nothing here links against the GPU stack at build time. libEGL is loaded
//! through `khronos-egl`'s dynamic instance, libgbm through `libloading`,
//! and every GL entry point is resolved by name through `eglGetProcAddress`
//! once a context is bound. The machine this runs on decides what is
//! available; missing pieces degrade (no export capability, no GL function
//! table) instead of failing the load of this crate.

use std::collections::HashMap;
use std::ffi::c_void;
use std::mem;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd};
use std::ptr;

use khronos_egl as egl;
use libc::c_int;
use libloading::Library;
use tracing::{debug, info, warn};

use crate::config::Api;
use crate::context::HeadlessContext;
use crate::driver::{
    AttachmentMode, ConfigHandle, ConfigRequest, ContextAttribs, ContextHandle, DeviceObject,
    DisplayHandle, Driver, ExportedImage, ImageHandle, ImageLayout, RenderTargetId, TextureId,
};
use crate::exports::{ExportFns, SymbolLookup};
use crate::{Error, Result};

// EGL_KHR_create_context / EGL_KHR_gl_image attributes not covered by the
// khronos-egl 1.4 constant set.
const EGL_CONTEXT_MAJOR_VERSION_KHR: egl::Int = 0x3098;
const EGL_CONTEXT_MINOR_VERSION_KHR: egl::Int = 0x30fb;
const EGL_CONTEXT_FLAGS_KHR: egl::Int = 0x30fc;
const EGL_CONTEXT_OPENGL_PROFILE_MASK_KHR: egl::Int = 0x30fd;
const EGL_GL_TEXTURE_2D_KHR: u32 = 0x30b1;

// GL constants used by the texture/render-target plumbing.
const GL_TEXTURE_2D: u32 = 0x0de1;
const GL_RGBA: u32 = 0x1908;
const GL_UNSIGNED_BYTE: u32 = 0x1401;
const GL_TEXTURE_MIN_FILTER: u32 = 0x2801;
const GL_TEXTURE_MAG_FILTER: u32 = 0x2800;
const GL_NEAREST: i32 = 0x2600;
const GL_TEXTURE_WRAP_S: u32 = 0x2802;
const GL_TEXTURE_WRAP_T: u32 = 0x2803;
const GL_CLAMP_TO_EDGE: i32 = 0x812f;
const GL_PACK_ALIGNMENT: u32 = 0x0d05;
const GL_UNPACK_ALIGNMENT: u32 = 0x0cf5;
const GL_FRAMEBUFFER: u32 = 0x8d40;
const GL_RENDERBUFFER: u32 = 0x8d41;
const GL_COLOR_ATTACHMENT0: u32 = 0x8ce0;
const GL_DEPTH_STENCIL_ATTACHMENT: u32 = 0x821a;
const GL_DEPTH24_STENCIL8: u32 = 0x88f0;
const GL_FRAMEBUFFER_COMPLETE: u32 = 0x8cd5;

/// libgbm entry points needed to turn a render-node descriptor into a
/// native display.
struct GbmLib {
    _lib: Library,
    create_device: unsafe extern "C" fn(c_int) -> *mut c_void,
    device_destroy: unsafe extern "C" fn(*mut c_void),
}

impl GbmLib {
    fn load() -> std::result::Result<Self, libloading::Error> {
        let lib = unsafe { Library::new("libgbm.so.1") }
            .or_else(|_| unsafe { Library::new("libgbm.so") })?;
        let create_device = unsafe {
            *lib.get::<unsafe extern "C" fn(c_int) -> *mut c_void>(b"gbm_create_device\0")?
        };
        let device_destroy =
            unsafe { *lib.get::<unsafe extern "C" fn(*mut c_void)>(b"gbm_device_destroy\0")? };
        Ok(Self {
            _lib: lib,
            create_device,
            device_destroy,
        })
    }
}

/// Core GL entry points, resolved once a context is current.
#[allow(clippy::type_complexity)]
struct GlFns {
    gen_textures: unsafe extern "system" fn(i32, *mut u32),
    delete_textures: unsafe extern "system" fn(i32, *const u32),
    bind_texture: unsafe extern "system" fn(u32, u32),
    tex_parameteri: unsafe extern "system" fn(u32, u32, i32),
    tex_image_2d:
        unsafe extern "system" fn(u32, i32, i32, i32, i32, i32, u32, u32, *const c_void),
    pixel_storei: unsafe extern "system" fn(u32, i32),
    read_pixels: unsafe extern "system" fn(i32, i32, i32, i32, u32, u32, *mut c_void),
    flush: unsafe extern "system" fn(),
    finish: unsafe extern "system" fn(),
    gen_framebuffers: unsafe extern "system" fn(i32, *mut u32),
    delete_framebuffers: unsafe extern "system" fn(i32, *const u32),
    bind_framebuffer: unsafe extern "system" fn(u32, u32),
    framebuffer_texture_2d: unsafe extern "system" fn(u32, u32, u32, u32, i32),
    check_framebuffer_status: unsafe extern "system" fn(u32) -> u32,
    gen_renderbuffers: unsafe extern "system" fn(i32, *mut u32),
    delete_renderbuffers: unsafe extern "system" fn(i32, *const u32),
    bind_renderbuffer: unsafe extern "system" fn(u32, u32),
    renderbuffer_storage: unsafe extern "system" fn(u32, u32, i32, i32),
    framebuffer_renderbuffer: unsafe extern "system" fn(u32, u32, u32, u32),
}

struct RtState {
    framebuffer: u32,
    color: u32,
    depth_rbo: u32,
    width: u32,
    height: u32,
}

/// [`Driver`] implementation over the real EGL/GBM/GL stack.
///
/// Single display, single context: exactly what the backend needs, so the
/// typed EGL handles are cached here and the opaque tokens handed across
/// the trait boundary mirror their raw pointer values.
pub struct EglDriver {
    egl: egl::DynamicInstance<egl::EGL1_4>,
    gbm: GbmLib,
    display: Option<egl::Display>,
    config: Option<egl::Config>,
    context: Option<egl::Context>,
    gl: Option<GlFns>,
    exports: Option<ExportFns>,
    targets: HashMap<u32, RtState>,
    next_target: u32,
    /// Scratch framebuffer for texture readback
    readback_fbo: u32,
    /// Currently bound render target framebuffer (0 = default)
    bound_fbo: u32,
}

impl EglDriver {
    /// Load libEGL and libgbm. Fails only when the libraries themselves are
    /// absent; device and display acquisition happen later.
    pub fn new() -> Result<Self> {
        let egl = unsafe { egl::DynamicInstance::<egl::EGL1_4>::load_required() }
            .map_err(|e| Error::DriverLoad(format!("libEGL: {e}")))?;
        let gbm = GbmLib::load().map_err(|e| Error::DriverLoad(format!("libgbm: {e}")))?;
        info!("EGL and GBM libraries loaded");
        Ok(Self {
            egl,
            gbm,
            display: None,
            config: None,
            context: None,
            gl: None,
            exports: None,
            targets: HashMap::new(),
            next_target: 1,
            readback_fbo: 0,
            bound_fbo: 0,
        })
    }

    /// Driver entry-point lookup passthrough for embedding code.
    pub fn proc_address(&self, name: &str) -> *const c_void {
        self.lookup(name)
    }

    fn gl(&self) -> Option<&GlFns> {
        if self.gl.is_none() {
            warn!("GL function table not resolved; is a context current?");
        }
        self.gl.as_ref()
    }

    fn resolve_gl(&self) -> Option<GlFns> {
        macro_rules! sym {
            ($name:literal) => {
                unsafe { mem::transmute(self.egl.get_proc_address($name)?) }
            };
        }
        Some(GlFns {
            gen_textures: sym!("glGenTextures"),
            delete_textures: sym!("glDeleteTextures"),
            bind_texture: sym!("glBindTexture"),
            tex_parameteri: sym!("glTexParameteri"),
            tex_image_2d: sym!("glTexImage2D"),
            pixel_storei: sym!("glPixelStorei"),
            read_pixels: sym!("glReadPixels"),
            flush: sym!("glFlush"),
            finish: sym!("glFinish"),
            gen_framebuffers: sym!("glGenFramebuffers"),
            delete_framebuffers: sym!("glDeleteFramebuffers"),
            bind_framebuffer: sym!("glBindFramebuffer"),
            framebuffer_texture_2d: sym!("glFramebufferTexture2D"),
            check_framebuffer_status: sym!("glCheckFramebufferStatus"),
            gen_renderbuffers: sym!("glGenRenderbuffers"),
            delete_renderbuffers: sym!("glDeleteRenderbuffers"),
            bind_renderbuffer: sym!("glBindRenderbuffer"),
            renderbuffer_storage: sym!("glRenderbufferStorage"),
            framebuffer_renderbuffer: sym!("glFramebufferRenderbuffer"),
        })
    }

    fn alloc_texture_storage(gl: &GlFns, tex: u32, width: u32, height: u32, data: *const c_void) {
        unsafe {
            (gl.bind_texture)(GL_TEXTURE_2D, tex);
            (gl.pixel_storei)(GL_UNPACK_ALIGNMENT, 1);
            (gl.tex_image_2d)(
                GL_TEXTURE_2D,
                0,
                GL_RGBA as i32,
                width as i32,
                height as i32,
                0,
                GL_RGBA,
                GL_UNSIGNED_BYTE,
                data,
            );
        }
    }
}

impl SymbolLookup for EglDriver {
    fn lookup(&self, name: &str) -> *const c_void {
        match self.egl.get_proc_address(name) {
            Some(f) => f as usize as *const c_void,
            None => ptr::null(),
        }
    }
}

impl Driver for EglDriver {
    fn create_device(&mut self, fd: BorrowedFd<'_>) -> Option<DeviceObject> {
        let dev = unsafe { (self.gbm.create_device)(fd.as_raw_fd()) };
        if dev.is_null() {
            warn!("gbm_create_device failed");
            return None;
        }
        Some(DeviceObject(dev as usize))
    }

    fn destroy_device(&mut self, dev: DeviceObject) {
        if dev.0 != 0 {
            unsafe { (self.gbm.device_destroy)(dev.0 as *mut c_void) };
        }
    }

    fn resolve_export_functions(&mut self) -> bool {
        self.exports = ExportFns::resolve(self);
        self.exports.is_some()
    }

    fn get_display(&mut self, dev: DeviceObject) -> Option<DisplayHandle> {
        let display = unsafe { self.egl.get_display(dev.0 as egl::NativeDisplayType) }?;
        self.display = Some(display);
        Some(DisplayHandle(display.as_ptr() as usize))
    }

    fn initialize_display(&mut self, _dpy: DisplayHandle) -> bool {
        let Some(display) = self.display else {
            return false;
        };
        match self.egl.initialize(display) {
            Ok((major, minor)) => {
                info!("EGL {major}.{minor} initialized on render node display");
                true
            }
            Err(e) => {
                warn!("eglInitialize failed: {e}");
                false
            }
        }
    }

    fn terminate_display(&mut self, _dpy: DisplayHandle) {
        if let Some(display) = self.display.take() {
            if let Err(e) = self.egl.terminate(display) {
                debug!("eglTerminate reported {e} during teardown");
            }
        }
        self.config = None;
    }

    fn bind_api(&mut self, api: Api) -> bool {
        let api = match api {
            Api::OpenGl => egl::OPENGL_API,
            Api::Gles => egl::OPENGL_ES_API,
            Api::Vulkan => return false,
        };
        self.egl.bind_api(api).is_ok()
    }

    fn choose_config(&mut self, _dpy: DisplayHandle, req: &ConfigRequest) -> Option<ConfigHandle> {
        let display = self.display?;
        let renderable = match req.api {
            Api::OpenGl => egl::OPENGL_BIT,
            Api::Gles => egl::OPENGL_ES2_BIT,
            Api::Vulkan => return None,
        };
        let attribs = [
            egl::SURFACE_TYPE,
            egl::WINDOW_BIT,
            egl::RENDERABLE_TYPE,
            renderable,
            egl::RED_SIZE,
            req.red as egl::Int,
            egl::GREEN_SIZE,
            req.green as egl::Int,
            egl::BLUE_SIZE,
            req.blue as egl::Int,
            egl::ALPHA_SIZE,
            req.alpha as egl::Int,
            egl::DEPTH_SIZE,
            req.depth as egl::Int,
            egl::NONE,
        ];
        match self.egl.choose_first_config(display, &attribs) {
            Ok(Some(config)) => {
                self.config = Some(config);
                Some(ConfigHandle(config.as_ptr() as usize))
            }
            Ok(None) => {
                warn!("no EGL config matches the requested channel depths");
                None
            }
            Err(e) => {
                warn!("eglChooseConfig failed: {e}");
                None
            }
        }
    }

    fn create_context(
        &mut self,
        _dpy: DisplayHandle,
        _cfg: ConfigHandle,
        attribs: &ContextAttribs,
    ) -> Option<ContextHandle> {
        let display = self.display?;
        let config = self.config?;

        let mut cas: Vec<egl::Int> = vec![egl::CONTEXT_CLIENT_VERSION, 2];
        if let Some((major, minor)) = attribs.version {
            cas.push(EGL_CONTEXT_MAJOR_VERSION_KHR);
            cas.push(major as egl::Int);
            cas.push(EGL_CONTEXT_MINOR_VERSION_KHR);
            cas.push(minor as egl::Int);
        }
        if let Some(mask) = attribs.profile_mask {
            cas.push(EGL_CONTEXT_OPENGL_PROFILE_MASK_KHR);
            cas.push(mask as egl::Int);
        }
        if let Some(flags) = attribs.flags {
            cas.push(EGL_CONTEXT_FLAGS_KHR);
            cas.push(flags as egl::Int);
        }
        cas.push(egl::NONE);

        let shared = attribs
            .shared
            .map(|c| unsafe { egl::Context::from_ptr(c.0 as *mut c_void) });

        match self.egl.create_context(display, config, shared, &cas) {
            Ok(ctx) => {
                self.context = Some(ctx);
                Some(ContextHandle(ctx.as_ptr() as usize))
            }
            Err(e) => {
                warn!("eglCreateContext rejected: {e}");
                None
            }
        }
    }

    fn destroy_context(&mut self, _dpy: DisplayHandle, _ctx: ContextHandle) {
        if let (Some(display), Some(ctx)) = (self.display, self.context.take()) {
            if let Err(e) = self.egl.destroy_context(display, ctx) {
                debug!("eglDestroyContext reported {e} during teardown");
            }
        }
    }

    fn make_current(&mut self, _dpy: DisplayHandle, ctx: Option<ContextHandle>) -> bool {
        let Some(display) = self.display else {
            return false;
        };
        let context = ctx.and(self.context);
        match self.egl.make_current(display, None, None, context) {
            Ok(()) => {
                if context.is_some() && self.gl.is_none() {
                    self.gl = self.resolve_gl();
                    if self.gl.is_none() {
                        warn!("GL entry points unresolved after context bind");
                    }
                }
                true
            }
            Err(e) => {
                warn!("eglMakeCurrent failed: {e}");
                false
            }
        }
    }

    fn create_texture(&mut self, width: u32, height: u32) -> TextureId {
        let Some(gl) = self.gl() else {
            return TextureId(0);
        };
        let mut tex = 0u32;
        unsafe {
            (gl.gen_textures)(1, &mut tex);
            (gl.bind_texture)(GL_TEXTURE_2D, tex);
            (gl.tex_parameteri)(GL_TEXTURE_2D, GL_TEXTURE_MIN_FILTER, GL_NEAREST);
            (gl.tex_parameteri)(GL_TEXTURE_2D, GL_TEXTURE_MAG_FILTER, GL_NEAREST);
            (gl.tex_parameteri)(GL_TEXTURE_2D, GL_TEXTURE_WRAP_S, GL_CLAMP_TO_EDGE);
            (gl.tex_parameteri)(GL_TEXTURE_2D, GL_TEXTURE_WRAP_T, GL_CLAMP_TO_EDGE);
        }
        Self::alloc_texture_storage(gl, tex, width, height, ptr::null());
        TextureId(tex)
    }

    fn delete_texture(&mut self, tex: TextureId) {
        if let Some(gl) = self.gl.as_ref() {
            unsafe { (gl.delete_textures)(1, &tex.0) };
        }
    }

    fn upload_texture(&mut self, tex: TextureId, width: u32, height: u32, pixels: &[u8]) {
        let needed = width as usize * height as usize * crate::pixel::BYTES_PER_PIXEL;
        if pixels.len() < needed {
            warn!("upload skipped: {} bytes for {}x{}", pixels.len(), width, height);
            return;
        }
        if let Some(gl) = self.gl.as_ref() {
            Self::alloc_texture_storage(gl, tex.0, width, height, pixels.as_ptr() as *const c_void);
        }
    }

    fn read_texture(&mut self, tex: TextureId, width: u32, height: u32, out: &mut [u8]) {
        let needed = width as usize * height as usize * crate::pixel::BYTES_PER_PIXEL;
        if out.len() < needed {
            warn!("readback skipped: {} bytes for {}x{}", out.len(), width, height);
            return;
        }
        let bound = self.bound_fbo;
        let Some(gl) = self.gl.as_ref() else { return };
        unsafe {
            if self.readback_fbo == 0 {
                let mut fbo = 0u32;
                (gl.gen_framebuffers)(1, &mut fbo);
                self.readback_fbo = fbo;
            }
            (gl.bind_framebuffer)(GL_FRAMEBUFFER, self.readback_fbo);
            (gl.framebuffer_texture_2d)(
                GL_FRAMEBUFFER,
                GL_COLOR_ATTACHMENT0,
                GL_TEXTURE_2D,
                tex.0,
                0,
            );
            (gl.pixel_storei)(GL_PACK_ALIGNMENT, 1);
            (gl.read_pixels)(
                0,
                0,
                width as i32,
                height as i32,
                GL_RGBA,
                GL_UNSIGNED_BYTE,
                out.as_mut_ptr() as *mut c_void,
            );
            (gl.bind_framebuffer)(GL_FRAMEBUFFER, bound);
        }
    }

    fn flush(&mut self) {
        if let Some(gl) = self.gl.as_ref() {
            unsafe {
                (gl.flush)();
                (gl.finish)();
            }
        }
    }

    fn create_render_target(
        &mut self,
        color: TextureId,
        width: u32,
        height: u32,
        mode: AttachmentMode,
    ) -> RenderTargetId {
        let id = self.next_target;
        self.next_target += 1;

        let mut framebuffer = 0u32;
        let mut depth_rbo = 0u32;
        if let Some(gl) = self.gl.as_ref() {
            unsafe {
                (gl.gen_framebuffers)(1, &mut framebuffer);
                (gl.bind_framebuffer)(GL_FRAMEBUFFER, framebuffer);
                (gl.framebuffer_texture_2d)(
                    GL_FRAMEBUFFER,
                    GL_COLOR_ATTACHMENT0,
                    GL_TEXTURE_2D,
                    color.0,
                    0,
                );
                if mode == AttachmentMode::ColorDepthStencil {
                    (gl.gen_renderbuffers)(1, &mut depth_rbo);
                    (gl.bind_renderbuffer)(GL_RENDERBUFFER, depth_rbo);
                    (gl.renderbuffer_storage)(
                        GL_RENDERBUFFER,
                        GL_DEPTH24_STENCIL8,
                        width as i32,
                        height as i32,
                    );
                    (gl.framebuffer_renderbuffer)(
                        GL_FRAMEBUFFER,
                        GL_DEPTH_STENCIL_ATTACHMENT,
                        GL_RENDERBUFFER,
                        depth_rbo,
                    );
                }
                let status = (gl.check_framebuffer_status)(GL_FRAMEBUFFER);
                if status != GL_FRAMEBUFFER_COMPLETE {
                    warn!("render target incomplete: {status:#x}");
                }
                (gl.bind_framebuffer)(GL_FRAMEBUFFER, self.bound_fbo);
            }
        }

        self.targets.insert(
            id,
            RtState {
                framebuffer,
                color: color.0,
                depth_rbo,
                width,
                height,
            },
        );
        RenderTargetId(id)
    }

    fn destroy_render_target(&mut self, rt: RenderTargetId) {
        let Some(state) = self.targets.remove(&rt.0) else {
            return;
        };
        if let Some(gl) = self.gl.as_ref() {
            unsafe {
                (gl.delete_framebuffers)(1, &state.framebuffer);
                if state.depth_rbo != 0 {
                    (gl.delete_renderbuffers)(1, &state.depth_rbo);
                }
            }
        }
    }

    fn resize_render_target(&mut self, rt: RenderTargetId, width: u32, height: u32) {
        let Some(state) = self.targets.get_mut(&rt.0) else {
            return;
        };
        state.width = width;
        state.height = height;
        let (color, depth_rbo) = (state.color, state.depth_rbo);
        if let Some(gl) = self.gl.as_ref() {
            // Attachments are respecified in place; no new objects.
            Self::alloc_texture_storage(gl, color, width, height, ptr::null());
            if depth_rbo != 0 {
                unsafe {
                    (gl.bind_renderbuffer)(GL_RENDERBUFFER, depth_rbo);
                    (gl.renderbuffer_storage)(
                        GL_RENDERBUFFER,
                        GL_DEPTH24_STENCIL8,
                        width as i32,
                        height as i32,
                    );
                }
            }
        }
    }

    fn bind_render_target(&mut self, rt: Option<RenderTargetId>) {
        let framebuffer = rt
            .and_then(|r| self.targets.get(&r.0))
            .map(|s| s.framebuffer)
            .unwrap_or(0);
        self.bound_fbo = framebuffer;
        if let Some(gl) = self.gl.as_ref() {
            unsafe { (gl.bind_framebuffer)(GL_FRAMEBUFFER, framebuffer) };
        }
    }

    fn set_color_attachment(&mut self, rt: RenderTargetId, tex: TextureId) {
        let Some(state) = self.targets.get_mut(&rt.0) else {
            return;
        };
        state.color = tex.0;
        let (framebuffer, width, height) = (state.framebuffer, state.width, state.height);
        let bound = self.bound_fbo;
        if let Some(gl) = self.gl.as_ref() {
            // Adopt the target's dimensions before attaching.
            Self::alloc_texture_storage(gl, tex.0, width, height, ptr::null());
            unsafe {
                (gl.bind_framebuffer)(GL_FRAMEBUFFER, framebuffer);
                (gl.framebuffer_texture_2d)(
                    GL_FRAMEBUFFER,
                    GL_COLOR_ATTACHMENT0,
                    GL_TEXTURE_2D,
                    tex.0,
                    0,
                );
                (gl.bind_framebuffer)(GL_FRAMEBUFFER, bound);
            }
        }
    }

    fn render_target_ids(&mut self, rt: RenderTargetId) -> (u32, u32, u32) {
        match self.targets.get(&rt.0) {
            Some(s) => (s.framebuffer, s.color, s.depth_rbo),
            None => (0, 0, 0),
        }
    }

    fn create_image(
        &mut self,
        dpy: DisplayHandle,
        ctx: Option<ContextHandle>,
        tex: TextureId,
    ) -> Option<ImageHandle> {
        let fns = self.exports?;
        let ctx_ptr = ctx.map(|c| c.0 as *mut c_void).unwrap_or(ptr::null_mut());
        let image = unsafe {
            (fns.create_image)(
                dpy.0 as *mut c_void,
                ctx_ptr,
                EGL_GL_TEXTURE_2D_KHR,
                tex.0 as usize as *mut c_void,
                ptr::null(),
            )
        };
        if image.is_null() {
            debug!("image wrapper creation failed for texture {}", tex.0);
            return None;
        }
        Some(ImageHandle(image as usize))
    }

    fn destroy_image(&mut self, dpy: DisplayHandle, img: ImageHandle) {
        if let Some(fns) = self.exports {
            unsafe { (fns.destroy_image)(dpy.0 as *mut c_void, img.0 as *mut c_void) };
        }
    }

    fn query_image_layout(&mut self, dpy: DisplayHandle, img: ImageHandle) -> Option<ImageLayout> {
        let fns = self.exports?;
        let mut fourcc: i32 = 0;
        let mut planes: i32 = 0;
        let ok = unsafe {
            (fns.query_image)(
                dpy.0 as *mut c_void,
                img.0 as *mut c_void,
                &mut fourcc,
                &mut planes,
                ptr::null_mut(),
            )
        };
        if ok == 0 || planes < 0 {
            return None;
        }
        Some(ImageLayout {
            format: fourcc as u32,
            planes: planes as u32,
        })
    }

    fn export_image(&mut self, dpy: DisplayHandle, img: ImageHandle) -> Option<ExportedImage> {
        let fns = self.exports?;
        let mut fd: i32 = -1;
        let mut stride: i32 = 0;
        let mut offset: i32 = 0;
        let ok = unsafe {
            (fns.export_image)(
                dpy.0 as *mut c_void,
                img.0 as *mut c_void,
                &mut fd,
                &mut stride,
                &mut offset,
            )
        };
        if ok == 0 || fd < 0 {
            return None;
        }
        Some(ExportedImage {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
            stride: stride.max(0) as u32,
        })
    }
}

impl HeadlessContext<EglDriver> {
    /// A context over the machine's real driver stack.
    pub fn native() -> Result<Self> {
        Ok(Self::new(EglDriver::new()?))
    }
}
