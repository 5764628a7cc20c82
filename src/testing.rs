//! In-memory test doubles for the driver and the consumer surface.

use std::collections::HashMap;
use std::fs::File;
use std::os::fd::{BorrowedFd, OwnedFd};
use std::path::PathBuf;

use crate::config::Api;
use crate::driver::{
    AttachmentMode, ConfigHandle, ConfigRequest, ContextAttribs, ContextHandle, DeviceObject,
    DisplayHandle, Driver, ExportedImage, ImageHandle, ImageLayout, RenderTargetId, TextureId,
};
use crate::pixel::{self, BYTES_PER_PIXEL};
use crate::surface::{SharedSurface, SignalMask};

/// Create an openable stand-in for a render node under the temp dir.
pub fn scratch_node(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "rnode-test-{}-{}-{name}",
        std::process::id(),
        std::thread::current().name().unwrap_or("t").replace("::", "-")
    ));
    File::create(&path).expect("create scratch node");
    path
}

struct FakeTexture {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

struct FakeTarget {
    color: u32,
    depth: u32,
    width: u32,
    height: u32,
}

/// Scriptable driver double with call accounting.
pub struct FakeDriver {
    // Failure injection
    pub fail_create_device: bool,
    pub fail_bind_api: bool,
    pub fail_get_display: bool,
    pub fail_initialize: bool,
    pub fail_choose_config: bool,
    pub fail_create_context: bool,
    pub fail_create_image: bool,
    pub fail_query_layout: bool,
    pub fail_export: bool,
    /// Whether the export entry points resolve
    pub export_available: bool,
    /// Plane count reported by the layout query
    pub planes: u32,

    // Accounting
    pub texture_allocs: usize,
    pub context_creations: usize,
    pub rt_resizes: usize,
    pub rt_binds: Vec<Option<u32>>,
    pub uploads: usize,
    pub readbacks: usize,
    pub flushes: usize,
    pub image_creations: usize,
    pub live_images: usize,
    pub live_devices: usize,

    textures: HashMap<u32, FakeTexture>,
    targets: HashMap<u32, FakeTarget>,
    images: HashMap<usize, u32>,
    next_texture: u32,
    next_target: u32,
    next_image: usize,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self {
            fail_create_device: false,
            fail_bind_api: false,
            fail_get_display: false,
            fail_initialize: false,
            fail_choose_config: false,
            fail_create_context: false,
            fail_create_image: false,
            fail_query_layout: false,
            fail_export: false,
            export_available: true,
            planes: 1,
            texture_allocs: 0,
            context_creations: 0,
            rt_resizes: 0,
            rt_binds: Vec::new(),
            uploads: 0,
            readbacks: 0,
            flushes: 0,
            image_creations: 0,
            live_images: 0,
            live_devices: 0,
            textures: HashMap::new(),
            targets: HashMap::new(),
            images: HashMap::new(),
            next_texture: 1,
            next_target: 1,
            next_image: 1,
        }
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_render_targets(&self) -> usize {
        self.targets.len()
    }
}

impl Default for FakeDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for FakeDriver {
    fn create_device(&mut self, _fd: BorrowedFd<'_>) -> Option<DeviceObject> {
        if self.fail_create_device {
            return None;
        }
        self.live_devices += 1;
        Some(DeviceObject(0xd00d))
    }

    fn destroy_device(&mut self, _dev: DeviceObject) {
        self.live_devices = self.live_devices.saturating_sub(1);
    }

    fn resolve_export_functions(&mut self) -> bool {
        self.export_available
    }

    fn get_display(&mut self, _dev: DeviceObject) -> Option<DisplayHandle> {
        (!self.fail_get_display).then_some(DisplayHandle(0xd15b))
    }

    fn initialize_display(&mut self, _dpy: DisplayHandle) -> bool {
        !self.fail_initialize
    }

    fn terminate_display(&mut self, _dpy: DisplayHandle) {}

    fn bind_api(&mut self, _api: Api) -> bool {
        !self.fail_bind_api
    }

    fn choose_config(&mut self, _dpy: DisplayHandle, _req: &ConfigRequest) -> Option<ConfigHandle> {
        (!self.fail_choose_config).then_some(ConfigHandle(0xc0f6))
    }

    fn create_context(
        &mut self,
        _dpy: DisplayHandle,
        _cfg: ConfigHandle,
        _attribs: &ContextAttribs,
    ) -> Option<ContextHandle> {
        if self.fail_create_context {
            return None;
        }
        self.context_creations += 1;
        Some(ContextHandle(0xc7c7))
    }

    fn destroy_context(&mut self, _dpy: DisplayHandle, _ctx: ContextHandle) {}

    fn make_current(&mut self, _dpy: DisplayHandle, _ctx: Option<ContextHandle>) -> bool {
        true
    }

    fn create_texture(&mut self, width: u32, height: u32) -> TextureId {
        let id = self.next_texture;
        self.next_texture += 1;
        self.texture_allocs += 1;
        self.textures.insert(
            id,
            FakeTexture {
                width,
                height,
                data: vec![0; width as usize * height as usize * BYTES_PER_PIXEL],
            },
        );
        TextureId(id)
    }

    fn delete_texture(&mut self, tex: TextureId) {
        self.textures.remove(&tex.0);
    }

    fn upload_texture(&mut self, tex: TextureId, width: u32, height: u32, pixels: &[u8]) {
        self.uploads += 1;
        if let Some(t) = self.textures.get_mut(&tex.0) {
            t.width = width;
            t.height = height;
            t.data = pixels.to_vec();
        }
    }

    fn read_texture(&mut self, tex: TextureId, width: u32, height: u32, out: &mut [u8]) {
        self.readbacks += 1;
        let len = (width as usize * height as usize * BYTES_PER_PIXEL).min(out.len());
        match self.textures.get(&tex.0) {
            Some(t) if t.data.len() >= len => out[..len].copy_from_slice(&t.data[..len]),
            _ => out[..len].fill(0),
        }
    }

    fn flush(&mut self) {
        self.flushes += 1;
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
        let depth = match mode {
            AttachmentMode::Color => 0,
            AttachmentMode::ColorDepthStencil => 0x0d00 + id,
        };
        self.targets.insert(
            id,
            FakeTarget {
                color: color.0,
                depth,
                width,
                height,
            },
        );
        RenderTargetId(id)
    }

    fn destroy_render_target(&mut self, rt: RenderTargetId) {
        self.targets.remove(&rt.0);
    }

    fn resize_render_target(&mut self, rt: RenderTargetId, width: u32, height: u32) {
        self.rt_resizes += 1;
        if let Some(t) = self.targets.get_mut(&rt.0) {
            t.width = width;
            t.height = height;
            let color = t.color;
            if let Some(tex) = self.textures.get_mut(&color) {
                tex.width = width;
                tex.height = height;
                tex.data = vec![0; width as usize * height as usize * BYTES_PER_PIXEL];
            }
        }
    }

    fn bind_render_target(&mut self, rt: Option<RenderTargetId>) {
        self.rt_binds.push(rt.map(|r| r.0));
    }

    fn set_color_attachment(&mut self, rt: RenderTargetId, tex: TextureId) {
        if let Some(t) = self.targets.get_mut(&rt.0) {
            t.color = tex.0;
            let (w, h) = (t.width, t.height);
            if let Some(texture) = self.textures.get_mut(&tex.0) {
                texture.width = w;
                texture.height = h;
            }
        }
    }

    fn render_target_ids(&mut self, rt: RenderTargetId) -> (u32, u32, u32) {
        match self.targets.get(&rt.0) {
            Some(t) => (0xfb00 + rt.0, t.color, t.depth),
            None => (0, 0, 0),
        }
    }

    fn create_image(
        &mut self,
        _dpy: DisplayHandle,
        _ctx: Option<ContextHandle>,
        tex: TextureId,
    ) -> Option<ImageHandle> {
        if self.fail_create_image {
            return None;
        }
        self.image_creations += 1;
        self.live_images += 1;
        let id = self.next_image;
        self.next_image += 1;
        self.images.insert(id, tex.0);
        Some(ImageHandle(id))
    }

    fn destroy_image(&mut self, _dpy: DisplayHandle, img: ImageHandle) {
        if self.images.remove(&img.0).is_some() {
            self.live_images = self.live_images.saturating_sub(1);
        }
    }

    fn query_image_layout(&mut self, _dpy: DisplayHandle, _img: ImageHandle) -> Option<ImageLayout> {
        (!self.fail_query_layout).then_some(ImageLayout {
            format: pixel::fourcc::DRM_FORMAT_ARGB8888,
            planes: self.planes,
        })
    }

    fn export_image(&mut self, _dpy: DisplayHandle, img: ImageHandle) -> Option<ExportedImage> {
        if self.fail_export {
            return None;
        }
        let tex = self.images.get(&img.0)?;
        let width = self.textures.get(tex).map(|t| t.width).unwrap_or(0);
        let fd: OwnedFd = File::open("/dev/null").ok()?.into();
        Some(ExportedImage {
            fd,
            stride: width * BYTES_PER_PIXEL as u32,
        })
    }
}

/// Recorded transport signal.
pub struct SignalEvent {
    pub mask: SignalMask,
    pub handle: Option<HandleInfo>,
}

pub struct HandleInfo {
    pub stride: u32,
    pub format: u32,
}

/// Minimal in-memory stand-in for the shared-memory consumer surface.
pub struct MemorySurface {
    width: u32,
    height: u32,
    pub pixels: Vec<u8>,
    pub signals: Vec<SignalEvent>,
    pub next_result: u64,
}

impl MemorySurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * BYTES_PER_PIXEL],
            signals: Vec::new(),
            next_result: 1,
        }
    }

    /// Simulate a consumer-side renegotiation.
    pub fn set_dimensions(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels
            .resize(width as usize * height as usize * BYTES_PER_PIXEL, 0);
    }
}

impl SharedSurface for MemorySurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn resize(&mut self, width: u32, height: u32) -> bool {
        self.set_dimensions(width, height);
        true
    }

    fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    fn signal(&mut self, mask: SignalMask) -> u64 {
        self.signals.push(SignalEvent { mask, handle: None });
        self.next_result
    }

    fn signal_with_handle(
        &mut self,
        mask: SignalMask,
        _fd: BorrowedFd<'_>,
        stride: u32,
        format: u32,
    ) -> u64 {
        self.signals.push(SignalEvent {
            mask,
            handle: Some(HandleInfo { stride, format }),
        });
        self.next_result
    }
}
