//! Consumed driver contract
//!
//! Everything this backend needs from the GPU driver stack is collected in
//! one trait so that the context manager never talks to EGL or GL directly.
//! The production implementation lives in [`crate::egl`]; tests substitute
//! an in-memory fake. All operations are blocking; implementations report
//! failure through `Option`/`bool` and log the out-of-band driver error
//! themselves.

use std::os::fd::{BorrowedFd, OwnedFd};

use crate::config::Api;

/// Opaque driver device object created from an open render-node descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceObject(pub usize);

/// Opaque display connection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayHandle(pub usize);

/// Opaque pixel configuration handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigHandle(pub usize);

/// Opaque rendering context handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextHandle(pub usize);

/// GPU texture object name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureId(pub u32);

/// Off-screen render target (framebuffer object) id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetId(pub u32);

/// Transient image wrapper handle used during buffer export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHandle(pub usize);

/// Pixel configuration request for [`Driver::choose_config`].
#[derive(Debug, Clone)]
pub struct ConfigRequest {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
    pub depth: u8,
    pub api: Api,
}

/// Context creation attributes for [`Driver::create_context`].
#[derive(Debug, Clone, Default)]
pub struct ContextAttribs {
    /// Explicit (major, minor) version request; `None` leaves the driver
    /// at its default
    pub version: Option<(u32, u32)>,
    pub profile_mask: Option<u32>,
    pub flags: Option<u32>,
    pub shared: Option<ContextHandle>,
}

/// Plane layout reported for an exportable image.
#[derive(Debug, Clone, Copy)]
pub struct ImageLayout {
    /// fourcc format tag
    pub format: u32,
    /// Number of memory planes; only single-plane layouts are exportable
    pub planes: u32,
}

/// An image exported as a GPU buffer descriptor.
#[derive(Debug)]
pub struct ExportedImage {
    pub fd: OwnedFd,
    /// Row stride in bytes
    pub stride: u32,
}

/// Attachment layout of an off-screen render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentMode {
    Color,
    ColorDepthStencil,
}

pub trait Driver {
    // Device
    fn create_device(&mut self, fd: BorrowedFd<'_>) -> Option<DeviceObject>;
    fn destroy_device(&mut self, dev: DeviceObject);

    /// Re-resolve the buffer-export entry points. Returns true only when
    /// the full set resolved; partial resolution counts as unavailable.
    fn resolve_export_functions(&mut self) -> bool;

    // Display and context
    fn get_display(&mut self, dev: DeviceObject) -> Option<DisplayHandle>;
    fn initialize_display(&mut self, dpy: DisplayHandle) -> bool;
    fn terminate_display(&mut self, dpy: DisplayHandle);
    fn bind_api(&mut self, api: Api) -> bool;
    fn choose_config(&mut self, dpy: DisplayHandle, req: &ConfigRequest) -> Option<ConfigHandle>;
    fn create_context(
        &mut self,
        dpy: DisplayHandle,
        cfg: ConfigHandle,
        attribs: &ContextAttribs,
    ) -> Option<ContextHandle>;
    fn destroy_context(&mut self, dpy: DisplayHandle, ctx: ContextHandle);

    /// Bind `ctx` (or release the current binding) with no on-screen
    /// surface attached.
    fn make_current(&mut self, dpy: DisplayHandle, ctx: Option<ContextHandle>) -> bool;

    // Texture storage
    fn create_texture(&mut self, width: u32, height: u32) -> TextureId;
    fn delete_texture(&mut self, tex: TextureId);
    fn upload_texture(&mut self, tex: TextureId, width: u32, height: u32, pixels: &[u8]);

    /// Synchronous GPU-to-system-memory readback of `tex` into `out`.
    fn read_texture(&mut self, tex: TextureId, width: u32, height: u32, out: &mut [u8]);

    /// Force completion of queued GPU commands.
    fn flush(&mut self);

    // Render targets
    fn create_render_target(
        &mut self,
        color: TextureId,
        width: u32,
        height: u32,
        mode: AttachmentMode,
    ) -> RenderTargetId;
    fn destroy_render_target(&mut self, rt: RenderTargetId);

    /// Resize the attachments in place; no new buffer objects are created.
    fn resize_render_target(&mut self, rt: RenderTargetId, width: u32, height: u32);
    fn bind_render_target(&mut self, rt: Option<RenderTargetId>);

    /// Swap the color attachment to `tex`, adopting the target's current
    /// dimensions.
    fn set_color_attachment(&mut self, rt: RenderTargetId, tex: TextureId);

    /// Raw (framebuffer, color, depth) object names backing `rt`.
    fn render_target_ids(&mut self, rt: RenderTargetId) -> (u32, u32, u32);

    // Buffer export
    fn create_image(
        &mut self,
        dpy: DisplayHandle,
        ctx: Option<ContextHandle>,
        tex: TextureId,
    ) -> Option<ImageHandle>;
    fn destroy_image(&mut self, dpy: DisplayHandle, img: ImageHandle);
    fn query_image_layout(&mut self, dpy: DisplayHandle, img: ImageHandle) -> Option<ImageLayout>;
    fn export_image(&mut self, dpy: DisplayHandle, img: ImageHandle) -> Option<ExportedImage>;
}
