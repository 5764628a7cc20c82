//! Frame hand-off: zero-copy export with synchronous readback fallback
//!
//! Each `present` call hands exactly one finished frame to the consumer.
//! The preferred path wraps the source texture in a transient image, exports
//! it as a GPU buffer descriptor, and signals the transport with the handle.
//! Any failure along that sequence (unresolved entry points, the no-pass
//! override, a missing display, a multi-plane layout, a refused export)
//! downgrades to a blocking GPU-to-memory readback into the consumer's own
//! pixel buffer. Zero-copy is best effort, never a hard requirement.

use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use tracing::{debug, trace, warn};

use crate::context::HeadlessContext;
use crate::driver::{DisplayHandle, Driver, TextureId};
use crate::surface::{SharedSurface, SignalMask};
use crate::swapchain::Swapchain;
use crate::{Error, Result};

/// Frame source for [`HeadlessContext::present`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentSource {
    /// The current built-in swapchain buffer
    Builtin,
    /// A caller-provided texture
    Texture(TextureId),
}

/// Bookkeeping for the most recent exported descriptor.
///
/// At most one descriptor is outstanding at any time: replacing it closes
/// the previous one only after the new export has been confirmed valid, so
/// the consumer never observes a gap and nothing leaks.
#[derive(Default)]
pub(crate) struct ExportRecord {
    fd: Option<OwnedFd>,
    stride: u32,
    format: u32,
}

impl ExportRecord {
    /// Adopt a confirmed export; the previously held descriptor closes.
    pub(crate) fn replace(&mut self, fd: OwnedFd, stride: u32, format: u32) {
        self.fd = Some(fd);
        self.stride = stride;
        self.format = format;
    }

    pub(crate) fn clear(&mut self) {
        self.fd = None;
        self.stride = 0;
        self.format = 0;
    }

    pub(crate) fn descriptor(&self) -> Option<BorrowedFd<'_>> {
        self.fd.as_ref().map(|fd| fd.as_fd())
    }

    pub(crate) fn layout(&self) -> Option<(u32, u32)> {
        self.fd.as_ref().map(|_| (self.stride, self.format))
    }
}

/// Signal results beyond this value are reported as exactly this value.
const MAX_SIGNAL_RESULT: u64 = i32::MAX as u64;

fn saturate(res: u64) -> u32 {
    res.min(MAX_SIGNAL_RESULT) as u32
}

impl<D: Driver> HeadlessContext<D> {
    /// Hand one frame to the consumer and signal the transport.
    ///
    /// `display` overrides the context's own display connection for the
    /// export step. The returned value is the transport's signal result,
    /// saturated to `i32::MAX`.
    pub fn present<S: SharedSurface>(
        &mut self,
        con: &mut S,
        display: Option<DisplayHandle>,
        mask: SignalMask,
        source: PresentSource,
    ) -> Result<u32> {
        let tex = match source {
            PresentSource::Texture(tex) => tex,
            PresentSource::Builtin => self.rotate_builtin(con)?,
        };

        let Some(dpy) = display.or(self.display) else {
            return Ok(saturate(self.readback_signal(con, mask, tex)));
        };
        if self.no_pass || !self.dmabuf_capable {
            trace!("handle passing unavailable, using readback");
            return Ok(saturate(self.readback_signal(con, mask, tex)));
        }

        match self.try_export(con, dpy, mask, tex) {
            Some(res) => Ok(saturate(res)),
            None => Ok(saturate(self.readback_signal(con, mask, tex))),
        }
    }

    /// The most recently exported descriptor, if one is still in flight.
    pub fn exported_descriptor(&self) -> Option<BorrowedFd<'_>> {
        self.export.descriptor()
    }

    /// (stride, format tag) recorded with the outstanding descriptor.
    pub fn exported_layout(&self) -> Option<(u32, u32)> {
        self.export.layout()
    }

    /// Prepare the built-in source: stream consumer pixels when no render
    /// target backs the current buffer, then ping-pong. Returns the texture
    /// holding the finished frame.
    fn rotate_builtin<S: SharedSurface>(&mut self, con: &mut S) -> Result<TextureId> {
        if !self.managed {
            return Err(Error::NotManaged);
        }
        let (width, height) = (con.width(), con.height());

        let mut sc = match self.swapchain.take() {
            Some(sc) => sc,
            None => Swapchain::new(&mut self.driver, width, height, None),
        };
        self.refresh_render_target(width, height);

        if self.render_target.is_none() {
            // Raw streaming upload instead of render-target indirection;
            // dimension changes force a full store reallocation.
            if sc.ensure_dimensions(&mut self.driver, width, height) {
                debug!("stream store resynchronized at {}x{}", width, height);
            }
            self.driver
                .upload_texture(sc.current().texture, width, height, con.pixels_mut());
            self.driver.flush();
        }

        let tex = sc.current().texture;
        sc.flip();
        if let Some(rt) = &self.render_target {
            // Swap the color attachment so rendering continues into the new
            // current buffer, and carry the attachment metadata over to the
            // exported one so it stays queryable.
            self.driver.set_color_attachment(rt.id, sc.current().texture);
            let (width, height) = (rt.width, rt.height);
            let cur = sc.current_mut();
            cur.width = width;
            cur.height = height;
            let prev = sc.prev_mut();
            prev.width = width;
            prev.height = height;
        }
        self.swapchain = Some(sc);
        Ok(tex)
    }

    /// Attempt the zero-copy sequence; `None` means "fall back".
    fn try_export<S: SharedSurface>(
        &mut self,
        con: &mut S,
        dpy: DisplayHandle,
        mask: SignalMask,
        tex: TextureId,
    ) -> Option<u64> {
        let image = self.driver.create_image(dpy, self.context, tex)?;

        let layout = match self.driver.query_image_layout(dpy, image) {
            Some(layout) => layout,
            None => {
                self.driver.destroy_image(dpy, image);
                return None;
            }
        };
        if layout.planes != 1 {
            debug!("unsupported {}-plane export layout", layout.planes);
            self.driver.destroy_image(dpy, image);
            return None;
        }

        let exported = match self.driver.export_image(dpy, image) {
            Some(exported) => exported,
            None => {
                warn!("descriptor export refused by driver");
                self.driver.destroy_image(dpy, image);
                return None;
            }
        };

        let res = con.signal_with_handle(mask, exported.fd.as_fd(), exported.stride, layout.format);
        self.driver.destroy_image(dpy, image);
        self.export.replace(exported.fd, exported.stride, layout.format);
        Some(res)
    }

    /// Blocking readback into the consumer's pixel buffer, then a plain
    /// signal. The render target is deactivated around the readback and
    /// reactivated after.
    fn readback_signal<S: SharedSurface>(
        &mut self,
        con: &mut S,
        mask: SignalMask,
        tex: TextureId,
    ) -> u64 {
        let (width, height) = (con.width(), con.height());
        let bound = self.render_target.as_ref().map(|rt| rt.id);

        if bound.is_some() {
            self.driver.bind_render_target(None);
        }
        self.driver.read_texture(tex, width, height, con.pixels_mut());
        if let Some(id) = bound {
            self.driver.bind_render_target(Some(id));
        }
        con.signal(mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SetupConfig;
    use crate::pixel::{self, Pixel};
    use crate::swapchain::Slot;
    use crate::testing::{scratch_node, FakeDriver, MemorySurface};
    use std::os::fd::AsRawFd;
    use std::path::PathBuf;

    fn ready(cfg: &SetupConfig) -> (HeadlessContext<FakeDriver>, MemorySurface, PathBuf) {
        ready_with(FakeDriver::new(), cfg, 64, 64)
    }

    fn ready_with(
        driver: FakeDriver,
        cfg: &SetupConfig,
        w: u32,
        h: u32,
    ) -> (HeadlessContext<FakeDriver>, MemorySurface, PathBuf) {
        let path = scratch_node("present");
        let mut ctx = HeadlessContext::new(driver);
        ctx.switch_node(&path).expect("node");
        let con = MemorySurface::new(w, h);
        ctx.setup(&con, cfg).expect("setup");
        (ctx, con, path)
    }

    fn stream_config() -> SetupConfig {
        SetupConfig {
            builtin_fbo: false,
            packed_format: Some(pixel::fourcc::DRM_FORMAT_ARGB8888),
            ..SetupConfig::default()
        }
    }

    #[test]
    fn ping_pong_parity() {
        let (mut ctx, mut con, path) = ready(&SetupConfig::default());
        for n in 0..6u32 {
            let slot = ctx.swapchain().expect("sc").current_slot();
            let expect = if n % 2 == 0 { Slot::A } else { Slot::B };
            assert_eq!(slot, expect, "before present {n}");
            ctx.present(&mut con, None, SignalMask::VIDEO, PresentSource::Builtin)
                .expect("present");
        }
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn builtin_without_managed_context_is_rejected() {
        let path = scratch_node("unmanaged");
        let mut ctx = HeadlessContext::new(FakeDriver::new());
        ctx.switch_node(&path).expect("node");
        let mut con = MemorySurface::new(8, 8);
        let err = ctx
            .present(&mut con, None, SignalMask::VIDEO, PresentSource::Builtin)
            .unwrap_err();
        assert!(matches!(err, Error::NotManaged));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn export_signals_with_handle_and_records_descriptor() {
        let (mut ctx, mut con, path) = ready(&SetupConfig::default());
        ctx.present(&mut con, None, SignalMask::VIDEO, PresentSource::Builtin)
            .expect("present");

        let sig = con.signals.last().expect("signal");
        let handle = sig.handle.as_ref().expect("handle-carrying signal");
        assert_eq!(handle.format, pixel::fourcc::DRM_FORMAT_ARGB8888);
        assert_eq!(handle.stride, 64 * 4);
        assert!(ctx.exported_descriptor().is_some());
        assert_eq!(
            ctx.exported_layout(),
            Some((64 * 4, pixel::fourcc::DRM_FORMAT_ARGB8888))
        );
        // The transient image wrapper never outlives the call.
        assert_eq!(ctx.driver().live_images, 0);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn one_descriptor_outstanding_and_released_on_teardown() {
        let (mut ctx, mut con, path) = ready(&SetupConfig::default());
        for _ in 0..4 {
            ctx.present(&mut con, None, SignalMask::VIDEO, PresentSource::Builtin)
                .expect("present");
        }
        let raw = ctx.exported_descriptor().expect("descriptor").as_raw_fd();
        assert!(unsafe { libc::fcntl(raw, libc::F_GETFD) } != -1);

        // Closing the connection releases the one outstanding descriptor.
        ctx.teardown();
        assert!(ctx.exported_descriptor().is_none());
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn no_pass_override_falls_back_with_equivalent_pixels() {
        let (mut ctx, mut con, path) = ready(&stream_config());
        ctx.set_no_handle_passing(true);

        pixel::fill(&mut con.pixels, Pixel::opaque(0x20, 0x40, 0x80));
        ctx.present(&mut con, None, SignalMask::VIDEO, PresentSource::Builtin)
            .expect("present");

        let sig = con.signals.last().expect("signal");
        assert!(sig.handle.is_none(), "override must suppress the handle");
        assert_eq!(ctx.driver().image_creations, 0);
        assert_eq!(ctx.driver().uploads, 1, "stream path uploads once");
        assert!(ctx.driver().flushes >= 1, "queue flushed before hand-off");
        // The streamed frame round-trips through the GPU store back into
        // the consumer buffer unchanged.
        for chunk in con.pixels.chunks_exact(pixel::BYTES_PER_PIXEL) {
            assert_eq!(Pixel::read_from(chunk), Pixel::opaque(0x20, 0x40, 0x80));
        }
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn missing_capability_never_attempts_export() {
        let mut driver = FakeDriver::new();
        driver.export_available = false;
        let (mut ctx, mut con, path) = ready_with(driver, &SetupConfig::default(), 64, 64);
        assert!(!ctx.dmabuf_capable());

        for _ in 0..3 {
            ctx.present(&mut con, None, SignalMask::VIDEO, PresentSource::Builtin)
                .expect("present");
        }
        assert_eq!(ctx.driver().image_creations, 0);
        assert!(con.signals.iter().all(|s| s.handle.is_none()));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn export_step_failures_degrade_to_readback() {
        let cases: [fn(&mut FakeDriver); 4] = [
            |d| d.fail_create_image = true,
            |d| d.fail_query_layout = true,
            |d| d.planes = 2,
            |d| d.fail_export = true,
        ];
        for setup in cases {
            let mut driver = FakeDriver::new();
            setup(&mut driver);
            let (mut ctx, mut con, path) = ready_with(driver, &SetupConfig::default(), 32, 32);
            ctx.present(&mut con, None, SignalMask::VIDEO, PresentSource::Builtin)
                .expect("present");

            let sig = con.signals.last().expect("signal");
            assert!(sig.handle.is_none());
            assert_eq!(ctx.driver().readbacks, 1);
            assert_eq!(ctx.driver().live_images, 0, "transient image must not leak");
            std::fs::remove_file(path).ok();
        }
    }

    #[test]
    fn stream_path_reallocates_once_per_dimension_change() {
        let (mut ctx, mut con, path) = ready(&stream_config());
        let mask = SignalMask::VIDEO;
        ctx.present(&mut con, None, mask, PresentSource::Builtin).expect("p");
        let base = ctx.driver().texture_allocs;

        ctx.present(&mut con, None, mask, PresentSource::Builtin).expect("p");
        assert_eq!(ctx.driver().texture_allocs, base, "stable dims: no realloc");

        con.set_dimensions(128, 128);
        ctx.present(&mut con, None, mask, PresentSource::Builtin).expect("p");
        let grown = ctx.driver().texture_allocs;
        assert!(grown > base, "dimension change must reallocate");

        ctx.present(&mut con, None, mask, PresentSource::Builtin).expect("p");
        assert_eq!(ctx.driver().texture_allocs, grown, "one realloc per change");
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn target_resize_reuses_buffers() {
        let (mut ctx, mut con, path) = ready(&SetupConfig::default());
        let mask = SignalMask::VIDEO;
        ctx.present(&mut con, None, mask, PresentSource::Builtin).expect("p");
        let allocs = ctx.driver().texture_allocs;
        let resizes = ctx.driver().rt_resizes;

        con.set_dimensions(128, 128);
        ctx.present(&mut con, None, mask, PresentSource::Builtin).expect("p");

        assert_eq!(ctx.driver().rt_resizes, resizes + 1, "exactly one resize");
        assert_eq!(ctx.driver().texture_allocs, allocs, "no new buffer objects");
        let rt = ctx.render_target().expect("target");
        assert_eq!((rt.width, rt.height), (128, 128));
        let sc = ctx.swapchain().expect("sc");
        assert_eq!((sc.current().width, sc.current().height), (128, 128));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn caller_texture_source_skips_swapchain() {
        let (mut ctx, mut con, path) = ready(&SetupConfig::default());
        let tex = ctx.driver_mut().create_texture(64, 64);
        let slot_before = ctx.swapchain().expect("sc").current_slot();

        ctx.present(&mut con, None, SignalMask::VIDEO, PresentSource::Texture(tex))
            .expect("present");

        assert_eq!(ctx.swapchain().expect("sc").current_slot(), slot_before);
        let sig = con.signals.last().expect("signal");
        assert!(sig.handle.is_some());
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn readback_brackets_render_target_binding() {
        let (mut ctx, mut con, path) = ready(&SetupConfig::default());
        ctx.set_no_handle_passing(true);
        ctx.driver_mut().rt_binds.clear();
        ctx.present(&mut con, None, SignalMask::VIDEO, PresentSource::Builtin)
            .expect("present");

        let binds = &ctx.driver().rt_binds;
        let release = binds.iter().position(|b| b.is_none()).expect("deactivate");
        assert!(
            binds[release + 1..].iter().any(|b| b.is_some()),
            "render target must be reactivated after readback"
        );
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn signal_result_saturates() {
        let (mut ctx, mut con, path) = ready(&SetupConfig::default());
        con.next_result = u64::MAX;
        let res = ctx
            .present(&mut con, None, SignalMask::VIDEO, PresentSource::Builtin)
            .expect("present");
        assert_eq!(res, i32::MAX as u32);
        std::fs::remove_file(path).ok();
    }
}
