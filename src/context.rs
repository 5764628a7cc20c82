//! Headless rendering-context manager
//!
//! One [`HeadlessContext`] owns the full chain of GPU state for a single
//! consumer connection: render node, display connection, rendering context,
//! swapchain, optional render target, and the export record. Resources are
//! created in strict dependency order and released in exact reverse order;
//! teardown is idempotent and tolerates driver failures (handles are nulled
//! regardless of what the driver reports).

use std::env;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::{Api, SetupConfig, NO_DMABUF_ENV};
use crate::device::RenderNode;
use crate::driver::{
    AttachmentMode, ConfigRequest, ContextAttribs, ContextHandle, DisplayHandle, Driver,
};
use crate::present::ExportRecord;
use crate::surface::SharedSurface;
use crate::swapchain::{RenderTarget, Swapchain};
use crate::{Error, Result};

/// Raw driver handle values for interop with embedding code.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawHandles {
    pub display: usize,
    /// Always zero: this backend renders off-screen with no surface.
    pub surface: usize,
    pub context: usize,
}

/// Connection-scoped GPU context state.
pub struct HeadlessContext<D: Driver> {
    pub(crate) driver: D,
    pub(crate) node: Option<RenderNode>,
    pub(crate) display: Option<DisplayHandle>,
    pub(crate) context: Option<ContextHandle>,
    /// True once this backend created the context (as opposed to an
    /// inherited one, which is never destroyed here).
    pub(crate) managed: bool,
    pub(crate) dmabuf_capable: bool,
    pub(crate) no_pass: bool,
    pub(crate) swapchain: Option<Swapchain>,
    pub(crate) render_target: Option<RenderTarget>,
    pub(crate) export: ExportRecord,
}

impl<D: Driver> HeadlessContext<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            node: None,
            display: None,
            context: None,
            managed: false,
            dmabuf_capable: false,
            no_pass: env::var_os(NO_DMABUF_ENV).is_some(),
            swapchain: None,
            render_target: None,
            export: ExportRecord::default(),
        }
    }

    /// Acquire device, display, context, and (optionally) the swapchain.
    ///
    /// Re-entrant: with a live display the device/display steps are skipped
    /// and only the context and buffers are (re)configured. An existing
    /// context is never silently replaced, so callers can rebind buffers
    /// without losing GPU state.
    pub fn setup<S: SharedSurface>(&mut self, con: &S, cfg: &SetupConfig) -> Result<()> {
        match cfg.api {
            Api::OpenGl | Api::Gles => {
                if self.display.is_none() && !self.driver.bind_api(cfg.api) {
                    return Err(Error::NoApi);
                }
            }
            Api::Vulkan => return Err(Error::NoApi),
        }

        if self.display.is_none() {
            if let Err(e) = self.ensure_device(None) {
                warn!("device pipeline failed during setup: {e}");
                return Err(Error::NoDisplay);
            }
            let device = match &self.node {
                Some(node) => node.device(),
                None => return Err(Error::NoDisplay),
            };
            let dpy = self.driver.get_display(device).ok_or(Error::NoDisplay)?;
            if !self.driver.initialize_display(dpy) {
                return Err(Error::NoEgl);
            }
            self.display = Some(dpy);
            if cfg.display_only {
                return Ok(());
            }
        }

        // Context (re)configuration; reached directly on the reuse path.
        let dpy = self.display.ok_or(Error::NoDisplay)?;
        let request = ConfigRequest {
            red: cfg.red,
            green: cfg.green,
            blue: cfg.blue,
            alpha: cfg.alpha,
            depth: cfg.depth,
            api: cfg.api,
        };
        let config = self
            .driver
            .choose_config(dpy, &request)
            .ok_or(Error::NoConfig)?;

        let mut context_reuse = false;
        if let Some(ctx) = self.context {
            debug!("reusing live context {:#x}", ctx.0);
            context_reuse = true;
        } else {
            let attribs = ContextAttribs {
                version: (cfg.major > 0).then_some((cfg.major, cfg.minor)),
                profile_mask: cfg.profile_mask,
                flags: cfg.context_flags,
                shared: cfg.shared_context,
            };
            let ctx = self
                .driver
                .create_context(dpy, config, &attribs)
                .ok_or(Error::NoContext)?;
            self.context = Some(ctx);
        }

        self.managed = true;
        self.driver.make_current(dpy, self.context);

        if cfg.builtin_fbo || cfg.packed_format.is_some() {
            if context_reuse {
                if let Some(rt) = self.render_target.take() {
                    rt.release(&mut self.driver);
                }
                if let Some(sc) = self.swapchain.take() {
                    sc.release(&mut self.driver);
                }
            }

            let (width, height) = (con.width(), con.height());
            let sc = Swapchain::new(&mut self.driver, width, height, cfg.packed_format);
            if cfg.builtin_fbo {
                let mode = if cfg.depth > 0 {
                    AttachmentMode::ColorDepthStencil
                } else {
                    AttachmentMode::Color
                };
                self.render_target = Some(RenderTarget::new(
                    &mut self.driver,
                    sc.current().texture,
                    width,
                    height,
                    mode,
                ));
            }
            self.swapchain = Some(sc);
        }

        self.make_current(con)
    }

    /// Rebind the context and apply the render-target resize policy for
    /// the consumer's current dimensions.
    pub fn make_current<S: SharedSurface>(&mut self, con: &S) -> Result<()> {
        let dpy = self.display.ok_or(Error::NoDisplay)?;
        self.driver.make_current(dpy, self.context);
        self.refresh_render_target(con.width(), con.height());
        Ok(())
    }

    /// Resize the render target in place when the consumer dimensions
    /// changed, then (re)activate it.
    pub(crate) fn refresh_render_target(&mut self, width: u32, height: u32) {
        let Some(rt) = self.render_target.as_mut() else {
            return;
        };
        if rt.width != width || rt.height != height {
            self.driver.bind_render_target(None);
            rt.resize(&mut self.driver, width, height);
            if let Some(sc) = self.swapchain.as_mut() {
                let cur = sc.current_mut();
                cur.width = width;
                cur.height = height;
            }
            debug!("render target resized to {}x{}", width, height);
        }
        self.driver.bind_render_target(Some(rt.id));
    }

    /// Open (or switch to) a render node and refresh the export
    /// capability. A switch while a device is active tears down the
    /// context, swapchain, and render target first: switching GPUs
    /// invalidates all dependent state.
    pub fn switch_node(&mut self, path: &Path) -> Result<()> {
        self.ensure_device(Some(path))
    }

    pub(crate) fn ensure_device(&mut self, requested: Option<&Path>) -> Result<()> {
        if let Some(path) = requested {
            let switching = self.node.as_ref().is_some_and(|n| n.path() != path);
            if switching {
                info!("render node switch to {}", path.display());
                self.teardown();
            }
        }
        if self.node.is_none() {
            self.node = Some(RenderNode::acquire(&mut self.driver, requested)?);
        }
        // Capability may differ per device, so re-resolve on every pass.
        self.dmabuf_capable = self.driver.resolve_export_functions();
        Ok(())
    }

    /// Destroy the context and its buffers while keeping the display and
    /// device alive for a later `setup` reuse. Returns false when there is
    /// nothing to drop.
    pub fn drop_context(&mut self) -> bool {
        if self.display.is_none() {
            return false;
        }
        if let Some(rt) = self.render_target.take() {
            rt.release(&mut self.driver);
        }
        if let Some(sc) = self.swapchain.take() {
            sc.release(&mut self.driver);
        }
        if let (Some(dpy), Some(ctx)) = (self.display, self.context.take()) {
            self.driver.make_current(dpy, None);
            self.driver.destroy_context(dpy, ctx);
        }
        self.managed = false;
        true
    }

    /// Full reverse-order teardown. Idempotent; driver failures are
    /// tolerated and owned handles are nulled regardless. Returns false
    /// when nothing was active.
    pub fn teardown(&mut self) -> bool {
        let had_state = self.node.is_some() || self.display.is_some() || self.context.is_some();

        if let Some(rt) = self.render_target.take() {
            rt.release(&mut self.driver);
        }
        if let Some(sc) = self.swapchain.take() {
            sc.release(&mut self.driver);
        }
        if let (Some(dpy), Some(ctx)) = (self.display, self.context.take()) {
            if self.managed {
                self.driver.make_current(dpy, None);
                self.driver.destroy_context(dpy, ctx);
            }
        }
        if let Some(dpy) = self.display.take() {
            if self.managed {
                self.driver.terminate_display(dpy);
            }
        }
        if let Some(node) = self.node.take() {
            node.release(&mut self.driver);
        }
        self.export.clear();
        self.managed = false;
        had_state
    }

    /// Raw (framebuffer, color, depth) ids of the built-in render target.
    pub fn gl_handles(&mut self) -> Option<(u32, u32, u32)> {
        self.display?;
        let rt = self.render_target.as_ref()?;
        Some(self.driver.render_target_ids(rt.id))
    }

    /// Raw display/surface/context values for embedding interop.
    pub fn raw_handles(&self) -> Option<RawHandles> {
        let display = self.display?;
        Some(RawHandles {
            display: display.0,
            surface: 0,
            context: self.context.map(|c| c.0).unwrap_or(0),
        })
    }

    pub fn is_managed(&self) -> bool {
        self.managed
    }

    /// True when the full export entry-point set resolved for the current
    /// device.
    pub fn dmabuf_capable(&self) -> bool {
        self.dmabuf_capable
    }

    /// Force (or re-allow) the readback path regardless of capability.
    pub fn set_no_handle_passing(&mut self, no_pass: bool) {
        self.no_pass = no_pass;
    }

    pub fn display(&self) -> Option<DisplayHandle> {
        self.display
    }

    pub fn swapchain(&self) -> Option<&Swapchain> {
        self.swapchain.as_ref()
    }

    pub fn render_target(&self) -> Option<&RenderTarget> {
        self.render_target.as_ref()
    }

    pub fn node(&self) -> Option<&RenderNode> {
        self.node.as_ref()
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}

impl<D: Driver> Drop for HeadlessContext<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}
