//! Probe binary for render-node bringup
//!
//! Walks the full acquisition chain on the local machine and reports what
//! works: device open, EGL display, context, swapchain, and whether frames
//! would go out zero-copy or through readback.

use std::os::fd::BorrowedFd;
use std::path::PathBuf;

use anyhow::{Context as _, Result};

use egl_rnode::{
    HeadlessContext, PresentSource, SetupConfig, SharedSurface, SignalMask,
};

/// Throwaway consumer surface: a plain pixel buffer plus signal counters.
struct ProbeSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    plain_signals: u32,
    handle_signals: u32,
}

impl ProbeSurface {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * egl_rnode::pixel::BYTES_PER_PIXEL],
            plain_signals: 0,
            handle_signals: 0,
        }
    }
}

impl SharedSurface for ProbeSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn resize(&mut self, width: u32, height: u32) -> bool {
        self.width = width;
        self.height = height;
        self.pixels.resize(
            width as usize * height as usize * egl_rnode::pixel::BYTES_PER_PIXEL,
            0,
        );
        true
    }

    fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    fn signal(&mut self, _mask: SignalMask) -> u64 {
        self.plain_signals += 1;
        self.plain_signals as u64
    }

    fn signal_with_handle(
        &mut self,
        _mask: SignalMask,
        _fd: BorrowedFd<'_>,
        stride: u32,
        format: u32,
    ) -> u64 {
        self.handle_signals += 1;
        println!("  descriptor received: stride={stride} format={format:#010x}");
        self.handle_signals as u64
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    println!("=== Render Node Probe ===\n");

    let node = std::env::args().nth(1).map(PathBuf::from);

    println!("Loading driver stack...");
    let mut ctx = HeadlessContext::native().context("driver libraries unavailable")?;
    println!("  EGL + GBM loaded");

    if let Some(path) = &node {
        println!("\nSwitching to {}...", path.display());
        ctx.switch_node(path).context("render node unusable")?;
    }

    let mut con = ProbeSurface::new(256, 256);

    println!("\nRunning setup (defaults, built-in render target)...");
    match ctx.setup(&con, &SetupConfig::default()) {
        Ok(()) => println!("  setup ok"),
        Err(e) => {
            println!("  setup failed: {e}");
            return Ok(());
        }
    }

    if let Some(node) = ctx.node() {
        println!("  node: {}", node.path().display());
    }
    if let Some(raw) = ctx.raw_handles() {
        println!("  display={:#x} context={:#x}", raw.display, raw.context);
    }
    if let Some((fbo, color, depth)) = ctx.gl_handles() {
        println!("  render target: fbo={fbo} color={color} depth={depth}");
    }
    println!(
        "  handle passing: {}",
        if ctx.dmabuf_capable() {
            "available"
        } else {
            "unavailable (will read back)"
        }
    );

    println!("\nPresenting one frame...");
    match ctx.present(&mut con, None, SignalMask::VIDEO, PresentSource::Builtin) {
        Ok(res) => {
            let path = if con.handle_signals > 0 {
                "zero-copy"
            } else {
                "readback"
            };
            println!("  frame delivered via {path} (signal result {res})");
        }
        Err(e) => println!("  present failed: {e}"),
    }

    Ok(())
}
