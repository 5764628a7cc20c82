//! Headless EGL rendering over DRM render nodes with dmabuf handle passing
//!
//! This library lets a frameserver process render GPU frames without any
//! windowing system and hand them to a consumer process with minimal
//! copying. It opens a render node, brings up an off-screen EGL context on
//! top of it, double-buffers a render-target swapchain, and delivers each
//! finished frame either as a dmabuf descriptor (zero-copy) or through a
//! synchronous pixel readback when handle passing is unavailable.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Frameserver (any renderer)                 │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                 setup / make_current / present
//!                               │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        egl-rnode                            │
//! │  ┌─────────────┐  ┌──────────────┐  ┌────────────────────┐  │
//! │  │ RenderNode  │  │ Context +    │  │ Export path        │  │
//! │  │ (device fd) │  │ Swapchain    │  │ (dmabuf/readback)  │  │
//! │  └─────────────┘  └──────────────┘  └────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!               EGL / GBM / GL (loaded at runtime)
//!                               │
//! ┌─────────────────────────────────────────────────────────────┐
//! │              GPU driver (Mesa, proprietary, ...)            │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//! ┌─────────────────────────────────────────────────────────────┐
//! │        Consumer process (shared surface + descriptor)       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use egl_rnode::{HeadlessContext, PresentSource, SetupConfig, SignalMask};
//!
//! let mut ctx = HeadlessContext::native()?;
//! ctx.setup(&surface, &SetupConfig::default())?;
//! loop {
//!     // ... render into the built-in target ...
//!     ctx.present(&mut surface, None, SignalMask::VIDEO, PresentSource::Builtin)?;
//! }
//! ```
//!
//! Everything is single-threaded and blocking by design: one connection
//! object owns the whole device → context → swapchain chain, and the caller
//! drives the frame loop.

pub mod config;
pub mod context;
pub mod device;
pub mod driver;
pub mod egl;
pub mod error;
pub mod exports;
pub mod pixel;
pub mod present;
pub mod surface;
pub mod swapchain;

#[cfg(test)]
mod testing;

pub use config::{Api, SetupConfig};
pub use context::{HeadlessContext, RawHandles};
pub use device::RenderNode;
pub use driver::Driver;
pub use egl::EglDriver;
pub use error::Error;
pub use exports::{ExportFns, SymbolLookup};
pub use present::PresentSource;
pub use surface::{SharedSurface, SignalMask};

/// Result type for this crate
pub type Result<T> = std::result::Result<T, Error>;
