//! Setup configuration and environment overrides

use std::env;

use crate::driver::ContextHandle;

/// Environment variable naming the render-node device path.
pub const DEVICE_NODE_ENV: &str = "RNODE_DEVICE";

/// Environment variable that forces the readback path unconditionally.
pub const NO_DMABUF_ENV: &str = "RNODE_NO_DMABUF";

/// Environment variables overriding the context version hint.
pub const GL_MAJOR_ENV: &str = "RNODE_GL_MAJOR";
pub const GL_MINOR_ENV: &str = "RNODE_GL_MINOR";

/// Default render node when neither an explicit path nor
/// [`DEVICE_NODE_ENV`] is given.
pub const DEFAULT_DEVICE_NODE: &str = "/dev/dri/renderD128";

/// Rendering API requested at setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Api {
    /// Desktop OpenGL
    OpenGl,
    /// OpenGL ES 2+
    Gles,
    /// Accepted for forward compatibility; setup always reports `NoApi`.
    Vulkan,
}

/// Context and swapchain configuration for [`setup`].
///
/// [`setup`]: crate::context::HeadlessContext::setup
#[derive(Debug, Clone)]
pub struct SetupConfig {
    /// Requested bits per color channel
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
    /// Depth buffer bits; a non-zero value also selects a depth+stencil
    /// layout for the built-in render target
    pub depth: u8,
    pub api: Api,
    /// Context version hint; zero major means "driver default"
    pub major: u32,
    pub minor: u32,
    /// Explicit profile mask forwarded to context creation
    pub profile_mask: Option<u32>,
    /// Explicit context flags forwarded to context creation
    pub context_flags: Option<u32>,
    /// Share state with an existing context
    pub shared_context: Option<ContextHandle>,
    /// Stop after device/display initialization, skipping context creation
    pub display_only: bool,
    /// Allocate the swapchain pair and wrap the current buffer in a
    /// render target
    pub builtin_fbo: bool,
    /// Tag swapchain buffers with a packed transfer format (fourcc)
    pub packed_format: Option<u32>,
}

impl Default for SetupConfig {
    /// 8-bit RGB with one alpha bit, a 16-bit depth buffer, desktop GL with
    /// the built-in render target, version hint from the environment
    /// (fallback 2.1).
    fn default() -> Self {
        Self {
            red: 8,
            green: 8,
            blue: 8,
            alpha: 1,
            depth: 16,
            api: Api::OpenGl,
            major: env_u32(GL_MAJOR_ENV, 2),
            minor: env_u32(GL_MINOR_ENV, 1),
            profile_mask: None,
            context_flags: None,
            shared_context: None,
            display_only: false,
            builtin_fbo: true,
            packed_format: None,
        }
    }
}

fn env_u32(name: &str, fallback: u32) -> u32 {
    match env::var(name) {
        Ok(v) => v.trim().parse().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test owns all env mutation for these keys to avoid races
    // between parallel test threads.
    #[test]
    fn version_hint_from_environment() {
        env::remove_var(GL_MAJOR_ENV);
        env::remove_var(GL_MINOR_ENV);
        let cfg = SetupConfig::default();
        assert_eq!((cfg.major, cfg.minor), (2, 1));

        env::set_var(GL_MAJOR_ENV, "3");
        env::set_var(GL_MINOR_ENV, "junk");
        let cfg = SetupConfig::default();
        assert_eq!((cfg.major, cfg.minor), (3, 1));

        env::remove_var(GL_MAJOR_ENV);
        env::remove_var(GL_MINOR_ENV);
    }

    #[test]
    fn default_requests_builtin_target() {
        let cfg = SetupConfig::default();
        assert!(cfg.builtin_fbo);
        assert_eq!(cfg.depth, 16);
        assert_eq!(cfg.api, Api::OpenGl);
    }
}
