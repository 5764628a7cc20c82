//! Error types for the render-node backend

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Terminal status codes surfaced by setup and device acquisition.
///
/// Every variant is final for the call that produced it; the caller may
/// retry with different parameters. Zero-copy export failures inside
/// `present` never surface here; they downgrade to the readback path.
#[derive(Error, Debug)]
pub enum Error {
    #[error("requested rendering API unavailable or unbindable")]
    NoApi,

    #[error("device or display acquisition failed")]
    NoDisplay,

    #[error("EGL display initialization failed")]
    NoEgl,

    #[error("no pixel configuration matches the request")]
    NoConfig,

    #[error("context creation rejected by the driver")]
    NoContext,

    #[error("cannot open render node {path}: {source}")]
    NoDevice {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("device object creation failed")]
    NoDeviceObject,

    #[error("no managed context to present from")]
    NotManaged,

    #[error("driver library loading failed: {0}")]
    DriverLoad(String),
}
