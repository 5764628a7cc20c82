//! Render-node device handle
//!
//! A render node is a GPU device path usable without display or session
//! privileges. The open descriptor and the driver device object created
//! from it are the root of every other resource lifetime in this backend.

use std::fs::OpenOptions;
use std::os::fd::{AsFd, AsRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{DEFAULT_DEVICE_NODE, DEVICE_NODE_ENV};
use crate::driver::{DeviceObject, Driver};
use crate::{Error, Result};

/// An open render node plus the device object wrapping it.
#[derive(Debug)]
pub struct RenderNode {
    path: PathBuf,
    fd: OwnedFd,
    device: DeviceObject,
}

impl RenderNode {
    /// Open a render node and wrap it in the driver's device abstraction.
    ///
    /// The node is `requested` when given, else the [`DEVICE_NODE_ENV`]
    /// override, else [`DEFAULT_DEVICE_NODE`].
    pub fn acquire<D: Driver>(driver: &mut D, requested: Option<&Path>) -> Result<Self> {
        let path = match requested {
            Some(p) => p.to_path_buf(),
            None => std::env::var_os(DEVICE_NODE_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DEVICE_NODE)),
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_CLOEXEC)
            .open(&path)
            .map_err(|source| Error::NoDevice {
                path: path.clone(),
                source,
            })?;
        let fd: OwnedFd = file.into();

        // On failure the descriptor is closed right here by OwnedFd.
        let device = driver.create_device(fd.as_fd()).ok_or(Error::NoDeviceObject)?;

        info!("acquired render node {}", path.display());
        Ok(Self { path, fd, device })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn device(&self) -> DeviceObject {
        self.device
    }

    /// Destroy the device object; the descriptor closes when `self` drops.
    pub(crate) fn release<D: Driver>(self, driver: &mut D) {
        debug!("releasing render node {}", self.path.display());
        driver.destroy_device(self.device);
    }
}

impl AsRawFd for RenderNode {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}
