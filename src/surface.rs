//! Consumer-side shared surface contract
//!
//! The IPC transport that carries frames to the consumer process is an
//! external collaborator; this backend only needs the surface dimensions, the
//! raw pixel buffer, and the two frame-signal primitives. Everything else
//! about the transport (mapping, resize negotiation, event queues) stays on
//! the other side of this trait.

use std::os::fd::BorrowedFd;

use bitflags::bitflags;

bitflags! {
    /// Frame-delivery signal bits forwarded to the transport
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SignalMask: u32 {
        /// A video frame is ready
        const VIDEO = 1;
        /// An audio block is ready
        const AUDIO = 2;
        /// Do not block on consumer acknowledgement
        const NOBLOCK = 4;
    }
}

/// A consumer-visible surface backed by shared memory.
pub trait SharedSurface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Renegotiate the surface dimensions with the consumer.
    fn resize(&mut self, width: u32, height: u32) -> bool;

    /// The raw shared pixel buffer, `width * height * 4` bytes in the
    /// layout documented in [`crate::pixel`].
    fn pixels_mut(&mut self) -> &mut [u8];

    /// Signal a finished frame in the shared pixel buffer.
    fn signal(&mut self, mask: SignalMask) -> u64;

    /// Signal a finished frame carried by a GPU buffer descriptor. The
    /// descriptor is only borrowed for the duration of the call; ownership
    /// stays with the caller.
    fn signal_with_handle(
        &mut self,
        mask: SignalMask,
        fd: BorrowedFd<'_>,
        stride: u32,
        format: u32,
    ) -> u64;
}
