//! Double-buffered render-target swapchain
//!
//! Two same-size GPU buffers alternate as the render destination so a frame
//! can be exported while the next one is drawn. Exactly one buffer is
//! current at any time; the other holds the most recently handed-off frame.

use tracing::debug;

use crate::driver::{AttachmentMode, Driver, RenderTargetId, TextureId};

/// Backing storage for one swapchain slot.
#[derive(Debug, Clone, Copy)]
pub struct BufferStore {
    pub width: u32,
    pub height: u32,
    pub texture: TextureId,
    /// Packed transfer-format tag (fourcc) when packed output was requested
    pub format: Option<u32>,
}

/// Swapchain slot identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    A,
    B,
}

/// The buffer pair. Owned exclusively by the context manager; buffers are
/// never handed out by reference beyond a single call.
pub struct Swapchain {
    a: BufferStore,
    b: BufferStore,
    current: Slot,
}

impl Swapchain {
    /// Allocate a same-size pair; slot A starts current.
    pub fn new<D: Driver>(driver: &mut D, width: u32, height: u32, format: Option<u32>) -> Self {
        let a = BufferStore {
            width,
            height,
            texture: driver.create_texture(width, height),
            format,
        };
        let b = BufferStore {
            width,
            height,
            texture: driver.create_texture(width, height),
            format,
        };
        debug!("allocated swapchain pair {}x{}", width, height);
        Self {
            a,
            b,
            current: Slot::A,
        }
    }

    pub fn current_slot(&self) -> Slot {
        self.current
    }

    pub fn current(&self) -> &BufferStore {
        match self.current {
            Slot::A => &self.a,
            Slot::B => &self.b,
        }
    }

    pub fn current_mut(&mut self) -> &mut BufferStore {
        match self.current {
            Slot::A => &mut self.a,
            Slot::B => &mut self.b,
        }
    }

    /// The most recently exported buffer.
    pub fn prev(&self) -> &BufferStore {
        match self.current {
            Slot::A => &self.b,
            Slot::B => &self.a,
        }
    }

    pub fn prev_mut(&mut self) -> &mut BufferStore {
        match self.current {
            Slot::A => &mut self.b,
            Slot::B => &mut self.a,
        }
    }

    /// Ping-pong the current slot.
    pub fn flip(&mut self) {
        self.current = match self.current {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        };
    }

    /// Reallocate the pair if the recorded dimensions differ from the
    /// requested ones. Returns true when a reallocation happened; repeated
    /// calls at stable dimensions are free.
    pub fn ensure_dimensions<D: Driver>(&mut self, driver: &mut D, width: u32, height: u32) -> bool {
        if self.a.width == width && self.a.height == height {
            return false;
        }
        for store in [&mut self.a, &mut self.b] {
            driver.delete_texture(store.texture);
            store.texture = driver.create_texture(width, height);
            store.width = width;
            store.height = height;
        }
        debug!("swapchain reallocated at {}x{}", width, height);
        true
    }

    /// Release both buffers.
    pub fn release<D: Driver>(self, driver: &mut D) {
        driver.delete_texture(self.a.texture);
        driver.delete_texture(self.b.texture);
    }
}

/// Wraps the current swapchain buffer as a color (+ depth/stencil)
/// attachment for built-in off-screen rendering.
pub struct RenderTarget {
    pub(crate) id: RenderTargetId,
    pub width: u32,
    pub height: u32,
    pub mode: AttachmentMode,
}

impl RenderTarget {
    pub fn new<D: Driver>(
        driver: &mut D,
        color: TextureId,
        width: u32,
        height: u32,
        mode: AttachmentMode,
    ) -> Self {
        let id = driver.create_render_target(color, width, height, mode);
        Self {
            id,
            width,
            height,
            mode,
        }
    }

    /// Resize the attachments in place; buffer objects are reused.
    pub fn resize<D: Driver>(&mut self, driver: &mut D, width: u32, height: u32) {
        driver.resize_render_target(self.id, width, height);
        self.width = width;
        self.height = height;
    }

    pub fn release<D: Driver>(self, driver: &mut D) {
        driver.destroy_render_target(self.id);
    }
}
