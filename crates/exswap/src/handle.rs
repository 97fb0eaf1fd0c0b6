use std::fmt;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};

/// Bytes per pixel of the fixed RGBA8 export format.
pub const BYTES_PER_PIXEL: u64 = 4;

/// One exportable GPU memory block handed from the producer to the consumer.
///
/// The descriptor is process-local and single-use: importing it transfers the
/// file descriptor into the graphics driver, after which the handle reports
/// itself as invalid. A handle dropped before it was imported closes its
/// descriptor.
#[derive(Default)]
pub struct ExHandle {
    id: i32,
    descriptor: Option<OwnedFd>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Total size of the backing memory in bytes.
    pub size: u64,
}

impl ExHandle {
    /// Wraps an exported memory descriptor. The pixel format is always RGBA8.
    pub fn new(id: i32, descriptor: OwnedFd, width: u32, height: u32, size: u64) -> Self {
        Self {
            id,
            descriptor: Some(descriptor),
            width,
            height,
            size,
        }
    }

    /// A handle carrying no descriptor. Used to pre-fill swapchain slots.
    pub fn empty(id: i32) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Producer-assigned frame identity.
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Byte size of a tightly packed RGBA8 image of the given dimensions.
    pub fn packed_size(width: u32, height: u32) -> u64 {
        u64::from(width) * u64::from(height) * BYTES_PER_PIXEL
    }

    pub fn has_descriptor(&self) -> bool {
        self.descriptor.is_some()
    }

    /// True when the handle may be passed to the importer.
    pub fn is_importable(&self) -> bool {
        self.descriptor.is_some() && self.size > 0 && self.width > 0 && self.height > 0
    }

    pub fn descriptor(&self) -> Option<BorrowedFd<'_>> {
        self.descriptor.as_ref().map(AsFd::as_fd)
    }

    /// Raw descriptor number for diagnostics, `-1` once consumed.
    pub fn raw_descriptor(&self) -> RawFd {
        self.descriptor.as_ref().map_or(-1, AsRawFd::as_raw_fd)
    }

    /// Moves the descriptor out, leaving the handle invalid.
    pub fn take_descriptor(&mut self) -> Option<OwnedFd> {
        self.descriptor.take()
    }
}

impl fmt::Debug for ExHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExHandle")
            .field("id", &self.id)
            .field("fd", &self.raw_descriptor())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("size", &self.size)
            .finish()
    }
}
