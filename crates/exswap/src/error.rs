use std::os::fd::RawFd;

/// Failures reported by a [`ContextPlatform`](crate::gl::ContextPlatform).
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("no graphics context is current on this thread")]
    NoCurrentContext,
    #[error("failed to create shared context: {0}")]
    Create(String),
    #[error("failed to create offscreen surface: {0}")]
    Surface(String),
    #[error("failed to make context current: {0}")]
    MakeCurrent(String),
    #[error("graphics platform unavailable: {0}")]
    Unavailable(String),
}

/// Negotiation failed; no import may be attempted.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("failed to load OpenGL entry points")]
    LoaderFailed,
    #[error("driver lacks required extensions: {}", .0.join(", "))]
    MissingExtensions(Vec<&'static str>),
    #[error("driver reports no usable texture tiling for RGBA8")]
    NoTilingSupport,
    #[error("external memory support is already initialized")]
    AlreadyInitialized,
    #[error(transparent)]
    Context(#[from] ContextError),
}

/// A single frame could not be imported. The caller keeps showing the
/// previous texture and tries again with the next frame.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("invalid handle (fd={fd}, size={size}, {width}x{height})")]
    InvalidHandle {
        fd: RawFd,
        size: u64,
        width: u32,
        height: u32,
    },
    #[error("external memory support is not initialized")]
    NotInitialized,
    #[error("driver returned no memory object")]
    MemoryObject,
    #[error("driver returned no texture object")]
    Texture,
    #[error("{op} failed with GL error {code:#06x}")]
    Driver { op: &'static str, code: u32 },
    #[error(transparent)]
    Context(#[from] ContextError),
}
