//! GPU frame exchange between a wallpaper producer and its display consumer.
//!
//! The producer renders into exportable memory and publishes each frame as an
//! [`ExHandle`]; the consumer imports the newest one as an OpenGL texture:
//!
//! ```text
//!   producer thread                                  consumer thread
//!   acquire_write ─▶ render ─▶ commit_write ─┐
//!                                            ▼
//!                                   TripleSwapchain (3 slots)
//!                                            │
//!                         acquire_read ◀─────┘
//!                              │ ExHandle
//!                              ▼
//!   GlExtra::init (once) ─▶ GlExtra::import ─▶ ImportedTexture ─▶ draw
//!                              │
//!                         release_read
//! ```
//!
//! [`TripleSwapchain`] never blocks either side and always hands the consumer
//! the newest committed frame. [`GlExtra`](crate::gl::GlExtra) negotiates how the local
//! driver can import external memory, falling back to a shared GL 4.2
//! context or a low-capability path on older contexts, and performs the
//! per-frame import. The [`native`] module binds both to the system OpenGL
//! and EGL libraries on Linux.

pub mod error;
pub mod gl;
mod handle;
#[cfg(target_os = "linux")]
pub mod native;
mod swapchain;

pub use error::{ContextError, ImportError, InitError};
pub use crate::gl::{Capabilities, GlExtra, ImportedTexture, TilingMode};
pub use handle::{ExHandle, BYTES_PER_PIXEL};
pub use swapchain::{ReadSlot, SlotState, SwapchainStats, TripleSwapchain, WriteSlot, SLOT_COUNT};
