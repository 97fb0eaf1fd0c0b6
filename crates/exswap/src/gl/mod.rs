//! OpenGL side of the exchange: turning handles into textures.
//!
//! The pieces, in the order the consumer meets them:
//! - `driver` is the narrow OpenGL surface the rest of the module calls
//!   through ([`GlDriver`]), plus the enum values and version parsing.
//! - `context` abstracts the window system ([`ContextPlatform`]) and carries
//!   the guards that keep the host's current context intact.
//! - `quirks` lists vendor overrides for tiling selection.
//! - `negotiate` probes the driver once and produces an [`ImportContext`],
//!   creating a shared GL 4.2 context when the host context is too old.
//! - `import` turns an [`ExHandle`](crate::ExHandle) into an
//!   [`ImportedTexture`] inside the negotiated context.
//! - `extra` bundles all of the above behind [`GlExtra`], the type consumers
//!   actually hold.

mod context;
mod driver;
mod extra;
mod import;
mod negotiate;
mod quirks;

#[cfg(test)]
pub(crate) mod fake;

pub use context::{Binding, ContextPlatform, PlatformBinding, ScopedContext};
pub use driver::{
    error_name, DeviceUuid, GlDriver, GlEnum, GlName, GlVersion, ProcResolver,
    DEVICE_UUID_EXT, EXT_MEMORY_OBJECT, EXT_MEMORY_OBJECT_FD, EXT_SEMAPHORE,
    HANDLE_TYPE_OPAQUE_FD_EXT, INVALID_ENUM, INVALID_FRAMEBUFFER_OPERATION, INVALID_OPERATION,
    INVALID_VALUE, LINEAR_TILING_EXT, NO_ERROR, NUM_DEVICE_UUIDS_EXT, NUM_TILING_TYPES_EXT,
    OPTIMAL_TILING_EXT, OUT_OF_MEMORY, REQUIRED_EXTENSIONS, RGBA8, TEXTURE_2D,
    TEXTURE_TILING_EXT, TILING_TYPES_EXT, UUID_SIZE_EXT,
};
pub use extra::GlExtra;
pub use import::{delete_texture, import_texture, ImportedTexture};
pub use negotiate::{negotiate, Capabilities, ImportContext, TilingMode, SHARED_CONTEXT_VERSION};
pub use quirks::{QuirkTable, TilingQuirk};
