//! Linux backend: system OpenGL through the `gl` crate and EGL through
//! `khronos-egl`, loaded at runtime so the library links without a GPU stack.

mod egl;
mod loader;

pub use self::egl::{load_egl, Egl, EglPlatform, EglSurfaces, HeadlessContext};
pub use self::loader::NativeGl;
