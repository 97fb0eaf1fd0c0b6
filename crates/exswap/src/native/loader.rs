use std::ffi::{c_void, CStr};
use std::os::fd::{IntoRawFd, OwnedFd};
use std::os::raw::c_char;

use gl::types::{GLenum, GLint, GLsizei, GLubyte, GLuint, GLuint64};
use tracing::{debug, warn};

use crate::gl::{
    DeviceUuid, GlDriver, GlEnum, GlName, GlVersion, ProcResolver, TilingMode,
    DEVICE_UUID_EXT, HANDLE_TYPE_OPAQUE_FD_EXT, NO_ERROR, NUM_TILING_TYPES_EXT, RGBA8,
    TEXTURE_2D, TEXTURE_TILING_EXT, TILING_TYPES_EXT, UUID_SIZE_EXT,
};

type CreateMemoryObjectsFn = unsafe extern "system" fn(n: GLsizei, memory_objects: *mut GLuint);
type DeleteMemoryObjectsFn =
    unsafe extern "system" fn(n: GLsizei, memory_objects: *const GLuint);
type ImportMemoryFdFn =
    unsafe extern "system" fn(memory: GLuint, size: GLuint64, handle_type: GLenum, fd: GLint);
type TexStorageMem2DFn = unsafe extern "system" fn(
    target: GLenum,
    levels: GLsizei,
    internal_format: GLenum,
    width: GLsizei,
    height: GLsizei,
    memory: GLuint,
    offset: GLuint64,
);
type GetUnsignedByteIndexedFn =
    unsafe extern "system" fn(target: GLenum, index: GLuint, data: *mut GLubyte);

/// `EXT_memory_object` entry points; the `gl` crate only generates core ones.
#[derive(Default)]
struct MemoryObjectFns {
    create: Option<CreateMemoryObjectsFn>,
    delete: Option<DeleteMemoryObjectsFn>,
    import_fd: Option<ImportMemoryFdFn>,
    tex_storage_2d: Option<TexStorageMem2DFn>,
    get_unsigned_bytei_v: Option<GetUnsignedByteIndexedFn>,
}

impl MemoryObjectFns {
    fn load(resolver: ProcResolver<'_>) -> Self {
        // SAFETY: each name is resolved against the current context and cast
        // to the prototype from the EXT_memory_object(_fd) registry entry.
        unsafe {
            Self {
                create: resolve(resolver, "glCreateMemoryObjectsEXT"),
                delete: resolve(resolver, "glDeleteMemoryObjectsEXT"),
                import_fd: resolve(resolver, "glImportMemoryFdEXT"),
                tex_storage_2d: resolve(resolver, "glTexStorageMem2DEXT"),
                get_unsigned_bytei_v: resolve(resolver, "glGetUnsignedBytei_vEXT"),
            }
        }
    }
}

unsafe fn resolve<F: Copy>(resolver: ProcResolver<'_>, name: &str) -> Option<F> {
    debug_assert_eq!(std::mem::size_of::<F>(), std::mem::size_of::<*const c_void>());
    let ptr = resolver(name);
    if ptr.is_null() {
        debug!(name, "GL entry point not available");
        return None;
    }
    Some(std::mem::transmute_copy::<*const c_void, F>(&ptr))
}

/// [`GlDriver`] over the system OpenGL library.
///
/// The `gl` crate keeps its function table in process globals, so there is
/// one live table at a time; `load` rebinds it to the current context.
#[derive(Default)]
pub struct NativeGl {
    ext: MemoryObjectFns,
    loaded: bool,
}

impl NativeGl {
    pub fn new() -> Self {
        Self::default()
    }

    fn string(name: GLenum) -> Option<String> {
        if !gl::GetString::is_loaded() {
            return None;
        }
        let raw = unsafe { gl::GetString(name) };
        if raw.is_null() {
            return None;
        }
        let text = unsafe { CStr::from_ptr(raw as *const c_char) };
        Some(text.to_string_lossy().into_owned())
    }

    fn extensions(&self) -> Vec<String> {
        if gl::GetStringi::is_loaded() && gl::GetIntegerv::is_loaded() {
            let mut count: GLint = 0;
            unsafe { gl::GetIntegerv(gl::NUM_EXTENSIONS, &mut count) };
            let mut names = Vec::with_capacity(count.max(0) as usize);
            for index in 0..count.max(0) as GLuint {
                let raw = unsafe { gl::GetStringi(gl::EXTENSIONS, index) };
                if raw.is_null() {
                    continue;
                }
                let name = unsafe { CStr::from_ptr(raw as *const c_char) };
                names.push(name.to_string_lossy().into_owned());
            }
            if !names.is_empty() {
                return names;
            }
        }
        // Pre-3.0 and ES 2 contexts only expose the space separated list.
        Self::string(gl::EXTENSIONS)
            .map(|list| list.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default()
    }
}

impl GlDriver for NativeGl {
    fn load(&mut self, resolver: ProcResolver<'_>) -> Option<GlVersion> {
        gl::load_with(|name| resolver(name));
        self.ext = MemoryObjectFns::load(resolver);
        self.loaded = gl::GetString::is_loaded() && gl::GetError::is_loaded();
        if !self.loaded {
            return None;
        }
        let raw = Self::string(gl::VERSION)?;
        let version = GlVersion::parse(&raw);
        if version.is_none() {
            warn!(version = %raw, "unrecognised GL_VERSION string");
        }
        version
    }

    fn has_extension(&self, name: &str) -> bool {
        let present = self.extensions().iter().any(|ext| ext == name);
        // The string is not enough; the entry points must resolve too.
        present
            && match name {
                crate::gl::EXT_MEMORY_OBJECT => {
                    self.ext.create.is_some()
                        && self.ext.delete.is_some()
                        && self.ext.tex_storage_2d.is_some()
                }
                crate::gl::EXT_MEMORY_OBJECT_FD => self.ext.import_fd.is_some(),
                _ => true,
            }
    }

    fn vendor(&self) -> String {
        Self::string(gl::VENDOR).unwrap_or_default()
    }

    fn device_uuid(&self) -> DeviceUuid {
        let mut uuid = [0u8; UUID_SIZE_EXT];
        if let Some(get) = self.ext.get_unsigned_bytei_v {
            unsafe { get(DEVICE_UUID_EXT, 0, uuid.as_mut_ptr()) };
        }
        DeviceUuid(uuid)
    }

    fn num_tiling_types(&self) -> i32 {
        if !gl::GetInternalformativ::is_loaded() {
            return 0;
        }
        let mut count: GLint = 0;
        unsafe {
            gl::GetInternalformativ(TEXTURE_2D, RGBA8, NUM_TILING_TYPES_EXT, 1, &mut count);
        }
        count
    }

    fn tiling_types(&self, count: usize) -> Vec<GlEnum> {
        if count == 0 || !gl::GetInternalformativ::is_loaded() {
            return Vec::new();
        }
        let mut types: Vec<GLint> = vec![0; count];
        unsafe {
            gl::GetInternalformativ(
                TEXTURE_2D,
                RGBA8,
                TILING_TYPES_EXT,
                count as GLsizei,
                types.as_mut_ptr(),
            );
        }
        types.into_iter().map(|value| value as GlEnum).collect()
    }

    fn get_error(&self) -> GlEnum {
        if !self.loaded {
            return NO_ERROR;
        }
        unsafe { gl::GetError() }
    }

    fn create_memory_object(&self) -> GlName {
        let mut memory: GLuint = 0;
        if let Some(create) = self.ext.create {
            unsafe { create(1, &mut memory) };
        }
        memory
    }

    fn import_memory_fd(&self, memory: GlName, size: u64, fd: OwnedFd) {
        match self.ext.import_fd {
            Some(import) => unsafe {
                import(memory, size, HANDLE_TYPE_OPAQUE_FD_EXT, fd.into_raw_fd());
            },
            None => warn!("glImportMemoryFdEXT missing, descriptor closed"),
        }
    }

    fn delete_memory_object(&self, memory: GlName) {
        if let Some(delete) = self.ext.delete {
            unsafe { delete(1, &memory) };
        }
    }

    fn gen_texture(&self) -> GlName {
        let mut texture: GLuint = 0;
        unsafe { gl::GenTextures(1, &mut texture) };
        texture
    }

    fn bind_texture(&self, texture: GlName) {
        unsafe { gl::BindTexture(TEXTURE_2D, texture) };
    }

    fn set_texture_tiling(&self, tiling: TilingMode) {
        unsafe {
            gl::TexParameteri(TEXTURE_2D, TEXTURE_TILING_EXT, tiling.gl_enum() as GLint);
        }
    }

    fn texture_storage_mem_2d(&self, width: u32, height: u32, memory: GlName) {
        if let Some(storage) = self.ext.tex_storage_2d {
            unsafe {
                storage(
                    TEXTURE_2D,
                    1,
                    RGBA8,
                    width as GLsizei,
                    height as GLsizei,
                    memory,
                    0,
                );
            }
        }
    }

    fn delete_texture(&self, texture: GlName) {
        unsafe { gl::DeleteTextures(1, &texture) };
    }
}
