use std::ffi::c_void;
use std::fmt;
use std::os::fd::OwnedFd;

use super::negotiate::TilingMode;

/// OpenGL object name. Zero is never a valid object.
pub type GlName = u32;
pub type GlEnum = u32;

/// Maps an entry point name to its address in the current context, or null.
pub type ProcResolver<'a> = &'a dyn Fn(&str) -> *const c_void;

pub const NO_ERROR: GlEnum = 0;
pub const INVALID_ENUM: GlEnum = 0x0500;
pub const INVALID_VALUE: GlEnum = 0x0501;
pub const INVALID_OPERATION: GlEnum = 0x0502;
pub const OUT_OF_MEMORY: GlEnum = 0x0505;
pub const INVALID_FRAMEBUFFER_OPERATION: GlEnum = 0x0506;

pub const TEXTURE_2D: GlEnum = 0x0DE1;
pub const RGBA8: GlEnum = 0x8058;
pub const TEXTURE_TILING_EXT: GlEnum = 0x9580;
pub const NUM_TILING_TYPES_EXT: GlEnum = 0x9582;
pub const TILING_TYPES_EXT: GlEnum = 0x9583;
pub const OPTIMAL_TILING_EXT: GlEnum = 0x9584;
pub const LINEAR_TILING_EXT: GlEnum = 0x9585;
pub const HANDLE_TYPE_OPAQUE_FD_EXT: GlEnum = 0x9586;
pub const NUM_DEVICE_UUIDS_EXT: GlEnum = 0x9596;
pub const DEVICE_UUID_EXT: GlEnum = 0x9597;
pub const UUID_SIZE_EXT: usize = 16;

pub const EXT_MEMORY_OBJECT: &str = "GL_EXT_memory_object";
pub const EXT_MEMORY_OBJECT_FD: &str = "GL_EXT_memory_object_fd";
pub const EXT_SEMAPHORE: &str = "GL_EXT_semaphore";

/// Extensions without which external memory cannot be imported at all.
pub const REQUIRED_EXTENSIONS: [&str; 3] = [EXT_MEMORY_OBJECT, EXT_MEMORY_OBJECT_FD, EXT_SEMAPHORE];

/// Symbolic name of a `glGetError` code for log output.
pub fn error_name(code: GlEnum) -> &'static str {
    match code {
        NO_ERROR => "GL_NO_ERROR",
        INVALID_ENUM => "GL_INVALID_ENUM",
        INVALID_VALUE => "GL_INVALID_VALUE",
        INVALID_OPERATION => "GL_INVALID_OPERATION",
        OUT_OF_MEMORY => "GL_OUT_OF_MEMORY",
        INVALID_FRAMEBUFFER_OPERATION => "GL_INVALID_FRAMEBUFFER_OPERATION",
        _ => "unknown GL error",
    }
}

/// API flavour and version of a loaded context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlVersion {
    pub major: u32,
    pub minor: u32,
    pub es: bool,
}

impl GlVersion {
    pub const fn desktop(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            es: false,
        }
    }

    pub const fn es(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            es: true,
        }
    }

    /// Parses a `GL_VERSION` string such as `4.6 (Core Profile) Mesa 24.0`
    /// or `OpenGL ES 3.2 NVIDIA 550.54`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let (es, rest) = match trimmed.strip_prefix("OpenGL ES") {
            Some(rest) => (true, rest.trim_start_matches(['-', 'C', 'M']).trim_start()),
            None => (false, trimmed),
        };
        let number = rest.split_whitespace().next()?;
        let mut parts = number.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts
            .next()
            .and_then(|part| {
                let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
                digits.parse().ok()
            })
            .unwrap_or(0);
        Some(Self { major, minor, es })
    }

    /// Whether the external memory entry points including tiling selection
    /// are usable directly: desktop GL 4.2 or GL ES 3.0.
    pub fn supports_direct_import(&self) -> bool {
        let minimum = if self.es { (3, 0) } else { (4, 2) };
        (self.major, self.minor) >= minimum
    }
}

impl fmt::Display for GlVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.es {
            write!(f, "GL ES {}.{}", self.major, self.minor)
        } else {
            write!(f, "GL {}.{}", self.major, self.minor)
        }
    }
}

/// Identity of the physical GPU, compared against the producer's device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct DeviceUuid(pub [u8; UUID_SIZE_EXT]);

impl DeviceUuid {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for DeviceUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// The slice of OpenGL the negotiator and importer talk to.
///
/// Implementations hold a function table bound to whichever context was
/// current during the last [`load`](GlDriver::load); every other method
/// assumes a context is current on the calling thread.
pub trait GlDriver {
    /// Resolves the function table against the current context and reports
    /// its version, or `None` if core entry points are missing.
    fn load(&mut self, resolver: ProcResolver<'_>) -> Option<GlVersion>;
    fn has_extension(&self, name: &str) -> bool;
    fn vendor(&self) -> String;
    fn device_uuid(&self) -> DeviceUuid;
    /// `GL_NUM_TILING_TYPES_EXT` for 2-D RGBA8 textures.
    fn num_tiling_types(&self) -> i32;
    /// The first `count` entries of `GL_TILING_TYPES_EXT` for 2-D RGBA8.
    fn tiling_types(&self, count: usize) -> Vec<GlEnum>;
    fn get_error(&self) -> GlEnum;

    fn create_memory_object(&self) -> GlName;
    /// Imports `fd` into `memory`. The driver owns the descriptor afterwards.
    fn import_memory_fd(&self, memory: GlName, size: u64, fd: OwnedFd);
    fn delete_memory_object(&self, memory: GlName);

    fn gen_texture(&self) -> GlName;
    fn bind_texture(&self, texture: GlName);
    /// Tags the bound texture's tiling. Must precede storage allocation.
    fn set_texture_tiling(&self, tiling: TilingMode);
    /// Backs the bound texture with one RGBA8 level from `memory`.
    fn texture_storage_mem_2d(&self, width: u32, height: u32, memory: GlName);
    fn delete_texture(&self, texture: GlName);
}
