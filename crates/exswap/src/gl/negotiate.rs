use std::fmt;
use std::str::FromStr;

use tracing::{debug, error, info, warn};

use super::context::{release_binding, ContextPlatform, PlatformBinding, ScopedContext, SharedContext};
use super::driver::{
    DeviceUuid, GlDriver, GlEnum, GlVersion, ProcResolver, LINEAR_TILING_EXT, OPTIMAL_TILING_EXT,
    REQUIRED_EXTENSIONS,
};
use super::quirks::QuirkTable;
use crate::error::{ContextError, InitError};

/// Version requested for the shared context when the host context is too old.
pub const SHARED_CONTEXT_VERSION: GlVersion = GlVersion::desktop(4, 2);

/// Memory layout of imported textures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TilingMode {
    /// Driver-chosen layout, fastest to sample.
    #[default]
    Optimal,
    /// Row-major layout.
    Linear,
}

impl TilingMode {
    pub fn gl_enum(self) -> GlEnum {
        match self {
            TilingMode::Optimal => OPTIMAL_TILING_EXT,
            TilingMode::Linear => LINEAR_TILING_EXT,
        }
    }
}

impl fmt::Display for TilingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TilingMode::Optimal => "optimal",
            TilingMode::Linear => "linear",
        })
    }
}

impl FromStr for TilingMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "optimal" => Ok(TilingMode::Optimal),
            "linear" => Ok(TilingMode::Linear),
            other => Err(format!(
                "unknown tiling mode '{other}'; expected optimal or linear"
            )),
        }
    }
}

/// Facts established by negotiation. Immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub tiling: TilingMode,
    /// Import runs against a context without tiling selection; the tiling
    /// field is then unused.
    pub low_capability: bool,
    pub shared_context: bool,
    pub device_uuid: DeviceUuid,
    pub vendor: String,
    pub version: GlVersion,
    /// A vendor quirk decided the tiling mode.
    pub vendor_override: bool,
}

/// Everything the importer needs: capabilities plus the shared context
/// imports must run in, if one was created.
pub struct ImportContext<P: ContextPlatform> {
    capabilities: Capabilities,
    shared: Option<PlatformBinding<P>>,
}

impl<P: ContextPlatform> ImportContext<P> {
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn shared(&self) -> Option<&PlatformBinding<P>> {
        self.shared.as_ref()
    }

    /// Destroys the shared context, if any.
    pub fn release(self, platform: &P) {
        if let Some(binding) = self.shared {
            release_binding(platform, binding);
        }
    }
}

impl<P: ContextPlatform> fmt::Debug for ImportContext<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportContext")
            .field("capabilities", &self.capabilities)
            .field("shared", &self.shared)
            .finish()
    }
}

/// Decides how external memory is imported in the current environment.
///
/// Runs on the consumer thread with the host context current. Whatever was
/// current on entry is current again on return, success or failure.
pub fn negotiate<G, P>(
    gl: &mut G,
    platform: &P,
    resolver: ProcResolver<'_>,
    quirks: &QuirkTable,
) -> Result<ImportContext<P>, InitError>
where
    G: GlDriver,
    P: ContextPlatform,
{
    // Declared before the guard so the host is current again before a
    // shared context that is not kept gets destroyed.
    let mut shared = None;
    let _restore = ScopedContext::preserve(platform);

    let version = gl.load(resolver).ok_or_else(|| {
        error!("failed to load OpenGL entry points");
        InitError::LoaderFailed
    })?;
    info!(%version, "OpenGL loaded");

    let missing: Vec<&'static str> = REQUIRED_EXTENSIONS
        .iter()
        .copied()
        .filter(|name| !gl.has_extension(name))
        .collect();
    if !missing.is_empty() {
        error!(?missing, "external memory extensions not available");
        return Err(InitError::MissingExtensions(missing));
    }

    let mut version = version;
    if !version.supports_direct_import() {
        info!(%version, "context too old for direct import, attempting shared {SHARED_CONTEXT_VERSION} context");
        match switch_to_shared(gl, platform, resolver) {
            Ok((context, loaded)) => {
                version = loaded;
                shared = Some(context);
            }
            Err(err) => info!(%err, "shared context not available, using low-capability import"),
        }
    }
    let low_capability = !version.supports_direct_import();

    let device_uuid = gl.device_uuid();
    let vendor = gl.vendor();
    info!(vendor = %vendor, uuid = %device_uuid, "OpenGL device");

    let (tiling, vendor_override) = if low_capability {
        (TilingMode::default(), false)
    } else {
        select_tiling(gl, &vendor, quirks)?
    };
    if low_capability {
        info!("external textures imported without tiling selection");
    } else {
        info!(%tiling, vendor_override, "external textures use {tiling} tiling");
    }

    let shared_binding = shared.and_then(SharedContext::keep);
    Ok(ImportContext {
        capabilities: Capabilities {
            tiling,
            low_capability,
            shared_context: shared_binding.is_some(),
            device_uuid,
            vendor,
            version,
            vendor_override,
        },
        shared: shared_binding,
    })
}

/// Creates a shared context, makes it current and rebinds the function
/// table to it. On failure the host context is current again with its own
/// function table.
fn switch_to_shared<'p, G, P>(
    gl: &mut G,
    platform: &'p P,
    resolver: ProcResolver<'_>,
) -> Result<(SharedContext<'p, P>, GlVersion), ContextError>
where
    G: GlDriver,
    P: ContextPlatform,
{
    let host = platform.current().ok_or(ContextError::NoCurrentContext)?;
    let shared = SharedContext::create(platform, &host.context, SHARED_CONTEXT_VERSION)?;
    let Some(binding) = shared.binding() else {
        return Err(ContextError::Create("shared context has no binding".into()));
    };
    platform.make_current(binding)?;

    match gl.load(resolver) {
        Some(version) if version.supports_direct_import() => {
            info!(%version, "shared context created");
            Ok((shared, version))
        }
        loaded => {
            if let Err(err) = platform.make_current(&host) {
                warn!(%err, "failed to switch back to host context");
            }
            drop(shared);
            if gl.load(resolver).is_none() {
                warn!("failed to reload OpenGL entry points on host context");
            }
            Err(ContextError::Create(match loaded {
                Some(version) => format!("shared context only provides {version}"),
                None => "failed to reload OpenGL entry points on shared context".into(),
            }))
        }
    }
}

fn select_tiling<G: GlDriver>(
    gl: &G,
    vendor: &str,
    quirks: &QuirkTable,
) -> Result<(TilingMode, bool), InitError> {
    let count = gl.num_tiling_types();
    if count <= 0 {
        error!("can't get texture tiling support info");
        return Err(InitError::NoTilingSupport);
    }
    // Only optimal and linear exist; anything beyond two entries is noise.
    let reported = gl.tiling_types(count.min(2) as usize);
    let optimal = reported.contains(&OPTIMAL_TILING_EXT);
    let linear = reported.contains(&LINEAR_TILING_EXT);
    debug!(optimal, linear, "driver tiling support");

    let preferred = match (optimal, linear) {
        (true, _) => TilingMode::Optimal,
        (false, true) => TilingMode::Linear,
        (false, false) => {
            error!("no supported tiling mode");
            return Err(InitError::NoTilingSupport);
        }
    };

    match quirks.lookup(vendor) {
        Some(quirk) => {
            let supported = match quirk.tiling {
                TilingMode::Optimal => optimal,
                TilingMode::Linear => linear,
            };
            if supported {
                info!(vendor, note = %quirk.note, "vendor quirk forces {} tiling", quirk.tiling);
                Ok((quirk.tiling, true))
            } else {
                Ok((preferred, false))
            }
        }
        None => Ok((preferred, false)),
    }
}
