use std::ffi::c_void;
use std::ptr;
use std::sync::Arc;

use khronos_egl as egl;
use tracing::{debug, info, warn};

use crate::error::ContextError;
use crate::gl::{Binding, ContextPlatform, GlVersion};

/// Dynamically loaded `libEGL`.
pub type Egl = egl::DynamicInstance<egl::EGL1_4>;

const LIBEGL: &str = "libEGL.so.1";

// EGL_KHR_create_context; EGL 1.4 headers predate them.
const CONTEXT_MAJOR_VERSION: egl::Int = 0x3098;
const CONTEXT_MINOR_VERSION: egl::Int = 0x30FB;
const OPENGL_ES3_BIT: egl::Int = 0x0040;

/// Opens the system EGL library.
pub fn load_egl() -> Result<Arc<Egl>, ContextError> {
    let library = unsafe { libloading::Library::new(LIBEGL) }
        .map_err(|err| ContextError::Unavailable(format!("{LIBEGL}: {err}")))?;
    let egl = unsafe { Egl::load_required_from(library) }
        .map_err(|err| ContextError::Unavailable(format!("{LIBEGL}: {err}")))?;
    Ok(Arc::new(egl))
}

/// Draw and read surfaces of a binding. `None` means surfaceless.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EglSurfaces {
    pub draw: Option<egl::Surface>,
    pub read: Option<egl::Surface>,
}

impl EglSurfaces {
    fn single(surface: egl::Surface) -> Self {
        Self {
            draw: Some(surface),
            read: Some(surface),
        }
    }
}

/// [`ContextPlatform`] over EGL on one display.
#[derive(Clone)]
pub struct EglPlatform {
    egl: Arc<Egl>,
    display: egl::Display,
}

impl EglPlatform {
    pub fn new(egl: Arc<Egl>, display: egl::Display) -> Self {
        Self { egl, display }
    }

    /// Uses the display of the context current on this thread.
    pub fn from_current(egl: Arc<Egl>) -> Result<Self, ContextError> {
        let display = egl
            .get_current_display()
            .ok_or(ContextError::NoCurrentContext)?;
        Ok(Self::new(egl, display))
    }

    pub fn display(&self) -> egl::Display {
        self.display
    }

    /// `eglGetProcAddress`, shaped for [`GlDriver::load`](crate::gl::GlDriver::load).
    pub fn proc_address(&self, name: &str) -> *const c_void {
        self.egl
            .get_proc_address(name)
            .map_or(ptr::null(), |function| function as *const c_void)
    }

    fn config_of(&self, context: egl::Context) -> Result<egl::Config, ContextError> {
        let id = self
            .egl
            .query_context(self.display, context, egl::CONFIG_ID)
            .map_err(|err| ContextError::Create(format!("querying context config: {err}")))?;
        self.egl
            .choose_first_config(self.display, &[egl::CONFIG_ID, id, egl::NONE])
            .map_err(|err| ContextError::Create(format!("looking up config {id}: {err}")))?
            .ok_or_else(|| ContextError::Create(format!("config {id} not found")))
    }

    fn client_api(&self, context: egl::Context) -> egl::Enum {
        match self
            .egl
            .query_context(self.display, context, egl::CONTEXT_CLIENT_TYPE)
        {
            Ok(api) => api as egl::Enum,
            Err(_) => egl::OPENGL_API,
        }
    }

    /// Binds the client API `context` was created for. EGL tracks the
    /// current context per API, so the binding must match before making it
    /// current or querying it.
    fn bind_api_of(&self, context: egl::Context) -> Result<(), ContextError> {
        let api = self.client_api(context);
        if self.egl.query_api() == api {
            return Ok(());
        }
        self.egl
            .bind_api(api)
            .map_err(|err| ContextError::MakeCurrent(format!("binding client API: {err}")))
    }

    fn current_binding(&self) -> Option<Binding<egl::Context, EglSurfaces>> {
        let context = self.egl.get_current_context()?;
        Some(Binding {
            context,
            surface: EglSurfaces {
                draw: self.egl.get_current_surface(egl::DRAW),
                read: self.egl.get_current_surface(egl::READ),
            },
        })
    }

    fn create_context(
        &self,
        config: egl::Config,
        api: egl::Enum,
        share: Option<egl::Context>,
        version: GlVersion,
    ) -> Result<egl::Context, ContextError> {
        let previous = self.egl.query_api();
        self.egl
            .bind_api(api)
            .map_err(|err| ContextError::Create(format!("binding client API: {err}")))?;
        let created = self
            .egl
            .create_context(self.display, config, share, &version_attributes(version))
            .map_err(|err| ContextError::Create(format!("{version}: {err}")));
        if previous != api {
            if let Err(err) = self.egl.bind_api(previous) {
                warn!(%err, "failed to restore EGL client API");
            }
        }
        created
    }
}

fn other_api(api: egl::Enum) -> egl::Enum {
    if api == egl::OPENGL_API {
        egl::OPENGL_ES_API
    } else {
        egl::OPENGL_API
    }
}

fn version_attributes(version: GlVersion) -> [egl::Int; 5] {
    [
        CONTEXT_MAJOR_VERSION,
        version.major as egl::Int,
        CONTEXT_MINOR_VERSION,
        version.minor as egl::Int,
        egl::NONE,
    ]
}

impl ContextPlatform for EglPlatform {
    type Context = egl::Context;
    type Surface = EglSurfaces;

    fn current(&self) -> Option<Binding<egl::Context, EglSurfaces>> {
        if let Some(binding) = self.current_binding() {
            return Some(binding);
        }
        // A context of the other client API may be current; leave that API
        // bound when one is found.
        let bound = self.egl.query_api();
        let other = other_api(bound);
        self.egl.bind_api(other).ok()?;
        let binding = self.current_binding();
        if binding.is_none() {
            if let Err(err) = self.egl.bind_api(bound) {
                warn!(%err, "failed to restore EGL client API");
            }
        }
        binding
    }

    fn make_current(&self, binding: &Binding<egl::Context, EglSurfaces>) -> Result<(), ContextError> {
        self.bind_api_of(binding.context)?;
        self.egl
            .make_current(
                self.display,
                binding.surface.draw,
                binding.surface.read,
                Some(binding.context),
            )
            .map_err(|err| ContextError::MakeCurrent(err.to_string()))
    }

    fn clear_current(&self) -> Result<(), ContextError> {
        self.egl
            .make_current(self.display, None, None, None)
            .map_err(|err| ContextError::MakeCurrent(err.to_string()))
    }

    fn create_shared_context(
        &self,
        share: &egl::Context,
        version: GlVersion,
    ) -> Result<egl::Context, ContextError> {
        let config = self.config_of(*share)?;
        let api = self.client_api(*share);
        // Objects only share within one client API; ES hosts get the ES level
        // that imports directly.
        let version = if api == egl::OPENGL_ES_API && !version.es {
            GlVersion::es(3, 0)
        } else {
            version
        };
        let context = self.create_context(config, api, Some(*share), version)?;
        info!(%version, "created shared EGL context");
        Ok(context)
    }

    fn create_offscreen_surface(&self, context: &egl::Context) -> Result<EglSurfaces, ContextError> {
        let config = self.config_of(*context)?;
        let surface = self
            .egl
            .create_pbuffer_surface(
                self.display,
                config,
                &[egl::WIDTH, 1, egl::HEIGHT, 1, egl::NONE],
            )
            .map_err(|err| ContextError::Surface(err.to_string()))?;
        Ok(EglSurfaces::single(surface))
    }

    fn destroy_surface(&self, surface: EglSurfaces) {
        let mut destroyed = None;
        for surface in [surface.draw, surface.read].into_iter().flatten() {
            if destroyed == Some(surface) {
                continue;
            }
            if let Err(err) = self.egl.destroy_surface(self.display, surface) {
                warn!(%err, "failed to destroy EGL surface");
            }
            destroyed = Some(surface);
        }
    }

    fn destroy_context(&self, context: egl::Context) {
        if let Err(err) = self.egl.destroy_context(self.display, context) {
            warn!(%err, "failed to destroy EGL context");
        }
    }
}

/// A standalone pbuffer context on the default display, current on the
/// creating thread until dropped.
pub struct HeadlessContext {
    platform: EglPlatform,
    binding: Binding<egl::Context, EglSurfaces>,
}

impl HeadlessContext {
    pub fn create(version: GlVersion) -> Result<Self, ContextError> {
        let egl = load_egl()?;
        let display = unsafe { egl.get_display(egl::DEFAULT_DISPLAY) }
            .ok_or_else(|| ContextError::Unavailable("no default EGL display".into()))?;
        let (major, minor) = egl
            .initialize(display)
            .map_err(|err| ContextError::Unavailable(format!("eglInitialize: {err}")))?;
        debug!(major, minor, "EGL initialised");

        let (api, renderable) = if version.es {
            (egl::OPENGL_ES_API, OPENGL_ES3_BIT)
        } else {
            (egl::OPENGL_API, egl::OPENGL_BIT)
        };
        let config = egl
            .choose_first_config(
                display,
                &[
                    egl::SURFACE_TYPE,
                    egl::PBUFFER_BIT,
                    egl::RENDERABLE_TYPE,
                    renderable,
                    egl::RED_SIZE,
                    8,
                    egl::GREEN_SIZE,
                    8,
                    egl::BLUE_SIZE,
                    8,
                    egl::ALPHA_SIZE,
                    8,
                    egl::NONE,
                ],
            )
            .map_err(|err| ContextError::Create(format!("eglChooseConfig: {err}")))?
            .ok_or_else(|| ContextError::Create("no pbuffer-capable config".into()))?;

        let platform = EglPlatform::new(egl, display);
        let context = platform.create_context(config, api, None, version)?;
        let surface = match platform.create_offscreen_surface(&context) {
            Ok(surface) => surface,
            Err(err) => {
                platform.destroy_context(context);
                return Err(err);
            }
        };
        let binding = Binding { context, surface };
        let headless = Self { platform, binding };
        // Binds `api` as well, so the context is found as current afterwards.
        headless.platform.make_current(&headless.binding)?;
        info!(%version, "headless EGL context ready");
        Ok(headless)
    }

    pub fn platform(&self) -> &EglPlatform {
        &self.platform
    }
}

impl Drop for HeadlessContext {
    fn drop(&mut self) {
        if let Err(err) = self.platform.clear_current() {
            warn!(%err, "failed to release headless context");
        }
        self.platform.destroy_surface(self.binding.surface);
        self.platform.destroy_context(self.binding.context);
        if let Err(err) = self.platform.egl.terminate(self.platform.display) {
            warn!(%err, "eglTerminate failed");
        }
    }
}
