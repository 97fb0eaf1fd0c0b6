use tracing::{debug, info};

use super::context::ContextPlatform;
use super::driver::{DeviceUuid, GlDriver, ProcResolver};
use super::import::{self, ImportedTexture};
use super::negotiate::{negotiate, Capabilities, ImportContext, TilingMode};
use super::quirks::QuirkTable;
use crate::error::{ImportError, InitError};
use crate::handle::ExHandle;

/// Consumer-side owner of the negotiated import state.
///
/// Create one per consumer, call [`init`](GlExtra::init) once with the host
/// context current, then [`import`](GlExtra::import) each frame. Dropping it
/// releases the shared context if negotiation created one; textures that are
/// still alive must be deleted before that.
pub struct GlExtra<G: GlDriver, P: ContextPlatform> {
    gl: G,
    platform: P,
    quirks: QuirkTable,
    state: Option<ImportContext<P>>,
}

impl<G: GlDriver, P: ContextPlatform> GlExtra<G, P> {
    pub fn new(gl: G, platform: P) -> Self {
        Self::with_quirks(gl, platform, QuirkTable::builtin())
    }

    pub fn with_quirks(gl: G, platform: P, quirks: QuirkTable) -> Self {
        Self {
            gl,
            platform,
            quirks,
            state: None,
        }
    }

    /// Negotiates capabilities against the current context.
    pub fn init(&mut self, resolver: ProcResolver<'_>) -> Result<&Capabilities, InitError> {
        if self.state.is_some() {
            return Err(InitError::AlreadyInitialized);
        }
        let negotiated = negotiate(&mut self.gl, &self.platform, resolver, &self.quirks)?;
        info!(
            tiling = %negotiated.capabilities().tiling,
            low_capability = negotiated.capabilities().low_capability,
            shared_context = negotiated.capabilities().shared_context,
            "external memory import ready"
        );
        Ok(self.state.insert(negotiated).capabilities())
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    pub fn capabilities(&self) -> Option<&Capabilities> {
        self.state.as_ref().map(ImportContext::capabilities)
    }

    pub fn tiling(&self) -> Option<TilingMode> {
        self.capabilities().map(|caps| caps.tiling)
    }

    pub fn device_uuid(&self) -> Option<DeviceUuid> {
        self.capabilities().map(|caps| caps.device_uuid)
    }

    pub fn driver(&self) -> &G {
        &self.gl
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Imports one frame. On success the handle's descriptor now belongs to
    /// the driver.
    pub fn import(&self, handle: &mut ExHandle) -> Result<ImportedTexture, ImportError> {
        let ctx = self.state.as_ref().ok_or(ImportError::NotInitialized)?;
        import::import_texture(&self.gl, &self.platform, ctx, handle)
    }

    pub fn delete_texture(&self, texture: ImportedTexture) {
        match self.state.as_ref() {
            Some(ctx) => import::delete_texture(&self.gl, &self.platform, ctx, texture),
            None => {
                // No shared context to switch to.
                self.gl.delete_texture(texture.name());
                self.gl.delete_memory_object(texture.memory_object());
            }
        }
    }

    /// Releases the negotiated state. `init` may be called again afterwards.
    pub fn shutdown(&mut self) {
        if let Some(ctx) = self.state.take() {
            debug!(shared = ctx.shared().is_some(), "shutting down external memory import");
            ctx.release(&self.platform);
        }
    }
}

impl<G: GlDriver, P: ContextPlatform> Drop for GlExtra<G, P> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
