use std::fmt;

use super::driver::GlVersion;
use crate::error::ContextError;

/// A context together with the surface it is made current against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding<C, S> {
    pub context: C,
    pub surface: S,
}

pub type PlatformBinding<P> = Binding<<P as ContextPlatform>::Context, <P as ContextPlatform>::Surface>;

/// Window-system side of context management (EGL, or the host toolkit).
pub trait ContextPlatform {
    type Context: Clone + fmt::Debug;
    type Surface: Clone + fmt::Debug;

    /// Context and draw surface current on the calling thread.
    fn current(&self) -> Option<Binding<Self::Context, Self::Surface>>;
    fn make_current(
        &self,
        binding: &Binding<Self::Context, Self::Surface>,
    ) -> Result<(), ContextError>;
    /// Leaves the calling thread without a current context.
    fn clear_current(&self) -> Result<(), ContextError>;

    /// Creates a context sharing objects with `share`, derived from its
    /// configuration but requesting at least `version`.
    fn create_shared_context(
        &self,
        share: &Self::Context,
        version: GlVersion,
    ) -> Result<Self::Context, ContextError>;
    fn create_offscreen_surface(&self, context: &Self::Context)
        -> Result<Self::Surface, ContextError>;

    fn destroy_surface(&self, surface: Self::Surface);
    fn destroy_context(&self, context: Self::Context);
}

/// Restores the binding that was current when it was created, on every exit
/// path.
#[must_use = "the previous context is restored when the guard drops"]
pub struct ScopedContext<'p, P: ContextPlatform> {
    platform: &'p P,
    previous: Option<PlatformBinding<P>>,
}

impl<'p, P: ContextPlatform> ScopedContext<'p, P> {
    /// Remembers the current binding without switching.
    pub fn preserve(platform: &'p P) -> Self {
        Self {
            platform,
            previous: platform.current(),
        }
    }

    /// Makes `target` current for the lifetime of the guard.
    pub fn enter(platform: &'p P, target: &PlatformBinding<P>) -> Result<Self, ContextError> {
        let guard = Self::preserve(platform);
        platform.make_current(target)?;
        Ok(guard)
    }
}

impl<P: ContextPlatform> Drop for ScopedContext<'_, P> {
    fn drop(&mut self) {
        let restored = match self.previous.take() {
            Some(previous) => self.platform.make_current(&previous),
            None => self.platform.clear_current(),
        };
        if let Err(err) = restored {
            tracing::warn!(%err, "failed to restore previous GL context");
        }
    }
}

/// Shared context plus offscreen surface, destroyed on drop unless kept.
pub(crate) struct SharedContext<'p, P: ContextPlatform> {
    platform: &'p P,
    binding: Option<PlatformBinding<P>>,
}

impl<'p, P: ContextPlatform> SharedContext<'p, P> {
    /// Creates a shared context with an offscreen surface, leaving the
    /// current binding untouched.
    pub(crate) fn create(
        platform: &'p P,
        share: &P::Context,
        version: GlVersion,
    ) -> Result<Self, ContextError> {
        let context = platform.create_shared_context(share, version)?;
        let surface = match platform.create_offscreen_surface(&context) {
            Ok(surface) => surface,
            Err(err) => {
                platform.destroy_context(context);
                return Err(err);
            }
        };
        Ok(Self {
            platform,
            binding: Some(Binding { context, surface }),
        })
    }

    pub(crate) fn binding(&self) -> Option<&PlatformBinding<P>> {
        self.binding.as_ref()
    }

    pub(crate) fn keep(mut self) -> Option<PlatformBinding<P>> {
        self.binding.take()
    }
}

impl<P: ContextPlatform> Drop for SharedContext<'_, P> {
    fn drop(&mut self) {
        if let Some(binding) = self.binding.take() {
            release_binding(self.platform, binding);
        }
    }
}

pub(crate) fn release_binding<P: ContextPlatform>(platform: &P, binding: PlatformBinding<P>) {
    tracing::debug!(context = ?binding.context, "destroying shared GL context");
    platform.destroy_surface(binding.surface);
    platform.destroy_context(binding.context);
}
