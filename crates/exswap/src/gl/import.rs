use tracing::{debug, error, warn};

use super::context::{ContextPlatform, ScopedContext};
use super::driver::{error_name, GlDriver, GlName, INVALID_ENUM, NO_ERROR};
use super::negotiate::ImportContext;
use crate::error::ImportError;
use crate::handle::ExHandle;

/// A texture backed by imported external memory.
///
/// The texture owns its memory object; [`delete_texture`] releases both.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "imported textures must be released with delete_texture"]
pub struct ImportedTexture {
    texture: GlName,
    memory: GlName,
    width: u32,
    height: u32,
}

impl ImportedTexture {
    /// GL texture name, usable in the host context.
    pub fn name(&self) -> GlName {
        self.texture
    }

    pub fn memory_object(&self) -> GlName {
        self.memory
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

fn check<G: GlDriver>(gl: &G, op: &'static str) -> Result<(), ImportError> {
    match gl.get_error() {
        NO_ERROR => Ok(()),
        code => {
            error!(op, code = error_name(code), "GL error during import");
            Err(ImportError::Driver { op, code })
        }
    }
}

/// Turns `handle` into a texture in the host context's share group.
///
/// The handle's descriptor is consumed by the driver once the memory object
/// exists; on any later failure the partially built objects are released.
/// An invalid handle fails before any driver call.
pub fn import_texture<G, P>(
    gl: &G,
    platform: &P,
    ctx: &ImportContext<P>,
    handle: &mut ExHandle,
) -> Result<ImportedTexture, ImportError>
where
    G: GlDriver,
    P: ContextPlatform,
{
    if !handle.is_importable() {
        error!(?handle, "refusing to import invalid handle");
        return Err(ImportError::InvalidHandle {
            fd: handle.raw_descriptor(),
            size: handle.size,
            width: handle.width,
            height: handle.height,
        });
    }

    let _scope = ctx
        .shared()
        .map(|binding| ScopedContext::enter(platform, binding))
        .transpose()?;
    let caps = ctx.capabilities();

    let memory = gl.create_memory_object();
    if memory == 0 {
        return Err(ImportError::MemoryObject);
    }
    let Some(fd) = handle.take_descriptor() else {
        gl.delete_memory_object(memory);
        return Err(ImportError::MemoryObject);
    };
    gl.import_memory_fd(memory, handle.size, fd);
    match gl.get_error() {
        NO_ERROR => {}
        INVALID_ENUM if caps.low_capability => {
            debug!("ignoring spurious GL_INVALID_ENUM after low-capability import");
        }
        code => {
            error!(code = error_name(code), "glImportMemoryFdEXT failed");
            gl.delete_memory_object(memory);
            return Err(ImportError::Driver {
                op: "glImportMemoryFdEXT",
                code,
            });
        }
    }

    let texture = gl.gen_texture();
    if texture == 0 {
        gl.delete_memory_object(memory);
        return Err(ImportError::Texture);
    }
    gl.bind_texture(texture);

    let backed = back_texture(gl, ctx, handle, memory);
    gl.bind_texture(0);

    if let Err(err) = backed {
        gl.delete_texture(texture);
        gl.delete_memory_object(memory);
        return Err(err);
    }

    debug!(
        frame = handle.id(),
        texture,
        memory,
        width = handle.width,
        height = handle.height,
        "imported external texture"
    );
    Ok(ImportedTexture {
        texture,
        memory,
        width: handle.width,
        height: handle.height,
    })
}

/// Allocates storage for the bound texture from `memory`. Tiling has to be
/// set first; the driver ignores it once storage exists.
fn back_texture<G, P>(
    gl: &G,
    ctx: &ImportContext<P>,
    handle: &ExHandle,
    memory: GlName,
) -> Result<(), ImportError>
where
    G: GlDriver,
    P: ContextPlatform,
{
    let caps = ctx.capabilities();
    if !caps.low_capability {
        gl.set_texture_tiling(caps.tiling);
        check(gl, "glTexParameteri(GL_TEXTURE_TILING_EXT)")?;
    }
    gl.texture_storage_mem_2d(handle.width, handle.height, memory);
    check(gl, "glTexStorageMem2DEXT")
}

/// Releases a texture and the memory object backing it.
pub fn delete_texture<G, P>(gl: &G, platform: &P, ctx: &ImportContext<P>, texture: ImportedTexture)
where
    G: GlDriver,
    P: ContextPlatform,
{
    let _scope = match ctx.shared() {
        Some(binding) => match ScopedContext::enter(platform, binding) {
            Ok(scope) => Some(scope),
            Err(err) => {
                warn!(%err, "deleting texture without switching to the shared context");
                None
            }
        },
        None => None,
    };
    gl.delete_texture(texture.texture);
    gl.delete_memory_object(texture.memory);
    let code = gl.get_error();
    if code != NO_ERROR {
        error!(code = error_name(code), texture = texture.texture, "failed to delete texture");
    }
}

#[cfg(test)]
mod tests {
    use std::os::fd::OwnedFd;

    use super::*;
    use crate::gl::driver::{INVALID_OPERATION, LINEAR_TILING_EXT, OUT_OF_MEMORY};
    use crate::gl::fake::{Call, FakeContext, FakeOp, FakePlatform, FakeWorld};
    use crate::gl::negotiate::{negotiate, TilingMode};
    use crate::gl::quirks::QuirkTable;
    use crate::gl::GlVersion;

    fn handle(id: i32, width: u32, height: u32) -> ExHandle {
        let size = ExHandle::packed_size(width, height);
        let file = tempfile::tempfile().expect("temp file");
        file.set_len(size).expect("resize");
        ExHandle::new(id, OwnedFd::from(file), width, height, size)
    }

    fn negotiated(world: &FakeWorld) -> ImportContext<FakePlatform> {
        let mut gl = world.gl();
        let platform = world.platform();
        let ctx = negotiate(&mut gl, &platform, &|_| std::ptr::null(), &QuirkTable::builtin())
            .expect("negotiated");
        world.clear_calls();
        ctx
    }

    #[test]
    fn imports_with_tiling_before_storage() {
        let world = FakeWorld::new();
        let ctx = negotiated(&world);
        let mut frame = handle(1, 64, 32);

        let texture = import_texture(&world.gl(), &world.platform(), &ctx, &mut frame)
            .expect("imported");
        assert_eq!(texture.size(), (64, 32));
        assert!(!frame.has_descriptor());

        let calls: Vec<Call> = world.calls();
        let tiling = calls
            .iter()
            .position(|c| matches!(c, Call::TextureTiling(TilingMode::Optimal)))
            .expect("tiling set");
        let storage = calls
            .iter()
            .position(|c| matches!(c, Call::TextureStorage { width: 64, height: 32, .. }))
            .expect("storage allocated");
        assert!(tiling < storage);
        assert_eq!(calls.last(), Some(&Call::BindTexture(0)));
        assert!(calls.contains(&Call::ImportMemoryFd {
            memory: texture.memory_object(),
            size: 64 * 32 * 4,
            context: Some(FakeContext::Host),
        }));

        delete_texture(&world.gl(), &world.platform(), &ctx, texture);
        assert_eq!(world.live_textures(), 0);
        assert_eq!(world.live_memory_objects(), 0);
    }

    #[test]
    fn invalid_handle_makes_no_driver_calls() {
        let world = FakeWorld::new();
        let ctx = negotiated(&world);

        let mut consumed = handle(1, 8, 8);
        drop(consumed.take_descriptor());
        let err = import_texture(&world.gl(), &world.platform(), &ctx, &mut consumed).unwrap_err();
        assert!(matches!(err, ImportError::InvalidHandle { fd: -1, .. }));

        let mut empty = handle(2, 8, 8);
        empty.size = 0;
        let err = import_texture(&world.gl(), &world.platform(), &ctx, &mut empty).unwrap_err();
        assert!(matches!(err, ImportError::InvalidHandle { size: 0, .. }));
        assert!(empty.has_descriptor());

        assert!(!world.calls().iter().any(Call::is_driver_object_call));
    }

    #[test]
    fn second_import_of_same_handle_is_rejected() {
        let world = FakeWorld::new();
        let ctx = negotiated(&world);
        let mut frame = handle(1, 8, 8);
        let texture =
            import_texture(&world.gl(), &world.platform(), &ctx, &mut frame).expect("imported");
        let err = import_texture(&world.gl(), &world.platform(), &ctx, &mut frame).unwrap_err();
        assert!(matches!(err, ImportError::InvalidHandle { .. }));
        delete_texture(&world.gl(), &world.platform(), &ctx, texture);
    }

    #[test]
    fn linear_tiling_is_applied_when_negotiated() {
        let world = FakeWorld::new();
        world.set_tilings(&[LINEAR_TILING_EXT]);
        let ctx = negotiated(&world);
        let mut frame = handle(1, 8, 8);
        let texture =
            import_texture(&world.gl(), &world.platform(), &ctx, &mut frame).expect("imported");
        assert!(world.calls().contains(&Call::TextureTiling(TilingMode::Linear)));
        delete_texture(&world.gl(), &world.platform(), &ctx, texture);
    }

    #[test]
    fn storage_failure_releases_texture_and_memory() {
        let world = FakeWorld::new();
        let ctx = negotiated(&world);
        world.fail_op(FakeOp::Storage, OUT_OF_MEMORY);
        let mut frame = handle(1, 8, 8);
        let err = import_texture(&world.gl(), &world.platform(), &ctx, &mut frame).unwrap_err();
        assert!(matches!(
            err,
            ImportError::Driver {
                code: OUT_OF_MEMORY,
                ..
            }
        ));
        assert!(!frame.has_descriptor());
        assert_eq!(world.live_textures(), 0);
        assert_eq!(world.live_memory_objects(), 0);
    }

    #[test]
    fn tiling_failure_releases_texture_and_memory() {
        let world = FakeWorld::new();
        let ctx = negotiated(&world);
        world.fail_op(FakeOp::Tiling, INVALID_OPERATION);
        let mut frame = handle(1, 8, 8);
        let err = import_texture(&world.gl(), &world.platform(), &ctx, &mut frame).unwrap_err();
        assert!(matches!(
            err,
            ImportError::Driver {
                code: INVALID_OPERATION,
                ..
            }
        ));
        assert!(!frame.has_descriptor());
        assert_eq!(world.live_textures(), 0);
        assert_eq!(world.live_memory_objects(), 0);
        // Storage is never allocated on a texture whose tiling failed.
        assert!(!world
            .calls()
            .iter()
            .any(|call| matches!(call, Call::TextureStorage { .. })));
    }

    #[test]
    fn texture_allocation_failure_releases_memory() {
        let world = FakeWorld::new();
        let ctx = negotiated(&world);
        world.refuse_textures();
        let mut frame = handle(1, 8, 8);
        let err = import_texture(&world.gl(), &world.platform(), &ctx, &mut frame).unwrap_err();
        assert!(matches!(err, ImportError::Texture));
        assert_eq!(world.live_memory_objects(), 0);
    }

    #[test]
    fn memory_object_failure_keeps_descriptor() {
        let world = FakeWorld::new();
        let ctx = negotiated(&world);
        world.refuse_memory_objects();
        let mut frame = handle(1, 8, 8);
        let err = import_texture(&world.gl(), &world.platform(), &ctx, &mut frame).unwrap_err();
        assert!(matches!(err, ImportError::MemoryObject));
        assert!(frame.has_descriptor());
    }

    #[test]
    fn shared_context_import_switches_and_restores() {
        let world = FakeWorld::new();
        world.set_host_version(GlVersion::desktop(3, 2));
        let ctx = negotiated(&world);
        let shared = ctx.shared().expect("shared context").context.clone();

        let mut frame = handle(1, 8, 8);
        let texture =
            import_texture(&world.gl(), &world.platform(), &ctx, &mut frame).expect("imported");

        let calls = world.calls();
        assert_eq!(calls.first(), Some(&Call::MakeCurrent(shared.clone())));
        assert_eq!(calls.last(), Some(&Call::MakeCurrent(FakeContext::Host)));
        assert!(calls
            .iter()
            .any(|c| matches!(c, Call::ImportMemoryFd { context: Some(current), .. } if *current == shared)));
        assert_eq!(world.current_context(), Some(FakeContext::Host));
        delete_texture(&world.gl(), &world.platform(), &ctx, texture);
    }

    #[test]
    fn shared_context_is_restored_after_failed_import() {
        let world = FakeWorld::new();
        world.set_host_version(GlVersion::desktop(3, 2));
        let ctx = negotiated(&world);
        world.fail_op(FakeOp::Storage, INVALID_OPERATION);
        let mut frame = handle(1, 8, 8);
        assert!(import_texture(&world.gl(), &world.platform(), &ctx, &mut frame).is_err());
        assert_eq!(world.current_context(), Some(FakeContext::Host));
    }

    #[test]
    fn low_capability_skips_tiling_and_tolerates_invalid_enum() {
        let world = FakeWorld::new();
        world.set_host_version(GlVersion::desktop(3, 2));
        world.refuse_shared_contexts();
        let ctx = negotiated(&world);
        assert!(ctx.capabilities().low_capability);
        world.fail_op(FakeOp::Import, INVALID_ENUM);

        let mut frame = handle(1, 8, 8);
        let texture =
            import_texture(&world.gl(), &world.platform(), &ctx, &mut frame).expect("imported");
        assert!(!world
            .calls()
            .iter()
            .any(|c| matches!(c, Call::TextureTiling(_))));
        delete_texture(&world.gl(), &world.platform(), &ctx, texture);
    }

    #[test]
    fn import_error_is_fatal_outside_low_capability() {
        let world = FakeWorld::new();
        let ctx = negotiated(&world);
        world.fail_op(FakeOp::Import, INVALID_ENUM);
        let mut frame = handle(1, 8, 8);
        let err = import_texture(&world.gl(), &world.platform(), &ctx, &mut frame).unwrap_err();
        assert!(matches!(err, ImportError::Driver { code: INVALID_ENUM, .. }));
        assert_eq!(world.live_memory_objects(), 0);
        assert_eq!(world.live_textures(), 0);
    }
}
