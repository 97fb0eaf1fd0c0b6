//! Recording stand-ins for the GL driver and context platform.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::os::fd::OwnedFd;
use std::rc::Rc;

use super::context::{Binding, ContextPlatform};
use super::driver::{
    DeviceUuid, GlDriver, GlEnum, GlName, GlVersion, ProcResolver, NO_ERROR, OPTIMAL_TILING_EXT,
    REQUIRED_EXTENSIONS,
};
use super::negotiate::TilingMode;
use crate::error::ContextError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FakeContext {
    Host,
    Shared(u32),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FakeSurface {
    Window,
    Offscreen(u32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FakeOp {
    Import,
    Tiling,
    Storage,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Load,
    QueryTiling,
    MakeCurrent(FakeContext),
    ClearCurrent,
    CreateSharedContext,
    CreateOffscreen,
    DestroySurface(u32),
    DestroyContext(u32),
    CreateMemoryObject(GlName),
    ImportMemoryFd {
        memory: GlName,
        size: u64,
        context: Option<FakeContext>,
    },
    DeleteMemoryObject(GlName),
    GenTexture(GlName),
    BindTexture(GlName),
    TextureTiling(TilingMode),
    TextureStorage {
        width: u32,
        height: u32,
        memory: GlName,
    },
    DeleteTexture(GlName),
}

impl Call {
    pub fn is_driver_object_call(&self) -> bool {
        matches!(
            self,
            Call::CreateMemoryObject(_)
                | Call::ImportMemoryFd { .. }
                | Call::DeleteMemoryObject(_)
                | Call::GenTexture(_)
                | Call::BindTexture(_)
                | Call::TextureTiling(_)
                | Call::TextureStorage { .. }
                | Call::DeleteTexture(_)
        )
    }
}

struct State {
    host_version: GlVersion,
    shared_version: GlVersion,
    current: Option<Binding<FakeContext, FakeSurface>>,
    loaded: Option<GlVersion>,
    loader_fails: bool,
    extensions: Vec<String>,
    vendor: String,
    tilings: Vec<GlEnum>,
    refuse_shared: bool,
    refuse_offscreen: bool,
    refuse_memory_objects: bool,
    refuse_textures: bool,
    failing: Vec<(FakeOp, GlEnum)>,
    pending_error: GlEnum,
    next_name: u32,
    live_shared: BTreeSet<u32>,
    live_memory: BTreeSet<GlName>,
    live_textures: BTreeSet<GlName>,
    calls: Vec<Call>,
}

impl State {
    fn name(&mut self) -> u32 {
        self.next_name += 1;
        self.next_name
    }

    fn raise(&mut self, op: FakeOp) {
        if let Some((_, code)) = self.failing.iter().find(|(failing, _)| *failing == op) {
            self.pending_error = *code;
        }
    }
}

/// Shared state behind a fake driver and platform pair.
#[derive(Clone)]
pub struct FakeWorld {
    state: Rc<RefCell<State>>,
}

impl FakeWorld {
    /// A GL 4.6 host context, all extensions, optimal + linear tiling.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                host_version: GlVersion::desktop(4, 6),
                shared_version: GlVersion::desktop(4, 6),
                current: Some(Binding {
                    context: FakeContext::Host,
                    surface: FakeSurface::Window,
                }),
                loaded: None,
                loader_fails: false,
                extensions: REQUIRED_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
                vendor: "Mesa".into(),
                tilings: vec![OPTIMAL_TILING_EXT, super::driver::LINEAR_TILING_EXT],
                refuse_shared: false,
                refuse_offscreen: false,
                refuse_memory_objects: false,
                refuse_textures: false,
                failing: Vec::new(),
                pending_error: NO_ERROR,
                next_name: 0,
                live_shared: BTreeSet::new(),
                live_memory: BTreeSet::new(),
                live_textures: BTreeSet::new(),
                calls: Vec::new(),
            })),
        }
    }

    pub fn gl(&self) -> FakeGl {
        FakeGl {
            state: Rc::clone(&self.state),
        }
    }

    pub fn platform(&self) -> FakePlatform {
        FakePlatform {
            state: Rc::clone(&self.state),
        }
    }

    pub fn set_host_version(&self, version: GlVersion) {
        self.state.borrow_mut().host_version = version;
    }

    pub fn set_shared_version(&self, version: GlVersion) {
        self.state.borrow_mut().shared_version = version;
    }

    pub fn set_vendor(&self, vendor: &str) {
        self.state.borrow_mut().vendor = vendor.into();
    }

    pub fn set_tilings(&self, tilings: &[GlEnum]) {
        self.state.borrow_mut().tilings = tilings.to_vec();
    }

    pub fn remove_extension(&self, name: &str) {
        self.state.borrow_mut().extensions.retain(|ext| ext != name);
    }

    pub fn fail_loader(&self) {
        self.state.borrow_mut().loader_fails = true;
    }

    /// No context is current, so there is nothing to share from.
    pub fn hide_host(&self) {
        self.state.borrow_mut().current = None;
    }

    pub fn refuse_shared_contexts(&self) {
        self.state.borrow_mut().refuse_shared = true;
    }

    pub fn refuse_offscreen_surfaces(&self) {
        self.state.borrow_mut().refuse_offscreen = true;
    }

    pub fn refuse_memory_objects(&self) {
        self.state.borrow_mut().refuse_memory_objects = true;
    }

    pub fn refuse_textures(&self) {
        self.state.borrow_mut().refuse_textures = true;
    }

    /// Makes `op` leave `code` in the GL error state.
    pub fn fail_op(&self, op: FakeOp, code: GlEnum) {
        self.state.borrow_mut().failing.push((op, code));
    }

    pub fn current_context(&self) -> Option<FakeContext> {
        self.state
            .borrow()
            .current
            .as_ref()
            .map(|binding| binding.context.clone())
    }

    pub fn loaded_version(&self) -> Option<GlVersion> {
        self.state.borrow().loaded
    }

    pub fn live_shared_contexts(&self) -> usize {
        self.state.borrow().live_shared.len()
    }

    pub fn live_textures(&self) -> usize {
        self.state.borrow().live_textures.len()
    }

    pub fn live_memory_objects(&self) -> usize {
        self.state.borrow().live_memory.len()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }
}

pub struct FakeGl {
    state: Rc<RefCell<State>>,
}

impl GlDriver for FakeGl {
    fn load(&mut self, _resolver: ProcResolver<'_>) -> Option<GlVersion> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Load);
        if state.loader_fails {
            state.loaded = None;
            return None;
        }
        let version = match state.current.as_ref().map(|b| &b.context) {
            Some(FakeContext::Shared(_)) => state.shared_version,
            _ => state.host_version,
        };
        state.loaded = Some(version);
        Some(version)
    }

    fn has_extension(&self, name: &str) -> bool {
        self.state.borrow().extensions.iter().any(|ext| ext == name)
    }

    fn vendor(&self) -> String {
        self.state.borrow().vendor.clone()
    }

    fn device_uuid(&self) -> DeviceUuid {
        DeviceUuid([7; 16])
    }

    fn num_tiling_types(&self) -> i32 {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::QueryTiling);
        state.tilings.len() as i32
    }

    fn tiling_types(&self, count: usize) -> Vec<GlEnum> {
        self.state
            .borrow()
            .tilings
            .iter()
            .copied()
            .take(count)
            .collect()
    }

    fn get_error(&self) -> GlEnum {
        std::mem::replace(&mut self.state.borrow_mut().pending_error, NO_ERROR)
    }

    fn create_memory_object(&self) -> GlName {
        let mut state = self.state.borrow_mut();
        if state.refuse_memory_objects {
            state.calls.push(Call::CreateMemoryObject(0));
            return 0;
        }
        let name = state.name();
        state.live_memory.insert(name);
        state.calls.push(Call::CreateMemoryObject(name));
        name
    }

    fn import_memory_fd(&self, memory: GlName, size: u64, fd: OwnedFd) {
        let mut state = self.state.borrow_mut();
        let context = state.current.as_ref().map(|b| b.context.clone());
        state.calls.push(Call::ImportMemoryFd {
            memory,
            size,
            context,
        });
        state.raise(FakeOp::Import);
        drop(fd);
    }

    fn delete_memory_object(&self, memory: GlName) {
        let mut state = self.state.borrow_mut();
        state.live_memory.remove(&memory);
        state.calls.push(Call::DeleteMemoryObject(memory));
    }

    fn gen_texture(&self) -> GlName {
        let mut state = self.state.borrow_mut();
        if state.refuse_textures {
            state.calls.push(Call::GenTexture(0));
            return 0;
        }
        let name = state.name();
        state.live_textures.insert(name);
        state.calls.push(Call::GenTexture(name));
        name
    }

    fn bind_texture(&self, texture: GlName) {
        self.state.borrow_mut().calls.push(Call::BindTexture(texture));
    }

    fn set_texture_tiling(&self, tiling: TilingMode) {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::TextureTiling(tiling));
        state.raise(FakeOp::Tiling);
    }

    fn texture_storage_mem_2d(&self, width: u32, height: u32, memory: GlName) {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::TextureStorage {
            width,
            height,
            memory,
        });
        state.raise(FakeOp::Storage);
    }

    fn delete_texture(&self, texture: GlName) {
        let mut state = self.state.borrow_mut();
        state.live_textures.remove(&texture);
        state.calls.push(Call::DeleteTexture(texture));
    }
}

pub struct FakePlatform {
    state: Rc<RefCell<State>>,
}

impl ContextPlatform for FakePlatform {
    type Context = FakeContext;
    type Surface = FakeSurface;

    fn current(&self) -> Option<Binding<FakeContext, FakeSurface>> {
        self.state.borrow().current.clone()
    }

    fn make_current(&self, binding: &Binding<FakeContext, FakeSurface>) -> Result<(), ContextError> {
        let mut state = self.state.borrow_mut();
        if let FakeContext::Shared(id) = binding.context {
            if !state.live_shared.contains(&id) {
                return Err(ContextError::MakeCurrent(format!("context {id} is gone")));
            }
        }
        state.calls.push(Call::MakeCurrent(binding.context.clone()));
        state.current = Some(binding.clone());
        Ok(())
    }

    fn clear_current(&self) -> Result<(), ContextError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::ClearCurrent);
        state.current = None;
        Ok(())
    }

    fn create_shared_context(
        &self,
        _share: &FakeContext,
        _version: GlVersion,
    ) -> Result<FakeContext, ContextError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::CreateSharedContext);
        if state.refuse_shared {
            return Err(ContextError::Create("refused".into()));
        }
        let id = state.name();
        state.live_shared.insert(id);
        Ok(FakeContext::Shared(id))
    }

    fn create_offscreen_surface(&self, context: &FakeContext) -> Result<FakeSurface, ContextError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::CreateOffscreen);
        if state.refuse_offscreen {
            return Err(ContextError::Surface("refused".into()));
        }
        match context {
            FakeContext::Shared(id) => Ok(FakeSurface::Offscreen(*id)),
            FakeContext::Host => Ok(FakeSurface::Window),
        }
    }

    fn destroy_surface(&self, surface: FakeSurface) {
        if let FakeSurface::Offscreen(id) = surface {
            self.state.borrow_mut().calls.push(Call::DestroySurface(id));
        }
    }

    fn destroy_context(&self, context: FakeContext) {
        if let FakeContext::Shared(id) = context {
            let mut state = self.state.borrow_mut();
            state.live_shared.remove(&id);
            state.calls.push(Call::DestroyContext(id));
        }
    }
}
