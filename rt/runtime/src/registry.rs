//! The execution contexts and the app manifest, owned by the supervisor

use alloc::boxed::Box;
use alloc::vec;

use apprt_core::{AppId, ContextId, RuntimeConfig, Tick};
use apprt_loader::LoadedApp;
use apprt_mem::Arena;

use crate::app::AppManifest;
use crate::port::TaskHandle;

/// One of the three fixed execution contexts
pub struct ExecutionContext {
    id: ContextId,
    pub(crate) arena: Arena<Box<[u8]>>,
    pub(crate) stack_size: usize,
    /// App whose task currently runs here
    pub(crate) app: Option<AppId>,
    pub(crate) loaded: Option<LoadedApp>,
    pub(crate) task: Option<TaskHandle>,
    /// App the supervisor wants running here
    pub(crate) target: Option<AppId>,
    pub(crate) shutdown_deadline: Option<Tick>,
    pub(crate) hang_deadline: Option<Tick>,
    pub(crate) download_deadline: Option<Tick>,
}

impl ExecutionContext {
    fn new(id: ContextId, config: &RuntimeConfig) -> Self {
        let storage = vec![0u8; config.arena_size(id)].into_boxed_slice();
        Self {
            id,
            arena: Arena::new(storage, config.arena_base(id)),
            stack_size: config.stack_size(id),
            app: None,
            loaded: None,
            task: None,
            target: None,
            shutdown_deadline: None,
            hang_deadline: None,
            download_deadline: None,
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn app(&self) -> Option<AppId> {
        self.app
    }

    pub fn target(&self) -> Option<AppId> {
        self.target
    }

    pub fn task(&self) -> Option<TaskHandle> {
        self.task
    }

    pub fn loaded(&self) -> Option<&LoadedApp> {
        self.loaded.as_ref()
    }

    pub fn arena(&self) -> &Arena<Box<[u8]>> {
        &self.arena
    }

    pub fn shutdown_deadline(&self) -> Option<Tick> {
        self.shutdown_deadline
    }

    pub fn hang_deadline(&self) -> Option<Tick> {
        self.hang_deadline
    }

    /// Forget the task and everything it ran
    pub(crate) fn clear(&mut self) {
        self.app = None;
        self.loaded = None;
        self.task = None;
        self.shutdown_deadline = None;
        self.hang_deadline = None;
        self.download_deadline = None;
    }
}

/// Everything the supervisor owns.
///
/// Built once at startup, before any task exists: the manifest first, then
/// the contexts in `ContextId` order, each with its arena.
pub struct Registry {
    pub(crate) manifest: AppManifest,
    contexts: [ExecutionContext; ContextId::COUNT],
}

impl Registry {
    pub fn new(manifest: AppManifest, config: &RuntimeConfig) -> Self {
        let contexts = ContextId::ALL.map(|id| ExecutionContext::new(id, config));
        Self { manifest, contexts }
    }

    pub fn manifest(&self) -> &AppManifest {
        &self.manifest
    }

    pub fn context(&self, id: ContextId) -> &ExecutionContext {
        &self.contexts[id.index()]
    }

    pub(crate) fn context_mut(&mut self, id: ContextId) -> &mut ExecutionContext {
        &mut self.contexts[id.index()]
    }
}
