//! Lifecycle state machine of the execution contexts

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::sync::atomic::Ordering;

use log::{debug, error, info, warn};

use apprt_core::{
    AppId, ContextId, Envelope, LifecycleState, RtError, RtResult, RuntimeMessage, Tick,
};
use apprt_loader::{load, SyscallTable};

use crate::app::{AppDescriptor, AppSource};
use crate::context::{AppContext, Entry, Launch};
use crate::port::{ContextTask, HostLink, TaskSpawner};
use crate::registry::{ExecutionContext, Registry};
use crate::shared::{AppMessage, RuntimeShared};

/// Owns the registry and moves each context through
/// `Unloaded -> Loading -> (Downloading ->) Loaded -> Runloop -> Unloading`.
///
/// The supervisor runs on its own task. Every [`wake`](Supervisor::wake)
/// handles at most one message, re-evaluates what each context should be
/// running, then sweeps all contexts for expired deadlines.
pub struct Supervisor {
    shared: Arc<RuntimeShared>,
    registry: Registry,
    spawner: Arc<dyn TaskSpawner>,
    host: Box<dyn HostLink>,
    syscalls: SyscallTable,
}

impl Supervisor {
    pub(crate) fn new(
        shared: Arc<RuntimeShared>,
        registry: Registry,
        host: Box<dyn HostLink>,
        syscalls: SyscallTable,
    ) -> Self {
        let spawner = Arc::clone(&shared.spawner);
        Self {
            shared,
            registry,
            spawner,
            host,
            syscalls,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn shared(&self) -> &Arc<RuntimeShared> {
        &self.shared
    }

    pub fn state(&self, id: ContextId) -> LifecycleState {
        self.shared.state(id)
    }

    /// Supervisor task body: wake on every message or sweep interval until
    /// the runtime stops
    pub fn run(&mut self) {
        info!("supervisor started");
        while self.shared.is_running() {
            let message = self
                .shared
                .supervisor
                .receive(Some(self.shared.config.sweep_interval));
            self.wake(message);
        }
        info!("supervisor stopped");
    }

    /// One supervisor cycle
    pub fn wake(&mut self, message: Option<Envelope>) {
        let now = self.shared.now();
        if let Some(envelope) = message {
            self.handle(envelope, now);
        }
        for id in ContextId::ALL {
            self.evaluate(id, now);
        }
        if self.sweep(now) {
            for id in ContextId::ALL {
                self.evaluate(id, now);
            }
        }
    }

    fn handle(&mut self, envelope: Envelope, now: Tick) {
        let id = envelope.target;
        debug!("supervisor <- {}", envelope);
        match envelope.message {
            RuntimeMessage::LoadApp(app) => self.retarget(id, app, now),
            RuntimeMessage::DownloadComplete { app, ok } => self.download_complete(id, app, ok),
            RuntimeMessage::QuitRequest => {
                if matches!(self.state(id), LifecycleState::Loaded | LifecycleState::Runloop) {
                    self.registry.context_mut(id).target = None;
                    self.begin_unload(id, now);
                }
            }
            RuntimeMessage::Heartbeat => {
                let state = self.state(id);
                let shutdown = self.shared.config.shutdown_timeout(id);
                let hang = self.shared.config.hang_timeout;
                let context = self.registry.context_mut(id);
                match state {
                    LifecycleState::Loaded | LifecycleState::Runloop => {
                        context.hang_deadline = hang.map(|timeout| now + timeout);
                    }
                    LifecycleState::Unloading if context.shutdown_deadline.is_some() => {
                        context.shutdown_deadline = Some(now + shutdown);
                    }
                    _ => {}
                }
            }
            RuntimeMessage::Teardown { generation } => {
                let current = self.shared.status(id).generation();
                if generation != current {
                    debug!("{} ignoring stale teardown (gen {} != {})", id, generation, current);
                } else if self.state(id).has_task() {
                    info!("{} torn down", id);
                    self.teardown(id);
                }
            }
            RuntimeMessage::Draw { force } => {
                let _ = self.shared.post_app(id, AppMessage::Draw { force });
            }
        }
    }

    fn retarget(&mut self, id: ContextId, app: AppId, now: Tick) {
        if self.registry.manifest.get(app).is_none() {
            warn!("{} asked for unknown {}", id, app);
            return;
        }
        let state = self.state(id);
        let context = self.registry.context_mut(id);
        if context.app == Some(app) && state == LifecycleState::Runloop {
            debug!("{} already running on {}", app, id);
            return;
        }
        info!("{} targets {}", id, app);
        context.target = Some(app);
        match state {
            LifecycleState::Loaded | LifecycleState::Runloop => self.begin_unload(id, now),
            LifecycleState::Downloading => {
                context.download_deadline = None;
                self.shared.status(id).set_state(LifecycleState::Unloaded);
            }
            _ => {}
        }
    }

    fn download_complete(&mut self, id: ContextId, app: AppId, ok: bool) {
        if !ok {
            warn!("download of {} failed", app);
            self.host.download_failed(app);
            return;
        }
        if self.registry.manifest.set_resident(app, true).is_err() {
            warn!("downloaded {} is not in the manifest", app);
            return;
        }
        let context = self.registry.context_mut(id);
        if self.shared.state(id) == LifecycleState::Downloading && context.target == Some(app) {
            info!("{} downloaded", app);
            context.download_deadline = None;
            self.shared.status(id).set_state(LifecycleState::Unloaded);
        }
    }

    /// Start whatever the context should be running. A failed load gets one
    /// more attempt with the fallback app in the same wake.
    fn evaluate(&mut self, id: ContextId, now: Tick) {
        for _ in 0..2 {
            let failed = match self.state(id) {
                LifecycleState::Unloaded => {
                    let Some(app) = self.target_of(id) else {
                        return;
                    };
                    match self.start_load(id, app, now) {
                        Ok(()) => return,
                        Err(err) => {
                            error!("{} failed to load {}: {}", id, app, err);
                            app
                        }
                    }
                }
                LifecycleState::Downloading => {
                    let context = self.registry.context(id);
                    match (context.download_deadline, context.target) {
                        (Some(deadline), Some(app)) if now.has_reached(deadline) => {
                            error!("{} download of {} timed out", id, app);
                            self.registry.context_mut(id).download_deadline = None;
                            self.shared.status(id).set_state(LifecycleState::Unloaded);
                            app
                        }
                        _ => return,
                    }
                }
                _ => return,
            };
            if !self.fall_back(id, failed) {
                return;
            }
        }
    }

    /// MainApp always runs something and Overlay always runs the overlay
    /// host; Worker runs only what it was asked to
    fn target_of(&mut self, id: ContextId) -> Option<AppId> {
        let resident = match id {
            ContextId::MainApp => Some(self.shared.config.default_app),
            ContextId::Worker => None,
            ContextId::Overlay => Some(AppId::OVERLAY_HOST),
        };
        let context = self.registry.context_mut(id);
        if context.target.is_none() {
            context.target = resident;
        }
        context.target
    }

    /// Returns true when there is a fallback to try
    fn fall_back(&mut self, id: ContextId, failed: AppId) -> bool {
        let default_app = self.shared.config.default_app;
        let context = self.registry.context_mut(id);
        if id == ContextId::MainApp && failed != default_app {
            warn!("{} falls back to {}", id, default_app);
            context.target = Some(default_app);
            true
        } else {
            context.target = None;
            false
        }
    }

    fn start_load(&mut self, id: ContextId, app: AppId, now: Tick) -> RtResult<()> {
        let status = self.shared.status(id);
        status.set_state(LifecycleState::Loading);
        info!("{} loading {}", id, app);

        let Some(descriptor) = self.registry.manifest.get(app).cloned() else {
            panic!("{} is not in the app manifest", app);
        };
        let context = self.registry.context_mut(id);
        context.arena.reset();
        if let Some(stale) = context.task.take() {
            error!("{} still had {}, deleting it", id, stale);
            self.spawner.delete(stale);
            status.bump_generation();
        }
        context.clear();

        if !descriptor.resident {
            info!("{} requesting {} from the host", id, app);
            self.host.request_app(app);
            context.download_deadline = Some(now + self.shared.config.download_timeout);
            status.set_state(LifecycleState::Downloading);
            return Ok(());
        }

        let entry = match Self::prepare(context, &descriptor, &self.syscalls) {
            Ok(entry) => entry,
            Err(err) => {
                context.clear();
                status.set_state(LifecycleState::Unloaded);
                return Err(err);
            }
        };
        context.app = Some(app);

        self.shared.mailbox(id).reset();
        if id == ContextId::MainApp {
            self.shared.redraw_pending.store(false, Ordering::Release);
        }
        status.set_state(LifecycleState::Loaded);
        let launch = Launch {
            app,
            kind: descriptor.kind,
            entry,
        };
        let task = Self::task(&self.shared, id, launch);
        match self.spawner.spawn(id, context.stack_size, task) {
            Ok(handle) => {
                info!("{} loaded {} as {}", id, app, handle);
                context.task = Some(handle);
                context.hang_deadline = self.shared.config.hang_timeout.map(|timeout| now + timeout);
                Ok(())
            }
            Err(err) => {
                context.clear();
                status.set_state(LifecycleState::Unloaded);
                Err(err)
            }
        }
    }

    /// Builtins run in place; images go through the loader
    fn prepare(
        context: &mut ExecutionContext,
        descriptor: &AppDescriptor,
        syscalls: &SyscallTable,
    ) -> RtResult<Entry> {
        match &descriptor.source {
            AppSource::Builtin(main) => Ok(Entry::Builtin(*main)),
            AppSource::Image(image) => {
                let loaded = load(&**image, &mut context.arena, syscalls).map_err(|err| {
                    error!("{}: {}", descriptor.name, err);
                    RtError::from(err)
                })?;
                context.loaded = Some(loaded.clone());
                Ok(Entry::Image(loaded))
            }
        }
    }

    fn task(shared: &Arc<RuntimeShared>, id: ContextId, launch: Launch) -> ContextTask {
        let shared = Arc::clone(shared);
        let generation = shared.status(id).generation();
        Box::new(move || {
            let entry = launch.entry.clone();
            AppContext::new(shared, id, generation, &launch).run(entry);
        })
    }

    /// Drop the context's registrations, tell the app to quit and arm the
    /// shutdown deadline
    fn begin_unload(&mut self, id: ContextId, now: Tick) {
        self.shared.status(id).set_state(LifecycleState::Unloading);
        info!("{} unloading", id);
        self.unsubscribe(id);
        if self.shared.post_app(id, AppMessage::Quit).is_err() {
            error!("{} did not get its quit message", id);
        }
        let context = self.registry.context_mut(id);
        context.shutdown_deadline = Some(now + self.shared.config.shutdown_timeout(id));
        context.hang_deadline = None;
    }

    fn unsubscribe(&self, id: ContextId) {
        if id.has_ui() {
            self.shared
                .buttons
                .with(|buttons| buttons.unsubscribe_context(id));
        }
        self.shared.events.with(|events| events.unsubscribe_all(id));
    }

    /// Delete the task and return the context to `Unloaded`
    fn teardown(&mut self, id: ContextId) {
        let context = self.registry.context_mut(id);
        if let Some(handle) = context.task {
            self.spawner.delete(handle);
        }
        if context.target.is_some() && context.target == context.app {
            context.target = None;
        }
        context.clear();
        let status = self.shared.status(id);
        status.bump_generation();
        status.set_state(LifecycleState::Unloaded);
        self.unsubscribe(id);
        if id == ContextId::Overlay {
            self.shared
                .overlay_windows
                .store(0, Ordering::Release);
        }
    }

    /// Hard-kill contexts whose shutdown or liveness deadline passed.
    /// Returns true if any was killed.
    fn sweep(&mut self, now: Tick) -> bool {
        let mut killed = false;
        for id in ContextId::ALL {
            let state = self.state(id);
            let context = self.registry.context(id);
            let expired = |deadline: Option<Tick>| deadline.is_some_and(|at| now.has_reached(at));
            if expired(context.shutdown_deadline) {
                error!("{} missed its shutdown deadline, killing it", id);
            } else if matches!(state, LifecycleState::Loaded | LifecycleState::Runloop)
                && expired(context.hang_deadline)
            {
                error!("{} stopped sending heartbeats, killing it", id);
            } else {
                continue;
            }
            self.teardown(id);
            killed = true;
        }
        killed
    }
}
