//! Runtime assembly

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, AtomicUsize};

use log::{error, info};

use apprt_core::sync::Mutex;
use apprt_core::{
    AppId, Backlight, Clock, ContextId, ContextStatus, Envelope, Mailbox, RtError, RtResult,
    RuntimeConfig,
};
use apprt_draw::{DisplayDriver, DrawCoordinator};
use apprt_event::EventService;
use apprt_input::ButtonMachine;
use apprt_loader::{LoadedApp, SyscallTable};

use crate::app::{AppDescriptor, AppKind, AppManifest};
use crate::context::AppContext;
use crate::port::{AppExecutor, HostLink, TaskSpawner};
use crate::registry::Registry;
use crate::shared::{AppMessage, RuntimeShared};
use crate::supervisor::Supervisor;

/// Queues of the supervisor and of the three context tasks
pub type Mailboxes = (
    Box<dyn Mailbox<Envelope>>,
    [Box<dyn Mailbox<AppMessage>>; ContextId::COUNT],
);

/// Builder for [`Runtime`].
///
/// Every collaborator except the executor must be supplied; the overlay
/// host is registered automatically.
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    manifest: AppManifest,
    clock: Option<Arc<dyn Clock>>,
    spawner: Option<Arc<dyn TaskSpawner>>,
    host: Option<Box<dyn HostLink>>,
    executor: Option<Box<dyn AppExecutor>>,
    display: Option<(Arc<DrawCoordinator>, Box<dyn DisplayDriver>)>,
    backlight: Option<Box<dyn Backlight>>,
    mailboxes: Option<Mailboxes>,
    syscalls: SyscallTable,
    error: Option<RtError>,
}

impl RuntimeBuilder {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            manifest: AppManifest::new(),
            clock: None,
            spawner: None,
            host: None,
            executor: None,
            display: None,
            backlight: None,
            mailboxes: None,
            syscalls: SyscallTable::new(SyscallTable::CURRENT_VERSION, 0, &[]),
            error: None,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn spawner(mut self, spawner: Arc<dyn TaskSpawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    pub fn host(mut self, host: Box<dyn HostLink>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn executor(mut self, executor: Box<dyn AppExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// The frame lock is shared with the display driver, which releases it
    /// when a frame completes
    pub fn display(mut self, draw: Arc<DrawCoordinator>, driver: Box<dyn DisplayDriver>) -> Self {
        self.display = Some((draw, driver));
        self
    }

    pub fn backlight(mut self, backlight: Box<dyn Backlight>) -> Self {
        self.backlight = Some(backlight);
        self
    }

    pub fn mailboxes(mut self, mailboxes: Mailboxes) -> Self {
        self.mailboxes = Some(mailboxes);
        self
    }

    pub fn syscalls(mut self, syscalls: SyscallTable) -> Self {
        self.syscalls = syscalls;
        self
    }

    /// Add an app to the manifest; a rejected entry fails [`build`](Self::build)
    pub fn app(mut self, app: AppDescriptor) -> Self {
        let id = app.id;
        if let Err(err) = self.manifest.register(app) {
            error!("cannot register {}: {}", id, err);
            self.error.get_or_insert(err);
        }
        self
    }

    pub fn build(mut self) -> RtResult<Runtime> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.manifest.get(AppId::OVERLAY_HOST).is_none() {
            self.manifest.register(AppDescriptor::builtin(
                AppId::OVERLAY_HOST,
                "overlay",
                AppKind::System,
                overlay_host,
            ))?;
        }
        let default_app = self.config.default_app;
        match self.manifest.get(default_app) {
            Some(app) if app.resident && app.kind != AppKind::Worker => {}
            _ => {
                error!("default app {} must be a resident foreground app", default_app);
                return Err(RtError::ProgrammingError);
            }
        }

        let missing = |part: &str| {
            error!("runtime built without {}", part);
            RtError::ProgrammingError
        };
        let clock = self.clock.ok_or_else(|| missing("clock"))?;
        let spawner = self.spawner.ok_or_else(|| missing("spawner"))?;
        let host = self.host.ok_or_else(|| missing("host link"))?;
        let (draw, display) = self.display.ok_or_else(|| missing("display"))?;
        let backlight = self.backlight.ok_or_else(|| missing("backlight"))?;
        let (supervisor, mailboxes) = self.mailboxes.ok_or_else(|| missing("mailboxes"))?;
        let executor = self
            .executor
            .unwrap_or_else(|| Box::new(NoExecutor) as Box<dyn AppExecutor>);

        let shared = Arc::new(RuntimeShared {
            buttons: Mutex::new(ButtonMachine::new(self.config.debounce, self.config.button_poll)),
            events: Mutex::new(EventService::new()),
            status: [ContextStatus::new(), ContextStatus::new(), ContextStatus::new()],
            config: self.config,
            clock,
            supervisor,
            mailboxes,
            draw,
            display,
            backlight,
            executor,
            spawner,
            overlay_windows: AtomicUsize::new(0),
            redraw_pending: AtomicBool::new(false),
            running: AtomicBool::new(true),
        });
        info!(
            "runtime ready: {} apps, default {}",
            self.manifest.len(),
            default_app
        );
        let registry = Registry::new(self.manifest, &shared.config);
        let supervisor = Supervisor::new(Arc::clone(&shared), registry, host, self.syscalls);
        Ok(Runtime { shared, supervisor })
    }
}

/// An assembled runtime; the supervisor has not started yet
pub struct Runtime {
    shared: Arc<RuntimeShared>,
    supervisor: Supervisor,
}

impl Runtime {
    pub fn builder(config: RuntimeConfig) -> RuntimeBuilder {
        RuntimeBuilder::new(config)
    }

    pub fn shared(&self) -> &Arc<RuntimeShared> {
        &self.shared
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn supervisor_mut(&mut self) -> &mut Supervisor {
        &mut self.supervisor
    }

    /// Split into the handle the button task and the host keep, and the
    /// supervisor that goes to its own task
    pub fn into_parts(self) -> (Arc<RuntimeShared>, Supervisor) {
        (self.shared, self.supervisor)
    }
}

/// Resident app of the Overlay context: it only runs the loop that stacks
/// and paints overlay windows
fn overlay_host(context: &mut AppContext) {
    context.event_loop();
}

/// Ports that cannot run image code
struct NoExecutor;

impl AppExecutor for NoExecutor {
    fn enter(&self, app: &LoadedApp, context: &mut AppContext) {
        error!(
            "{} cannot run image at {:#010x}: no executor on this port",
            context.id(),
            app.entry()
        );
    }
}
