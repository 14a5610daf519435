
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::vec::Vec;

use apprt_core::{AppId, ContextId, RtResult, RuntimeConfig, Tick};
use apprt_draw::DrawCoordinator;

use crate::app::{AppDescriptor, AppKind};
use crate::builder::Runtime;
use crate::context::{AppContext, Entry, Launch};
use crate::port::{ContextTask, TaskHandle, TaskSpawner};
use crate::posix::{self, HeadlessDisplay, LogBacklight, ManualClock, RecordingHost};

pub(super) const APP: AppId = AppId(5);
pub(super) const OTHER: AppId = AppId(6);
pub(super) const WORKER: AppId = AppId(7);

/// Keeps spawned tasks without running them
#[derive(Default)]
pub(super) struct RecordingSpawner {
    next: AtomicU32,
    spawned: Mutex<Vec<(ContextId, TaskHandle)>>,
    deleted: Mutex<Vec<TaskHandle>>,
    tasks: Mutex<Vec<ContextTask>>,
}

impl RecordingSpawner {
    pub(super) fn spawned(&self) -> Vec<(ContextId, TaskHandle)> {
        self.spawned.lock().unwrap().clone()
    }

    pub(super) fn deleted(&self) -> Vec<TaskHandle> {
        self.deleted.lock().unwrap().clone()
    }
}

impl TaskSpawner for RecordingSpawner {
    fn spawn(&self, context: ContextId, _: usize, task: ContextTask) -> RtResult<TaskHandle> {
        let handle = TaskHandle(self.next.fetch_add(1, Ordering::Relaxed));
        self.spawned.lock().unwrap().push((context, handle));
        self.tasks.lock().unwrap().push(task);
        Ok(handle)
    }

    fn delete(&self, handle: TaskHandle) {
        self.deleted.lock().unwrap().push(handle);
    }

    fn park(&self, _: &dyn Fn() -> bool) {}
}

pub(super) fn idle(_: &mut AppContext) {}

pub(super) struct Harness {
    pub runtime: Runtime,
    pub clock: Arc<ManualClock>,
    pub spawner: Arc<RecordingSpawner>,
    pub host: RecordingHost,
    pub display: HeadlessDisplay,
    pub backlight: LogBacklight,
}

pub(super) fn default_apps() -> Vec<AppDescriptor> {
    std::vec![
        AppDescriptor::builtin(AppId::SYSTEM, "System", AppKind::Watchface, idle),
        AppDescriptor::builtin(APP, "Sports", AppKind::Application, idle),
        AppDescriptor::builtin(OTHER, "Music", AppKind::Application, idle),
        AppDescriptor::builtin(WORKER, "Steps", AppKind::Worker, idle),
    ]
}

pub(super) fn harness(apps: Vec<AppDescriptor>) -> Harness {
    harness_with(RuntimeConfig::default(), apps)
}

pub(super) fn harness_with(config: RuntimeConfig, apps: Vec<AppDescriptor>) -> Harness {
    let _ = env_logger::builder().is_test(true).try_init();
    let clock = Arc::new(ManualClock::new(Tick::new(1_000)));
    let spawner = Arc::new(RecordingSpawner::default());
    let host = RecordingHost::new();
    let draw = Arc::new(DrawCoordinator::new(config.frame_watchdog));
    let display = HeadlessDisplay::new(Arc::clone(&draw), false);
    let backlight = LogBacklight::new();

    let mut builder = posix::builder(config)
        .clock(clock.clone())
        .spawner(spawner.clone())
        .host(std::boxed::Box::new(host.clone()))
        .display(draw, std::boxed::Box::new(display.clone()))
        .backlight(std::boxed::Box::new(backlight.clone()));
    for app in apps {
        builder = builder.app(app);
    }
    Harness {
        runtime: builder.build().unwrap(),
        clock,
        spawner,
        host,
        display,
        backlight,
    }
}

impl Harness {
    /// An app context on `id` as its task would create it, without a task
    pub(super) fn context(&self, id: ContextId, app: AppId, kind: AppKind) -> AppContext {
        let launch = Launch {
            app,
            kind,
            entry: Entry::Builtin(idle),
        };
        let shared = Arc::clone(self.runtime.shared());
        let generation = shared.status(id).generation();
        AppContext::new(shared, id, generation, &launch)
    }
}
