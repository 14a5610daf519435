//! Host port
//!
//! Runs the runtime on a desktop OS: context tasks become threads, the
//! mailboxes are condvar queues and the tick clock follows `Instant`.
//! Used by the integration tests and for running apps without hardware.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, Thread};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use apprt_core::{
    AppId, Backlight, Clock, ContextId, Envelope, LifecycleState, Mailbox, QueueFull, RtError,
    RtResult, RuntimeConfig, RuntimeMessage, Tick, TickDuration,
};
use apprt_draw::{Canvas, Color, DisplayDriver, DrawCoordinator, FrameBuffer, Point, Size};
use apprt_event::EventPacket;
use apprt_input::{ButtonId, ButtonPins, NUM_BUTTONS};
use apprt_loader::LoadedApp;

use crate::builder::{Mailboxes, Runtime, RuntimeBuilder};
use crate::context::AppContext;
use crate::port::{AppExecutor, ContextTask, HostLink, TaskHandle, TaskSpawner};
use crate::shared::{AppMessage, RuntimeShared};

/// Display geometry of the reference watch
pub const SCREEN: Size = Size::new(144, 168);

/// Threads get at least this much stack regardless of the configured size
const MIN_THREAD_STACK: usize = 256 * 1024;

/// Longest a parked task or an idle button task sleeps between checks
const IDLE_WAIT: Duration = Duration::from_millis(50);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Milliseconds since the clock was created
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Tick {
        let elapsed = u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX);
        Tick::new(elapsed)
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Tick) -> Self {
        Self {
            now: AtomicU64::new(start.raw()),
        }
    }

    pub fn advance(&self, by: TickDuration) {
        self.now.fetch_add(u64::from(by.ticks()), Ordering::AcqRel);
    }

    pub fn set(&self, now: Tick) {
        self.now.store(now.raw(), Ordering::Release);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Tick {
        Tick::new(self.now.load(Ordering::Acquire))
    }
}

/// Bounded FIFO with blocking post and receive
pub struct BoundedQueue<T> {
    queue: Mutex<VecDeque<T>>,
    capacity: usize,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue needs room for one message");
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn push(&self, mut queue: MutexGuard<'_, VecDeque<T>>, message: T) -> Result<(), QueueFull<T>> {
        if queue.len() >= self.capacity {
            return Err(QueueFull(message));
        }
        queue.push_back(message);
        drop(queue);
        self.not_empty.notify_one();
        Ok(())
    }
}

impl<T: Send> Mailbox<T> for BoundedQueue<T> {
    fn post(&self, message: T, timeout: TickDuration) -> Result<(), QueueFull<T>> {
        let queue = lock(&self.queue);
        let (queue, _) = self
            .not_full
            .wait_timeout_while(queue, timeout.to_std(), |queue| queue.len() >= self.capacity)
            .unwrap_or_else(PoisonError::into_inner);
        self.push(queue, message)
    }

    fn post_from_isr(&self, message: T) -> Result<(), QueueFull<T>> {
        self.push(lock(&self.queue), message)
    }

    fn receive(&self, timeout: Option<TickDuration>) -> Option<T> {
        let queue = lock(&self.queue);
        let mut queue = match timeout {
            Some(timeout) => {
                self.not_empty
                    .wait_timeout_while(queue, timeout.to_std(), |queue| queue.is_empty())
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            }
            None => self
                .not_empty
                .wait_while(queue, |queue| queue.is_empty())
                .unwrap_or_else(PoisonError::into_inner),
        };
        let message = queue.pop_front();
        drop(queue);
        if message.is_some() {
            self.not_full.notify_one();
        }
        message
    }

    fn reset(&self) {
        lock(&self.queue).clear();
        self.not_full.notify_all();
    }

    fn len(&self) -> usize {
        lock(&self.queue).len()
    }
}

/// Supervisor and context queues, each `depth` deep
pub fn mailboxes(depth: usize) -> Mailboxes {
    let context = || Box::new(BoundedQueue::<AppMessage>::new(depth)) as Box<dyn Mailbox<AppMessage>>;
    (
        Box::new(BoundedQueue::<Envelope>::new(depth)),
        [context(), context(), context()],
    )
}

/// Context tasks as named OS threads.
///
/// An OS thread cannot be killed from outside: `delete` forgets the thread
/// and wakes it, and the task itself notices its cancelled generation.
#[derive(Default)]
pub struct ThreadSpawner {
    next: AtomicU32,
    threads: Mutex<HashMap<TaskHandle, Thread>>,
}

impl ThreadSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks spawned and not yet deleted
    pub fn live(&self) -> usize {
        lock(&self.threads).len()
    }
}

impl TaskSpawner for ThreadSpawner {
    fn spawn(
        &self,
        context: ContextId,
        stack_size: usize,
        task: ContextTask,
    ) -> RtResult<TaskHandle> {
        let handle = TaskHandle(self.next.fetch_add(1, Ordering::Relaxed));
        let thread = thread::Builder::new()
            .name(format!("{}-{}", context, handle.0))
            .stack_size(stack_size.max(MIN_THREAD_STACK))
            .spawn(task)
            .map_err(|err| {
                error!("cannot start {} task: {}", context, err);
                RtError::OutOfMemory
            })?;
        lock(&self.threads).insert(handle, thread.thread().clone());
        Ok(handle)
    }

    fn delete(&self, handle: TaskHandle) {
        match lock(&self.threads).remove(&handle) {
            Some(thread) => thread.unpark(),
            None => warn!("{} already gone", handle),
        }
    }

    fn yield_now(&self) {
        thread::yield_now();
    }

    fn park(&self, cancelled: &dyn Fn() -> bool) {
        while !cancelled() {
            thread::park_timeout(IDLE_WAIT);
        }
    }
}

/// No paired phone: every download request fails
#[derive(Debug, Default)]
pub struct NoHost;

impl HostLink for NoHost {
    fn request_app(&self, app: AppId) {
        warn!("no host to fetch {} from", app);
    }

    fn download_failed(&self, app: AppId) {
        warn!("download of {} failed", app);
    }
}

/// Host link that remembers what was asked of it
#[derive(Debug, Default, Clone)]
pub struct RecordingHost {
    requested: Arc<Mutex<Vec<AppId>>>,
    failed: Arc<Mutex<Vec<AppId>>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requested(&self) -> Vec<AppId> {
        lock(&self.requested).clone()
    }

    pub fn failed(&self) -> Vec<AppId> {
        lock(&self.failed).clone()
    }
}

impl HostLink for RecordingHost {
    fn request_app(&self, app: AppId) {
        lock(&self.requested).push(app);
    }

    fn download_failed(&self, app: AppId) {
        lock(&self.failed).push(app);
    }
}

struct Screen {
    frame: FrameBuffer<Vec<u8>>,
    frames: u32,
}

/// In-memory display.
///
/// With `auto_complete` every started frame completes at once; otherwise
/// the frame lock stays held until [`complete_frame`](Self::complete_frame).
#[derive(Clone)]
pub struct HeadlessDisplay {
    draw: Arc<DrawCoordinator>,
    screen: Arc<Mutex<Screen>>,
    auto_complete: bool,
}

impl HeadlessDisplay {
    pub fn new(draw: Arc<DrawCoordinator>, auto_complete: bool) -> Self {
        let frame = FrameBuffer::new(vec![0u8; SCREEN.area()], SCREEN);
        Self {
            draw,
            screen: Arc::new(Mutex::new(Screen { frame, frames: 0 })),
            auto_complete,
        }
    }

    pub fn coordinator(&self) -> &Arc<DrawCoordinator> {
        &self.draw
    }

    /// Frames started so far
    pub fn frames(&self) -> u32 {
        lock(&self.screen).frames
    }

    pub fn pixel(&self, at: Point) -> Option<Color> {
        lock(&self.screen).frame.pixel(at)
    }

    /// The frame transfer finished
    pub fn complete_frame(&self) -> bool {
        self.draw.on_frame_done()
    }
}

impl DisplayDriver for HeadlessDisplay {
    fn with_canvas(&self, paint: &mut dyn FnMut(&mut dyn Canvas)) {
        let mut screen = lock(&self.screen);
        paint(&mut screen.frame);
    }

    fn start_frame(&self, x: i16, y: i16) {
        let frames = {
            let mut screen = lock(&self.screen);
            screen.frames += 1;
            screen.frames
        };
        debug!("frame {} at ({}, {})", frames, x, y);
        if self.auto_complete {
            self.draw.on_frame_done();
        }
    }
}

/// Backlight that logs and counts activations
#[derive(Debug, Default, Clone)]
pub struct LogBacklight {
    activations: Arc<AtomicU32>,
}

impl LogBacklight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activations(&self) -> u32 {
        self.activations.load(Ordering::Acquire)
    }
}

impl Backlight for LogBacklight {
    fn on(&self, brightness: u8, duration: TickDuration) {
        self.activations.fetch_add(1, Ordering::AcqRel);
        debug!("backlight {}% for {}", brightness, duration);
    }
}

/// Image code cannot run on the host; the app behaves as one whose main
/// only runs the event loop
#[derive(Debug, Default)]
pub struct EventLoopExecutor;

impl AppExecutor for EventLoopExecutor {
    fn enter(&self, app: &LoadedApp, context: &mut AppContext) {
        info!(
            "{} entering image at {:#010x} ({} relocations)",
            context.id(),
            app.entry(),
            app.relocations()
        );
        context.event_loop();
    }
}

struct ButtonLines {
    levels: [bool; NUM_BUTTONS],
    edges: u64,
}

/// Buttons pressed from code, with the edge interrupt as a condvar
#[derive(Clone)]
pub struct SimulatedButtons {
    lines: Arc<(Mutex<ButtonLines>, Condvar)>,
}

impl SimulatedButtons {
    pub fn new() -> Self {
        let lines = ButtonLines {
            levels: [false; NUM_BUTTONS],
            edges: 0,
        };
        Self {
            lines: Arc::new((Mutex::new(lines), Condvar::new())),
        }
    }

    pub fn press(&self, button: ButtonId) {
        self.set(button, true);
    }

    pub fn release(&self, button: ButtonId) {
        self.set(button, false);
    }

    fn set(&self, button: ButtonId, pressed: bool) {
        let (lines, edge) = &*self.lines;
        let mut lines = lock(lines);
        if lines.levels[button.index()] != pressed {
            lines.levels[button.index()] = pressed;
            lines.edges += 1;
            edge.notify_all();
        }
    }

    /// Sleep until the next edge or `timeout`
    fn wait_edge(&self, seen: u64, timeout: Duration) -> u64 {
        let (lines, edge) = &*self.lines;
        let guard = lock(lines);
        let (guard, _) = edge
            .wait_timeout_while(guard, timeout, |lines| lines.edges == seen)
            .unwrap_or_else(PoisonError::into_inner);
        guard.edges
    }

    fn edges(&self) -> u64 {
        lock(&self.lines.0).edges
    }
}

impl Default for SimulatedButtons {
    fn default() -> Self {
        Self::new()
    }
}

impl ButtonPins for SimulatedButtons {
    fn levels(&mut self) -> [bool; NUM_BUTTONS] {
        lock(&self.lines.0).levels
    }
}

/// Builder prefilled with the host collaborators: threads, the system
/// clock, condvar queues, a self-completing headless display, a logging
/// backlight and no paired phone
pub fn builder(config: RuntimeConfig) -> RuntimeBuilder {
    let draw = Arc::new(DrawCoordinator::new(config.frame_watchdog));
    let display = HeadlessDisplay::new(Arc::clone(&draw), true);
    let depth = config.queue_depth;
    RuntimeBuilder::new(config)
        .clock(Arc::new(SystemClock::new()))
        .spawner(Arc::new(ThreadSpawner::new()))
        .host(Box::new(NoHost))
        .executor(Box::new(EventLoopExecutor))
        .display(draw, Box::new(display))
        .backlight(Box::new(LogBacklight::new()))
        .mailboxes(mailboxes(depth))
}

/// A runtime running on host threads
pub struct RuntimeHandle {
    shared: Arc<RuntimeShared>,
    threads: Vec<JoinHandle<()>>,
}

/// Start the supervisor and the button task
pub fn start(runtime: Runtime, buttons: SimulatedButtons) -> io::Result<RuntimeHandle> {
    let (shared, mut supervisor) = runtime.into_parts();
    let supervisor = thread::Builder::new()
        .name(String::from("supervisor"))
        .spawn(move || supervisor.run())?;
    let button_shared = Arc::clone(&shared);
    let button = thread::Builder::new()
        .name(String::from("buttons"))
        .spawn(move || button_task(&button_shared, buttons))?;
    Ok(RuntimeHandle {
        shared,
        threads: vec![supervisor, button],
    })
}

/// Sample on every edge and whenever the machine asked to be polled
fn button_task(shared: &RuntimeShared, mut buttons: SimulatedButtons) {
    let mut seen = buttons.edges();
    while shared.is_running() {
        let delay = shared.scan_buttons(buttons.levels());
        let wait = delay.map_or(IDLE_WAIT, |delay| delay.to_std().min(IDLE_WAIT));
        seen = buttons.wait_edge(seen, wait);
    }
}

impl RuntimeHandle {
    pub fn shared(&self) -> &Arc<RuntimeShared> {
        &self.shared
    }

    pub fn state(&self, context: ContextId) -> LifecycleState {
        self.shared.state(context)
    }

    pub fn launch(&self, context: ContextId, app: AppId) -> RtResult<()> {
        self.shared.launch(context, app)
    }

    pub fn post(&self, context: ContextId, message: RuntimeMessage) -> RtResult<()> {
        self.shared.post_runtime(context, message)
    }

    pub fn post_event(&self, packet: EventPacket) -> RtResult<()> {
        self.shared.post_event(packet)
    }

    /// The host finished (or gave up) transferring `app`
    pub fn download_complete(&self, context: ContextId, app: AppId, ok: bool) -> RtResult<()> {
        self.post(context, RuntimeMessage::DownloadComplete { app, ok })
    }

    /// Stop the supervisor and the button task, then cancel every context
    /// task
    pub fn stop(self) {
        self.shared.stop();
        for thread in self.threads {
            if thread.join().is_err() {
                error!("runtime thread panicked");
            }
        }
        for context in ContextId::ALL {
            self.shared.status(context).bump_generation();
        }
        info!("runtime stopped");
    }
}
