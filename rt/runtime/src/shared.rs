//! State shared by the supervisor, the context tasks and the button task

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use log::{error, warn};

use apprt_core::sync::Mutex;
use apprt_core::{
    AppId, Backlight, Clock, ContextId, ContextStatus, Envelope, LifecycleState, Mailbox,
    QueueFull, RtError, RtResult, RuntimeConfig, RuntimeMessage, Tick, TickDuration,
};
use apprt_draw::{DisplayDriver, DrawCoordinator, Window};
use apprt_event::{EventPacket, EventService};
use apprt_input::{ButtonMachine, ClickEvent, ClickSink, NUM_BUTTONS};

use crate::context::AppContext;
use crate::port::{AppExecutor, TaskSpawner};

/// Message queued on a context task
pub enum AppMessage {
    /// A recognised click for a handler this context subscribed
    Button(ClickEvent<AppContext>),
    /// Reinstall the click bindings of the topmost window
    LoadClickConfig,
    /// Leave the runloop
    Quit,
    /// Paint a frame
    Draw { force: bool },
    Event(EventPacket),
    /// Overlay only: stack a window
    PushOverlay(Window<AppContext>),
    /// Overlay only: remove the topmost window
    PopOverlay,
    /// Overlay only: paint overlay windows over the base frame and start it
    Compose,
}

impl fmt::Debug for AppMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppMessage::Button(click) => write!(f, "Button({:?})", click.recognizer),
            AppMessage::LoadClickConfig => f.write_str("LoadClickConfig"),
            AppMessage::Quit => f.write_str("Quit"),
            AppMessage::Draw { force } => write!(f, "Draw(force={})", force),
            AppMessage::Event(packet) => write!(f, "Event({})", packet.command()),
            AppMessage::PushOverlay(window) => write!(f, "PushOverlay({})", window.id()),
            AppMessage::PopOverlay => f.write_str("PopOverlay"),
            AppMessage::Compose => f.write_str("Compose"),
        }
    }
}

/// Everything the runtime's tasks share.
///
/// Constructed once by [`RuntimeBuilder`](crate::RuntimeBuilder); the
/// supervisor, every context task and the button task hold an `Arc` to it.
pub struct RuntimeShared {
    pub(crate) config: RuntimeConfig,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) supervisor: Box<dyn Mailbox<Envelope>>,
    pub(crate) mailboxes: [Box<dyn Mailbox<AppMessage>>; ContextId::COUNT],
    pub(crate) status: [ContextStatus; ContextId::COUNT],
    pub(crate) buttons: Mutex<ButtonMachine<AppContext>>,
    pub(crate) events: Mutex<EventService<AppContext>>,
    pub(crate) draw: Arc<DrawCoordinator>,
    pub(crate) display: Box<dyn DisplayDriver>,
    pub(crate) backlight: Box<dyn Backlight>,
    pub(crate) executor: Box<dyn AppExecutor>,
    pub(crate) spawner: Arc<dyn TaskSpawner>,
    pub(crate) overlay_windows: AtomicUsize,
    pub(crate) redraw_pending: AtomicBool,
    pub(crate) running: AtomicBool,
}

impl RuntimeShared {
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn now(&self) -> Tick {
        self.clock.now()
    }

    pub fn state(&self, context: ContextId) -> LifecycleState {
        self.status[context.index()].state()
    }

    pub fn status(&self, context: ContextId) -> &ContextStatus {
        &self.status[context.index()]
    }

    pub fn mailbox(&self, context: ContextId) -> &dyn Mailbox<AppMessage> {
        self.mailboxes[context.index()].as_ref()
    }

    pub fn draw(&self) -> &DrawCoordinator {
        &self.draw
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ask the supervisor and the button task to exit after their current
    /// pass
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Windows currently stacked on Overlay
    pub fn overlay_windows(&self) -> usize {
        self.overlay_windows.load(Ordering::Acquire)
    }

    /// Queue a message for the supervisor
    pub fn post_runtime(&self, target: ContextId, message: RuntimeMessage) -> RtResult<()> {
        self.supervisor
            .post(Envelope::new(target, message), self.config.post_timeout)
            .map_err(|QueueFull(envelope)| {
                error!("supervisor queue full, dropped {}", envelope);
                RtError::QueueFull
            })
    }

    /// Queue a message on a context task
    pub fn post_app(&self, target: ContextId, message: AppMessage) -> RtResult<()> {
        self.mailbox(target)
            .post(message, self.config.post_timeout)
            .map_err(|QueueFull(message)| {
                error!("{} queue full, dropped {:?}", target, message);
                RtError::QueueFull
            })
    }

    /// Switch MainApp (or Worker, for worker apps) to `app`
    pub fn launch(&self, target: ContextId, app: AppId) -> RtResult<()> {
        self.post_runtime(target, RuntimeMessage::LoadApp(app))
    }

    /// Publish an event; it enters at MainApp. When the queue is full the
    /// packet is dropped here, destructor included.
    pub fn post_event(&self, packet: EventPacket) -> RtResult<()> {
        self.post_event_to(ContextId::MainApp, packet)
    }

    /// Deliver an event to one context only
    pub fn post_event_to(&self, target: ContextId, packet: EventPacket) -> RtResult<()> {
        self.post_app(target, AppMessage::Event(packet))
    }

    /// Ask MainApp for a frame. Non-forced requests coalesce while one is
    /// pending.
    pub fn request_redraw(&self, force: bool) {
        if !force && self.redraw_pending.swap(true, Ordering::AcqRel) {
            return;
        }
        if self
            .post_app(ContextId::MainApp, AppMessage::Draw { force })
            .is_err()
        {
            self.redraw_pending.store(false, Ordering::Release);
        }
    }

    /// One pass of the button task over freshly sampled `levels`; returns
    /// how long the task may sleep when no edge arrives
    pub fn scan_buttons(&self, levels: [bool; NUM_BUTTONS]) -> Option<TickDuration> {
        let now = self.clock.now();
        let mut sink = Router { shared: self };
        self.buttons.with(|machine| machine.scan(now, levels, &mut sink))
    }
}

/// Routes clicks to the queue of the owning context
struct Router<'a> {
    shared: &'a RuntimeShared,
}

impl ClickSink<AppContext> for Router<'_> {
    fn deliver(&mut self, event: ClickEvent<AppContext>) {
        if let Err(QueueFull(message)) = self
            .shared
            .mailbox(event.target)
            .post_from_isr(AppMessage::Button(event))
        {
            warn!("{} queue full, click dropped: {:?}", event.target, message);
        }
    }

    fn backlight_on(&mut self) {
        let config = &self.shared.config;
        self.shared
            .backlight
            .on(config.backlight_brightness, config.backlight_duration);
    }
}
