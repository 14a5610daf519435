//! Per-context runloop and the API apps program against

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::any::Any;
use core::sync::atomic::Ordering;

use log::{debug, error, info, trace, warn};

use apprt_core::{
    AppId, ContextId, ContextStatus, LifecycleState, RtResult, RuntimeMessage, Tick, TickDuration,
};
use apprt_draw::{Canvas, Window, WindowStack, MAX_WINDOWS};
use apprt_event::{trigger, Disposition, EventCommand, EventHandler, EventPacket};
use apprt_input::{ButtonId, ButtonMachine, ClickHandler, ClickRecognizer};
use apprt_loader::LoadedApp;
use apprt_timer::{TimerId, TimerList};

use crate::app::{AppKind, AppMain};
use crate::shared::{AppMessage, RuntimeShared};

/// Timers one context can have queued
pub const MAX_APP_TIMERS: usize = 16;

/// Timer callback, run on the owning context with the registered data
pub type TimerCallback = fn(&mut AppContext, usize);

#[derive(Clone, Copy)]
struct AppTimer {
    callback: TimerCallback,
    data: usize,
}

/// What a context task runs
#[derive(Debug, Clone)]
pub(crate) enum Entry {
    Builtin(AppMain),
    Image(LoadedApp),
}

/// Identity of the app a task was spawned for
#[derive(Debug, Clone)]
pub(crate) struct Launch {
    pub(crate) app: AppId,
    pub(crate) kind: AppKind,
    pub(crate) entry: Entry,
}

/// The running app's view of its context.
///
/// One `AppContext` lives on each context task, created when the task
/// starts and dropped when it is deleted. Apps receive it in their entry
/// point, in every handler and in every timer callback.
pub struct AppContext {
    shared: Arc<RuntimeShared>,
    id: ContextId,
    generation: u32,
    app: AppId,
    kind: AppKind,
    timers: TimerList<AppTimer, MAX_APP_TIMERS>,
    windows: WindowStack<AppContext>,
    last_heartbeat: Tick,
    state: Option<Box<dyn Any>>,
}

impl AppContext {
    pub(crate) fn new(
        shared: Arc<RuntimeShared>,
        id: ContextId,
        generation: u32,
        launch: &Launch,
    ) -> Self {
        let now = shared.now();
        Self {
            shared,
            id,
            generation,
            app: launch.app,
            kind: launch.kind,
            timers: TimerList::new(),
            windows: WindowStack::new(),
            last_heartbeat: now,
            state: None,
        }
    }

    /// Task body: run the app, then hand the context back to the supervisor
    pub(crate) fn run(mut self, entry: Entry) {
        match entry {
            Entry::Builtin(main) => main(&mut self),
            Entry::Image(app) => {
                let shared = Arc::clone(&self.shared);
                shared.executor.enter(&app, &mut self);
            }
        }
        self.finish();
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn app(&self) -> AppId {
        self.app
    }

    pub fn kind(&self) -> AppKind {
        self.kind
    }

    pub fn now(&self) -> Tick {
        self.shared.now()
    }

    pub fn shared(&self) -> &Arc<RuntimeShared> {
        &self.shared
    }

    /// The supervisor deleted this task; stop touching shared state
    pub fn is_cancelled(&self) -> bool {
        self.status().is_cancelled(self.generation)
    }

    fn status(&self) -> &ContextStatus {
        self.shared.status(self.id)
    }

    // App state

    /// Store the app's state; replaces whatever was stored
    pub fn set_state<T: Any>(&mut self, state: T) {
        self.state = Some(Box::new(state));
    }

    pub fn state_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.state.as_mut().and_then(|state| state.downcast_mut::<T>())
    }

    pub fn state_ref<T: Any>(&self) -> Option<&T> {
        self.state.as_ref().and_then(|state| state.downcast_ref::<T>())
    }

    // Runloop

    /// Run the event loop until the app is told to quit.
    ///
    /// Entry moves the context to `Runloop`; if the supervisor is already
    /// unloading it the loop is skipped.
    pub fn event_loop(&mut self) {
        if !self
            .status()
            .transition(LifecycleState::Loaded, LifecycleState::Runloop)
        {
            info!("{} is {}, skipping runloop", self.id, self.status().state());
            return;
        }
        info!("{} running {}", self.id, self.app);
        self.load_click_config();
        self.last_heartbeat = self.now();

        while !self.is_cancelled() {
            let now = self.now();
            let heartbeat_due = self.last_heartbeat + self.shared.config.heartbeat_interval;
            let timeout = match self.timers.next_expiry(now) {
                Some(expiry) => expiry.min(now.until(heartbeat_due)),
                None => now.until(heartbeat_due),
            };

            match self.shared.mailbox(self.id).receive(Some(timeout)) {
                Some(message) => {
                    if !self.dispatch(message) {
                        break;
                    }
                }
                None => self.fire_timers(),
            }
            self.heartbeat();
            self.shared.spawner.yield_now();
        }
        debug!("{} left runloop", self.id);
    }

    pub(crate) fn fire_timers(&mut self) {
        let mut fired = false;
        let now = self.now();
        while let Some(timer) = self.timers.expire_due(now) {
            trace!("{} firing {}", self.id, timer.id);
            (timer.payload.callback)(self, timer.payload.data);
            fired = true;
        }
        if fired && self.id.has_ui() {
            self.request_redraw();
        }
    }

    fn heartbeat(&mut self) {
        let now = self.now();
        if now.elapsed_since(self.last_heartbeat)
            < u64::from(self.shared.config.heartbeat_interval.ticks())
        {
            return;
        }
        self.last_heartbeat = now;
        if self.is_cancelled() {
            return;
        }
        let _ = self.shared.post_runtime(self.id, RuntimeMessage::Heartbeat);
    }

    /// Returns false when the loop must end
    pub(crate) fn dispatch(&mut self, message: AppMessage) -> bool {
        trace!("{} <- {:?}", self.id, message);
        match message {
            AppMessage::Button(click) => {
                (click.handler)(self, &click.recognizer);
                self.request_redraw();
            }
            AppMessage::LoadClickConfig => self.load_click_config(),
            AppMessage::Quit => return false,
            AppMessage::Draw { force } => self.draw(force),
            AppMessage::Event(packet) => self.dispatch_event(packet),
            AppMessage::PushOverlay(window) => self.push_overlay_window(window),
            AppMessage::PopOverlay => {
                self.pop_window();
            }
            AppMessage::Compose => self.compose(),
        }
        true
    }

    fn dispatch_event(&mut self, packet: EventPacket) {
        let id = self.id;
        let handlers = self
            .shared
            .events
            .with(|events| events.handlers_for(id, packet.command()));
        match trigger(&handlers, self, id, &packet) {
            Disposition::Forward(next) => {
                // A failed forward drops the packet inside post_app.
                let _ = self.shared.post_event_to(next, packet);
            }
            Disposition::Destroy => drop(packet),
            Disposition::DestroyAndRedraw => {
                drop(packet);
                self.shared.request_redraw(true);
            }
        }
    }

    /// Hand the context back after the app returned
    fn finish(mut self) {
        if !self.is_cancelled() {
            while let Some(window) = self.windows.pop() {
                if let Some(unload) = window.unload() {
                    unload(&mut self);
                }
            }
            if self.id == ContextId::Overlay {
                self.shared.overlay_windows.store(0, Ordering::Release);
            }
            if self.id == ContextId::MainApp {
                self.shared.redraw_pending.store(false, Ordering::Release);
            }
            self.timers.clear();
            self.shared.status(self.id).set_state(LifecycleState::Unloading);
            let teardown = RuntimeMessage::Teardown {
                generation: self.generation,
            };
            if self.shared.post_runtime(self.id, teardown).is_err()
            {
                error!("{} could not post teardown, waiting for the sweep", self.id);
            }
        }
        let shared = Arc::clone(&self.shared);
        let status = shared.status(self.id);
        let generation = self.generation;
        shared.spawner.park(&|| status.is_cancelled(generation));
        debug!("{} task released", self.id);
    }

    // Drawing

    fn draw(&mut self, force: bool) {
        self.shared.redraw_pending.store(false, Ordering::Release);
        if self.id != ContextId::MainApp {
            debug!("{} ignoring draw request", self.id);
            return;
        }
        let now = self.now();
        let token = match self.shared.draw.try_begin(now) {
            Ok(token) => token,
            Err(_) => {
                trace!("draw(force={}) dropped, frame in flight", force);
                return;
            }
        };
        if token.recovered() {
            warn!("frame started at {} replaced a lost frame", token.started());
        }

        if let Some(window) = self.windows.top().copied() {
            self.paint(&window);
        }
        if self.shared.overlay_windows() > 0
            && self
                .shared
                .post_app(ContextId::Overlay, AppMessage::Compose)
                .is_ok()
        {
            return;
        }
        self.shared.display.start_frame(0, 0);
    }

    /// Overlay paints every overlay window over the base frame and starts it
    fn compose(&mut self) {
        let windows: heapless::Vec<Window<AppContext>, MAX_WINDOWS> =
            self.windows.iter().copied().collect();
        for window in &windows {
            self.paint(window);
        }
        self.shared.display.start_frame(0, 0);
    }

    fn paint(&mut self, window: &Window<AppContext>) {
        if let Some(draw) = window.draw() {
            let shared = Arc::clone(&self.shared);
            shared
                .display
                .with_canvas(&mut |canvas: &mut dyn Canvas| draw(self, canvas));
        }
    }

    /// Ask for a frame; coalesces with a pending request
    pub fn request_redraw(&self) {
        self.shared.request_redraw(false);
    }

    // Timers

    /// Run `callback` with `data` once `delay` has passed
    pub fn register_timer(
        &mut self,
        delay: TickDuration,
        callback: TimerCallback,
        data: usize,
    ) -> RtResult<TimerId> {
        let expiry = self.now() + delay;
        self.timers.insert(expiry, AppTimer { callback, data })
    }

    /// Move a queued timer to `delay` from now; false if it already fired
    pub fn reschedule_timer(&mut self, id: TimerId, delay: TickDuration) -> bool {
        let expiry = self.now() + delay;
        self.timers.reschedule(id, expiry)
    }

    /// Returns false if the timer already fired or was cancelled
    pub fn cancel_timer(&mut self, id: TimerId) -> bool {
        if !self.timers.contains(id) {
            return false;
        }
        self.timers.remove(id);
        true
    }

    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    // Windows

    /// Stack `window` on top; it takes over the click bindings
    pub fn push_window(&mut self, window: Window<AppContext>) -> RtResult<()> {
        assert!(self.id.has_ui(), "{} has no windows", self.id);
        self.windows.push(window)?;
        debug!("{} pushed {}", self.id, window.id());
        if self.id == ContextId::Overlay {
            self.shared
                .overlay_windows
                .store(self.windows.len(), Ordering::Release);
        }
        self.load_click_config();
        self.request_redraw();
        Ok(())
    }

    /// Remove the topmost window; the next one gets the click bindings
    pub fn pop_window(&mut self) -> Option<Window<AppContext>> {
        let window = self.windows.pop()?;
        debug!("{} popped {}", self.id, window.id());
        if let Some(unload) = window.unload() {
            unload(self);
        }
        if self.id == ContextId::Overlay {
            self.shared
                .overlay_windows
                .store(self.windows.len(), Ordering::Release);
            if self.windows.is_empty() {
                self.unsubscribe_clicks();
                let _ = self
                    .shared
                    .post_app(ContextId::MainApp, AppMessage::LoadClickConfig);
            } else {
                self.load_click_config();
            }
        } else {
            self.load_click_config();
        }
        self.request_redraw();
        Some(window)
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    pub fn top_window(&self) -> Option<&Window<AppContext>> {
        self.windows.top()
    }

    /// Stack `window` on the Overlay context
    pub fn push_overlay(&self, window: Window<AppContext>) -> RtResult<()> {
        self.shared
            .post_app(ContextId::Overlay, AppMessage::PushOverlay(window))
    }

    pub fn pop_overlay(&self) -> RtResult<()> {
        self.shared.post_app(ContextId::Overlay, AppMessage::PopOverlay)
    }

    fn push_overlay_window(&mut self, window: Window<AppContext>) {
        if self.id != ContextId::Overlay {
            warn!("{} cannot host overlay {}", self.id, window.id());
            return;
        }
        if let Err(err) = self.push_window(window) {
            error!("overlay {} not shown: {}", window.id(), err);
        }
    }

    // Buttons

    /// Install the default bindings, then those of the topmost window.
    /// Overlay windows take every button while they are shown.
    fn load_click_config(&mut self) {
        if !self.id.has_ui() {
            return;
        }
        if self.id == ContextId::MainApp && self.shared.overlay_windows() > 0 {
            return;
        }
        if self.id == ContextId::Overlay && self.windows.is_empty() {
            return;
        }
        let id = self.id;
        self.buttons(|buttons| {
            if id == ContextId::Overlay {
                buttons.clear();
            } else {
                buttons.unsubscribe_context(id);
            }
        });
        self.subscribe_single(ButtonId::Back, default_back);
        if self.kind == AppKind::Watchface {
            self.subscribe_single(ButtonId::Select, default_select);
        }
        if let Some(provider) = self.windows.top().and_then(|window| window.click_config()) {
            provider(self);
        }
    }

    pub fn subscribe_single(&self, button: ButtonId, handler: ClickHandler<AppContext>) {
        self.buttons(|buttons| buttons.subscribe_single(self.id, button, handler));
    }

    pub fn subscribe_repeating(
        &self,
        button: ButtonId,
        interval: TickDuration,
        handler: ClickHandler<AppContext>,
    ) {
        self.buttons(|buttons| buttons.subscribe_repeating(self.id, button, interval, handler));
    }

    pub fn subscribe_long(
        &self,
        button: ButtonId,
        delay: TickDuration,
        handler: Option<ClickHandler<AppContext>>,
        release: Option<ClickHandler<AppContext>>,
    ) {
        self.buttons(|buttons| buttons.subscribe_long(self.id, button, delay, handler, release));
    }

    pub fn subscribe_raw(
        &self,
        button: ButtonId,
        down: Option<ClickHandler<AppContext>>,
        up: Option<ClickHandler<AppContext>>,
    ) {
        self.buttons(|buttons| buttons.subscribe_raw(self.id, button, down, up));
    }

    pub fn unsubscribe_clicks(&self) {
        self.buttons(|buttons| buttons.unsubscribe_context(self.id));
    }

    /// Worker has no buttons; asking for them is a programming error
    fn buttons<R>(&self, f: impl FnOnce(&mut ButtonMachine<AppContext>) -> R) -> R {
        assert!(self.id.has_ui(), "{} cannot use buttons", self.id);
        self.shared.buttons.with(f)
    }

    // Events

    pub fn subscribe_event(
        &self,
        command: EventCommand,
        handler: EventHandler<AppContext>,
        context: usize,
    ) -> RtResult<()> {
        self.shared
            .events
            .with(|events| events.subscribe(self.id, command, handler, context))
    }

    /// Tick and minute services
    pub fn subscribe_tick(&self, handler: EventHandler<AppContext>) -> RtResult<()> {
        self.subscribe_event(EventCommand::TICK, handler, 0)
    }

    pub fn unsubscribe_event(&self, command: EventCommand) -> bool {
        self.shared
            .events
            .with(|events| events.unsubscribe(self.id, command))
    }

    pub fn event_context(&self, command: EventCommand) -> Option<usize> {
        self.shared
            .events
            .with(|events| events.context(self.id, command))
    }

    pub fn set_event_context(&self, command: EventCommand, context: usize) -> RtResult<()> {
        self.shared
            .events
            .with(|events| events.set_context(self.id, command, context))
    }

    pub fn post_event(&self, packet: EventPacket) -> RtResult<()> {
        self.shared.post_event(packet)
    }

    // Lifecycle

    /// Ask the supervisor to unload this app
    pub fn quit(&self) -> RtResult<()> {
        self.shared.post_runtime(self.id, RuntimeMessage::QuitRequest)
    }

    /// Replace the app running on this context (MainApp for Overlay)
    pub fn launch(&self, app: AppId) -> RtResult<()> {
        let target = match self.id {
            ContextId::Overlay => ContextId::MainApp,
            id => id,
        };
        self.shared.launch(target, app)
    }
}

/// Back closes the topmost window. MainApp returns to the default app when
/// its last window goes; Overlay hands the buttons back to MainApp.
fn default_back(context: &mut AppContext, _: &ClickRecognizer) {
    context.pop_window();
    if context.id == ContextId::MainApp && context.windows.is_empty() {
        let default_app = context.shared.config.default_app;
        if context.app != default_app {
            if let Err(err) = context.launch(default_app) {
                error!("cannot return to {}: {}", default_app, err);
            }
        }
    }
}

fn default_select(context: &mut AppContext, _: &ClickRecognizer) {
    let default_app = context.shared.config.default_app;
    if let Err(err) = context.launch(default_app) {
        error!("cannot leave watchface: {}", err);
    }
}
