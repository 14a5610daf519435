//! Debounce and click state machine

use log::trace;

use apprt_core::{ContextId, Tick, TickDuration};

use crate::button::{
    ButtonId, ButtonState, ClickConfig, ClickHandler, ClickKind, ClickRecognizer, HandlerKind,
    LongClick, RawClick, SingleClick, NUM_BUTTONS,
};

/// A recognised click, addressed to the context owning its handler
pub struct ClickEvent<C> {
    pub target: ContextId,
    pub handler: ClickHandler<C>,
    pub recognizer: ClickRecognizer,
}

impl<C> Clone for ClickEvent<C> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<C> Copy for ClickEvent<C> {}

impl<C> core::fmt::Debug for ClickEvent<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ClickEvent")
            .field("target", &self.target)
            .field("recognizer", &self.recognizer)
            .finish()
    }
}

/// Where recognised clicks go
pub trait ClickSink<C> {
    /// Queue `event` on its target context
    fn deliver(&mut self, event: ClickEvent<C>);

    /// Wake the backlight; runs after every delivered click
    fn backlight_on(&mut self);
}

struct Slot<C> {
    config: ClickConfig<C>,
    owners: [ContextId; HandlerKind::COUNT],
    state: ButtonState,
}

impl<C> Slot<C> {
    const fn new() -> Self {
        Self {
            config: ClickConfig::empty(),
            owners: [ContextId::MainApp; HandlerKind::COUNT],
            state: ButtonState {
                is_pressed: false,
                last_transition: None,
                press_start: Tick::ZERO,
                last_repeat: Tick::ZERO,
                did_long_click: false,
                is_repeating: false,
                repeat_count: 0,
            },
        }
    }
}

/// Per-button debounce and click recognition.
///
/// Only the button task mutates the machine's press state; subscriptions
/// come from the contexts through whatever lock the port wraps it in.
pub struct ButtonMachine<C> {
    slots: [Slot<C>; NUM_BUTTONS],
    debounce: TickDuration,
    poll: TickDuration,
}

impl<C> ButtonMachine<C> {
    pub const fn new(debounce: TickDuration, poll: TickDuration) -> Self {
        Self {
            slots: [Slot::new(), Slot::new(), Slot::new(), Slot::new()],
            debounce,
            poll,
        }
    }

    pub fn state(&self, button: ButtonId) -> &ButtonState {
        &self.slots[button.index()].state
    }

    pub fn config(&self, button: ButtonId) -> &ClickConfig<C> {
        &self.slots[button.index()].config
    }

    /// Context that last subscribed `kind` on `button`
    pub fn owner(&self, button: ButtonId, kind: HandlerKind) -> ContextId {
        self.slots[button.index()].owners[kind as usize]
    }

    pub fn subscribe_single(&mut self, owner: ContextId, button: ButtonId, handler: ClickHandler<C>) {
        self.subscribe_repeating(owner, button, TickDuration::ZERO, handler);
    }

    pub fn subscribe_repeating(
        &mut self,
        owner: ContextId,
        button: ButtonId,
        repeat_interval: TickDuration,
        handler: ClickHandler<C>,
    ) {
        let slot = self.claim(owner, button, HandlerKind::Single);
        slot.config.single = Some(SingleClick {
            handler,
            repeat_interval,
        });
    }

    pub fn subscribe_long(
        &mut self,
        owner: ContextId,
        button: ButtonId,
        delay: TickDuration,
        handler: Option<ClickHandler<C>>,
        release: Option<ClickHandler<C>>,
    ) {
        let slot = self.claim(owner, button, HandlerKind::Long);
        slot.config.long = Some(LongClick {
            delay,
            handler,
            release,
        });
    }

    pub fn subscribe_raw(
        &mut self,
        owner: ContextId,
        button: ButtonId,
        down: Option<ClickHandler<C>>,
        up: Option<ClickHandler<C>>,
    ) {
        let slot = self.claim(owner, button, HandlerKind::Raw);
        slot.config.raw = Some(RawClick { down, up });
    }

    /// Replace every handler of `button` with `config`, all owned by `owner`
    pub fn install(&mut self, owner: ContextId, button: ButtonId, config: ClickConfig<C>) {
        assert!(owner.has_ui(), "{} cannot own click handlers", owner);
        let slot = &mut self.slots[button.index()];
        slot.config = config;
        slot.owners = [owner; HandlerKind::COUNT];
    }

    /// Drop every handler `owner` registered
    pub fn unsubscribe_context(&mut self, owner: ContextId) {
        for slot in self.slots.iter_mut() {
            for kind in [HandlerKind::Single, HandlerKind::Long, HandlerKind::Raw] {
                if slot.owners[kind as usize] == owner {
                    slot.config.clear(kind);
                }
            }
        }
    }

    /// Drop every handler on every button
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.config = ClickConfig::empty();
        }
    }

    fn claim(&mut self, owner: ContextId, button: ButtonId, kind: HandlerKind) -> &mut Slot<C> {
        assert!(owner.has_ui(), "{} cannot own click handlers", owner);
        let slot = &mut self.slots[button.index()];
        slot.owners[kind as usize] = owner;
        slot
    }

    /// Scan every button against the sampled `levels` and fire whatever is
    /// due. Returns how long the button task may sleep before the next scan
    /// when no edge arrives; `None` means until the next edge.
    pub fn scan<S>(&mut self, now: Tick, levels: [bool; NUM_BUTTONS], sink: &mut S) -> Option<TickDuration>
    where
        S: ClickSink<C>,
    {
        let mut next: Option<Tick> = None;
        for button in ButtonId::ALL {
            let level = levels[button.index()];
            if let Some(deadline) = self.debounce_input(button, now, level, sink) {
                next = earliest(next, deadline);
            }
            if self.slots[button.index()].state.is_pressed {
                if let Some(due) = self.held(button, now, sink) {
                    next = earliest(next, due);
                }
                next = earliest(next, now + self.poll);
            }
        }
        next.map(|deadline| now.until(deadline))
    }

    /// Accept a level change once the debounce interval has passed since
    /// the previous accepted transition. Returns when to look again if the
    /// change is still bouncing.
    fn debounce_input<S>(&mut self, button: ButtonId, now: Tick, level: bool, sink: &mut S) -> Option<Tick>
    where
        S: ClickSink<C>,
    {
        let state = &mut self.slots[button.index()].state;
        if level == state.is_pressed {
            return None;
        }
        if let Some(last) = state.last_transition {
            let settle = last + self.debounce;
            if !now.has_reached(settle) {
                trace!("{} bouncing", button);
                return Some(settle);
            }
        }
        state.is_pressed = level;
        state.last_transition = Some(now);
        if level {
            self.pressed(button, now, sink);
        } else {
            self.released(button, sink);
        }
        None
    }

    fn pressed<S: ClickSink<C>>(&mut self, button: ButtonId, now: Tick, sink: &mut S) {
        let slot = &mut self.slots[button.index()];
        slot.state.press_start = now;
        slot.state.last_repeat = now;
        slot.state.did_long_click = false;
        slot.state.is_repeating = false;
        slot.state.repeat_count = 0;
        let config = slot.config;

        if let Some(down) = config.raw.and_then(|raw| raw.down) {
            self.fire(button, ClickKind::RawDown, down, sink);
        }
        if let (Some(single), None) = (config.single, config.long) {
            self.fire(button, ClickKind::Single, single.handler, sink);
        }
    }

    fn released<S: ClickSink<C>>(&mut self, button: ButtonId, sink: &mut S) {
        let slot = &self.slots[button.index()];
        let config = slot.config;
        let state = slot.state;

        if let Some(up) = config.raw.and_then(|raw| raw.up) {
            self.fire(button, ClickKind::RawUp, up, sink);
        }
        if let (Some(single), Some(_)) = (config.single, config.long) {
            if !state.did_long_click && !state.is_repeating {
                self.fire(button, ClickKind::Single, single.handler, sink);
            }
        }
        if state.did_long_click {
            if let Some(release) = config.long.and_then(|long| long.release) {
                self.fire(button, ClickKind::LongRelease, release, sink);
            }
        }
    }

    /// Fire long and repeat clicks that came due while the button is held;
    /// returns the nearest future deadline
    fn held<S: ClickSink<C>>(&mut self, button: ButtonId, now: Tick, sink: &mut S) -> Option<Tick> {
        let config = self.slots[button.index()].config;
        let mut next = None;

        if let Some(long) = config.long {
            let state = &mut self.slots[button.index()].state;
            if !state.did_long_click {
                let due = state.press_start + long.delay;
                if now.has_reached(due) {
                    state.did_long_click = true;
                    if let Some(handler) = long.handler {
                        self.fire(button, ClickKind::Long, handler, sink);
                    }
                } else {
                    next = earliest(next, due);
                }
            }
        }

        if let Some(single) = config.single.filter(|single| !single.repeat_interval.is_zero()) {
            let state = &mut self.slots[button.index()].state;
            if !state.did_long_click {
                let due = state.last_repeat + single.repeat_interval;
                if now.has_reached(due) {
                    state.is_repeating = true;
                    state.last_repeat = now;
                    state.repeat_count = state.repeat_count.saturating_add(1);
                    self.fire(button, ClickKind::Repeat, single.handler, sink);
                    next = earliest(next, now + single.repeat_interval);
                } else {
                    next = earliest(next, due);
                }
            }
        }
        next
    }

    fn fire<S: ClickSink<C>>(&mut self, button: ButtonId, kind: ClickKind, handler: ClickHandler<C>, sink: &mut S) {
        let slot = &self.slots[button.index()];
        let target = slot.owners[kind.handler_kind() as usize];
        let recognizer = ClickRecognizer {
            button,
            kind,
            repeat_count: slot.state.repeat_count,
        };
        trace!("{} {:?} -> {}", button, kind, target);
        sink.deliver(ClickEvent {
            target,
            handler,
            recognizer,
        });
        sink.backlight_on();
    }
}

fn earliest(current: Option<Tick>, candidate: Tick) -> Option<Tick> {
    match current {
        Some(current) if current.elapsed_since(candidate) > u64::MAX / 2 => Some(current),
        Some(current) if current == candidate => Some(current),
        _ => Some(candidate),
    }
}
