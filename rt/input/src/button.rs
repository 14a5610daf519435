//! Buttons, click configurations and recognisers

use core::fmt;

use embedded_hal::digital::InputPin;

use apprt_core::{RtError, RtResult, Tick, TickDuration};

pub const NUM_BUTTONS: usize = 4;

/// Physical buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ButtonId {
    Back = 0,
    Up = 1,
    Select = 2,
    Down = 3,
}

impl ButtonId {
    pub const ALL: [ButtonId; NUM_BUTTONS] =
        [ButtonId::Back, ButtonId::Up, ButtonId::Select, ButtonId::Down];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Unknown ids are a programming error
    pub fn from_index(index: usize) -> RtResult<Self> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(RtError::ProgrammingError)
    }
}

impl fmt::Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ButtonId::Back => "back",
            ButtonId::Up => "up",
            ButtonId::Select => "select",
            ButtonId::Down => "down",
        };
        f.write_str(name)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ButtonId {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "button{=u8}", *self as u8);
    }
}

/// What a delivered click represents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickKind {
    Single,
    Repeat,
    Long,
    LongRelease,
    RawDown,
    RawUp,
}

impl ClickKind {
    /// Handler slot the click comes from
    pub const fn handler_kind(self) -> HandlerKind {
        match self {
            ClickKind::Single | ClickKind::Repeat => HandlerKind::Single,
            ClickKind::Long | ClickKind::LongRelease => HandlerKind::Long,
            ClickKind::RawDown | ClickKind::RawUp => HandlerKind::Raw,
        }
    }
}

/// Handler slots of a button; each remembers the context that filled it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Single = 0,
    Long = 1,
    Raw = 2,
}

impl HandlerKind {
    pub const COUNT: usize = 3;
}

/// Passed to click handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickRecognizer {
    pub button: ButtonId,
    pub kind: ClickKind,
    /// Repeats fired so far during this press
    pub repeat_count: u8,
}

/// Click callback running on the subscribing context
pub type ClickHandler<C> = fn(&mut C, &ClickRecognizer);

pub struct SingleClick<C> {
    pub handler: ClickHandler<C>,
    /// Zero disables repeating
    pub repeat_interval: TickDuration,
}

pub struct LongClick<C> {
    pub delay: TickDuration,
    pub handler: Option<ClickHandler<C>>,
    pub release: Option<ClickHandler<C>>,
}

pub struct RawClick<C> {
    pub down: Option<ClickHandler<C>>,
    pub up: Option<ClickHandler<C>>,
}

/// Handlers registered on one button
pub struct ClickConfig<C> {
    pub single: Option<SingleClick<C>>,
    pub long: Option<LongClick<C>>,
    pub raw: Option<RawClick<C>>,
}

impl<C> ClickConfig<C> {
    pub const fn empty() -> Self {
        Self {
            single: None,
            long: None,
            raw: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.single.is_none() && self.long.is_none() && self.raw.is_none()
    }

    pub fn has(&self, kind: HandlerKind) -> bool {
        match kind {
            HandlerKind::Single => self.single.is_some(),
            HandlerKind::Long => self.long.is_some(),
            HandlerKind::Raw => self.raw.is_some(),
        }
    }

    pub fn clear(&mut self, kind: HandlerKind) {
        match kind {
            HandlerKind::Single => self.single = None,
            HandlerKind::Long => self.long = None,
            HandlerKind::Raw => self.raw = None,
        }
    }
}

impl<C> Default for ClickConfig<C> {
    fn default() -> Self {
        Self::empty()
    }
}

// fn pointers are Copy whatever `C` is; derives would demand `C: Clone`.
impl<C> Clone for SingleClick<C> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<C> Copy for SingleClick<C> {}

impl<C> Clone for LongClick<C> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<C> Copy for LongClick<C> {}

impl<C> Clone for RawClick<C> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<C> Copy for RawClick<C> {}

impl<C> Clone for ClickConfig<C> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<C> Copy for ClickConfig<C> {}

impl<C> fmt::Debug for ClickConfig<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClickConfig")
            .field("single", &self.single.map(|single| single.repeat_interval))
            .field("long", &self.long.map(|long| long.delay))
            .field("raw", &self.raw.is_some())
            .finish()
    }
}

/// Debounce and click bookkeeping of one button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonState {
    pub is_pressed: bool,
    pub last_transition: Option<Tick>,
    pub press_start: Tick,
    pub last_repeat: Tick,
    pub did_long_click: bool,
    pub is_repeating: bool,
    pub repeat_count: u8,
}

/// Source of the raw button levels
pub trait ButtonPins {
    /// True for every button currently held down
    fn levels(&mut self) -> [bool; NUM_BUTTONS];
}

/// Active-low inputs in `ButtonId` order; a pin that cannot be read counts
/// as released
impl<P: InputPin> ButtonPins for [P; NUM_BUTTONS] {
    fn levels(&mut self) -> [bool; NUM_BUTTONS] {
        let mut levels = [false; NUM_BUTTONS];
        for (level, pin) in levels.iter_mut().zip(self.iter_mut()) {
            *level = pin.is_low().unwrap_or(false);
        }
        levels
    }
}
