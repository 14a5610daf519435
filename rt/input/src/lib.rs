#![no_std]
#![forbid(unsafe_code)]

//! # apprt input
//!
//! Debounces the physical buttons and turns presses into click events.
//!
//! The [`ButtonMachine`] is driven by a single button task: the task wakes
//! on an edge notification or on the delay returned by the previous
//! [`ButtonMachine::scan`], samples the pins and scans again. Recognised
//! clicks leave through a [`ClickSink`], which routes them to the queue of
//! the context that subscribed the handler.

#[cfg(test)]
extern crate std;

pub mod button;
pub mod machine;

pub use button::{
    ButtonId, ButtonPins, ButtonState, ClickConfig, ClickHandler, ClickKind, ClickRecognizer,
    HandlerKind, LongClick, RawClick, SingleClick, NUM_BUTTONS,
};
pub use machine::{ButtonMachine, ClickEvent, ClickSink};

#[cfg(test)]
mod tests;
