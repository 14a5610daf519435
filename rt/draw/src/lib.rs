#![no_std]
#![forbid(unsafe_code)]

//! # apprt draw
//!
//! Serialises access to the shared frame buffer.
//!
//! ## Module Overview
//! - [`frame`]  – the frame lock and its watchdog
//! - [`canvas`] – drawing surface and display driver contracts
//! - [`window`] – windows and per-context window stacks
//!
//! A frame starts with [`DrawCoordinator::try_begin`]; the display driver's
//! completion interrupt ends it with [`DrawCoordinator::on_frame_done`].

#[cfg(test)]
extern crate std;

pub mod canvas;
pub mod frame;
pub mod window;

pub use canvas::{Canvas, Color, DisplayDriver, FrameBuffer, Point, Rect, Size};
pub use frame::{DrawCoordinator, DrawStats, FrameToken};
pub use window::{Window, WindowId, WindowStack, MAX_WINDOWS};

#[cfg(test)]
mod tests;
