#![no_std]
#![forbid(unsafe_code)]

//! # apprt core
//!
//! Types shared by every layer of the application runtime: context ids and
//! lifecycle states, the tick clock, runtime messages, configuration, the
//! error taxonomy and the traits the runtime expects its RTOS and board
//! collaborators to implement.

#[cfg(feature = "std")]
extern crate std;

use core::fmt;

pub mod config;
pub mod context;
pub mod message;
pub mod port;
pub mod sync;
pub mod time;

pub use config::{RuntimeConfig, RuntimeConfigBuilder};
pub use context::{ContextId, ContextStatus, LifecycleState};
pub use message::{AppId, Envelope, RuntimeMessage};
pub use port::{Backlight, Clock, Mailbox, QueueFull};
pub use time::{Tick, TickDuration};

#[cfg(test)]
mod tests;

/// Runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type used throughout the runtime
pub type RtResult<T> = Result<T, RtError>;

/// Error taxonomy of the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtError {
    /// Corrupt or unsupported application image
    InvalidImage,
    /// Context arena or fixed-capacity storage exhausted
    OutOfMemory,
    /// Download or shutdown deadline exceeded
    Timeout,
    /// Message queue is full
    QueueFull,
    /// Violated runtime invariant
    ProgrammingError,
    /// Lookup found nothing
    NotFound,
    /// Operation not available on this port
    Unsupported,
}

impl fmt::Display for RtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RtError::InvalidImage => write!(f, "Invalid application image"),
            RtError::OutOfMemory => write!(f, "Arena exhausted"),
            RtError::Timeout => write!(f, "Deadline exceeded"),
            RtError::QueueFull => write!(f, "Message queue is full"),
            RtError::ProgrammingError => write!(f, "Runtime invariant violated"),
            RtError::NotFound => write!(f, "Not found"),
            RtError::Unsupported => write!(f, "Unsupported on this port"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RtError {}

#[cfg(feature = "defmt")]
impl defmt::Format for RtError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            RtError::InvalidImage => defmt::write!(fmt, "InvalidImage"),
            RtError::OutOfMemory => defmt::write!(fmt, "OutOfMemory"),
            RtError::Timeout => defmt::write!(fmt, "Timeout"),
            RtError::QueueFull => defmt::write!(fmt, "QueueFull"),
            RtError::ProgrammingError => defmt::write!(fmt, "ProgrammingError"),
            RtError::NotFound => defmt::write!(fmt, "NotFound"),
            RtError::Unsupported => defmt::write!(fmt, "Unsupported"),
        }
    }
}
