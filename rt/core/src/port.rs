//! Contracts the runtime consumes from the RTOS and board layers.

use core::fmt;

use crate::time::{Tick, TickDuration};

/// Monotonic tick source
pub trait Clock: Send + Sync {
    fn now(&self) -> Tick;
}

/// A post that did not fit; carries the message back so its owner can
/// release whatever it holds.
pub struct QueueFull<T>(pub T);

impl<T> QueueFull<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for QueueFull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueueFull(..)")
    }
}

/// Bounded message queue of one task.
///
/// Messages are delivered strictly FIFO. `post` may block up to `timeout`
/// for room; `post_from_isr` never blocks.
pub trait Mailbox<T>: Send + Sync {
    fn post(&self, message: T, timeout: TickDuration) -> Result<(), QueueFull<T>>;

    fn post_from_isr(&self, message: T) -> Result<(), QueueFull<T>>;

    /// Blocks up to `timeout` (forever when `None`) for the next message
    fn receive(&self, timeout: Option<TickDuration>) -> Option<T>;

    /// Drops every queued message
    fn reset(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Display backlight
pub trait Backlight: Send + Sync {
    /// Light up at `brightness` percent for `duration`
    fn on(&self, brightness: u8, duration: TickDuration);
}
