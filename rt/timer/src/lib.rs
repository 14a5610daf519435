#![no_std]
#![forbid(unsafe_code)]

//! # apprt timers
//!
//! Per-context software timers. Each context's runloop owns one
//! [`TimerList`]; the list is a pure data structure and never calls back on
//! its own. The runloop pops due timers with [`TimerList::expire_due`] and
//! runs them after they are detached, so a callback may re-arm itself.

pub mod list;

pub use list::{ExpiredTimer, Iter, TimerId, TimerList};
