#![no_std]
#![forbid(unsafe_code)]

//! # apprt event
//!
//! Publish/subscribe between the application contexts.
//!
//! Posted packets always enter at MainApp. After MainApp's subscribers have
//! run the packet moves on to Overlay, which ends its journey. Worker is
//! never on that path; it only dispatches packets delivered to it directly.
//! A packet owns its payload and runs its destroy procedure exactly once,
//! when it is finally dropped, wherever that happens.

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod packet;
pub mod service;

pub use packet::{Destructor, DynPayload, EventCommand, EventPacket};
pub use service::{trigger, Disposition, EventHandler, EventService, Subscription, MAX_SUBSCRIPTIONS};
