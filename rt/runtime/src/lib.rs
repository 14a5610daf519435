#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

//! # apprt runtime
//!
//! The application runtime proper. A [`Supervisor`] owns three execution
//! contexts (MainApp, Worker and Overlay), loads apps into them and tears
//! them down again; each context runs its app on a task of its own, where
//! the [`AppContext`] runloop dispatches clicks, events, timers and draw
//! requests.
//!
//! Everything the runtime needs from the RTOS, the display and the paired
//! phone comes in through traits ([`TaskSpawner`], [`DisplayDriver`],
//! [`HostLink`], ...) handed to the [`RuntimeBuilder`]. The `std` feature
//! adds [`posix`], a port that runs the whole runtime on host threads.
//!
//! [`DisplayDriver`]: apprt_draw::DisplayDriver

extern crate alloc;

pub mod app;
pub mod builder;
pub mod context;
pub mod port;
pub mod registry;
pub mod shared;
pub mod supervisor;

#[cfg(feature = "std")]
pub mod posix;

pub use app::{AppDescriptor, AppKind, AppMain, AppManifest, AppSource, MAX_APPS};
pub use builder::{Mailboxes, Runtime, RuntimeBuilder};
pub use context::{AppContext, TimerCallback, MAX_APP_TIMERS};
pub use port::{AppExecutor, ContextTask, HostLink, TaskHandle, TaskSpawner};
pub use registry::{ExecutionContext, Registry};
pub use shared::{AppMessage, RuntimeShared};
pub use supervisor::Supervisor;

pub use apprt_core::{
    AppId, ContextId, LifecycleState, RtError, RtResult, RuntimeConfig, Tick, TickDuration,
};

#[cfg(all(test, feature = "std"))]
mod tests;
