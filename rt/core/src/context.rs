//! Execution contexts and their lifecycle states

use core::fmt;
use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use crate::{RtError, RtResult};

/// One of the three fixed execution contexts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ContextId {
    /// Foreground application
    MainApp = 0,
    /// Background worker
    Worker = 1,
    /// Transient overlay UI
    Overlay = 2,
}

impl ContextId {
    /// Number of contexts
    pub const COUNT: usize = 3;

    /// Every context in index order
    pub const ALL: [ContextId; Self::COUNT] =
        [ContextId::MainApp, ContextId::Worker, ContextId::Overlay];

    /// Dense index for per-context tables
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Look up a context by its dense index
    pub fn from_index(index: usize) -> RtResult<Self> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(RtError::ProgrammingError)
    }

    /// Contexts that may own windows and click handlers
    pub const fn has_ui(self) -> bool {
        matches!(self, ContextId::MainApp | ContextId::Overlay)
    }

    pub const fn name(self) -> &'static str {
        match self {
            ContextId::MainApp => "main",
            ContextId::Worker => "worker",
            ContextId::Overlay => "overlay",
        }
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ContextId {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{=str}", self.name());
    }
}

/// Lifecycle of a context as driven by the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum LifecycleState {
    Unloaded = 0,
    Loading = 1,
    Downloading = 2,
    Loaded = 3,
    Runloop = 4,
    Unloading = 5,
}

impl LifecycleState {
    const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => LifecycleState::Loading,
            2 => LifecycleState::Downloading,
            3 => LifecycleState::Loaded,
            4 => LifecycleState::Runloop,
            5 => LifecycleState::Unloading,
            _ => LifecycleState::Unloaded,
        }
    }

    /// States in which the context owns a live task
    pub const fn has_task(self) -> bool {
        matches!(
            self,
            LifecycleState::Loaded | LifecycleState::Runloop | LifecycleState::Unloading
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Unloaded => "Unloaded",
            LifecycleState::Loading => "Loading",
            LifecycleState::Downloading => "Downloading",
            LifecycleState::Loaded => "Loaded",
            LifecycleState::Runloop => "Runloop",
            LifecycleState::Unloading => "Unloading",
        };
        f.write_str(name)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for LifecycleState {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{=u8}", *self as u8);
    }
}

/// Lifecycle state and task generation of one context, shared between the
/// supervisor and that context's task.
///
/// The generation moves every time the supervisor deletes the context's
/// task; a task compares it with the value it was spawned with to learn it
/// has been cancelled.
#[derive(Debug)]
pub struct ContextStatus {
    state: AtomicU8,
    generation: AtomicU32,
}

impl ContextStatus {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(LifecycleState::Unloaded as u8),
            generation: AtomicU32::new(0),
        }
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_raw(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: LifecycleState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Move from `from` to `to` only if the context is still in `from`
    pub fn transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    /// Invalidate every task spawned before this call
    pub fn bump_generation(&self) -> u32 {
        self.generation.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }

    /// True when a task spawned at `generation` has been cancelled
    pub fn is_cancelled(&self, generation: u32) -> bool {
        self.generation() != generation
    }
}

impl Default for ContextStatus {
    fn default() -> Self {
        Self::new()
    }
}
