//! Frame lock with watchdog recovery

use core::cell::RefCell;
use core::convert::Infallible;

use critical_section::Mutex;
use log::{error, trace};

use apprt_core::{Tick, TickDuration};

/// Frame counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    /// Frames that acquired the lock
    pub frames: u32,
    /// Requests dropped while a frame was in flight
    pub dropped: u32,
    /// Locks force-released by the watchdog
    pub recoveries: u32,
}

#[cfg(feature = "defmt")]
impl defmt::Format for DrawStats {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "frames={} dropped={} recoveries={}",
            self.frames,
            self.dropped,
            self.recoveries
        );
    }
}

/// Proof that the caller owns the frame buffer until the frame completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameToken {
    started: Tick,
    recovered: bool,
}

impl FrameToken {
    pub fn started(&self) -> Tick {
        self.started
    }

    /// The previous frame never completed and was reclaimed
    pub fn recovered(&self) -> bool {
        self.recovered
    }
}

struct LockState {
    held: bool,
    started: Tick,
    stats: DrawStats,
}

enum Attempt {
    Acquired,
    Recovered(u64),
    Dropped,
}

/// The single frame lock shared by MainApp and Overlay.
///
/// At most one frame is in flight. A request arriving while a frame is in
/// flight is dropped, unless the frame has been in flight for longer than
/// the watchdog, in which case its completion is presumed lost and the
/// request takes the lock over.
pub struct DrawCoordinator {
    state: Mutex<RefCell<LockState>>,
    watchdog: TickDuration,
}

impl DrawCoordinator {
    pub const fn new(watchdog: TickDuration) -> Self {
        Self {
            state: Mutex::new(RefCell::new(LockState {
                held: false,
                started: Tick::ZERO,
                stats: DrawStats {
                    frames: 0,
                    dropped: 0,
                    recoveries: 0,
                },
            })),
            watchdog,
        }
    }

    pub fn watchdog(&self) -> TickDuration {
        self.watchdog
    }

    /// Try to take the frame lock at `now`.
    ///
    /// `WouldBlock` means another frame is in flight and this request was
    /// dropped; the caller does not retry.
    pub fn try_begin(&self, now: Tick) -> nb::Result<FrameToken, Infallible> {
        let watchdog = u64::from(self.watchdog.ticks());
        let attempt = critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            let attempt = if !state.held {
                Attempt::Acquired
            } else {
                let held_for = now.elapsed_since(state.started);
                if held_for > watchdog {
                    state.stats.recoveries += 1;
                    Attempt::Recovered(held_for)
                } else {
                    state.stats.dropped += 1;
                    Attempt::Dropped
                }
            };
            if !matches!(attempt, Attempt::Dropped) {
                state.held = true;
                state.started = now;
                state.stats.frames += 1;
            }
            attempt
        });

        match attempt {
            Attempt::Acquired => Ok(FrameToken {
                started: now,
                recovered: false,
            }),
            Attempt::Recovered(held_for) => {
                error!("frame lock held for {} ms, forcing release", held_for);
                Ok(FrameToken {
                    started: now,
                    recovered: true,
                })
            }
            Attempt::Dropped => {
                trace!("draw request dropped, frame in flight");
                Err(nb::Error::WouldBlock)
            }
        }
    }

    /// Release the lock; called from the display completion interrupt.
    /// Returns false when no frame was in flight.
    pub fn on_frame_done(&self) -> bool {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            core::mem::replace(&mut state.held, false)
        })
    }

    pub fn is_locked(&self) -> bool {
        critical_section::with(|cs| self.state.borrow_ref(cs).held)
    }

    pub fn stats(&self) -> DrawStats {
        critical_section::with(|cs| self.state.borrow_ref(cs).stats)
    }
}
