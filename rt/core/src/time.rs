//! Tick clock types
//!
//! One tick is one millisecond. Ticks wrap; every comparison goes through
//! wrapping arithmetic.

use core::fmt;
use core::ops::Add;

/// Absolute tick count
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tick(u64);

impl Tick {
    /// Zero tick
    pub const ZERO: Self = Self(0);

    /// Create a tick from a raw count
    pub const fn new(ticks: u64) -> Self {
        Self(ticks)
    }

    /// Get the raw tick value
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Ticks elapsed since `previous`
    pub const fn elapsed_since(self, previous: Tick) -> u64 {
        self.0.wrapping_sub(previous.0)
    }

    /// True once `self` is at or past `deadline`
    pub const fn has_reached(self, deadline: Tick) -> bool {
        self.0.wrapping_sub(deadline.0) < u64::MAX / 2
    }

    /// Time left until `deadline`, zero when already reached
    pub fn until(self, deadline: Tick) -> TickDuration {
        if self.has_reached(deadline) {
            TickDuration::ZERO
        } else {
            let delta = deadline.0.wrapping_sub(self.0);
            TickDuration::from_ticks(u32::try_from(delta).unwrap_or(u32::MAX))
        }
    }
}

impl Add<TickDuration> for Tick {
    type Output = Tick;

    fn add(self, rhs: TickDuration) -> Tick {
        Tick(self.0.wrapping_add(u64::from(rhs.ticks())))
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tick:{}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Tick {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "tick:{}", self.0);
    }
}

/// Duration in ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TickDuration {
    ticks: u32,
}

impl TickDuration {
    /// Zero duration
    pub const ZERO: Self = Self { ticks: 0 };

    /// Maximum duration
    pub const MAX: Self = Self { ticks: u32::MAX };

    /// Create duration from ticks
    pub const fn from_ticks(ticks: u32) -> Self {
        Self { ticks }
    }

    /// Create duration from milliseconds
    pub const fn from_millis(millis: u32) -> Self {
        Self { ticks: millis }
    }

    /// Create duration from seconds
    pub const fn from_secs(secs: u32) -> Self {
        Self { ticks: secs * 1000 }
    }

    /// Get tick count
    pub const fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Convert to milliseconds
    pub const fn as_millis(&self) -> u32 {
        self.ticks
    }

    /// Check if duration is zero
    pub const fn is_zero(&self) -> bool {
        self.ticks == 0
    }

    /// Convert to a std duration for host ports
    #[cfg(feature = "std")]
    pub fn to_std(self) -> std::time::Duration {
        std::time::Duration::from_millis(u64::from(self.ticks))
    }
}

impl fmt::Display for TickDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.ticks)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TickDuration {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}ms", self.ticks);
    }
}

/// Build a `TickDuration` from a literal with a unit
#[macro_export]
macro_rules! duration {
    ($value:literal ms) => {
        $crate::TickDuration::from_millis($value)
    };
    ($value:literal s) => {
        $crate::TickDuration::from_secs($value)
    };
    ($value:literal ticks) => {
        $crate::TickDuration::from_ticks($value)
    };
}
