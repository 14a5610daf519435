#![no_std]
#![forbid(unsafe_code)]

//! # apprt memory
//!
//! Fixed-size per-context arenas. An arena holds the loaded app image
//! (code, data, BSS) and is reset wholesale when the context unloads.

pub mod arena;

pub use arena::{Arena, ArenaBlock};

#[cfg(test)]
mod tests;

/// Arena statistics for debugging and monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaStats {
    /// Size of the backing storage in bytes
    pub capacity: usize,
    /// Bytes handed out since the last reset, alignment padding included
    pub used: usize,
    /// Highest `used` ever reached
    pub peak: usize,
    /// Successful allocations since the last reset
    pub allocations: usize,
    /// Requests refused for lack of space
    pub failures: usize,
}

impl ArenaStats {
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            used: 0,
            peak: 0,
            allocations: 0,
            failures: 0,
        }
    }

    /// Update statistics after the bump pointer moved to `top`
    pub fn on_alloc(&mut self, top: usize) {
        self.allocations += 1;
        self.on_grow(top);
    }

    pub fn on_grow(&mut self, top: usize) {
        self.used = top;
        if top > self.peak {
            self.peak = top;
        }
    }

    pub fn on_failure(&mut self) {
        self.failures += 1;
    }

    /// Keeps `peak` and `failures`; they describe the arena's lifetime
    pub fn on_reset(&mut self) {
        self.used = 0;
        self.allocations = 0;
    }

    pub const fn remaining(&self) -> usize {
        self.capacity - self.used
    }

    /// Get utilization as a percentage (0-100)
    pub fn utilization(&self) -> u8 {
        if self.capacity == 0 {
            0
        } else {
            ((self.used * 100) / self.capacity) as u8
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ArenaStats {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "ArenaStats{{ capacity: {}, used: {}, peak: {}, allocations: {}, failures: {} }}",
            self.capacity,
            self.used,
            self.peak,
            self.allocations,
            self.failures
        );
    }
}
