//! Bump arena over caller-provided storage

use core::fmt;

use apprt_core::{RtError, RtResult};

use crate::ArenaStats;

/// Allocation granularity; every block starts word aligned
pub const ARENA_ALIGN: usize = 4;

/// A span of arena bytes handed out by `Arena::alloc`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaBlock {
    offset: usize,
    len: usize,
}

impl ArenaBlock {
    /// Offset from the start of the arena
    pub const fn offset(&self) -> usize {
        self.offset
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    const fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Per-context memory pool.
///
/// `base` is the address the storage is seen at by loaded code. On target
/// it is the storage's real address; host ports pick a stable virtual one.
pub struct Arena<S> {
    storage: S,
    base: u32,
    top: usize,
    stats: ArenaStats,
}

impl<S> Arena<S>
where
    S: AsRef<[u8]> + AsMut<[u8]>,
{
    pub fn new(storage: S, base: u32) -> Self {
        let capacity = storage.as_ref().len();
        Self {
            storage,
            base,
            top: 0,
            stats: ArenaStats::new(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.storage.as_ref().len()
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn used(&self) -> usize {
        self.top
    }

    pub fn stats(&self) -> ArenaStats {
        self.stats
    }

    /// Address of `block` as seen by loaded code
    pub fn address_of(&self, block: ArenaBlock) -> u32 {
        self.base.wrapping_add(block.offset as u32)
    }

    /// Hand out `size` bytes. Contents are unspecified.
    pub fn alloc(&mut self, size: usize) -> RtResult<ArenaBlock> {
        let offset = align_up(self.top).ok_or(RtError::OutOfMemory)?;
        let end = offset.checked_add(size).ok_or(RtError::OutOfMemory)?;
        if end > self.capacity() {
            self.stats.on_failure();
            return Err(RtError::OutOfMemory);
        }
        self.top = end;
        self.stats.on_alloc(end);
        Ok(ArenaBlock { offset, len: size })
    }

    /// Extend the most recent block to `new_len` without moving it.
    ///
    /// Shrinking is a no-op. Growing any other block is a programming error.
    pub fn grow(&mut self, block: ArenaBlock, new_len: usize) -> RtResult<ArenaBlock> {
        if block.end() != self.top {
            return Err(RtError::ProgrammingError);
        }
        if new_len <= block.len {
            return Ok(block);
        }
        let end = block
            .offset
            .checked_add(new_len)
            .ok_or(RtError::OutOfMemory)?;
        if end > self.capacity() {
            self.stats.on_failure();
            return Err(RtError::OutOfMemory);
        }
        self.top = end;
        self.stats.on_grow(end);
        Ok(ArenaBlock {
            offset: block.offset,
            len: new_len,
        })
    }

    pub fn bytes(&self, block: ArenaBlock) -> &[u8] {
        &self.storage.as_ref()[block.offset..block.end()]
    }

    pub fn bytes_mut(&mut self, block: ArenaBlock) -> &mut [u8] {
        let end = block.end();
        &mut self.storage.as_mut()[block.offset..end]
    }

    /// Release every block at once
    pub fn reset(&mut self) {
        self.top = 0;
        self.stats.on_reset();
    }
}

impl<S> fmt::Debug for Arena<S>
where
    S: AsRef<[u8]>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("base", &format_args!("{:#010x}", self.base))
            .field("capacity", &self.storage.as_ref().len())
            .field("top", &self.top)
            .finish()
    }
}

fn align_up(offset: usize) -> Option<usize> {
    Some(offset.checked_add(ARENA_ALIGN - 1)? & !(ARENA_ALIGN - 1))
}
