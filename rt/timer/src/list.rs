//! Fixed-capacity timer list sorted by absolute expiry

use core::fmt;

use apprt_core::{RtError, RtResult, Tick, TickDuration};

/// Identity of a queued timer.
///
/// The generation changes every time a slot is reused, so a handle kept
/// after its timer fired or was removed never matches a newer timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId {
    slot: u16,
    generation: u16,
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}.{}", self.slot, self.generation)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TimerId {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "timer#{}.{}", self.slot, self.generation);
    }
}

struct Node<T> {
    expiry: Tick,
    payload: T,
    next: Option<usize>,
}

/// A timer detached from the list by `expire`
#[derive(Debug)]
pub struct ExpiredTimer<T> {
    pub id: TimerId,
    pub expiry: Tick,
    pub payload: T,
}

/// Singly linked timer list, ascending by expiry, FIFO among equal expiries.
///
/// Nodes live in `N` fixed slots linked by index, so the list never
/// allocates after construction.
pub struct TimerList<T, const N: usize> {
    nodes: [Option<Node<T>>; N],
    generations: [u16; N],
    head: Option<usize>,
    len: usize,
}

impl<T, const N: usize> TimerList<T, N> {
    pub fn new() -> Self {
        assert!(N <= u16::MAX as usize);
        Self {
            nodes: core::array::from_fn(|_| None),
            generations: [0; N],
            head: None,
            len: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Queue `payload` to fire at `expiry`
    pub fn insert(&mut self, expiry: Tick, payload: T) -> RtResult<TimerId> {
        let slot = self
            .nodes
            .iter()
            .position(Option::is_none)
            .ok_or(RtError::OutOfMemory)?;
        self.nodes[slot] = Some(Node {
            expiry,
            payload,
            next: None,
        });
        self.link(slot);
        self.len += 1;
        Ok(self.id_of(slot))
    }

    /// Unlink the timer with identity `id` and hand back its payload.
    ///
    /// # Panics
    ///
    /// If `id` is not queued. Callers that cannot be sure check `contains`.
    pub fn remove(&mut self, id: TimerId) -> T {
        assert!(self.contains(id), "{} is not queued", id);
        let slot = usize::from(id.slot);
        self.unlink(slot);
        self.release(slot).payload
    }

    pub fn contains(&self, id: TimerId) -> bool {
        let slot = usize::from(id.slot);
        slot < N && self.nodes[slot].is_some() && self.generations[slot] == id.generation
    }

    /// Move a queued timer to a new expiry, keeping its identity.
    /// Returns false when `id` is not queued.
    pub fn reschedule(&mut self, id: TimerId, expiry: Tick) -> bool {
        if !self.contains(id) {
            return false;
        }
        let slot = usize::from(id.slot);
        self.unlink(slot);
        if let Some(node) = self.nodes[slot].as_mut() {
            node.expiry = expiry;
            node.next = None;
        }
        self.link(slot);
        true
    }

    /// Expiry of the head timer
    pub fn next_deadline(&self) -> Option<Tick> {
        self.head.and_then(|slot| self.node(slot)).map(|node| node.expiry)
    }

    /// `None` when empty, zero when the head is already due, otherwise the
    /// time left until the head fires
    pub fn next_expiry(&self, now: Tick) -> Option<TickDuration> {
        self.next_deadline().map(|deadline| now.until(deadline))
    }

    /// Detach the head timer, due or not
    pub fn expire(&mut self) -> Option<ExpiredTimer<T>> {
        let slot = self.head?;
        self.unlink(slot);
        let id = self.id_of(slot);
        let node = self.release(slot);
        Some(ExpiredTimer {
            id,
            expiry: node.expiry,
            payload: node.payload,
        })
    }

    /// Detach the head timer if it is due at `now`
    pub fn expire_due(&mut self, now: Tick) -> Option<ExpiredTimer<T>> {
        match self.next_deadline() {
            Some(deadline) if now.has_reached(deadline) => self.expire(),
            _ => None,
        }
    }

    /// Queued timers in firing order
    pub fn iter(&self) -> Iter<'_, T, N> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    pub fn clear(&mut self) {
        while self.expire().is_some() {}
    }

    fn node(&self, slot: usize) -> Option<&Node<T>> {
        self.nodes[slot].as_ref()
    }

    fn id_of(&self, slot: usize) -> TimerId {
        TimerId {
            slot: slot as u16,
            generation: self.generations[slot],
        }
    }

    fn release(&mut self, slot: usize) -> Node<T> {
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.len -= 1;
        match self.nodes[slot].take() {
            Some(node) => node,
            None => unreachable!("released an empty timer slot"),
        }
    }

    /// Splice `slot` before the first node expiring strictly later
    fn link(&mut self, slot: usize) {
        let expiry = match self.node(slot) {
            Some(node) => node.expiry,
            None => return,
        };
        let mut prev: Option<usize> = None;
        let mut cursor = self.head;
        while let Some(current) = cursor {
            let Some(node) = self.node(current) else { break };
            if !expiry.has_reached(node.expiry) {
                break;
            }
            prev = Some(current);
            cursor = node.next;
        }
        if let Some(node) = self.nodes[slot].as_mut() {
            node.next = cursor;
        }
        match prev {
            Some(prev) => {
                if let Some(node) = self.nodes[prev].as_mut() {
                    node.next = Some(slot);
                }
            }
            None => self.head = Some(slot),
        }
    }

    fn unlink(&mut self, slot: usize) {
        let next = self.node(slot).and_then(|node| node.next);
        if self.head == Some(slot) {
            self.head = next;
            return;
        }
        let mut cursor = self.head;
        while let Some(current) = cursor {
            let node = match self.nodes[current].as_mut() {
                Some(node) => node,
                None => break,
            };
            if node.next == Some(slot) {
                node.next = next;
                return;
            }
            cursor = node.next;
        }
    }
}

impl<T, const N: usize> Default for TimerList<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> fmt::Debug for TimerList<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.iter().map(|(id, expiry, _)| (id, expiry)))
            .finish()
    }
}

/// Iterator over queued timers in firing order
pub struct Iter<'a, T, const N: usize> {
    list: &'a TimerList<T, N>,
    cursor: Option<usize>,
}

impl<'a, T, const N: usize> Iterator for Iter<'a, T, N> {
    type Item = (TimerId, Tick, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.cursor?;
        let node = self.list.node(slot)?;
        self.cursor = node.next;
        Some((self.list.id_of(slot), node.expiry, &node.payload))
    }
}
