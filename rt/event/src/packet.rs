//! Event commands and packets

use alloc::sync::Arc;
use core::any::Any;
use core::fmt;

/// Identifier of an event kind
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventCommand(pub u16);

impl EventCommand {
    /// Tick and minute services
    pub const TICK: Self = Self(0);

    pub const fn new(command: u16) -> Self {
        Self(command)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl From<u16> for EventCommand {
    #[inline]
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl fmt::Display for EventCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CMD({:#06x})", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for EventCommand {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "CMD({=u16:#x})", self.0);
    }
}

/// Type-erased event payload shared by every subscriber
pub type DynPayload = Arc<dyn Any + Send + Sync>;

/// Runs once when the packet is dropped
pub type Destructor = fn(&DynPayload);

/// An event travelling between contexts
pub struct EventPacket {
    command: EventCommand,
    payload: DynPayload,
    destroy: Option<Destructor>,
}

impl EventPacket {
    pub fn new(command: EventCommand, payload: DynPayload) -> Self {
        Self {
            command,
            payload,
            destroy: None,
        }
    }

    /// A packet without payload
    pub fn empty(command: EventCommand) -> Self {
        let payload: DynPayload = Arc::new(());
        Self::new(command, payload)
    }

    pub fn with_destructor(mut self, destroy: Destructor) -> Self {
        self.destroy = Some(destroy);
        self
    }

    pub fn command(&self) -> EventCommand {
        self.command
    }

    pub fn payload(&self) -> &DynPayload {
        &self.payload
    }

    /// The payload as `T`, if that is what it holds
    pub fn payload_as<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    pub fn has_destructor(&self) -> bool {
        self.destroy.is_some()
    }
}

impl Drop for EventPacket {
    fn drop(&mut self) {
        if let Some(destroy) = self.destroy.take() {
            destroy(&self.payload);
        }
    }
}

impl fmt::Debug for EventPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventPacket")
            .field("command", &self.command)
            .field("destroy", &self.destroy.is_some())
            .finish()
    }
}
