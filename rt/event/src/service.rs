//! Subscription registry and packet routing

use core::fmt;

use heapless::Vec;
use log::{debug, trace};

use apprt_core::{ContextId, RtError, RtResult};

use crate::packet::{EventCommand, EventPacket};

/// Subscriptions the registry holds across all contexts
pub const MAX_SUBSCRIPTIONS: usize = 32;

/// Callback run on the subscribing context with its context pointer
pub type EventHandler<C> = fn(&mut C, &EventPacket, usize);

/// One registered (command, owner, handler, context pointer) tuple
pub struct Subscription<C> {
    pub command: EventCommand,
    pub owner: ContextId,
    pub handler: EventHandler<C>,
    pub context: usize,
}

impl<C> Clone for Subscription<C> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<C> Copy for Subscription<C> {}

impl<C> fmt::Debug for Subscription<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("command", &self.command)
            .field("owner", &self.owner)
            .field("context", &self.context)
            .finish()
    }
}

/// What happens to a packet once the current context's subscribers ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Hand the packet to the next context; drop it if that fails
    Forward(ContextId),
    /// Drop the packet
    Destroy,
    /// Drop the packet and force a frame
    DestroyAndRedraw,
}

impl Disposition {
    /// Posted packets go MainApp then Overlay. Worker only sees packets
    /// delivered to it directly.
    pub const fn after_dispatch(current: ContextId) -> Self {
        match current {
            ContextId::MainApp => Disposition::Forward(ContextId::Overlay),
            ContextId::Overlay => Disposition::DestroyAndRedraw,
            ContextId::Worker => Disposition::Destroy,
        }
    }
}

/// Registry of event subscriptions.
///
/// The registry is shared by every context behind a lock; handlers are
/// copied out by [`EventService::handlers_for`] so dispatch runs unlocked
/// and a handler may (un)subscribe.
pub struct EventService<C, const N: usize = MAX_SUBSCRIPTIONS> {
    subscriptions: Vec<Subscription<C>, N>,
}

impl<C, const N: usize> EventService<C, N> {
    pub const fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Register `handler` for `command` on `owner`; a second subscription
    /// for the same pair replaces the first
    pub fn subscribe(
        &mut self,
        owner: ContextId,
        command: EventCommand,
        handler: EventHandler<C>,
        context: usize,
    ) -> RtResult<()> {
        let subscription = Subscription {
            command,
            owner,
            handler,
            context,
        };
        if let Some(existing) = self.find_mut(owner, command) {
            *existing = subscription;
            return Ok(());
        }
        self.subscriptions
            .push(subscription)
            .map_err(|_| RtError::OutOfMemory)?;
        debug!("{} subscribed to {}", owner, command);
        Ok(())
    }

    /// Returns false when nothing was registered
    pub fn unsubscribe(&mut self, owner: ContextId, command: EventCommand) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions
            .retain(|sub| !(sub.owner == owner && sub.command == command));
        before != self.subscriptions.len()
    }

    /// Drop every subscription of `owner`; returns how many went
    pub fn unsubscribe_all(&mut self, owner: ContextId) -> usize {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|sub| sub.owner != owner);
        let removed = before - self.subscriptions.len();
        if removed > 0 {
            debug!("{} dropped {} event subscriptions", owner, removed);
        }
        removed
    }

    pub fn is_subscribed(&self, owner: ContextId, command: EventCommand) -> bool {
        self.subscriptions
            .iter()
            .any(|sub| sub.owner == owner && sub.command == command)
    }

    /// Context pointer registered with the subscription
    pub fn context(&self, owner: ContextId, command: EventCommand) -> Option<usize> {
        self.subscriptions
            .iter()
            .find(|sub| sub.owner == owner && sub.command == command)
            .map(|sub| sub.context)
    }

    pub fn set_context(
        &mut self,
        owner: ContextId,
        command: EventCommand,
        context: usize,
    ) -> RtResult<()> {
        let sub = self.find_mut(owner, command).ok_or(RtError::NotFound)?;
        sub.context = context;
        Ok(())
    }

    /// Handlers `current` registered for `command`, in subscription order
    pub fn handlers_for(
        &self,
        current: ContextId,
        command: EventCommand,
    ) -> Vec<(EventHandler<C>, usize), N> {
        let mut handlers = Vec::new();
        for sub in self
            .subscriptions
            .iter()
            .filter(|sub| sub.owner == current && sub.command == command)
        {
            // Same capacity as the registry.
            let _ = handlers.push((sub.handler, sub.context));
        }
        trace!("{} has {} handlers for {}", current, handlers.len(), command);
        handlers
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subscription<C>> {
        self.subscriptions.iter()
    }

    fn find_mut(&mut self, owner: ContextId, command: EventCommand) -> Option<&mut Subscription<C>> {
        self.subscriptions
            .iter_mut()
            .find(|sub| sub.owner == owner && sub.command == command)
    }
}

impl<C, const N: usize> Default for EventService<C, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Run every handler `current` registered for the packet's command, then
/// report what should become of the packet
pub fn trigger<C>(
    handlers: &[(EventHandler<C>, usize)],
    target: &mut C,
    current: ContextId,
    packet: &EventPacket,
) -> Disposition {
    for (handler, context) in handlers {
        handler(target, packet, *context);
    }
    Disposition::after_dispatch(current)
}
