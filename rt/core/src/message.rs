//! Messages exchanged between the supervisor and the context tasks

use core::fmt;

use crate::context::ContextId;

/// Application identifier used by the app manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AppId(pub u32);

impl AppId {
    /// Built-in app hosting overlay windows
    pub const OVERLAY_HOST: AppId = AppId(0);

    /// Default app, also the fallback after a failed load
    pub const SYSTEM: AppId = AppId(1);

    pub const fn new(id: u32) -> Self {
        AppId(id)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "app#{}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for AppId {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "app#{}", self.0);
    }
}

/// Message handled by the supervisor on behalf of one context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeMessage {
    /// Load (or switch to) the given app
    LoadApp(AppId),
    /// The host finished transferring an app binary
    DownloadComplete { app: AppId, ok: bool },
    /// Ask the running app to exit
    QuitRequest,
    /// Liveness ping from the context's runloop
    Heartbeat,
    /// The context's runloop has exited and waits for deletion; carries
    /// the generation of the task that sent it
    Teardown { generation: u32 },
    /// Redraw request, forwarded to the context's own queue
    Draw { force: bool },
}

impl fmt::Display for RuntimeMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeMessage::LoadApp(app) => write!(f, "LoadApp({})", app),
            RuntimeMessage::DownloadComplete { app, ok } => {
                write!(f, "DownloadComplete({}, ok={})", app, ok)
            }
            RuntimeMessage::QuitRequest => write!(f, "QuitRequest"),
            RuntimeMessage::Heartbeat => write!(f, "Heartbeat"),
            RuntimeMessage::Teardown { generation } => write!(f, "Teardown(gen={})", generation),
            RuntimeMessage::Draw { force } => write!(f, "Draw(force={})", force),
        }
    }
}

/// A runtime message addressed to one context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    pub target: ContextId,
    pub message: RuntimeMessage,
}

impl Envelope {
    pub const fn new(target: ContextId, message: RuntimeMessage) -> Self {
        Self { target, message }
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.message, self.target)
    }
}
