//! The app manifest

use alloc::sync::Arc;
use core::fmt;

use heapless::{String, Vec};
use log::warn;

use apprt_core::{AppId, RtError, RtResult};
use apprt_loader::ImageSource;

use crate::context::AppContext;

/// Apps the manifest can describe
pub const MAX_APPS: usize = 32;

/// Longest app name kept by the manifest, in bytes
pub const MAX_NAME_LEN: usize = 32;

/// Entry point of an app linked into the firmware
pub type AppMain = fn(&mut AppContext);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppKind {
    System,
    Watchface,
    Application,
    Worker,
}

/// Where an app's code comes from
#[derive(Clone)]
pub enum AppSource {
    /// Linked into the firmware; never goes through the loader
    Builtin(AppMain),
    /// A relocatable image in flash or on the filesystem
    Image(Arc<dyn ImageSource + Send + Sync>),
}

impl fmt::Debug for AppSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppSource::Builtin(_) => f.write_str("Builtin"),
            AppSource::Image(image) => write!(f, "Image({} bytes)", image.len()),
        }
    }
}

/// One manifest entry
#[derive(Debug, Clone)]
pub struct AppDescriptor {
    pub id: AppId,
    pub name: String<MAX_NAME_LEN>,
    pub kind: AppKind,
    pub uuid: [u8; 16],
    pub source: AppSource,
    /// The binary is on the device
    pub resident: bool,
}

impl AppDescriptor {
    /// A firmware app; names longer than [`MAX_NAME_LEN`] are cut at a
    /// character boundary
    pub fn builtin(id: AppId, name: &str, kind: AppKind, main: AppMain) -> Self {
        Self {
            id,
            name: truncated(name),
            kind,
            uuid: [0; 16],
            source: AppSource::Builtin(main),
            resident: true,
        }
    }

    /// An app shipped as an image
    pub fn image(
        id: AppId,
        name: &str,
        kind: AppKind,
        image: Arc<dyn ImageSource + Send + Sync>,
    ) -> Self {
        Self {
            id,
            name: truncated(name),
            kind,
            uuid: [0; 16],
            source: AppSource::Image(image),
            resident: true,
        }
    }

    pub fn with_uuid(mut self, uuid: [u8; 16]) -> Self {
        self.uuid = uuid;
        self
    }

    /// The binary has to be fetched from the paired host first
    pub fn remote(mut self) -> Self {
        self.resident = false;
        self
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self.source, AppSource::Builtin(_))
    }
}

fn truncated(name: &str) -> String<MAX_NAME_LEN> {
    let mut out = String::new();
    for ch in name.chars() {
        if out.push(ch).is_err() {
            warn!("app name '{}' truncated", name);
            break;
        }
    }
    out
}

/// Ordered list of the apps the runtime can launch
#[derive(Debug, Clone, Default)]
pub struct AppManifest {
    apps: Vec<AppDescriptor, MAX_APPS>,
}

impl AppManifest {
    pub const fn new() -> Self {
        Self { apps: Vec::new() }
    }

    /// Ids are unique; a duplicate is a programming error
    pub fn register(&mut self, app: AppDescriptor) -> RtResult<()> {
        if self.get(app.id).is_some() {
            return Err(RtError::ProgrammingError);
        }
        self.apps.push(app).map_err(|_| RtError::OutOfMemory)
    }

    pub fn get(&self, id: AppId) -> Option<&AppDescriptor> {
        self.apps.iter().find(|app| app.id == id)
    }

    /// Record that the binary arrived (or vanished)
    pub fn set_resident(&mut self, id: AppId, resident: bool) -> RtResult<()> {
        let app = self
            .apps
            .iter_mut()
            .find(|app| app.id == id)
            .ok_or(RtError::NotFound)?;
        app.resident = resident;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AppDescriptor> {
        self.apps.iter()
    }
}
