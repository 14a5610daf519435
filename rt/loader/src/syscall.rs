//! System services exposed to loaded apps

use core::fmt;

use apprt_core::{RtError, RtResult};

use crate::header::Version;

/// A system service; arguments arrive as raw machine words
pub type Syscall = fn(&[u32]) -> u32;

/// Versioned table of system services.
///
/// The loader writes `address` into each app's symbol table slot. Apps
/// reach services only through `call`, which checks the index against the
/// table instead of trusting it.
#[derive(Clone, Copy)]
pub struct SyscallTable {
    version: Version,
    address: u32,
    entries: &'static [Syscall],
}

impl SyscallTable {
    /// API revision apps are built against today
    pub const CURRENT_VERSION: Version = Version::new(5, 0x56);

    pub const fn new(version: Version, address: u32, entries: &'static [Syscall]) -> Self {
        Self {
            version,
            address,
            entries,
        }
    }

    pub const fn version(&self) -> Version {
        self.version
    }

    /// Address apps see the table at
    pub const fn address(&self) -> u32 {
        self.address
    }

    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// An image built against `sdk` can run on this table
    pub fn supports(&self, sdk: Version) -> bool {
        sdk.major == self.version.major && sdk.minor <= self.version.minor
    }

    pub fn lookup(&self, index: usize) -> RtResult<Syscall> {
        self.entries.get(index).copied().ok_or(RtError::NotFound)
    }

    pub fn call(&self, index: usize, args: &[u32]) -> RtResult<u32> {
        match self.lookup(index) {
            Ok(service) => Ok(service(args)),
            Err(err) => {
                log::warn!("syscall {} outside table of {}", index, self.entries.len());
                Err(err)
            }
        }
    }
}

impl fmt::Debug for SyscallTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyscallTable")
            .field("version", &self.version)
            .field("address", &format_args!("{:#010x}", self.address))
            .field("entries", &self.entries.len())
            .finish()
    }
}
