//! Image report

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Serialize;
use thiserror::Error;

use apprt_core::{ContextId, RuntimeConfig};
use apprt_loader::{load, read_header, ImageFlags, LoadError, SyscallTable, Version};
use apprt_mem::Arena;

#[derive(Debug, Error)]
pub enum InspectError {
    #[error("cannot read {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("not an application image: {0}")]
    Header(#[from] LoadError),
}

/// Where and how the dry run loads the image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InspectOptions {
    /// Address the arena is mapped at
    pub base: u32,
    pub arena_size: usize,
    /// Value written into the symbol table slot
    pub syscalls: u32,
}

impl Default for InspectOptions {
    fn default() -> Self {
        let config = RuntimeConfig::default();
        Self {
            base: config.arena_base(ContextId::MainApp),
            arena_size: config.arena_size(ContextId::MainApp),
            syscalls: 0,
        }
    }
}

/// Outcome of a successful dry run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub base: u32,
    pub entry: u32,
    pub relocations: u32,
    /// First zeroed byte, relative to `base`
    pub bss_start: u32,
    pub bss_end: u32,
    pub arena_used: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub source: String,
    pub file_size: usize,
    pub name: String,
    pub company: String,
    pub uuid: String,
    pub header_version: Version,
    pub sdk_version: Version,
    pub app_version: Version,
    pub app_size: u16,
    pub virtual_size: u16,
    pub entry_offset: u32,
    pub sym_table_addr: u32,
    pub reloc_entries: u32,
    pub crc: u32,
    pub flags: Vec<String>,
    pub load: Result<LoadSummary, String>,
}

impl Report {
    pub fn loaded(&self) -> bool {
        self.load.is_ok()
    }
}

/// Read the image at `path` and inspect it
pub fn inspect(path: &Path, options: &InspectOptions) -> Result<Report, InspectError> {
    let bytes = fs::read(path).map_err(|source| InspectError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("read {} bytes from {}", bytes.len(), path.display());
    inspect_bytes(&path.display().to_string(), &bytes, options)
}

/// Inspect an in-memory image.
///
/// A header that does not parse is an error; a loader failure past the
/// header is part of the report.
pub fn inspect_bytes(
    source: &str,
    bytes: &[u8],
    options: &InspectOptions,
) -> Result<Report, InspectError> {
    let header = read_header(bytes)?;
    let syscalls = SyscallTable::new(SyscallTable::CURRENT_VERSION, options.syscalls, &[]);
    let mut arena = Arena::new(vec![0u8; options.arena_size], options.base);

    let load = match load(bytes, &mut arena, &syscalls) {
        Ok(app) => {
            info!("'{}' loads at {:#010x}", header.name(), app.base());
            Ok(LoadSummary {
                base: app.base(),
                entry: app.entry(),
                relocations: app.relocations(),
                bss_start: u32::from(header.app_size),
                bss_end: app.virtual_size(),
                arena_used: arena.used(),
            })
        }
        Err(err) => {
            info!("'{}' does not load: {}", header.name(), err);
            Err(err.to_string())
        }
    };

    Ok(Report {
        source: source.to_string(),
        file_size: bytes.len(),
        name: header.name().to_string(),
        company: header.company().to_string(),
        uuid: hex(&header.uuid),
        header_version: header.header_version,
        sdk_version: header.sdk_version,
        app_version: header.app_version,
        app_size: header.app_size,
        virtual_size: header.virtual_size,
        entry_offset: header.entry_offset,
        sym_table_addr: header.sym_table_addr,
        reloc_entries: header.reloc_entries_count,
        crc: header.crc,
        flags: flag_names(header.image_flags()),
        load,
    })
}

fn flag_names(flags: ImageFlags) -> Vec<String> {
    flags
        .iter_names()
        .map(|(name, _)| name.to_lowercase())
        .collect()
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
