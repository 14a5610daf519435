#![no_std]
#![forbid(unsafe_code)]

//! # apprt loader
//!
//! Parses position-independent app images, copies them into a context
//! arena and turns their image-relative pointers into absolute ones.
//!
//! ## Module Overview
//! - [`header`]  – on-flash image header
//! - [`image`]   – reader contract for the flash/file layer
//! - [`reloc`]   – relocation table validation and fixups
//! - [`syscall`] – versioned service table handed to apps
//! - [`loader`]  – the load sequence itself

#[cfg(any(feature = "std", test))]
extern crate std;

use core::fmt;

use apprt_core::RtError;

pub mod header;
pub mod image;
pub mod loader;
pub mod reloc;
pub mod syscall;

#[cfg(feature = "std")]
pub mod builder;

pub use header::{ImageFlags, ImageHeader, Version, HEADER_SIZE, MAGIC};
pub use image::ImageSource;
pub use loader::{load, read_header, AppFlags, LoadedApp};
pub use reloc::{Patch, RelocationPlan};
pub use syscall::{Syscall, SyscallTable};

#[cfg(test)]
mod tests;

/// Why an image could not be loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadError {
    /// The image source ended early
    ShortRead {
        offset: usize,
        wanted: usize,
        got: usize,
    },
    /// The magic tag is not `PBLAPP`
    BadMagic,
    /// A header field is inconsistent with the others
    HeaderField(&'static str),
    /// The image targets an API this runtime does not offer
    UnsupportedSdk(Version),
    /// A relocation names a slot outside the binary
    RelocationOutOfRange { index: u32, offset: u32 },
    /// A relocated slot points outside the image
    RelocationTarget { index: u32, value: u32 },
    /// Two relocations touch the same bytes
    OverlappingRelocation { index: u32 },
    /// The context arena cannot hold the image
    OutOfMemory { requested: usize },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::ShortRead {
                offset,
                wanted,
                got,
            } => write!(f, "short read at {}: wanted {} bytes, got {}", offset, wanted, got),
            LoadError::BadMagic => write!(f, "bad magic"),
            LoadError::HeaderField(field) => write!(f, "invalid header field {}", field),
            LoadError::UnsupportedSdk(version) => write!(f, "unsupported sdk {}", version),
            LoadError::RelocationOutOfRange { index, offset } => {
                write!(f, "relocation {} slot {:#x} outside image", index, offset)
            }
            LoadError::RelocationTarget { index, value } => {
                write!(f, "relocation {} target {:#x} outside image", index, value)
            }
            LoadError::OverlappingRelocation { index } => {
                write!(f, "relocation {} overlaps an earlier one", index)
            }
            LoadError::OutOfMemory { requested } => {
                write!(f, "arena cannot hold {} bytes", requested)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for LoadError {}

#[cfg(feature = "defmt")]
impl defmt::Format for LoadError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            LoadError::ShortRead { offset, .. } => defmt::write!(fmt, "ShortRead({})", offset),
            LoadError::BadMagic => defmt::write!(fmt, "BadMagic"),
            LoadError::HeaderField(field) => defmt::write!(fmt, "HeaderField({=str})", *field),
            LoadError::UnsupportedSdk(version) => {
                defmt::write!(fmt, "UnsupportedSdk({}.{})", version.major, version.minor)
            }
            LoadError::RelocationOutOfRange { index, offset } => {
                defmt::write!(fmt, "RelocationOutOfRange({}, {:#x})", index, offset)
            }
            LoadError::RelocationTarget { index, value } => {
                defmt::write!(fmt, "RelocationTarget({}, {:#x})", index, value)
            }
            LoadError::OverlappingRelocation { index } => {
                defmt::write!(fmt, "OverlappingRelocation({})", index)
            }
            LoadError::OutOfMemory { requested } => defmt::write!(fmt, "OutOfMemory({})", requested),
        }
    }
}

impl From<LoadError> for RtError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::OutOfMemory { .. } => RtError::OutOfMemory,
            _ => RtError::InvalidImage,
        }
    }
}
