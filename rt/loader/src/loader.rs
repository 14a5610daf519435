//! Relocating loader

use bitflags::bitflags;
use log::{debug, warn};

use apprt_mem::{Arena, ArenaBlock};

use crate::header::{ImageFlags, ImageHeader, Version, HEADER_SIZE};
use crate::image::ImageSource;
use crate::reloc::{write_u32, RelocationPlan};
use crate::syscall::SyscallTable;
use crate::LoadError;

bitflags! {
    /// Runtime flags of a loaded app
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AppFlags: u8 {
        /// Code runs from internal flash instead of an arena copy
        const EXECUTE_FROM_INTERNAL_FLASH = 1 << 0;
        const APP_FILE_PRESENT = 1 << 1;
        const RESOURCE_FILE_PRESENT = 1 << 2;
    }
}

/// An image decoded, relocated and ready to enter
#[derive(Debug, Clone)]
pub struct LoadedApp {
    block: ArenaBlock,
    base: u32,
    entry: u32,
    virtual_size: u32,
    relocations: u32,
    flags: AppFlags,
    image_flags: ImageFlags,
    sdk_version: Version,
    uuid: [u8; 16],
}

impl LoadedApp {
    /// Arena span holding the image, relocation scratch included
    pub fn block(&self) -> ArenaBlock {
        self.block
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    /// Entry address with the Thumb bit set
    pub fn entry(&self) -> u32 {
        self.entry
    }

    pub fn entry_offset(&self) -> u32 {
        (self.entry & !1).wrapping_sub(self.base)
    }

    pub fn virtual_size(&self) -> u32 {
        self.virtual_size
    }

    pub fn relocations(&self) -> u32 {
        self.relocations
    }

    pub fn flags(&self) -> AppFlags {
        self.flags
    }

    pub fn image_flags(&self) -> ImageFlags {
        self.image_flags
    }

    pub fn sdk_version(&self) -> Version {
        self.sdk_version
    }

    pub fn uuid(&self) -> &[u8; 16] {
        &self.uuid
    }

    /// True when `address` points inside the app's memory
    pub fn contains(&self, address: u32) -> bool {
        address.wrapping_sub(self.base) < self.virtual_size
    }
}

/// Read the header from `source` and check it can be loaded
pub fn read_header<I>(source: &I) -> Result<ImageHeader, LoadError>
where
    I: ImageSource + ?Sized,
{
    let mut raw = [0u8; HEADER_SIZE];
    source.read_exact_at(0, &mut raw)?;
    let header = ImageHeader::parse(&raw)?;
    header.validate()?;
    Ok(header)
}

/// Load the image in `source` into `arena`.
///
/// The binary and its relocation table are copied in, every relocation is
/// validated and applied, the tail up to `virtual_size` is zeroed, the
/// symbol table slot receives `syscalls.address()`. On error the arena
/// holds garbage and must be reset before reuse.
pub fn load<I, S>(
    source: &I,
    arena: &mut Arena<S>,
    syscalls: &SyscallTable,
) -> Result<LoadedApp, LoadError>
where
    I: ImageSource + ?Sized,
    S: AsRef<[u8]> + AsMut<[u8]>,
{
    let header = read_header(source)?;
    if !syscalls.supports(header.sdk_version) {
        warn!(
            "'{}' needs sdk {}, runtime offers {}",
            header.name(),
            header.sdk_version,
            syscalls.version()
        );
        return Err(LoadError::UnsupportedSdk(header.sdk_version));
    }

    let app_size = usize::from(header.app_size);
    let virtual_size = usize::from(header.virtual_size);
    let reloc_bytes = header
        .reloc_bytes()
        .ok_or(LoadError::HeaderField("reloc_entries_count"))?;
    let wanted = app_size
        .checked_add(reloc_bytes)
        .ok_or(LoadError::HeaderField("reloc_entries_count"))?;

    let block = arena
        .alloc(wanted)
        .map_err(|_| LoadError::OutOfMemory { requested: wanted })?;
    let base = arena.address_of(block);
    source.read_exact_at(0, arena.bytes_mut(block))?;

    let plan = RelocationPlan::new(&header);
    let relocations = plan.apply(arena.bytes_mut(block), base)?;

    let total = virtual_size.max(wanted);
    let block = arena
        .grow(block, total)
        .map_err(|_| LoadError::OutOfMemory { requested: total })?;
    let image = arena.bytes_mut(block);
    image[app_size..].fill(0);
    if !write_u32(image, header.sym_table_addr as usize, syscalls.address()) {
        return Err(LoadError::HeaderField("sym_table_addr"));
    }

    let entry = base.wrapping_add(header.entry_offset) | 1;
    debug!(
        "loaded '{}' at {:#010x}: {} relocations, entry {:#010x}, bss {}..{}",
        header.name(),
        base,
        relocations,
        entry,
        app_size,
        total
    );

    Ok(LoadedApp {
        block,
        base,
        entry,
        virtual_size: u32::from(header.virtual_size),
        relocations,
        flags: AppFlags::APP_FILE_PRESENT,
        image_flags: header.image_flags(),
        sdk_version: header.sdk_version,
        uuid: header.uuid,
    })
}
