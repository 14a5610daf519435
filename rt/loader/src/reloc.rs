//! Relocation table handling
//!
//! Every entry of the table that trails the binary is the image-relative
//! offset of a 32-bit slot. The slot holds an image-relative pointer which
//! becomes absolute once the image base is known.

use crate::header::ImageHeader;
use crate::LoadError;

/// One validated fixup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Patch {
    /// Position in the relocation table
    pub index: u32,
    /// Image-relative offset of the slot to rewrite
    pub slot: u32,
    /// Image-relative value currently stored in the slot
    pub target: u32,
}

impl Patch {
    /// Absolute value the slot holds after relocation
    pub fn relocated(&self, base: u32) -> u32 {
        base.wrapping_add(self.target)
    }
}

/// Fixups described by one image header, checked against the loaded bytes
/// before anything is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocationPlan {
    table_offset: usize,
    count: u32,
    app_size: u32,
    virtual_size: u32,
}

impl RelocationPlan {
    pub fn new(header: &ImageHeader) -> Self {
        Self {
            table_offset: usize::from(header.app_size),
            count: header.reloc_entries_count,
            app_size: u32::from(header.app_size),
            virtual_size: u32::from(header.virtual_size),
        }
    }

    pub fn len(&self) -> u32 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Decode entry `index` from `image` (binary followed by the table)
    pub fn patch(&self, image: &[u8], index: u32) -> Result<Patch, LoadError> {
        let entry = self
            .table_offset
            .saturating_add((index as usize).saturating_mul(4));
        let slot = read_u32(image, entry).ok_or(LoadError::ShortRead {
            offset: entry,
            wanted: 4,
            got: image.len().saturating_sub(entry),
        })?;
        if slot >= self.virtual_size || slot.saturating_add(4) > self.app_size {
            return Err(LoadError::RelocationOutOfRange {
                index,
                offset: slot,
            });
        }
        let target = read_u32(image, slot as usize).ok_or(LoadError::RelocationOutOfRange {
            index,
            offset: slot,
        })?;
        if target >= self.virtual_size {
            return Err(LoadError::RelocationTarget {
                index,
                value: target,
            });
        }
        Ok(Patch {
            index,
            slot,
            target,
        })
    }

    /// Validated fixups in table order
    pub fn patches<'a>(
        &'a self,
        image: &'a [u8],
    ) -> impl Iterator<Item = Result<Patch, LoadError>> + 'a {
        (0..self.count).map(move |index| self.patch(image, index))
    }

    /// Check every entry without writing
    pub fn validate(&self, image: &[u8]) -> Result<(), LoadError> {
        self.patches(image).try_for_each(|patch| patch.map(|_| ()))
    }

    /// Validate the whole table, then rewrite every slot to `base + target`.
    /// Returns the number of slots rewritten.
    ///
    /// Slots that are listed twice or overlap are reported as
    /// `OverlappingRelocation` when the second fixup is reached; the image
    /// must then be discarded.
    pub fn apply(&self, image: &mut [u8], base: u32) -> Result<u32, LoadError> {
        self.validate(image)?;
        for index in 0..self.count {
            let patch = self
                .patch(image, index)
                .map_err(|_| LoadError::OverlappingRelocation { index })?;
            write_u32(image, patch.slot as usize, patch.relocated(base));
        }
        Ok(self.count)
    }
}

pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(4)?;
    let raw = bytes.get(offset..end)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

pub(crate) fn write_u32(bytes: &mut [u8], offset: usize, value: u32) -> bool {
    match offset
        .checked_add(4)
        .and_then(|end| bytes.get_mut(offset..end))
    {
        Some(slot) => {
            slot.copy_from_slice(&value.to_le_bytes());
            true
        }
        None => false,
    }
}
