//! Application image header
//!
//! The header is a packed little-endian record at offset 0 of every app
//! image:
//!
//! | offset | size | field |
//! |--------|------|-------|
//! | 0   | 8  | magic `PBLAPP`, NUL padded |
//! | 8   | 2  | header version (major, minor) |
//! | 10  | 2  | SDK version |
//! | 12  | 2  | app version |
//! | 14  | 2  | `app_size`, header included |
//! | 16  | 4  | entry offset |
//! | 20  | 4  | CRC |
//! | 24  | 32 | name |
//! | 56  | 32 | company |
//! | 88  | 4  | icon resource id |
//! | 92  | 4  | symbol table slot |
//! | 96  | 4  | flags |
//! | 100 | 4  | relocation entry count |
//! | 104 | 16 | UUID |
//! | 120 | 4  | resource CRC |
//! | 124 | 4  | resource timestamp |
//! | 128 | 2  | `virtual_size` (text + data + bss) |

use core::fmt;

use bitflags::bitflags;

use crate::LoadError;

/// Encoded header length
pub const HEADER_SIZE: usize = 130;

/// Magic tag; only these six bytes are compared
pub const MAGIC: &[u8; 6] = b"PBLAPP";

const NAME_LEN: usize = 32;

/// Two-byte version pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

bitflags! {
    /// Flags stored in the image header
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ImageFlags: u32 {
        const WATCHFACE = 1 << 0;
        const VISIBILITY_HIDDEN = 1 << 1;
        const SHOWN_ON_COMMUNICATION = 1 << 2;
        const ALLOW_JS = 1 << 3;
        const HAS_WORKER = 1 << 4;
    }
}

/// Decoded application image header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHeader {
    pub header_version: Version,
    pub sdk_version: Version,
    pub app_version: Version,
    pub app_size: u16,
    pub entry_offset: u32,
    pub crc: u32,
    pub name: [u8; NAME_LEN],
    pub company: [u8; NAME_LEN],
    pub icon_resource_id: u32,
    pub sym_table_addr: u32,
    pub flags: u32,
    pub reloc_entries_count: u32,
    pub uuid: [u8; 16],
    pub resource_crc: u32,
    pub resource_timestamp: u32,
    pub virtual_size: u16,
}

impl ImageHeader {
    /// Decode and check the magic tag
    pub fn parse(bytes: &[u8; HEADER_SIZE]) -> Result<Self, LoadError> {
        if &bytes[0..6] != MAGIC {
            return Err(LoadError::BadMagic);
        }
        let mut reader = Reader { bytes, at: 8 };
        Ok(Self {
            header_version: reader.version(),
            sdk_version: reader.version(),
            app_version: reader.version(),
            app_size: reader.u16(),
            entry_offset: reader.u32(),
            crc: reader.u32(),
            name: reader.array(),
            company: reader.array(),
            icon_resource_id: reader.u32(),
            sym_table_addr: reader.u32(),
            flags: reader.u32(),
            reloc_entries_count: reader.u32(),
            uuid: reader.array(),
            resource_crc: reader.u32(),
            resource_timestamp: reader.u32(),
            virtual_size: reader.u16(),
        })
    }

    /// Encode back into the on-flash layout
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..6].copy_from_slice(MAGIC);
        let mut writer = Writer { out: &mut out, at: 8 };
        writer.version(self.header_version);
        writer.version(self.sdk_version);
        writer.version(self.app_version);
        writer.bytes(&self.app_size.to_le_bytes());
        writer.bytes(&self.entry_offset.to_le_bytes());
        writer.bytes(&self.crc.to_le_bytes());
        writer.bytes(&self.name);
        writer.bytes(&self.company);
        writer.bytes(&self.icon_resource_id.to_le_bytes());
        writer.bytes(&self.sym_table_addr.to_le_bytes());
        writer.bytes(&self.flags.to_le_bytes());
        writer.bytes(&self.reloc_entries_count.to_le_bytes());
        writer.bytes(&self.uuid);
        writer.bytes(&self.resource_crc.to_le_bytes());
        writer.bytes(&self.resource_timestamp.to_le_bytes());
        writer.bytes(&self.virtual_size.to_le_bytes());
        out
    }

    /// Check the size fields against each other
    pub fn validate(&self) -> Result<(), LoadError> {
        let app_size = usize::from(self.app_size);
        let virtual_size = u64::from(self.virtual_size);
        if app_size < HEADER_SIZE {
            return Err(LoadError::HeaderField("app_size"));
        }
        if usize::from(self.virtual_size) < app_size {
            return Err(LoadError::HeaderField("virtual_size"));
        }
        if self.entry_offset as usize >= app_size {
            return Err(LoadError::HeaderField("entry_offset"));
        }
        if u64::from(self.sym_table_addr) + 4 > virtual_size {
            return Err(LoadError::HeaderField("sym_table_addr"));
        }
        Ok(())
    }

    /// Size of the relocation table that trails the binary
    pub fn reloc_bytes(&self) -> Option<usize> {
        (self.reloc_entries_count as usize).checked_mul(4)
    }

    pub fn image_flags(&self) -> ImageFlags {
        ImageFlags::from_bits_truncate(self.flags)
    }

    pub fn is_watchface(&self) -> bool {
        self.image_flags().contains(ImageFlags::WATCHFACE)
    }

    pub fn name(&self) -> &str {
        c_str(&self.name)
    }

    pub fn company(&self) -> &str {
        c_str(&self.company)
    }

    /// Store `name` NUL padded, truncated to the field width
    pub fn set_name(&mut self, name: &str) {
        self.name = pad(name);
    }

    pub fn set_company(&mut self, company: &str) {
        self.company = pad(company);
    }
}

impl Default for ImageHeader {
    fn default() -> Self {
        Self {
            header_version: Version::new(16, 1),
            sdk_version: Version::new(5, 0x56),
            app_version: Version::new(1, 0),
            app_size: HEADER_SIZE as u16,
            entry_offset: 0,
            crc: 0,
            name: [0; NAME_LEN],
            company: [0; NAME_LEN],
            icon_resource_id: 0,
            sym_table_addr: 0,
            flags: 0,
            reloc_entries_count: 0,
            uuid: [0; 16],
            resource_crc: 0,
            resource_timestamp: 0,
            virtual_size: HEADER_SIZE as u16,
        }
    }
}

fn c_str(bytes: &[u8]) -> &str {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    match core::str::from_utf8(&bytes[..end]) {
        Ok(text) => text,
        Err(err) => core::str::from_utf8(&bytes[..err.valid_up_to()]).unwrap_or(""),
    }
}

fn pad(text: &str) -> [u8; NAME_LEN] {
    let mut out = [0u8; NAME_LEN];
    let len = text.len().min(NAME_LEN - 1);
    out[..len].copy_from_slice(&text.as_bytes()[..len]);
    out
}

struct Reader<'a> {
    bytes: &'a [u8; HEADER_SIZE],
    at: usize,
}

impl Reader<'_> {
    fn array<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.at..self.at + N]);
        self.at += N;
        out
    }

    fn version(&mut self) -> Version {
        let [major, minor] = self.array();
        Version { major, minor }
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.array())
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.array())
    }
}

struct Writer<'a> {
    out: &'a mut [u8; HEADER_SIZE],
    at: usize,
}

impl Writer<'_> {
    fn bytes(&mut self, bytes: &[u8]) {
        self.out[self.at..self.at + bytes.len()].copy_from_slice(bytes);
        self.at += bytes.len();
    }

    fn version(&mut self, version: Version) {
        self.bytes(&[version.major, version.minor]);
    }
}
