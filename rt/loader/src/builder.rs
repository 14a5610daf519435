//! Image assembly for host tools and tests

use std::vec::Vec;

use crate::header::{ImageFlags, ImageHeader, HEADER_SIZE};

/// Assembles a loadable image: header, body, relocation table.
///
/// Offsets handed out and accepted by the builder are image-relative, the
/// header included, the same convention the loader uses.
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    header: ImageHeader,
    body: Vec<u8>,
    relocations: Vec<u32>,
    bss: usize,
}

impl ImageBuilder {
    pub fn new(name: &str) -> Self {
        let mut header = ImageHeader::default();
        header.set_name(name);
        header.set_company("apprt");
        let mut builder = Self {
            header,
            body: Vec::new(),
            relocations: Vec::new(),
            bss: 0,
        };
        builder.header.sym_table_addr = builder.word(0);
        builder
    }

    pub fn header_mut(&mut self) -> &mut ImageHeader {
        &mut self.header
    }

    pub fn uuid(mut self, uuid: [u8; 16]) -> Self {
        self.header.uuid = uuid;
        self
    }

    pub fn watchface(mut self) -> Self {
        self.header.flags |= ImageFlags::WATCHFACE.bits();
        self
    }

    /// Append raw code or data; returns its offset
    pub fn code(&mut self, bytes: &[u8]) -> u32 {
        self.align();
        let offset = self.cursor();
        self.body.extend_from_slice(bytes);
        offset
    }

    /// Append a plain word; returns its offset
    pub fn word(&mut self, value: u32) -> u32 {
        self.code(&value.to_le_bytes())
    }

    /// Append a pointer to image offset `target` and list it for relocation
    pub fn pointer(&mut self, target: u32) -> u32 {
        let slot = self.word(target);
        self.relocations.push(slot);
        slot
    }

    /// List an arbitrary slot offset for relocation, valid or not
    pub fn relocation(&mut self, slot: u32) -> &mut Self {
        self.relocations.push(slot);
        self
    }

    pub fn entry(&mut self, offset: u32) -> &mut Self {
        self.header.entry_offset = offset;
        self
    }

    /// Zero-initialised bytes after the binary
    pub fn bss(&mut self, bytes: usize) -> &mut Self {
        self.bss = bytes;
        self
    }

    /// Offset the symbol table address is written to
    pub fn sym_table_slot(&self) -> u32 {
        self.header.sym_table_addr
    }

    /// Offset the next appended byte lands at
    pub fn cursor(&self) -> u32 {
        (HEADER_SIZE + self.body.len()) as u32
    }

    pub fn build(&self) -> Vec<u8> {
        let mut header = self.header.clone();
        let app_size = HEADER_SIZE + self.body.len();
        header.app_size = app_size as u16;
        header.virtual_size = (app_size + self.bss) as u16;
        header.reloc_entries_count = self.relocations.len() as u32;
        if header.entry_offset == 0 && !self.body.is_empty() {
            header.entry_offset = HEADER_SIZE as u32 + 2;
        }

        let mut image = Vec::with_capacity(app_size + self.relocations.len() * 4);
        image.extend_from_slice(&header.encode());
        image.extend_from_slice(&self.body);
        for slot in &self.relocations {
            image.extend_from_slice(&slot.to_le_bytes());
        }
        image
    }

    fn align(&mut self) {
        while self.cursor() % 4 != 0 {
            self.body.push(0);
        }
    }
}
