mod header;
mod reloc;
