use crate::{ImageHeader, LoadError, Version, HEADER_SIZE};

fn sample() -> ImageHeader {
    let mut header = ImageHeader {
        app_size: 400,
        entry_offset: 132,
        sym_table_addr: 136,
        reloc_entries_count: 3,
        virtual_size: 1024,
        flags: 1,
        uuid: [7; 16],
        ..ImageHeader::default()
    };
    header.set_name("Simple");
    header
}

#[test]
fn decodes_fields_at_documented_offsets() {
    let raw = sample().encode();

    assert_eq!(&raw[0..6], b"PBLAPP");
    assert_eq!(u16::from_le_bytes([raw[14], raw[15]]), 400);
    assert_eq!(u32::from_le_bytes([raw[16], raw[17], raw[18], raw[19]]), 132);
    assert_eq!(&raw[24..30], b"Simple");
    assert_eq!(u32::from_le_bytes([raw[92], raw[93], raw[94], raw[95]]), 136);
    assert_eq!(u32::from_le_bytes([raw[100], raw[101], raw[102], raw[103]]), 3);
    assert_eq!(&raw[104..120], &[7; 16]);
    assert_eq!(u16::from_le_bytes([raw[128], raw[129]]), 1024);

    let decoded = ImageHeader::parse(&raw).unwrap();
    assert_eq!(decoded, sample());
    assert_eq!(decoded.name(), "Simple");
    assert!(decoded.is_watchface());
}

#[test]
fn only_first_six_magic_bytes_matter() {
    let mut raw = sample().encode();
    raw[6] = b'X';
    raw[7] = b'Y';
    assert!(ImageHeader::parse(&raw).is_ok());

    raw[0] = b'Q';
    assert_eq!(ImageHeader::parse(&raw), Err(LoadError::BadMagic));
}

#[test]
fn validate_rejects_inconsistent_sizes() {
    let too_small = ImageHeader {
        app_size: (HEADER_SIZE - 1) as u16,
        ..sample()
    };
    assert_eq!(too_small.validate(), Err(LoadError::HeaderField("app_size")));

    let bss_shorter_than_binary = ImageHeader {
        virtual_size: 300,
        ..sample()
    };
    assert_eq!(
        bss_shorter_than_binary.validate(),
        Err(LoadError::HeaderField("virtual_size"))
    );

    let entry_past_binary = ImageHeader {
        entry_offset: 400,
        ..sample()
    };
    assert_eq!(
        entry_past_binary.validate(),
        Err(LoadError::HeaderField("entry_offset"))
    );

    let slot_past_image = ImageHeader {
        sym_table_addr: 1021,
        ..sample()
    };
    assert_eq!(
        slot_past_image.validate(),
        Err(LoadError::HeaderField("sym_table_addr"))
    );
    assert!(sample().validate().is_ok());
}

#[test]
fn long_names_are_truncated_and_nul_terminated() {
    let mut header = ImageHeader::default();
    header.set_name("a name that is far longer than thirty-two bytes");

    assert_eq!(header.name().len(), 31);
    assert_eq!(header.name, {
        let mut expected = [0u8; 32];
        expected[..31].copy_from_slice(&b"a name that is far longer than thirty-two bytes"[..31]);
        expected
    });
    assert_eq!(header.sdk_version, Version::new(5, 0x56));
}
