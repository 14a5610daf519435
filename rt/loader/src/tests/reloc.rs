use std::vec::Vec;

use crate::{ImageHeader, LoadError, Patch, RelocationPlan, HEADER_SIZE};

const APP_SIZE: usize = HEADER_SIZE + 14;
const VIRTUAL_SIZE: u16 = 256;

/// Header, a 14 byte body holding two pointers, then `table`
fn image(table: &[u32]) -> (ImageHeader, [u8; 256]) {
    let header = ImageHeader {
        app_size: APP_SIZE as u16,
        virtual_size: VIRTUAL_SIZE,
        reloc_entries_count: table.len() as u32,
        ..ImageHeader::default()
    };
    let mut bytes = [0u8; 256];
    bytes[..HEADER_SIZE].copy_from_slice(&header.encode());
    bytes[132..136].copy_from_slice(&200u32.to_le_bytes());
    bytes[136..140].copy_from_slice(&132u32.to_le_bytes());
    for (i, slot) in table.iter().enumerate() {
        let at = APP_SIZE + i * 4;
        bytes[at..at + 4].copy_from_slice(&slot.to_le_bytes());
    }
    (header, bytes)
}

fn word(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

#[test]
fn plan_decodes_patches_in_table_order() {
    let (header, bytes) = image(&[136, 132]);
    let plan = RelocationPlan::new(&header);

    let patches: Vec<Patch> = plan.patches(&bytes).map(Result::unwrap).collect();

    assert_eq!(
        patches,
        [
            Patch { index: 0, slot: 136, target: 132 },
            Patch { index: 1, slot: 132, target: 200 },
        ]
    );
    assert_eq!(patches[0].relocated(0x2000_0000), 0x2000_0084);
}

#[test]
fn apply_rewrites_slots_to_absolute_addresses() {
    let (header, mut bytes) = image(&[132, 136]);

    let count = RelocationPlan::new(&header)
        .apply(&mut bytes, 0x2000_0000)
        .unwrap();

    assert_eq!(count, 2);
    assert_eq!(word(&bytes, 132), 0x2000_0000 + 200);
    assert_eq!(word(&bytes, 136), 0x2000_0000 + 132);
}

#[test]
fn slot_at_virtual_size_is_rejected_before_any_write() {
    let (header, mut bytes) = image(&[132, u32::from(VIRTUAL_SIZE), 136]);
    let before = bytes;

    let err = RelocationPlan::new(&header)
        .apply(&mut bytes, 0x2000_0000)
        .unwrap_err();

    assert_eq!(
        err,
        LoadError::RelocationOutOfRange {
            index: 1,
            offset: u32::from(VIRTUAL_SIZE)
        }
    );
    assert_eq!(bytes, before);
}

#[test]
fn slot_in_bss_is_rejected() {
    let (header, bytes) = image(&[APP_SIZE as u32]);

    assert_eq!(
        RelocationPlan::new(&header).validate(&bytes),
        Err(LoadError::RelocationOutOfRange {
            index: 0,
            offset: APP_SIZE as u32
        })
    );
}

#[test]
fn target_outside_image_is_rejected() {
    let (header, mut bytes) = image(&[132]);
    bytes[132..136].copy_from_slice(&300u32.to_le_bytes());

    assert_eq!(
        RelocationPlan::new(&header).validate(&bytes),
        Err(LoadError::RelocationTarget { index: 0, value: 300 })
    );
}

#[test]
fn duplicate_slot_is_reported() {
    let (header, mut bytes) = image(&[132, 132]);

    assert_eq!(
        RelocationPlan::new(&header).apply(&mut bytes, 0x2000_0000),
        Err(LoadError::OverlappingRelocation { index: 1 })
    );
}
