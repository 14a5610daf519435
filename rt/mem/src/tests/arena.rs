use apprt_core::RtError;

use crate::Arena;

fn arena() -> Arena<[u8; 64]> {
    Arena::new([0u8; 64], 0x2000_0000)
}

#[test]
fn allocations_are_word_aligned() {
    let mut arena = arena();

    let first = arena.alloc(3).unwrap();
    let second = arena.alloc(8).unwrap();

    assert_eq!(first.offset(), 0);
    assert_eq!(second.offset(), 4);
    assert_eq!(arena.address_of(second), 0x2000_0004);
    assert_eq!(arena.used(), 12);
    assert_eq!(arena.stats().allocations, 2);
}

#[test]
fn exhaustion_reports_out_of_memory() {
    let mut arena = arena();

    arena.alloc(60).unwrap();
    assert_eq!(arena.alloc(8), Err(RtError::OutOfMemory));
    assert_eq!(arena.stats().failures, 1);
    assert_eq!(arena.used(), 60);
}

#[test]
fn grow_extends_last_block_in_place() {
    let mut arena = arena();
    let block = arena.alloc(16).unwrap();
    arena.bytes_mut(block).copy_from_slice(&[0xAA; 16]);

    let grown = arena.grow(block, 40).unwrap();

    assert_eq!(grown.offset(), block.offset());
    assert_eq!(grown.len(), 40);
    assert_eq!(&arena.bytes(grown)[..16], &[0xAA; 16]);
    assert_eq!(arena.grow(grown, 80), Err(RtError::OutOfMemory));
    assert_eq!(arena.grow(grown, 8), Ok(grown));
}

#[test]
fn grow_refuses_blocks_that_are_not_last() {
    let mut arena = arena();
    let first = arena.alloc(8).unwrap();
    arena.alloc(8).unwrap();

    assert_eq!(arena.grow(first, 12), Err(RtError::ProgrammingError));
}

#[test]
fn reset_releases_everything_and_keeps_peak() {
    let mut arena = arena();
    arena.alloc(48).unwrap();

    arena.reset();

    let stats = arena.stats();
    assert_eq!(stats.used, 0);
    assert_eq!(stats.peak, 48);
    assert_eq!(arena.alloc(64).unwrap().offset(), 0);
    assert_eq!(arena.stats().utilization(), 100);
}
