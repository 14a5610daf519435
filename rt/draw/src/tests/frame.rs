use apprt_core::{Tick, TickDuration};

use crate::{DrawCoordinator, DrawStats};

fn coordinator() -> DrawCoordinator {
    DrawCoordinator::new(TickDuration::from_millis(250))
}

#[test]
fn free_lock_is_acquired_and_stamped() {
    let draw = coordinator();

    let token = draw.try_begin(Tick::new(1_000)).unwrap();

    assert_eq!(token.started(), Tick::new(1_000));
    assert!(!token.recovered());
    assert!(draw.is_locked());
}

#[test]
fn requests_while_locked_yield_exactly_one_frame() {
    let draw = coordinator();

    assert!(draw.try_begin(Tick::new(0)).is_ok());
    for now in [1, 50, 200, 250] {
        assert_eq!(draw.try_begin(Tick::new(now)), Err(nb::Error::WouldBlock));
    }

    assert_eq!(
        draw.stats(),
        DrawStats {
            frames: 1,
            dropped: 4,
            recoveries: 0,
        }
    );
}

#[test]
fn stale_lock_is_recovered_after_the_watchdog() {
    let draw = coordinator();
    draw.try_begin(Tick::new(100)).unwrap();

    let token = draw.try_begin(Tick::new(400)).unwrap();

    assert!(token.recovered());
    assert_eq!(token.started(), Tick::new(400));
    assert_eq!(draw.stats().recoveries, 1);
    assert_eq!(draw.stats().frames, 2);
    assert!(draw.try_begin(Tick::new(450)).is_err());
}

#[test]
fn completion_releases_the_lock() {
    let draw = coordinator();
    draw.try_begin(Tick::new(0)).unwrap();

    assert!(draw.on_frame_done());
    assert!(!draw.is_locked());
    assert!(!draw.on_frame_done());

    let token = draw.try_begin(Tick::new(10)).unwrap();
    assert!(!token.recovered());
}

#[test]
fn watchdog_survives_tick_wrap() {
    let draw = coordinator();
    draw.try_begin(Tick::new(u64::MAX - 100)).unwrap();

    assert!(draw.try_begin(Tick::new(100)).is_err());
    assert!(draw.try_begin(Tick::new(200)).unwrap().recovered());
}
