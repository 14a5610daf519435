use crate::{duration, Tick, TickDuration};

#[test]
fn tick_reaches_deadline_across_wrap() {
    let start = Tick::new(u64::MAX - 5);
    let deadline = start + TickDuration::from_millis(10);

    assert_eq!(deadline.raw(), 4);
    assert!(!start.has_reached(deadline));
    assert!(Tick::new(4).has_reached(deadline));
    assert!(Tick::new(9).has_reached(deadline));
    assert_eq!(Tick::new(4).elapsed_since(start), 10);
}

#[test]
fn until_saturates_at_zero() {
    let now = Tick::new(1_000);

    assert_eq!(now.until(Tick::new(1_250)), TickDuration::from_millis(250));
    assert_eq!(now.until(Tick::new(1_000)), TickDuration::ZERO);
    assert_eq!(now.until(Tick::new(10)), TickDuration::ZERO);
}

#[test]
fn duration_macro_units() {
    assert_eq!(duration!(250 ms), TickDuration::from_millis(250));
    assert_eq!(duration!(6 s).as_millis(), 6_000);
    assert_eq!(duration!(3 ticks).ticks(), 3);
}
