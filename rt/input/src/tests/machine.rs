use std::vec::Vec;

use apprt_core::{ContextId, Tick, TickDuration};

use crate::{ButtonId, ButtonMachine, ClickEvent, ClickKind, ClickRecognizer, ClickSink};

type Log = Vec<(&'static str, ClickKind, u8)>;

fn single(log: &mut Log, click: &ClickRecognizer) {
    log.push(("single", click.kind, click.repeat_count));
}

fn long(log: &mut Log, click: &ClickRecognizer) {
    log.push(("long", click.kind, click.repeat_count));
}

fn release(log: &mut Log, click: &ClickRecognizer) {
    log.push(("release", click.kind, click.repeat_count));
}

fn raw(log: &mut Log, click: &ClickRecognizer) {
    log.push(("raw", click.kind, click.repeat_count));
}

#[derive(Default)]
struct Collector {
    events: Vec<ClickEvent<Log>>,
    backlight: usize,
}

impl Collector {
    /// Run every delivered handler, in order
    fn replay(&self) -> Log {
        let mut log = Log::new();
        for event in &self.events {
            (event.handler)(&mut log, &event.recognizer);
        }
        log
    }

    fn targets(&self) -> Vec<ContextId> {
        self.events.iter().map(|event| event.target).collect()
    }
}

impl ClickSink<Log> for Collector {
    fn deliver(&mut self, event: ClickEvent<Log>) {
        self.events.push(event);
    }

    fn backlight_on(&mut self) {
        self.backlight += 1;
    }
}

fn machine() -> ButtonMachine<Log> {
    ButtonMachine::new(TickDuration::from_millis(2), TickDuration::from_millis(10))
}

fn pressed(button: ButtonId) -> [bool; 4] {
    let mut levels = [false; 4];
    levels[button.index()] = true;
    levels
}

const RELEASED: [bool; 4] = [false; 4];

#[test]
fn idle_buttons_need_no_polling() {
    let mut machine = machine();
    let mut sink = Collector::default();

    assert_eq!(machine.scan(Tick::new(0), RELEASED, &mut sink), None);
    assert!(sink.events.is_empty());
}

#[test]
fn lone_single_handler_fires_on_press() {
    let mut machine = machine();
    let mut sink = Collector::default();
    machine.subscribe_single(ContextId::MainApp, ButtonId::Select, single);

    machine.scan(Tick::new(10), pressed(ButtonId::Select), &mut sink);
    assert_eq!(sink.replay(), [("single", ClickKind::Single, 0)]);

    machine.scan(Tick::new(60), RELEASED, &mut sink);
    assert_eq!(sink.events.len(), 1);
}

#[test]
fn short_press_with_long_handler_fires_single_on_release() {
    let mut machine = machine();
    let mut sink = Collector::default();
    machine.subscribe_single(ContextId::MainApp, ButtonId::Up, single);
    machine.subscribe_long(
        ContextId::MainApp,
        ButtonId::Up,
        TickDuration::from_millis(500),
        Some(long),
        Some(release),
    );

    let wait = machine.scan(Tick::new(100), pressed(ButtonId::Up), &mut sink);
    assert_eq!(wait, Some(TickDuration::from_millis(10)));
    assert!(sink.events.is_empty());

    machine.scan(Tick::new(200), RELEASED, &mut sink);

    assert_eq!(sink.replay(), [("single", ClickKind::Single, 0)]);
    assert_eq!(sink.backlight, 1);
}

#[test]
fn held_press_fires_long_once_and_release_instead_of_single() {
    let mut machine = machine();
    let mut sink = Collector::default();
    machine.subscribe_single(ContextId::MainApp, ButtonId::Up, single);
    machine.subscribe_long(
        ContextId::MainApp,
        ButtonId::Up,
        TickDuration::from_millis(500),
        Some(long),
        Some(release),
    );

    machine.scan(Tick::new(100), pressed(ButtonId::Up), &mut sink);
    machine.scan(Tick::new(599), pressed(ButtonId::Up), &mut sink);
    assert!(sink.events.is_empty());
    machine.scan(Tick::new(600), pressed(ButtonId::Up), &mut sink);
    machine.scan(Tick::new(700), pressed(ButtonId::Up), &mut sink);
    machine.scan(Tick::new(800), RELEASED, &mut sink);

    assert_eq!(
        sink.replay(),
        [
            ("long", ClickKind::Long, 0),
            ("release", ClickKind::LongRelease, 0)
        ]
    );
    assert!(machine.state(ButtonId::Up).did_long_click);
    assert_eq!(sink.backlight, 2);
}

#[test]
fn bouncing_edges_inside_the_debounce_window_are_ignored() {
    let mut machine = machine();
    let mut sink = Collector::default();
    machine.subscribe_raw(ContextId::MainApp, ButtonId::Back, Some(raw), Some(raw));

    machine.scan(Tick::new(100), pressed(ButtonId::Back), &mut sink);
    let wait = machine.scan(Tick::new(101), RELEASED, &mut sink);

    assert_eq!(wait, Some(TickDuration::from_millis(1)));
    assert!(machine.state(ButtonId::Back).is_pressed);
    assert_eq!(sink.events.len(), 1);

    machine.scan(Tick::new(102), RELEASED, &mut sink);

    assert!(!machine.state(ButtonId::Back).is_pressed);
    assert_eq!(
        sink.replay(),
        [("raw", ClickKind::RawDown, 0), ("raw", ClickKind::RawUp, 0)]
    );
}

#[test]
fn held_repeating_button_fires_repeats_at_the_interval() {
    let mut machine = machine();
    let mut sink = Collector::default();
    machine.subscribe_repeating(
        ContextId::MainApp,
        ButtonId::Down,
        TickDuration::from_millis(100),
        single,
    );

    machine.scan(Tick::new(0), pressed(ButtonId::Down), &mut sink);
    machine.scan(Tick::new(50), pressed(ButtonId::Down), &mut sink);
    machine.scan(Tick::new(100), pressed(ButtonId::Down), &mut sink);
    machine.scan(Tick::new(200), pressed(ButtonId::Down), &mut sink);
    machine.scan(Tick::new(250), RELEASED, &mut sink);

    assert_eq!(
        sink.replay(),
        [
            ("single", ClickKind::Single, 0),
            ("single", ClickKind::Repeat, 1),
            ("single", ClickKind::Repeat, 2)
        ]
    );
    assert_eq!(machine.state(ButtonId::Down).repeat_count, 2);
}

#[test]
fn repeats_stop_after_a_long_click() {
    let mut machine = machine();
    let mut sink = Collector::default();
    machine.subscribe_repeating(
        ContextId::MainApp,
        ButtonId::Down,
        TickDuration::from_millis(300),
        single,
    );
    machine.subscribe_long(
        ContextId::MainApp,
        ButtonId::Down,
        TickDuration::from_millis(200),
        Some(long),
        None,
    );

    machine.scan(Tick::new(0), pressed(ButtonId::Down), &mut sink);
    machine.scan(Tick::new(200), pressed(ButtonId::Down), &mut sink);
    machine.scan(Tick::new(300), pressed(ButtonId::Down), &mut sink);
    machine.scan(Tick::new(600), pressed(ButtonId::Down), &mut sink);
    machine.scan(Tick::new(650), RELEASED, &mut sink);

    assert_eq!(sink.replay(), [("long", ClickKind::Long, 0)]);
}

#[test]
fn clicks_route_to_the_context_owning_each_handler() {
    let mut machine = machine();
    let mut sink = Collector::default();
    machine.subscribe_single(ContextId::MainApp, ButtonId::Up, single);
    machine.subscribe_raw(ContextId::Overlay, ButtonId::Up, Some(raw), Some(raw));

    machine.scan(Tick::new(10), pressed(ButtonId::Up), &mut sink);
    machine.scan(Tick::new(20), RELEASED, &mut sink);

    assert_eq!(
        sink.targets(),
        [ContextId::Overlay, ContextId::MainApp, ContextId::Overlay]
    );
    assert_eq!(sink.backlight, 3);
}

#[test]
fn unsubscribing_a_context_leaves_other_owners_intact() {
    let mut machine = machine();
    machine.subscribe_single(ContextId::MainApp, ButtonId::Up, single);
    machine.subscribe_raw(ContextId::Overlay, ButtonId::Up, Some(raw), None);
    machine.subscribe_single(ContextId::Overlay, ButtonId::Back, single);

    machine.unsubscribe_context(ContextId::Overlay);

    assert!(machine.config(ButtonId::Up).single.is_some());
    assert!(machine.config(ButtonId::Up).raw.is_none());
    assert!(machine.config(ButtonId::Back).is_empty());
}

#[test]
#[should_panic]
fn worker_cannot_subscribe_to_buttons() {
    let mut machine = machine();
    machine.subscribe_single(ContextId::Worker, ButtonId::Select, single);
}
