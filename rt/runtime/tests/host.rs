//! End-to-end scenarios on the host port: real threads, real queues

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use apprt_draw::{DrawCoordinator, Window, WindowId};
use apprt_event::{DynPayload, EventCommand, EventPacket};
use apprt_input::{ButtonId, ClickRecognizer};
use apprt_loader::builder::ImageBuilder;
use apprt_runtime::posix::{self, HeadlessDisplay, RecordingHost, RuntimeHandle, SimulatedButtons};
use apprt_runtime::{
    AppContext, AppDescriptor, AppId, AppKind, ContextId, LifecycleState, RuntimeConfig,
    TickDuration,
};

const APP: AppId = AppId(10);
const REMOTE: AppId = AppId(11);
const WORKER: AppId = AppId(12);

fn config() -> RuntimeConfig {
    RuntimeConfig::builder()
        .heartbeat_interval(TickDuration::from_millis(50))
        .hang_timeout(Some(TickDuration::from_millis(400)))
        .sweep_interval(TickDuration::from_millis(20))
        .download_timeout(TickDuration::from_secs(30))
        .build()
        .unwrap()
}

fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(5));
    }
}

fn run_loop(context: &mut AppContext) {
    context.event_loop();
}

fn start(apps: Vec<AppDescriptor>) -> RuntimeHandle {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut builder = posix::builder(config());
    for app in apps {
        builder = builder.app(app);
    }
    posix::start(builder.build().unwrap(), SimulatedButtons::new()).unwrap()
}

fn both_running(handle: &RuntimeHandle) -> bool {
    handle.state(ContextId::MainApp) == LifecycleState::Runloop
        && handle.state(ContextId::Overlay) == LifecycleState::Runloop
}

#[test]
fn boot_runs_the_default_app_and_the_overlay_host() {
    let handle = start(vec![AppDescriptor::builtin(
        AppId::SYSTEM,
        "System",
        AppKind::Watchface,
        run_loop,
    )]);

    wait_for("boot", || both_running(&handle));
    assert_eq!(handle.state(ContextId::Worker), LifecycleState::Unloaded);

    handle.stop();
}

/// Three relocations, the second pointing at `virtual_size`
fn broken_image() -> Vec<u8> {
    let mut builder = ImageBuilder::new("Broken");
    let target = builder.word(0);
    let first = builder.word(target);
    let third = builder.word(target);
    builder.bss(16);
    let virtual_size = builder.cursor() + 16;
    builder
        .relocation(first)
        .relocation(virtual_size)
        .relocation(third);
    builder.build()
}

#[test]
fn invalid_image_lands_back_on_the_default_app() {
    static STARTS: AtomicUsize = AtomicUsize::new(0);
    fn system(context: &mut AppContext) {
        STARTS.fetch_add(1, Ordering::SeqCst);
        context.event_loop();
    }

    let handle = start(vec![
        AppDescriptor::builtin(AppId::SYSTEM, "System", AppKind::Watchface, system),
        AppDescriptor::image(APP, "Broken", AppKind::Application, Arc::new(broken_image())),
    ]);
    wait_for("boot", || both_running(&handle));

    handle.launch(ContextId::MainApp, APP).unwrap();

    wait_for("fallback", || {
        STARTS.load(Ordering::SeqCst) == 2
            && handle.state(ContextId::MainApp) == LifecycleState::Runloop
    });
    handle.stop();
}

#[test]
fn hung_app_is_replaced_by_the_default_app() {
    static STARTS: AtomicUsize = AtomicUsize::new(0);
    static HUNG: AtomicUsize = AtomicUsize::new(0);
    fn system(context: &mut AppContext) {
        STARTS.fetch_add(1, Ordering::SeqCst);
        context.event_loop();
    }
    fn spin(context: &mut AppContext, _: usize) {
        HUNG.fetch_add(1, Ordering::SeqCst);
        while !context.is_cancelled() {
            thread::sleep(Duration::from_millis(5));
        }
    }
    fn hang(context: &mut AppContext) {
        context
            .register_timer(TickDuration::from_millis(10), spin, 0)
            .unwrap();
        context.event_loop();
    }

    let handle = start(vec![
        AppDescriptor::builtin(AppId::SYSTEM, "System", AppKind::Watchface, system),
        AppDescriptor::builtin(APP, "Hang", AppKind::Application, hang),
    ]);
    wait_for("boot", || both_running(&handle));

    handle.launch(ContextId::MainApp, APP).unwrap();

    wait_for("hang", || HUNG.load(Ordering::SeqCst) == 1);
    wait_for("restart", || {
        STARTS.load(Ordering::SeqCst) == 2
            && handle.state(ContextId::MainApp) == LifecycleState::Runloop
    });
    handle.stop();
}

#[test]
fn posted_events_reach_subscribers_and_are_destroyed_once() {
    static HANDLED: AtomicUsize = AtomicUsize::new(0);
    static DESTROYED: AtomicUsize = AtomicUsize::new(0);
    const PING: EventCommand = EventCommand::new(5);
    fn on_ping(_: &mut AppContext, packet: &EventPacket, _: usize) {
        if packet.payload_as::<&'static str>() == Some(&"ping") {
            HANDLED.fetch_add(1, Ordering::SeqCst);
        }
    }
    fn destroy(_: &DynPayload) {
        DESTROYED.fetch_add(1, Ordering::SeqCst);
    }
    fn system(context: &mut AppContext) {
        context.subscribe_event(PING, on_ping, 0).unwrap();
        context.event_loop();
    }

    let handle = start(vec![AppDescriptor::builtin(
        AppId::SYSTEM,
        "System",
        AppKind::Watchface,
        system,
    )]);
    wait_for("boot", || both_running(&handle));

    handle
        .post_event(EventPacket::new(PING, Arc::new("ping")).with_destructor(destroy))
        .unwrap();

    wait_for("destruction", || DESTROYED.load(Ordering::SeqCst) == 1);
    assert_eq!(HANDLED.load(Ordering::SeqCst), 1);
    handle.stop();
}

#[test]
fn button_presses_reach_the_top_window_and_redraw() {
    static CLICKS: AtomicUsize = AtomicUsize::new(0);
    fn on_up(_: &mut AppContext, click: &ClickRecognizer) {
        assert_eq!(click.button, ButtonId::Up);
        CLICKS.fetch_add(1, Ordering::SeqCst);
    }
    fn bindings(context: &mut AppContext) {
        context.subscribe_single(ButtonId::Up, on_up);
    }
    fn system(context: &mut AppContext) {
        context
            .push_window(Window::new(WindowId(1)).with_click_config(bindings))
            .unwrap();
        context.event_loop();
    }

    let _ = env_logger::builder().is_test(true).try_init();
    let config = config();
    let draw = Arc::new(DrawCoordinator::new(config.frame_watchdog));
    let display = HeadlessDisplay::new(Arc::clone(&draw), true);
    let runtime = posix::builder(config)
        .display(draw, Box::new(display.clone()))
        .app(AppDescriptor::builtin(
            AppId::SYSTEM,
            "System",
            AppKind::Watchface,
            system,
        ))
        .build()
        .unwrap();
    let buttons = SimulatedButtons::new();
    let handle = posix::start(runtime, buttons.clone()).unwrap();
    wait_for("boot", || both_running(&handle));
    wait_for("first frame", || display.frames() >= 1);
    let frames = display.frames();

    buttons.press(ButtonId::Up);
    wait_for("click", || CLICKS.load(Ordering::SeqCst) == 1);
    buttons.release(ButtonId::Up);

    wait_for("redraw", || display.frames() > frames);
    handle.stop();
}

#[test]
fn remote_app_runs_after_its_download() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut image = ImageBuilder::new("Remote");
    let code = image.code(&[0x70, 0x47, 0x00, 0xbf]);
    image.entry(code);
    let host = RecordingHost::new();
    let runtime = posix::builder(config())
        .host(Box::new(host.clone()))
        .app(AppDescriptor::builtin(
            AppId::SYSTEM,
            "System",
            AppKind::Watchface,
            run_loop,
        ))
        .app(
            AppDescriptor::image(REMOTE, "Remote", AppKind::Application, Arc::new(image.build()))
                .remote(),
        )
        .build()
        .unwrap();
    let handle = posix::start(runtime, SimulatedButtons::new()).unwrap();
    wait_for("boot", || both_running(&handle));

    handle.launch(ContextId::MainApp, REMOTE).unwrap();
    wait_for("download request", || {
        handle.state(ContextId::MainApp) == LifecycleState::Downloading
    });
    assert_eq!(host.requested(), vec![REMOTE]);

    handle
        .download_complete(ContextId::MainApp, REMOTE, true)
        .unwrap();

    wait_for("remote app", || {
        handle.state(ContextId::MainApp) == LifecycleState::Runloop
    });
    handle.stop();
}

#[test]
fn worker_runs_beside_the_foreground_app() {
    static TICKS: AtomicUsize = AtomicUsize::new(0);
    fn count(context: &mut AppContext, _: usize) {
        if TICKS.fetch_add(1, Ordering::SeqCst) < 3 {
            context
                .register_timer(TickDuration::from_millis(10), count, 0)
                .unwrap();
        }
    }
    fn worker(context: &mut AppContext) {
        context
            .register_timer(TickDuration::from_millis(10), count, 0)
            .unwrap();
        context.event_loop();
    }

    let handle = start(vec![
        AppDescriptor::builtin(AppId::SYSTEM, "System", AppKind::Watchface, run_loop),
        AppDescriptor::builtin(WORKER, "Steps", AppKind::Worker, worker),
    ]);
    wait_for("boot", || both_running(&handle));

    handle.launch(ContextId::Worker, WORKER).unwrap();

    wait_for("worker timers", || TICKS.load(Ordering::SeqCst) == 4);
    assert_eq!(handle.state(ContextId::Worker), LifecycleState::Runloop);
    assert_eq!(handle.state(ContextId::MainApp), LifecycleState::Runloop);
    handle.stop();
}
