use apprt_core::RtError;

use crate::{Canvas, Color, Point, Window, WindowId, WindowStack};

struct Screen {
    unloaded: u32,
}

fn unload(screen: &mut Screen) {
    screen.unloaded += 1;
}

fn paint(_: &mut Screen, canvas: &mut dyn Canvas) {
    canvas.set_pixel(Point::new(0, 0), Color::WHITE);
}

#[test]
fn stack_keeps_most_recent_on_top() {
    let mut stack: WindowStack<Screen> = WindowStack::new();
    stack.push(Window::new(WindowId(1))).unwrap();
    stack.push(Window::new(WindowId(2))).unwrap();

    assert_eq!(stack.top().map(Window::id), Some(WindowId(2)));
    let order: std::vec::Vec<_> = stack.iter().map(Window::id).collect();
    assert_eq!(order, [WindowId(1), WindowId(2)]);

    assert_eq!(stack.pop().map(|w| w.id()), Some(WindowId(2)));
    assert_eq!(stack.len(), 1);
    assert!(stack.contains(WindowId(1)));
}

#[test]
fn full_stack_reports_out_of_memory() {
    let mut stack: WindowStack<Screen, 1> = WindowStack::new();
    stack.push(Window::new(WindowId(1))).unwrap();

    assert_eq!(stack.push(Window::new(WindowId(2))).unwrap_err(), RtError::OutOfMemory);
}

#[test]
fn window_procedures_run_against_their_context() {
    let window = Window::new(WindowId(3))
        .with_draw(paint)
        .with_unload(unload)
        .with_user_data(7);
    let mut screen = Screen { unloaded: 0 };

    if let Some(unload) = window.unload() {
        unload(&mut screen);
    }

    assert_eq!(screen.unloaded, 1);
    assert!(window.draw().is_some());
    assert!(window.click_config().is_none());
    assert_eq!(window.user_data(), 7);
}
