use crate::{Canvas, Color, FrameBuffer, Point, Rect, Size};

#[test]
fn fill_rect_clips_to_the_surface() {
    let mut frame = FrameBuffer::new([0u8; 16], Size::new(4, 4));

    frame.fill_rect(Rect::new(2, -1, 4, 2), Color::WHITE);

    assert_eq!(frame.pixel(Point::new(2, 0)), Some(Color::WHITE));
    assert_eq!(frame.pixel(Point::new(3, 0)), Some(Color::WHITE));
    assert_eq!(frame.pixel(Point::new(2, 1)), Some(Color::CLEAR));
    assert_eq!(frame.pixel(Point::new(1, 0)), Some(Color::CLEAR));
    assert_eq!(frame.pixel(Point::new(4, 0)), None);
}

#[test]
fn clear_paints_every_pixel() {
    let mut frame = FrameBuffer::new([0u8; 6], Size::new(3, 2));

    frame.clear(Color::BLACK);

    assert!(frame.as_bytes().iter().all(|b| *b == Color::BLACK.0));
}

#[test]
#[should_panic]
fn undersized_storage_is_rejected() {
    let _ = FrameBuffer::new([0u8; 3], Size::new(2, 2));
}
