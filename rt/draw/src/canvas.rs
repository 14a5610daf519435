//! Drawing surface and display driver contracts

/// 8-bit packed colour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Color(pub u8);

impl Color {
    pub const BLACK: Self = Self(0xC0);
    pub const WHITE: Self = Self(0xFF);
    pub const CLEAR: Self = Self(0x00);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i16,
    pub y: i16,
}

impl Point {
    pub const fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Size {
    pub width: u16,
    pub height: u16,
}

impl Size {
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    pub const fn area(self) -> usize {
        self.width as usize * self.height as usize
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const fn new(x: i16, y: i16, width: u16, height: u16) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }
}

/// Drawing surface handed to window draw procedures
pub trait Canvas {
    fn size(&self) -> Size;

    /// Pixels outside the surface are ignored
    fn set_pixel(&mut self, at: Point, color: Color);

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        for dy in 0..rect.size.height {
            for dx in 0..rect.size.width {
                let x = i32::from(rect.origin.x) + i32::from(dx);
                let y = i32::from(rect.origin.y) + i32::from(dy);
                if let (Ok(x), Ok(y)) = (i16::try_from(x), i16::try_from(y)) {
                    self.set_pixel(Point::new(x, y), color);
                }
            }
        }
    }

    fn clear(&mut self, color: Color) {
        let size = self.size();
        self.fill_rect(Rect::new(0, 0, size.width, size.height), color);
    }
}

/// Row-major 8-bit frame buffer over any byte storage
pub struct FrameBuffer<B> {
    bytes: B,
    size: Size,
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> FrameBuffer<B> {
    /// `bytes` must hold at least `size.area()` bytes
    pub fn new(bytes: B, size: Size) -> Self {
        assert!(bytes.as_ref().len() >= size.area(), "frame buffer too small");
        Self { bytes, size }
    }

    pub fn pixel(&self, at: Point) -> Option<Color> {
        self.index(at).map(|index| Color(self.bytes.as_ref()[index]))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes.as_ref()[..self.size.area()]
    }

    fn index(&self, at: Point) -> Option<usize> {
        let x = usize::try_from(at.x).ok()?;
        let y = usize::try_from(at.y).ok()?;
        if x >= usize::from(self.size.width) || y >= usize::from(self.size.height) {
            return None;
        }
        Some(y * usize::from(self.size.width) + x)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Canvas for FrameBuffer<B> {
    fn size(&self) -> Size {
        self.size
    }

    fn set_pixel(&mut self, at: Point, color: Color) {
        if let Some(index) = self.index(at) {
            self.bytes.as_mut()[index] = color.0;
        }
    }
}

/// Display hardware.
///
/// `start_frame` pushes the frame buffer out asynchronously; the driver
/// reports completion by calling [`DrawCoordinator::on_frame_done`] from
/// its interrupt.
///
/// [`DrawCoordinator::on_frame_done`]: crate::DrawCoordinator::on_frame_done
pub trait DisplayDriver: Send + Sync {
    /// Borrow the frame buffer for painting
    fn with_canvas(&self, paint: &mut dyn FnMut(&mut dyn Canvas));

    /// Start pushing the frame at offset (`x`, `y`); returns immediately
    fn start_frame(&self, x: i16, y: i16);
}
