//! Windows and window stacks

use core::fmt;

use heapless::Vec;

use apprt_core::{RtError, RtResult};

use crate::canvas::Canvas;

/// Windows a single context can stack
pub const MAX_WINDOWS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WindowId(pub u32);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window:{}", self.0)
    }
}

/// A UI unit: installs its click bindings when it becomes topmost and
/// paints itself when its context draws
pub struct Window<C> {
    id: WindowId,
    click_config: Option<fn(&mut C)>,
    draw: Option<fn(&mut C, &mut dyn Canvas)>,
    unload: Option<fn(&mut C)>,
    user_data: usize,
}

impl<C> Window<C> {
    pub const fn new(id: WindowId) -> Self {
        Self {
            id,
            click_config: None,
            draw: None,
            unload: None,
            user_data: 0,
        }
    }

    pub fn with_click_config(mut self, provider: fn(&mut C)) -> Self {
        self.click_config = Some(provider);
        self
    }

    pub fn with_draw(mut self, draw: fn(&mut C, &mut dyn Canvas)) -> Self {
        self.draw = Some(draw);
        self
    }

    pub fn with_unload(mut self, unload: fn(&mut C)) -> Self {
        self.unload = Some(unload);
        self
    }

    pub fn with_user_data(mut self, user_data: usize) -> Self {
        self.user_data = user_data;
        self
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn user_data(&self) -> usize {
        self.user_data
    }

    pub fn click_config(&self) -> Option<fn(&mut C)> {
        self.click_config
    }

    pub fn draw(&self) -> Option<fn(&mut C, &mut dyn Canvas)> {
        self.draw
    }

    pub fn unload(&self) -> Option<fn(&mut C)> {
        self.unload
    }
}

impl<C> Clone for Window<C> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<C> Copy for Window<C> {}

impl<C> fmt::Debug for Window<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window")
            .field("id", &self.id)
            .field("user_data", &self.user_data)
            .finish()
    }
}

/// Windows of one context, most recent on top
pub struct WindowStack<C, const N: usize = MAX_WINDOWS> {
    windows: Vec<Window<C>, N>,
}

impl<C, const N: usize> WindowStack<C, N> {
    pub const fn new() -> Self {
        Self {
            windows: Vec::new(),
        }
    }

    pub fn push(&mut self, window: Window<C>) -> RtResult<()> {
        self.windows.push(window).map_err(|_| RtError::OutOfMemory)
    }

    pub fn pop(&mut self) -> Option<Window<C>> {
        self.windows.pop()
    }

    pub fn top(&self) -> Option<&Window<C>> {
        self.windows.last()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.windows.iter().any(|window| window.id == id)
    }

    /// Oldest first, the order windows are painted in
    pub fn iter(&self) -> impl Iterator<Item = &Window<C>> {
        self.windows.iter()
    }
}

impl<C, const N: usize> Default for WindowStack<C, N> {
    fn default() -> Self {
        Self::new()
    }
}
