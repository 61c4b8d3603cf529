//! The shared framebuffer and the display surface the renderer reports
//! progress to.

use std::sync::atomic::{AtomicBool, Ordering};

use fray_core::Bitmap;
use fray_math::Color;

/// A half-open pixel rectangle [x0, x1) × [y0, y1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl Rect {
    pub fn new(x0: usize, y0: usize, x1: usize, y1: usize) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> usize {
        self.x1 - self.x0
    }

    pub fn height(&self) -> usize {
        self.y1 - self.y0
    }
}

/// A dense raster of HDR radiance values, sized once per frame.
#[derive(Debug, Clone)]
pub struct Framebuffer {
    width: usize,
    height: usize,
    data: Vec<Color>,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![Color::BLACK; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Color {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, color: Color) {
        self.data[y * self.width + x] = color;
    }

    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        for y in rect.y0..rect.y1.min(self.height) {
            for x in rect.x0..rect.x1.min(self.width) {
                self.set(x, y, color);
            }
        }
    }

    /// Copy into a [`Bitmap`] for saving to disk.
    pub fn to_bitmap(&self) -> Bitmap {
        let mut bmp = Bitmap::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                bmp.set_pixel(x, y, self.get(x, y));
            }
        }
        bmp
    }
}

/// The surface that shows render progress.
///
/// The region operations return `false` once the user has requested
/// cancellation; workers poll that through their region writes and unwind
/// at the next bucket boundary. Implementations are shared across worker
/// threads and synchronize internally.
pub trait Display: Sync {
    /// Show the whole framebuffer.
    fn present(&self, _fb: &Framebuffer) {}

    /// Show one finished region of the framebuffer.
    fn present_region(&self, _rect: Rect, _fb: &Framebuffer) -> bool {
        !self.want_to_quit()
    }

    /// Paint a region in a flat color (used by the coarse pre-pass).
    fn paint_region(&self, _rect: Rect, _color: Color) -> bool {
        !self.want_to_quit()
    }

    /// Bracket a region that a worker has started on.
    fn mark_region(&self, _rect: Rect) -> bool {
        !self.want_to_quit()
    }

    fn want_to_quit(&self) -> bool {
        false
    }
}

/// A display that shows nothing; rendering runs to completion unless
/// cancellation is requested programmatically.
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    cancel: AtomicBool,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_quit(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

impl Display for HeadlessDisplay {
    fn want_to_quit(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framebuffer_set_get() {
        let mut fb = Framebuffer::new(8, 4);
        fb.set(7, 3, Color::WHITE);
        assert_eq!(fb.get(7, 3), Color::WHITE);
        assert_eq!(fb.get(0, 0), Color::BLACK);
    }

    #[test]
    fn test_fill_rect_clips() {
        let mut fb = Framebuffer::new(4, 4);
        fb.fill_rect(Rect::new(2, 2, 100, 100), Color::RED);
        assert_eq!(fb.get(2, 2), Color::RED);
        assert_eq!(fb.get(3, 3), Color::RED);
        assert_eq!(fb.get(1, 1), Color::BLACK);
    }

    #[test]
    fn test_headless_display_cancellation() {
        let display = HeadlessDisplay::new();
        let fb = Framebuffer::new(2, 2);
        let r = Rect::new(0, 0, 2, 2);
        assert!(display.mark_region(r));
        assert!(display.present_region(r, &fb));
        display.request_quit();
        assert!(!display.mark_region(r));
        assert!(!display.paint_region(r, Color::BLACK));
    }
}
