//! Headless 2D drawing surface.
//!
//! Page renderers expect a browser-style 2D context to draw into. Nothing in
//! this crate needs vector drawing: the only calls with an observable effect
//! are [`DrawingContext2d::put_image_data`] and
//! [`DrawingContext2d::get_image_data`]. Every other primitive is accepted and
//! ignored, so a renderer that paints through them runs to completion and the
//! pixels it hands over via `put_image_data` become the page image.

use crate::pipeline::encode::png_data_uri;
use image::ImageError;
use tracing::trace;

/// RGBA pixels with their declared dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA, four bytes per pixel.
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// Fully opaque white buffer (every byte 255).
    pub fn white(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * 4;
        Self {
            width,
            height,
            data: vec![255; len],
        }
    }

    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }
}

/// Gradient returned by the gradient constructors. Color stops are dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GradientHandle;

impl GradientHandle {
    pub fn add_color_stop(&mut self, offset: f64, color: &str) {
        let _ = (offset, color);
    }
}

/// Pattern handle. Never produced by the stub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternHandle;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TextMetrics {
    pub width: f64,
}

/// The 2D context surface a page renderer draws into.
///
/// All methods except the two image-data calls have no-op defaults.
#[allow(clippy::too_many_arguments)]
pub trait DrawingContext2d: Send {
    // ── State ────────────────────────────────────────────────────────────
    fn save(&mut self) {}
    fn restore(&mut self) {}

    // ── Transforms ───────────────────────────────────────────────────────
    fn translate(&mut self, x: f64, y: f64) {
        let _ = (x, y);
    }
    fn scale(&mut self, x: f64, y: f64) {
        let _ = (x, y);
    }
    fn rotate(&mut self, angle: f64) {
        let _ = angle;
    }
    fn transform(&mut self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) {
        let _ = (a, b, c, d, e, f);
    }
    fn set_transform(&mut self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) {
        let _ = (a, b, c, d, e, f);
    }

    // ── Rectangles ───────────────────────────────────────────────────────
    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        let _ = (x, y, w, h);
    }
    fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        let _ = (x, y, w, h);
    }
    fn clear_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        let _ = (x, y, w, h);
    }

    // ── Paths ────────────────────────────────────────────────────────────
    fn begin_path(&mut self) {}
    fn close_path(&mut self) {}
    fn move_to(&mut self, x: f64, y: f64) {
        let _ = (x, y);
    }
    fn line_to(&mut self, x: f64, y: f64) {
        let _ = (x, y);
    }
    fn quadratic_curve_to(&mut self, cpx: f64, cpy: f64, x: f64, y: f64) {
        let _ = (cpx, cpy, x, y);
    }
    fn bezier_curve_to(&mut self, cp1x: f64, cp1y: f64, cp2x: f64, cp2y: f64, x: f64, y: f64) {
        let _ = (cp1x, cp1y, cp2x, cp2y, x, y);
    }
    fn arc(&mut self, x: f64, y: f64, radius: f64, start: f64, end: f64, ccw: bool) {
        let _ = (x, y, radius, start, end, ccw);
    }
    fn arc_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, radius: f64) {
        let _ = (x1, y1, x2, y2, radius);
    }
    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        let _ = (x, y, w, h);
    }
    fn fill(&mut self) {}
    fn stroke(&mut self) {}
    fn clip(&mut self) {}

    // ── Images and text ──────────────────────────────────────────────────
    fn draw_image(&mut self, image: &PixelBuffer, dx: f64, dy: f64) {
        let _ = (image, dx, dy);
    }
    fn fill_text(&mut self, text: &str, x: f64, y: f64) {
        let _ = (text, x, y);
    }
    fn stroke_text(&mut self, text: &str, x: f64, y: f64) {
        let _ = (text, x, y);
    }
    fn measure_text(&self, text: &str) -> TextMetrics {
        let _ = text;
        TextMetrics::default()
    }

    // ── Paint sources ────────────────────────────────────────────────────
    fn create_linear_gradient(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) -> GradientHandle {
        let _ = (x0, y0, x1, y1);
        GradientHandle
    }
    fn create_radial_gradient(
        &mut self,
        x0: f64,
        y0: f64,
        r0: f64,
        x1: f64,
        y1: f64,
        r1: f64,
    ) -> GradientHandle {
        let _ = (x0, y0, r0, x1, y1, r1);
        GradientHandle
    }
    fn create_pattern(&mut self, image: &PixelBuffer, repetition: &str) -> Option<PatternHandle> {
        let _ = (image, repetition);
        None
    }

    // ── Pixels ───────────────────────────────────────────────────────────
    /// Replace the surface's pixels with `data`. Offsets are accepted but
    /// there is no compositing.
    fn put_image_data(&mut self, data: &PixelBuffer, dx: f64, dy: f64);

    /// Current pixels with the declared surface dimensions. The rectangle
    /// arguments are accepted but the whole surface is returned.
    fn get_image_data(&self, sx: f64, sy: f64, sw: f64, sh: f64) -> PixelBuffer;

    /// Catch-all for calls outside the declared set.
    fn unsupported(&mut self, name: &str) {
        trace!("2d context: ignoring unsupported call '{}'", name);
    }
}

/// The in-memory [`DrawingContext2d`] handed out by [`super::Canvas`].
#[derive(Debug, Clone)]
pub struct StubContext2d {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl StubContext2d {
    pub fn new(width: u32, height: u32) -> Self {
        let buffer = PixelBuffer::white(width, height);
        Self {
            width,
            height,
            pixels: buffer.data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Resize and start over from white.
    pub(crate) fn reallocate(&mut self, width: u32, height: u32) {
        *self = Self::new(width, height);
    }

    /// Zero dimensions and drop the buffer.
    pub(crate) fn release(&mut self) {
        self.width = 0;
        self.height = 0;
        self.pixels = Vec::new();
    }

    /// `data:image/png;base64,…` of the current pixels.
    ///
    /// Fails when the buffer does not hold exactly `width * height` pixels.
    pub fn to_data_url(&self) -> Result<String, ImageError> {
        png_data_uri(self.width, self.height, &self.pixels)
    }
}

impl DrawingContext2d for StubContext2d {
    fn put_image_data(&mut self, data: &PixelBuffer, dx: f64, dy: f64) {
        let _ = (dx, dy);
        self.pixels.clone_from(&data.data);
    }

    fn get_image_data(&self, sx: f64, sy: f64, sw: f64, sh: f64) -> PixelBuffer {
        let _ = (sx, sy, sw, sh);
        PixelBuffer::from_rgba(self.width, self.height, self.pixels.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_white() {
        let ctx = StubContext2d::new(2, 3);
        assert_eq!(ctx.pixels().len(), 2 * 3 * 4);
        assert!(ctx.pixels().iter().all(|&b| b == 255));
    }

    #[test]
    fn put_replaces_wholesale_and_keeps_dimensions() {
        let mut ctx = StubContext2d::new(2, 2);
        let red = PixelBuffer::from_rgba(1, 1, vec![255, 0, 0, 255]);
        ctx.put_image_data(&red, 5.0, 7.0);

        let got = ctx.get_image_data(0.0, 0.0, 1.0, 1.0);
        assert_eq!(got.data, vec![255, 0, 0, 255]);
        assert_eq!((got.width, got.height), (2, 2));
    }

    #[test]
    fn drawing_primitives_are_inert() {
        let mut ctx = StubContext2d::new(1, 1);
        let before = ctx.pixels().to_vec();

        ctx.save();
        ctx.translate(10.0, 10.0);
        ctx.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);
        ctx.begin_path();
        ctx.arc(0.0, 0.0, 5.0, 0.0, 6.28, false);
        ctx.fill();
        ctx.fill_rect(0.0, 0.0, 1.0, 1.0);
        ctx.fill_text("TOTAL 75.50", 0.0, 0.0);
        let mut g = ctx.create_linear_gradient(0.0, 0.0, 1.0, 1.0);
        g.add_color_stop(0.0, "#000");
        ctx.unsupported("setLineDash");
        ctx.restore();

        assert_eq!(ctx.pixels(), before.as_slice());
        assert_eq!(ctx.measure_text("anything").width, 0.0);
        assert!(ctx.create_pattern(&PixelBuffer::white(1, 1), "repeat").is_none());
    }

    #[test]
    fn data_url_is_png() {
        let ctx = StubContext2d::new(4, 4);
        let url = ctx.to_data_url().unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn data_url_fails_on_short_buffer() {
        let mut ctx = StubContext2d::new(4, 4);
        ctx.put_image_data(&PixelBuffer::from_rgba(1, 1, vec![0; 4]), 0.0, 0.0);
        assert!(ctx.to_data_url().is_err());
    }
}
