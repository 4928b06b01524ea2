//! Canvas handles and the factory that sizes them.

use super::surface::{DrawingContext2d, StubContext2d};
use tracing::trace;

/// A drawing surface of declared size.
#[derive(Debug, Clone)]
pub struct Canvas {
    context: StubContext2d,
}

impl Canvas {
    pub fn width(&self) -> u32 {
        self.context.width()
    }

    pub fn height(&self) -> u32 {
        self.context.height()
    }

    /// The context for `kind`. Only `"2d"` is available.
    pub fn get_context(&mut self, kind: &str) -> Option<&mut dyn DrawingContext2d> {
        match kind {
            "2d" => Some(&mut self.context as &mut dyn DrawingContext2d),
            _ => None,
        }
    }

    /// Read-only view of the 2D surface, for export.
    pub fn surface(&self) -> &StubContext2d {
        &self.context
    }
}

/// Creates, resizes and releases [`Canvas`]es for a page renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanvasFactory;

impl CanvasFactory {
    pub fn new() -> Self {
        Self
    }

    pub fn create(&self, width: u32, height: u32) -> Canvas {
        trace!("canvas create {}x{}", width, height);
        Canvas {
            context: StubContext2d::new(width, height),
        }
    }

    /// Resize for the next page. The buffer is reallocated white.
    pub fn reset(&self, canvas: &mut Canvas, width: u32, height: u32) {
        trace!("canvas reset {}x{}", width, height);
        canvas.context.reallocate(width, height);
    }

    pub fn destroy(&self, canvas: &mut Canvas) {
        trace!("canvas destroy");
        canvas.context.release();
    }
}
