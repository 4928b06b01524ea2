//! Page rasterisation.
//!
//! ```text
//! bytes ──▶ DocumentLoader ──▶ page 1..=n ──▶ Canvas (2d stub) ──▶ RasterFrame
//! ```
//!
//! 1. [`surface`]   — the headless 2D context a renderer paints into
//! 2. [`canvas`]    — canvas handles and their create/reset/destroy lifecycle
//! 3. [`rasterize`] — the page loop and frame encoding
//! 4. [`pdfium`]    — a [`DocumentLoader`] backed by pdfium

pub mod canvas;
pub mod pdfium;
pub mod rasterize;
pub mod surface;

pub use canvas::{Canvas, CanvasFactory};
pub use pdfium::PdfiumLoader;
pub use rasterize::{
    rasterize, rasterize_blocking, DocumentLoader, DocumentPage, PaginatedDocument, Viewport,
};
pub use surface::{DrawingContext2d, PixelBuffer, StubContext2d};
