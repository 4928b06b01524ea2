//! pdfium-backed [`DocumentLoader`].
//!
//! pdfium paints each page into an RGBA bitmap of exactly the viewport size;
//! the bitmap reaches the canvas through `put_image_data`.

use super::rasterize::{DocumentLoader, DocumentPage, PaginatedDocument, Viewport};
use super::surface::{DrawingContext2d, PixelBuffer};
use crate::error::{ReceiptError, RenderFailure};
use image::imageops::FilterType;
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// Loads PDFs with a bound pdfium library.
pub struct PdfiumLoader {
    pdfium: Pdfium,
    password: Option<String>,
}

impl std::fmt::Debug for PdfiumLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfiumLoader")
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl PdfiumLoader {
    /// Bind pdfium: `PDFIUM_LIB_PATH`, then the working directory, then the
    /// system library.
    pub fn new() -> Result<Self, ReceiptError> {
        let bindings = match std::env::var("PDFIUM_LIB_PATH") {
            Ok(path) if !path.is_empty() => {
                debug!("Binding pdfium from PDFIUM_LIB_PATH={}", path);
                Pdfium::bind_to_library(&path)
            }
            _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| ReceiptError::PdfiumBindingFailed(format!("{:?}", e)))?;

        info!("pdfium bound");
        Ok(Self {
            pdfium: Pdfium::new(bindings),
            password: None,
        })
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

impl DocumentLoader for PdfiumLoader {
    fn open<'a>(&'a self, bytes: &'a [u8]) -> Result<Box<dyn PaginatedDocument + 'a>, RenderFailure> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(bytes, self.password.as_deref())
            .map_err(|e| RenderFailure::new(format!("{:?}", e)))?;
        Ok(Box::new(PdfiumDocument { document }))
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl PaginatedDocument for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page(&self, number: usize) -> Result<Box<dyn DocumentPage + '_>, RenderFailure> {
        let index = number
            .checked_sub(1)
            .ok_or_else(|| RenderFailure::new("page numbers start at 1"))?;
        let page = self
            .document
            .pages()
            .get(index as u16)
            .map_err(|e| RenderFailure::new(format!("{:?}", e)))?;
        Ok(Box::new(PdfiumPage { page }))
    }
}

struct PdfiumPage<'a> {
    page: PdfPage<'a>,
}

impl DocumentPage for PdfiumPage<'_> {
    fn viewport(&self, scale: f32) -> Viewport {
        Viewport::scaled(self.page.width().value, self.page.height().value, scale)
    }

    fn render(
        &self,
        context: &mut dyn DrawingContext2d,
        viewport: &Viewport,
    ) -> Result<(), RenderFailure> {
        let (width, height) = viewport.pixel_size();
        if width == 0 || height == 0 {
            return Err(RenderFailure::new(format!(
                "page has no area at scale {}",
                viewport.scale
            )));
        }

        let bitmap = self
            .page
            .render_with_config(
                &PdfRenderConfig::new()
                    .set_target_width(width as i32)
                    .set_target_height(height as i32)
                    .render_form_data(true)
                    .render_annotations(true),
            )
            .map_err(|e| RenderFailure::new(format!("{:?}", e)))?;

        let mut rgba = bitmap.as_image().to_rgba8();
        if rgba.dimensions() != (width, height) {
            rgba = image::imageops::resize(&rgba, width, height, FilterType::Triangle);
        }

        context.put_image_data(
            &PixelBuffer::from_rgba(width, height, rgba.into_raw()),
            0.0,
            0.0,
        );
        Ok(())
    }
}
