//! Page rasterisation: turn the first pages of a document into image frames.
//!
//! Rendering itself is delegated to a [`DocumentLoader`]; this module owns
//! the page loop, the canvas lifecycle and frame encoding. Pages are
//! processed strictly in order on a single canvas, and any failure aborts the
//! whole call: callers get every requested frame or none.

use super::canvas::{Canvas, CanvasFactory};
use super::surface::DrawingContext2d;
use crate::config::{FrameEncoding, RasterConfig};
use crate::error::{ReceiptError, RenderFailure};
use crate::output::RasterFrame;
use crate::pipeline::encode::data_uri;
use std::sync::Arc;
use tracing::{debug, info};

/// Page size at a given magnification, in device pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub scale: f32,
}

impl Viewport {
    /// Intrinsic page size (points) times `scale`.
    pub fn scaled(page_width: f32, page_height: f32, scale: f32) -> Self {
        Self {
            width: page_width * scale,
            height: page_height * scale,
            scale,
        }
    }

    /// Whole-pixel canvas size (floored, never negative).
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            self.width.max(0.0).floor() as u32,
            self.height.max(0.0).floor() as u32,
        )
    }
}

/// Opens document bytes into something paginated.
pub trait DocumentLoader: Send + Sync {
    fn open<'a>(&'a self, bytes: &'a [u8]) -> Result<Box<dyn PaginatedDocument + 'a>, RenderFailure>;
}

/// An opened document.
pub trait PaginatedDocument {
    fn page_count(&self) -> usize;

    /// Page `number`, 1-based.
    fn page(&self, number: usize) -> Result<Box<dyn DocumentPage + '_>, RenderFailure>;
}

/// One page of an opened document.
pub trait DocumentPage {
    fn viewport(&self, scale: f32) -> Viewport;

    fn render(
        &self,
        context: &mut dyn DrawingContext2d,
        viewport: &Viewport,
    ) -> Result<(), RenderFailure>;
}

/// Rasterise up to `config.max_pages` pages of a document.
///
/// Runs on the blocking pool; renderers such as pdfium are CPU-bound and
/// must not stall the async workers.
///
/// # Errors
/// [`ReceiptError::DocumentRender`] when the document cannot be opened or any
/// page fails to render or encode.
pub async fn rasterize(
    loader: Arc<dyn DocumentLoader>,
    bytes: Vec<u8>,
    mime_type: impl Into<String>,
    config: &RasterConfig,
) -> Result<Vec<RasterFrame>, ReceiptError> {
    let mime_type = mime_type.into();
    let config = config.clone();

    tokio::task::spawn_blocking(move || {
        rasterize_blocking(loader.as_ref(), &bytes, &mime_type, &config)
    })
    .await
    .map_err(|e| ReceiptError::Internal(format!("Render task panicked: {}", e)))?
}

/// Blocking implementation of [`rasterize`].
pub fn rasterize_blocking(
    loader: &dyn DocumentLoader,
    bytes: &[u8],
    mime_type: &str,
    config: &RasterConfig,
) -> Result<Vec<RasterFrame>, ReceiptError> {
    let document = loader.open(bytes).map_err(|e| ReceiptError::DocumentRender {
        page: None,
        detail: e.detail,
    })?;

    let page_count = document.page_count();
    let pages_to_convert = page_count.min(config.max_pages);
    info!(
        "Document loaded: {} page(s), rasterising {}",
        page_count, pages_to_convert
    );

    let factory = CanvasFactory::new();
    let mut canvas: Option<Canvas> = None;
    let result = render_pages(
        document.as_ref(),
        pages_to_convert,
        bytes,
        mime_type,
        config,
        &factory,
        &mut canvas,
    );
    if let Some(ref mut c) = canvas {
        factory.destroy(c);
    }
    result
}

fn render_pages(
    document: &dyn PaginatedDocument,
    pages_to_convert: usize,
    source: &[u8],
    mime_type: &str,
    config: &RasterConfig,
    factory: &CanvasFactory,
    canvas: &mut Option<Canvas>,
) -> Result<Vec<RasterFrame>, ReceiptError> {
    let mut frames = Vec::with_capacity(pages_to_convert);

    for number in 1..=pages_to_convert {
        let page_error = |e: RenderFailure| ReceiptError::DocumentRender {
            page: Some(number),
            detail: e.detail,
        };

        let page = document.page(number).map_err(page_error)?;
        let viewport = page.viewport(config.scale);
        let (width, height) = viewport.pixel_size();

        let surface = match canvas {
            Some(c) => {
                factory.reset(c, width, height);
                c
            }
            None => canvas.insert(factory.create(width, height)),
        };

        let context = surface
            .get_context("2d")
            .ok_or_else(|| ReceiptError::Internal("2d context unavailable".into()))?;
        page.render(context, &viewport).map_err(page_error)?;

        let encoded_image = match config.encoding {
            FrameEncoding::Png if width == 0 || height == 0 => {
                return Err(ReceiptError::DocumentRender {
                    page: Some(number),
                    detail: format!("page has no area at scale {}", viewport.scale),
                });
            }
            FrameEncoding::Png => {
                surface
                    .surface()
                    .to_data_url()
                    .map_err(|e| ReceiptError::DocumentRender {
                        page: Some(number),
                        detail: format!("PNG encoding failed: {}", e),
                    })?
            }
            FrameEncoding::SourcePassthrough => data_uri(mime_type, source),
        };

        debug!(
            "Rasterised page {} → {}x{} px, {} chars",
            number,
            width,
            height,
            encoded_image.len()
        );
        frames.push(RasterFrame {
            page_number: number,
            encoded_image,
        });
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::surface::PixelBuffer;

    struct FakeLoader {
        pages: usize,
        fail_page: Option<usize>,
        fail_open: bool,
    }

    struct FakeDocument<'a> {
        loader: &'a FakeLoader,
    }

    struct FakePage {
        number: usize,
        fail: bool,
    }

    impl DocumentLoader for FakeLoader {
        fn open<'a>(
            &'a self,
            _bytes: &'a [u8],
        ) -> Result<Box<dyn PaginatedDocument + 'a>, RenderFailure> {
            if self.fail_open {
                return Err(RenderFailure::new("Invalid PDF structure"));
            }
            Ok(Box::new(FakeDocument { loader: self }))
        }
    }

    impl PaginatedDocument for FakeDocument<'_> {
        fn page_count(&self) -> usize {
            self.loader.pages
        }

        fn page(&self, number: usize) -> Result<Box<dyn DocumentPage + '_>, RenderFailure> {
            Ok(Box::new(FakePage {
                number,
                fail: self.loader.fail_page == Some(number),
            }))
        }
    }

    impl DocumentPage for FakePage {
        fn viewport(&self, scale: f32) -> Viewport {
            Viewport::scaled(2.5 * self.number as f32, 3.0, scale)
        }

        fn render(
            &self,
            context: &mut dyn DrawingContext2d,
            viewport: &Viewport,
        ) -> Result<(), RenderFailure> {
            if self.fail {
                return Err(RenderFailure::new("broken content stream"));
            }
            let (w, h) = viewport.pixel_size();
            context.fill_rect(0.0, 0.0, w as f64, h as f64);
            let gray = PixelBuffer::from_rgba(w, h, vec![128; (w * h * 4) as usize]);
            context.put_image_data(&gray, 0.0, 0.0);
            Ok(())
        }
    }

    fn loader(pages: usize) -> FakeLoader {
        FakeLoader {
            pages,
            fail_page: None,
            fail_open: false,
        }
    }

    fn config(max_pages: usize) -> RasterConfig {
        RasterConfig::builder().max_pages(max_pages).build().unwrap()
    }

    #[test]
    fn caps_at_max_pages() {
        let frames = rasterize_blocking(&loader(5), b"%PDF", "application/pdf", &config(2)).unwrap();
        let numbers: Vec<usize> = frames.iter().map(|f| f.page_number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert!(frames
            .iter()
            .all(|f| f.encoded_image.starts_with("data:image/png;base64,")));
    }

    #[test]
    fn caps_at_page_count() {
        let frames = rasterize_blocking(&loader(2), b"%PDF", "application/pdf", &config(9)).unwrap();
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn empty_document_yields_no_frames() {
        let frames = rasterize_blocking(&loader(0), b"%PDF", "application/pdf", &config(3)).unwrap();
        assert!(frames.is_empty());
    }

    #[test]
    fn page_failure_aborts_everything() {
        let l = FakeLoader {
            pages: 3,
            fail_page: Some(2),
            fail_open: false,
        };
        let err = rasterize_blocking(&l, b"%PDF", "application/pdf", &config(3)).unwrap_err();
        match err {
            ReceiptError::DocumentRender { page, detail } => {
                assert_eq!(page, Some(2));
                assert!(detail.contains("content stream"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn open_failure_has_no_page() {
        let l = FakeLoader {
            pages: 1,
            fail_page: None,
            fail_open: true,
        };
        let err = rasterize_blocking(&l, b"junk", "application/pdf", &config(1)).unwrap_err();
        assert!(matches!(err, ReceiptError::DocumentRender { page: None, .. }));
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn passthrough_repeats_source() {
        let cfg = RasterConfig::builder()
            .max_pages(2)
            .encoding(FrameEncoding::SourcePassthrough)
            .build()
            .unwrap();
        let frames = rasterize_blocking(&loader(4), b"%PDF-1.7", "application/pdf", &cfg).unwrap();
        assert_eq!(frames.len(), 2);
        for f in &frames {
            assert_eq!(f.encoded_image, "data:application/pdf;base64,JVBERi0xLjc=");
        }
    }

    #[test]
    fn viewport_floors_to_pixels() {
        let v = Viewport::scaled(612.0, 792.5, 2.0);
        assert_eq!(v.pixel_size(), (1224, 1585));
        assert_eq!(Viewport::scaled(-1.0, 1.0, 1.0).pixel_size(), (0, 1));
    }

    #[tokio::test]
    async fn async_entry_point_runs_on_blocking_pool() {
        let frames = rasterize(Arc::new(loader(3)), b"%PDF".to_vec(), "application/pdf", &config(1))
            .await
            .unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].page_number, 1);
    }
}
