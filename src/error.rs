//! Error types for the receipt-extract library.
//!
//! Three error types reflect three distinct audiences:
//!
//! * [`ReceiptError`] — **Terminal**: the invocation produced no receipts
//!   (input missing, the model returned nothing usable, the provider or
//!   renderer failed). Returned as `Err(ReceiptError)` from every public
//!   entry point and mapped onto an HTTP status by [`ReceiptError::status_code`].
//!
//! * [`RenderFailure`] — reported by a [`crate::raster::DocumentLoader`]
//!   implementation. The rasteriser wraps it into
//!   [`ReceiptError::DocumentRender`] together with the failing page.
//!
//! * [`crate::pipeline::validate::ValidationError`] — why a model response
//!   failed strict validation. It never leaves the pipeline: a validation
//!   failure routes the response into repair instead.
//!
//! Field-level problems (a non-numeric amount, an unknown category) are not
//! errors at all; the normaliser fixes them in place.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All terminal errors returned by the receipt-extract library.
#[derive(Debug, Error)]
pub enum ReceiptError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// No document bytes were supplied.
    #[error("Missing required document")]
    InputMissing,

    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The bytes are neither a PDF nor a supported image format.
    #[error("Unsupported document '{name}': first bytes {magic:?} are not PDF, PNG, JPEG, GIF or WEBP")]
    UnsupportedDocument { name: String, magic: Vec<u8> },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The model answered, but no receipt array could be recovered.
    #[error("No receipt data found")]
    NoDataExtracted,

    /// The configured backend is not initialised (missing API key etc.).
    #[error("Extraction backend '{backend}' is not configured.\n{hint}")]
    BackendNotConfigured { backend: String, hint: String },

    /// The extraction backend itself failed (network, auth, provider error).
    #[error("Extraction backend '{backend}' failed: {detail}")]
    Extraction { backend: String, detail: String },

    /// The backend replied with something that is not a JSON object.
    #[error("Extraction response is not valid JSON: {detail}")]
    MalformedResponse { detail: String },

    /// The invocation exceeded its wall-clock budget.
    #[error("Extraction timed out after {secs}s")]
    Timeout { secs: u64 },

    // ── Rendering errors ──────────────────────────────────────────────────
    /// The document could not be opened, or one of its pages failed to render.
    #[error("{}", render_message(*page, detail))]
    DocumentRender { page: Option<usize>, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or place the library in the working directory."
    )]
    PdfiumBindingFailed(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn render_message(page: Option<usize>, detail: &str) -> String {
    match page {
        Some(p) => format!("Rendering failed for page {p}: {detail}"),
        None => format!("Document could not be opened: {detail}"),
    }
}

impl ReceiptError {
    /// HTTP status the route layer must answer with for this error.
    ///
    /// 400 for bad or missing input, 422 when the model returned nothing
    /// usable, 500 for every transport, provider, render or internal failure.
    pub fn status_code(&self) -> u16 {
        match self {
            ReceiptError::InputMissing
            | ReceiptError::FileNotFound { .. }
            | ReceiptError::PermissionDenied { .. }
            | ReceiptError::UnsupportedDocument { .. }
            | ReceiptError::DownloadFailed { .. }
            | ReceiptError::DownloadTimeout { .. } => 400,
            ReceiptError::NoDataExtracted => 422,
            _ => 500,
        }
    }

    /// Short, stable error label for the response body.
    fn label(&self) -> &'static str {
        match self.status_code() {
            400 => "Missing or unsupported document",
            422 => "No receipt data found",
            _ => "OCR failed",
        }
    }

    /// Build the `{ error, details? }` body that accompanies [`Self::status_code`].
    pub fn to_body(&self) -> ErrorBody {
        let details = match self {
            ReceiptError::NoDataExtracted => None,
            other => Some(other.to_string()),
        };
        ErrorBody {
            error: self.label().to_string(),
            details,
        }
    }
}

/// Serialisable error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// A failure reported by a document-rendering backend.
#[derive(Debug, Clone, Error)]
#[error("{detail}")]
pub struct RenderFailure {
    pub detail: String,
}

impl RenderFailure {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_route_contract() {
        assert_eq!(ReceiptError::InputMissing.status_code(), 400);
        assert_eq!(ReceiptError::NoDataExtracted.status_code(), 422);
        assert_eq!(
            ReceiptError::Extraction {
                backend: "openai".into(),
                detail: "401".into()
            }
            .status_code(),
            500
        );
        assert_eq!(ReceiptError::Timeout { secs: 60 }.status_code(), 500);
    }

    #[test]
    fn no_data_body_has_no_details() {
        let body = ReceiptError::NoDataExtracted.to_body();
        assert_eq!(body.error, "No receipt data found");
        assert!(body.details.is_none());
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"error":"No receipt data found"}"#);
    }

    #[test]
    fn extraction_body_carries_cause() {
        let body = ReceiptError::Extraction {
            backend: "anthropic".into(),
            detail: "invalid key".into(),
        }
        .to_body();
        assert_eq!(body.error, "OCR failed");
        let details = body.details.unwrap();
        assert!(details.contains("anthropic"));
        assert!(details.contains("invalid key"));
    }

    #[test]
    fn render_display_mentions_page() {
        let e = ReceiptError::DocumentRender {
            page: Some(3),
            detail: "bad xref".into(),
        };
        assert!(e.to_string().contains("page 3"));
        let e = ReceiptError::DocumentRender {
            page: None,
            detail: "not a pdf".into(),
        };
        assert!(e.to_string().contains("could not be opened"));
    }
}
