//! # receipt-extract
//!
//! Turn photographed or scanned receipts into validated, normalised records
//! using Vision Language Models (VLMs).
//!
//! ## Why this crate?
//!
//! Receipt OCR output is only useful if every record can be trusted
//! downstream: a date that parses, a non-negative amount, a category from a
//! closed list. Models get this right most of the time and nearly right the
//! rest. Instead of failing on "nearly right", this crate validates the
//! model's answer strictly and, when that fails, repairs each entry field by
//! field into a record that satisfies every invariant.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / image
//!  │
//!  ├─ 1. Input      resolve local file, URL or upload buffer; sniff the type
//!  ├─ 2. Submit     document + instructions + JSON schema → VLM (timeout-bounded)
//!  ├─ 3. Validate   strict shape and invariant check
//!  ├─ 4. Repair     total per-field normalisation when validation fails
//!  └─ 5. Output     receipts + which branch produced them
//! ```
//!
//! A separate [`raster`] module renders the first pages of a PDF into image
//! frames for display.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use receipt_extract::{extract, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = ExtractionConfig::default();
//!     let output = extract("walmart.pdf", &config).await?;
//!     for r in &output.receipts {
//!         println!("{} {} {:.2} {}", r.date, r.vendor, r.amount, r.currency);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `receipts` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! receipt-extract = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod raster;
pub mod receipt;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ExtractionConfig, ExtractionConfigBuilder, FrameEncoding, RasterConfig, RasterConfigBuilder,
};
pub use error::{ErrorBody, ReceiptError, RenderFailure};
pub use extract::{extract, extract_document, extract_from_bytes, extract_sync, resolve_response};
pub use output::{ExtractionOutput, Outcome, RasterFrame};
pub use pipeline::llm::{ExtractionBackend, ExtractionRequest, LlmBackend};
pub use pipeline::normalize::{normalize, repair, BatchContext};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use raster::{rasterize, DocumentLoader, PdfiumLoader};
pub use receipt::{Category, PaymentMethod, ProcessedReceipt, ReceiptBatch};
pub use stream::{extract_all, extract_stream, DocumentResult, ReceiptStream};
