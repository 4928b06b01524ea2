//! Progress-callback trait for batch extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as [`crate::stream::extract_stream`] works through a batch of
//! documents.
//!
//! # Example
//!
//! ```rust
//! use receipt_extract::{ExtractionProgressCallback, ExtractionConfig, Outcome};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     receipts: Arc<AtomicUsize>,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, name: &str, receipt_count: usize, outcome: Outcome) {
//!         self.receipts.fetch_add(receipt_count, Ordering::SeqCst);
//!         eprintln!("{name}: {receipt_count} receipt(s), {outcome:?}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     receipts: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::Outcome;
use std::sync::Arc;

/// Called by the batch APIs as each document moves through the pipeline.
///
/// Documents are processed concurrently, so every method may be called from
/// several tasks at once. All methods default to no-ops.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once before any document is submitted.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called just before a document is sent to the extraction backend.
    fn on_document_start(&self, name: &str) {
        let _ = name;
    }

    /// Called when a document yielded receipts.
    ///
    /// `outcome` tells whether the model's answer was valid as-is or had to
    /// be repaired.
    fn on_document_complete(&self, name: &str, receipt_count: usize, outcome: Outcome) {
        let _ = (name, receipt_count, outcome);
    }

    /// Called when a document ended in a terminal error.
    fn on_document_error(&self, name: &str, error: &str) {
        let _ = (name, error);
    }

    /// Called once after every document has been attempted.
    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        let _ = (total_documents, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        receipts: AtomicUsize,
        repaired: AtomicUsize,
        errors: AtomicUsize,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_document_start(&self, _name: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_complete(&self, _name: &str, receipt_count: usize, outcome: Outcome) {
            self.receipts.fetch_add(receipt_count, Ordering::SeqCst);
            if outcome == Outcome::Repaired {
                self.repaired.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_document_error(&self, _name: &str, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_document_start("a.pdf");
        cb.on_document_complete("a.pdf", 1, Outcome::Validated);
        cb.on_document_error("b.pdf", "No receipt data found");
        cb.on_batch_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_document_start("a.pdf");
        tracker.on_document_complete("a.pdf", 2, Outcome::Validated);
        tracker.on_document_start("b.png");
        tracker.on_document_complete("b.png", 1, Outcome::Repaired);
        tracker.on_document_start("c.pdf");
        tracker.on_document_error("c.pdf", "timeout");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.receipts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.repaired.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }
}
