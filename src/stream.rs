//! Batch extraction: run many independent documents concurrently.
//!
//! Each document is its own pipeline invocation with its own context; the
//! only thing shared is the (immutable) backend. [`extract_stream`] yields
//! results in completion order, [`extract_all`] waits for every document and
//! returns them in input order.

use crate::config::ExtractionConfig;
use crate::error::ReceiptError;
use crate::extract::{extract_document, resolve_backend};
use crate::output::ExtractionOutput;
use crate::pipeline::input;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// Result for one input of a batch.
#[derive(Debug)]
pub struct DocumentResult {
    /// Position of the input in the batch (0-based).
    pub index: usize,
    /// The path or URL as given.
    pub input: String,
    pub result: Result<ExtractionOutput, ReceiptError>,
}

/// A boxed stream of per-document results.
pub type ReceiptStream = Pin<Box<dyn Stream<Item = DocumentResult> + Send>>;

/// Extract receipts from several documents, emitting each as it completes.
///
/// At most `config.concurrency` documents are in flight at once. Per-document
/// failures are reported inside the stream; only a backend that cannot be
/// resolved at all fails the whole call.
pub fn extract_stream(
    inputs: Vec<String>,
    config: &ExtractionConfig,
) -> Result<ReceiptStream, ReceiptError> {
    let backend = resolve_backend(config)?;
    let concurrency = config.concurrency.max(1);
    let total = inputs.len();
    let succeeded = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));
    info!("Starting batch extraction of {} document(s)", total);

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
        if total == 0 {
            cb.on_batch_complete(0, 0);
        }
    }

    let config_clone = config.clone();
    let s = stream::iter(inputs.into_iter().enumerate().map(move |(index, input)| {
        let backend = Arc::clone(&backend);
        let cfg = config_clone.clone();
        let succeeded = Arc::clone(&succeeded);
        let finished = Arc::clone(&finished);
        async move {
            if let Some(ref cb) = cfg.progress_callback {
                cb.on_document_start(&input);
            }

            let result = match input::resolve_input(&input, cfg.download_timeout_secs).await {
                Ok(document) => extract_document(&document, backend.as_ref(), &cfg).await,
                Err(e) => Err(e),
            };

            if let Some(ref cb) = cfg.progress_callback {
                match &result {
                    Ok(out) => cb.on_document_complete(&input, out.receipts.len(), out.outcome),
                    Err(e) => cb.on_document_error(&input, &e.to_string()),
                }
            }
            if result.is_ok() {
                succeeded.fetch_add(1, Ordering::SeqCst);
            }
            if finished.fetch_add(1, Ordering::SeqCst) + 1 == total {
                if let Some(ref cb) = cfg.progress_callback {
                    cb.on_batch_complete(total, succeeded.load(Ordering::SeqCst));
                }
            }

            DocumentResult {
                index,
                input,
                result,
            }
        }
    }))
    .buffer_unordered(concurrency);

    Ok(Box::pin(s))
}

/// Extract receipts from several documents and return them in input order.
pub async fn extract_all(
    inputs: Vec<String>,
    config: &ExtractionConfig,
) -> Result<Vec<DocumentResult>, ReceiptError> {
    let mut results: Vec<DocumentResult> = extract_stream(inputs, config)?.collect().await;
    results.sort_by_key(|r| r.index);
    Ok(results)
}
