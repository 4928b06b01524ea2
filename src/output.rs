//! Result types produced by the extraction pipeline and the rasteriser.

use crate::receipt::{ProcessedReceipt, ReceiptBatch};
use serde::{Deserialize, Serialize};

/// Which branch of the pipeline produced the receipts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The model's answer passed strict validation and is returned unchanged.
    Validated,
    /// Validation failed; every entry went through the normaliser.
    Repaired,
}

/// Receipts extracted from one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionOutput {
    pub file_name: String,
    pub receipts: Vec<ProcessedReceipt>,
    pub outcome: Outcome,
    pub duration_ms: u64,
}

impl ExtractionOutput {
    /// Drop the bookkeeping and keep the `{ receipts }` success body.
    pub fn into_batch(self) -> ReceiptBatch {
        ReceiptBatch {
            receipts: self.receipts,
        }
    }
}

/// One rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RasterFrame {
    /// 1-indexed.
    pub page_number: usize,
    /// `data:<mime>;base64,<payload>`
    pub encoded_image: String,
}
