//! Strict validation of the model's answer.
//!
//! A response is valid when it deserialises into `{ "receipts": [...] }`
//! with every field present and correctly typed (dates exactly `YYYY-MM-DD`),
//! and every receipt holds the invariants serde alone cannot express.
//! Anything less routes the response into repair; [`ValidationError`] only
//! explains why in the logs.

use crate::pipeline::normalize::BatchContext;
use crate::receipt::{ProcessedReceipt, ReceiptBatch};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

static RE_CURRENCY_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{3}$").unwrap());

/// Why a response failed strict validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Missing key, wrong type, or a value outside a closed enumeration.
    #[error("response does not match the receipt schema: {0}")]
    Shape(#[from] serde_json::Error),

    /// The array was present but held no receipts.
    #[error("response contains no receipts")]
    Empty,

    /// A well-typed field violates a receipt invariant.
    #[error("receipt {index}: field '{field}' {reason}")]
    Field {
        index: usize,
        field: &'static str,
        reason: String,
    },

    /// Two receipts share an id.
    #[error("receipt {index}: duplicate id '{id}'")]
    DuplicateId { index: usize, id: String },
}

/// Validate a raw response, returning its receipts unchanged and in order.
pub fn validate(raw: &Value, ctx: &BatchContext) -> Result<Vec<ProcessedReceipt>, ValidationError> {
    let batch: ReceiptBatch = serde_json::from_value(raw.clone())?;
    if batch.receipts.is_empty() {
        return Err(ValidationError::Empty);
    }

    let mut ids = HashSet::with_capacity(batch.receipts.len());
    for (index, receipt) in batch.receipts.iter().enumerate() {
        check_receipt(index, receipt, ctx)?;
        if !ids.insert(receipt.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                index,
                id: receipt.id.clone(),
            });
        }
    }

    Ok(batch.receipts)
}

fn check_receipt(
    index: usize,
    receipt: &ProcessedReceipt,
    ctx: &BatchContext,
) -> Result<(), ValidationError> {
    let field = |field: &'static str, reason: String| ValidationError::Field {
        index,
        field,
        reason,
    };

    for (name, value) in [
        ("id", &receipt.id),
        ("fileName", &receipt.file_name),
        ("vendor", &receipt.vendor),
    ] {
        if value.trim().is_empty() {
            return Err(field(name, "must not be empty".into()));
        }
    }

    for (name, value) in [("taxAmount", receipt.tax_amount), ("amount", receipt.amount)] {
        if !value.is_finite() || value < 0.0 {
            return Err(field(name, format!("must be a non-negative number, got {value}")));
        }
    }

    if !RE_CURRENCY_CODE.is_match(&receipt.currency) {
        return Err(field(
            "currency",
            format!("must be a 3-letter uppercase code, got {:?}", receipt.currency),
        ));
    }

    if receipt.mime_type != ctx.mime_type {
        return Err(field(
            "mimeType",
            format!("must be {:?}, got {:?}", ctx.mime_type, receipt.mime_type),
        ));
    }

    Ok(())
}
