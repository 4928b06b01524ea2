//! Single-document extraction entry points.
//!
//! Every call runs the same state machine:
//!
//! ```text
//! Submitted ──▶ Validating ──┬──▶ Valid ─────▶ Emitted
//!                            └──▶ Repairing ─┬▶ Emitted
//!                                            └▶ Rejected (NoDataExtracted)
//! ```
//!
//! The backend call is the only suspension point. A backend error or a
//! timeout ends the call before validation; repair never runs for them.
//! Nothing is cached between calls.

use crate::config::{ExtractionConfig, RasterConfig, DEFAULT_MODEL};
use crate::error::ReceiptError;
use crate::output::{ExtractionOutput, Outcome};
use crate::pipeline::input::{self, Document};
use crate::pipeline::llm::{ExtractionBackend, ExtractionRequest, LlmBackend};
use crate::pipeline::normalize::{repair, BatchContext};
use crate::pipeline::validate::validate;
use crate::prompts::{extraction_instructions, receipt_schema};
use crate::receipt::ProcessedReceipt;
use edgequake_llm::ProviderFactory;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Extract receipts from a local file or HTTP/HTTPS URL.
///
/// # Errors
/// Returns `Err(ReceiptError)` for every terminal condition: unreadable
/// input, backend failure or timeout, or a response with no usable receipts.
pub async fn extract(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ReceiptError> {
    let input_str = input_str.as_ref();
    info!("Starting extraction: {}", input_str);
    let document = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let backend = resolve_backend(config)?;
    extract_document(&document, backend.as_ref(), config).await
}

/// Extract receipts from an in-memory document.
///
/// This is the entry point for an HTTP handler that already holds the
/// uploaded bytes.
pub async fn extract_from_bytes(
    file_name: &str,
    bytes: Vec<u8>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ReceiptError> {
    let document = Document::from_bytes(file_name, bytes)?;
    let backend = resolve_backend(config)?;
    extract_document(&document, backend.as_ref(), config).await
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ReceiptError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ReceiptError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input_str, config))
}

/// Run the state machine for one resolved document against one backend.
pub async fn extract_document(
    document: &Document,
    backend: &dyn ExtractionBackend,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ReceiptError> {
    if document.bytes.is_empty() {
        return Err(ReceiptError::InputMissing);
    }
    let start = Instant::now();
    let ctx = BatchContext::now(&document.file_name, &document.mime_type);

    // ── Submitted ────────────────────────────────────────────────────────
    let instructions = config
        .instructions
        .clone()
        .unwrap_or_else(|| extraction_instructions(&ctx));
    let schema = receipt_schema();
    let request = ExtractionRequest {
        data: &document.bytes,
        mime_type: &document.mime_type,
        instructions: &instructions,
        schema: &schema,
    };

    debug!(
        "Submitting {} ({}, {} bytes) to {}",
        document.file_name,
        document.mime_type,
        document.bytes.len(),
        backend.name()
    );
    let raw = tokio::time::timeout(
        Duration::from_secs(config.timeout_secs),
        backend.submit(request),
    )
    .await
    .map_err(|_| ReceiptError::Timeout {
        secs: config.timeout_secs,
    })??;

    // ── Validating → Emitted | Rejected ──────────────────────────────────
    let (receipts, outcome) = resolve_response(&raw, &ctx)?;

    let duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "{}: {} receipt(s), {:?}, {}ms",
        document.file_name,
        receipts.len(),
        outcome,
        duration_ms
    );

    Ok(ExtractionOutput {
        file_name: document.file_name.clone(),
        receipts,
        outcome,
        duration_ms,
    })
}

/// Validate a raw response and fall back to repair.
///
/// Pure: the same response and context always give the same result.
pub fn resolve_response(
    raw: &Value,
    ctx: &BatchContext,
) -> Result<(Vec<ProcessedReceipt>, Outcome), ReceiptError> {
    match validate(raw, ctx) {
        Ok(receipts) => {
            debug!("Response valid: {} receipt(s)", receipts.len());
            Ok((receipts, Outcome::Validated))
        }
        Err(reason) => {
            warn!("Validation failed, repairing: {}", reason);
            match raw.get("receipts").and_then(Value::as_array) {
                Some(entries) if !entries.is_empty() => {
                    Ok((repair(entries, ctx), Outcome::Repaired))
                }
                _ => Err(ReceiptError::NoDataExtracted),
            }
        }
    }
}

// ── Backend resolution ───────────────────────────────────────────────────

fn pdf_pages(config: &ExtractionConfig) -> RasterConfig {
    RasterConfig {
        max_pages: config.max_pdf_pages.max(1),
        ..RasterConfig::default()
    }
}

fn create_vision_backend(
    provider_name: &str,
    model: &str,
    config: &ExtractionConfig,
) -> Result<Arc<dyn ExtractionBackend>, ReceiptError> {
    let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ReceiptError::BackendNotConfigured {
            backend: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    Ok(Arc::new(
        LlmBackend::new(provider, format!("{provider_name}/{model}"))
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
            .with_pages(pdf_pages(config)),
    ))
}

/// Resolve the extraction backend, from most-specific to least-specific.
///
/// 1. **Pre-built backend** (`config.backend`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`).
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_backend(
    config: &ExtractionConfig,
) -> Result<Arc<dyn ExtractionBackend>, ReceiptError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_vision_backend(name, model, config);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_vision_backend(&prov, &env_model, config);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_vision_backend("openai", model, config);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ReceiptError::BackendNotConfigured {
            backend: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(Arc::new(
        LlmBackend::new(llm_provider, "auto")
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
            .with_pages(pdf_pages(config)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn ctx() -> BatchContext {
        BatchContext::new(
            "walmart.pdf",
            "application/pdf",
            NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            7,
        )
    }

    #[test]
    fn valid_response_is_not_repaired() {
        let raw = json!({ "receipts": [{
            "id": "r1", "fileName": "walmart.pdf", "date": "2025-03-01",
            "vendor": "WALMART #4521", "category": "groceries", "paymentMethod": "cash",
            "taxAmount": 5.5, "amount": 75.5, "currency": "USD",
            "thumbnail": "", "base64": "", "mimeType": "application/pdf"
        }]});
        let (receipts, outcome) = resolve_response(&raw, &ctx()).unwrap();
        assert_eq!(outcome, Outcome::Validated);
        assert_eq!(receipts[0].vendor, "WALMART #4521");
    }

    #[test]
    fn loosely_written_date_is_repaired_not_validated() {
        let raw = json!({ "receipts": [{
            "id": "r1", "fileName": "walmart.pdf", "date": "2025-3-1",
            "vendor": "WALMART #4521", "category": "groceries", "paymentMethod": "cash",
            "taxAmount": 5.5, "amount": 75.5, "currency": "USD",
            "thumbnail": "", "base64": "", "mimeType": "application/pdf"
        }]});
        let (receipts, outcome) = resolve_response(&raw, &ctx()).unwrap();
        assert_eq!(outcome, Outcome::Repaired);
        assert_eq!(receipts[0].id, "r1");
        assert_eq!(receipts[0].date, NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
    }

    #[test]
    fn invalid_entries_are_repaired() {
        let raw = json!({ "receipts": [{ "amount": "75.5xyz", "category": "snacks" }] });
        let (receipts, outcome) = resolve_response(&raw, &ctx()).unwrap();
        assert_eq!(outcome, Outcome::Repaired);
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].amount, 0.0);
        assert_eq!(receipts[0].category.as_str(), "other");
    }

    #[test]
    fn unusable_responses_are_rejected() {
        for raw in [
            json!({}),
            json!({ "receipts": "none" }),
            json!({ "receipts": [] }),
            json!([{ "vendor": "bare array" }]),
            json!(null),
        ] {
            assert!(
                matches!(resolve_response(&raw, &ctx()), Err(ReceiptError::NoDataExtracted)),
                "{raw}"
            );
        }
    }

    #[test]
    fn prebuilt_backend_wins() {
        struct Fixed;
        #[async_trait::async_trait]
        impl ExtractionBackend for Fixed {
            fn name(&self) -> &str {
                "fixed"
            }
            async fn submit(&self, _r: ExtractionRequest<'_>) -> Result<Value, ReceiptError> {
                Ok(json!({}))
            }
        }
        let config = ExtractionConfig::builder()
            .backend(Arc::new(Fixed))
            .provider_name("openai")
            .build()
            .unwrap();
        assert_eq!(resolve_backend(&config).unwrap().name(), "fixed");
    }
}
