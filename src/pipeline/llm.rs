//! The extraction capability and its vision-LLM implementation.
//!
//! The pipeline only knows [`ExtractionBackend`]: "given document bytes and
//! instructions, return an unstructured JSON value". [`LlmBackend`] fulfils
//! it over any `edgequake_llm` provider. Tests and embedders plug in their
//! own backends through [`crate::config::ExtractionConfigBuilder::backend`].
//!
//! Vision APIs accept images only. [`LlmBackend`] therefore rasterises a PDF
//! into PNG frames (one attachment per page) before the call; images go out
//! as they are.
//!
//! No retries happen here. A provider error is terminal for the invocation;
//! retry policy belongs to the caller.

use crate::config::{FrameEncoding, RasterConfig};
use crate::error::ReceiptError;
use crate::pipeline::encode::to_base64;
use crate::pipeline::input::PDF_MIME_TYPE;
use crate::prompts::SYSTEM_PROMPT;
use crate::raster::{rasterize, DocumentLoader, PdfiumLoader};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::debug;

const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Everything one extraction call sends.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRequest<'a> {
    pub data: &'a [u8],
    /// Media type of the source document, as sniffed from its bytes.
    pub mime_type: &'a str,
    pub instructions: &'a str,
    pub schema: &'a Value,
}

/// A capability that reads a document and answers with candidate JSON.
///
/// Implementations return whatever the model produced, conformant or not;
/// errors are reserved for the capability itself failing (transport, auth,
/// provider error, a reply that is not JSON at all).
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    async fn submit(&self, request: ExtractionRequest<'_>) -> Result<Value, ReceiptError>;
}

/// [`ExtractionBackend`] over an `edgequake_llm` vision provider.
pub struct LlmBackend {
    provider: Arc<dyn LLMProvider>,
    name: String,
    temperature: f32,
    max_tokens: usize,
    /// Bound on first PDF submission unless supplied up front.
    page_loader: OnceCell<Arc<dyn DocumentLoader>>,
    pages: RasterConfig,
}

impl LlmBackend {
    pub fn new(provider: Arc<dyn LLMProvider>, name: impl Into<String>) -> Self {
        Self {
            provider,
            name: name.into(),
            temperature: 0.0,
            max_tokens: 4096,
            page_loader: OnceCell::new(),
            pages: RasterConfig {
                max_pages: 4,
                ..RasterConfig::default()
            },
        }
    }

    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    pub fn with_max_tokens(mut self, n: usize) -> Self {
        self.max_tokens = n;
        self
    }

    /// Render PDFs with `loader` instead of binding pdfium.
    pub fn with_page_loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.page_loader = OnceCell::new_with(Some(loader));
        self
    }

    /// Page limit and scale for PDF attachments. Frames are always PNG.
    pub fn with_pages(mut self, pages: RasterConfig) -> Self {
        self.pages = RasterConfig {
            encoding: FrameEncoding::Png,
            ..pages
        };
        self
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }

    async fn page_loader(&self) -> Result<Arc<dyn DocumentLoader>, ReceiptError> {
        let loader = self
            .page_loader
            .get_or_try_init(|| async {
                let loader = tokio::task::spawn_blocking(PdfiumLoader::new)
                    .await
                    .map_err(|e| {
                        ReceiptError::Internal(format!("pdfium binding task panicked: {}", e))
                    })??;
                Ok::<_, ReceiptError>(Arc::new(loader) as Arc<dyn DocumentLoader>)
            })
            .await?;
        Ok(Arc::clone(loader))
    }

    /// Image attachments for one request: the image itself, or one PNG per
    /// rendered PDF page.
    async fn attachments(
        &self,
        request: &ExtractionRequest<'_>,
    ) -> Result<Vec<ImageData>, ReceiptError> {
        if request.mime_type != PDF_MIME_TYPE {
            return Ok(vec![ImageData::new(
                to_base64(request.data),
                request.mime_type,
            )
            .with_detail("high")]);
        }

        let loader = self.page_loader().await?;
        let frames = rasterize(loader, request.data.to_vec(), request.mime_type, &self.pages).await?;
        if frames.is_empty() {
            return Err(ReceiptError::DocumentRender {
                page: None,
                detail: "document has no pages".into(),
            });
        }
        debug!("{}: attaching {} rendered page(s)", self.name, frames.len());

        frames
            .into_iter()
            .map(|frame| -> Result<ImageData, ReceiptError> {
                let payload = frame
                    .encoded_image
                    .strip_prefix(PNG_DATA_URI_PREFIX)
                    .ok_or_else(|| ReceiptError::DocumentRender {
                        page: Some(frame.page_number),
                        detail: "rendered page is not a PNG".into(),
                    })?;
                Ok(ImageData::new(payload, "image/png").with_detail("high"))
            })
            .collect()
    }
}

#[async_trait]
impl ExtractionBackend for LlmBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, request: ExtractionRequest<'_>) -> Result<Value, ReceiptError> {
        let start = Instant::now();
        let attachments = self.attachments(&request).await?;
        let text = user_message(request.instructions, request.schema);

        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user_with_images(text.as_str(), attachments),
        ];

        let response = self
            .provider
            .chat(&messages, Some(&self.options()))
            .await
            .map_err(|e| ReceiptError::Extraction {
                backend: self.name.clone(),
                detail: e.to_string(),
            })?;

        debug!(
            "{}: {} input tokens, {} output tokens, {:?}",
            self.name,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        parse_json_payload(&response.content)
    }
}

/// Instructions followed by the schema the answer must match.
fn user_message(instructions: &str, schema: &Value) -> String {
    let schema_text = serde_json::to_string_pretty(schema).unwrap_or_default();
    format!("{instructions}\n\nThe reply must validate against this JSON Schema:\n{schema_text}")
}

static RE_FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?\s*\n(.*?)\n?```\s*$").unwrap());

/// Parse a model reply as JSON.
///
/// Models wrap JSON in Markdown fences or add a sentence around it despite
/// the prompt; both are peeled off before giving up.
pub fn parse_json_payload(reply: &str) -> Result<Value, ReceiptError> {
    let trimmed = reply.trim();
    let unfenced = RE_FENCED_JSON
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map_or(trimmed, |m| m.as_str().trim());

    match serde_json::from_str::<Value>(unfenced) {
        Ok(v) => Ok(v),
        Err(first_err) => {
            let start = unfenced.find('{');
            let end = unfenced.rfind('}');
            match (start, end) {
                (Some(s), Some(e)) if s < e => serde_json::from_str(&unfenced[s..=e]).map_err(
                    |e| ReceiptError::MalformedResponse {
                        detail: e.to_string(),
                    },
                ),
                _ => Err(ReceiptError::MalformedResponse {
                    detail: first_err.to_string(),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_json() {
        let v = parse_json_payload(r#"{"receipts": []}"#).unwrap();
        assert_eq!(v, json!({ "receipts": [] }));
    }

    #[test]
    fn fenced_json() {
        let v = parse_json_payload("```json\n{\"receipts\": [{\"vendor\": \"CVS\"}]}\n```").unwrap();
        assert_eq!(v["receipts"][0]["vendor"], "CVS");
    }

    #[test]
    fn json_inside_prose() {
        let v = parse_json_payload("Here you go: {\"receipts\": []} Hope it helps!").unwrap();
        assert!(v["receipts"].is_array());
    }

    #[test]
    fn garbage_is_malformed() {
        let err = parse_json_payload("I could not read this receipt.").unwrap_err();
        assert!(matches!(err, ReceiptError::MalformedResponse { .. }));
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn user_message_contains_schema() {
        let text = user_message("Extract.", &json!({ "type": "object" }));
        assert!(text.starts_with("Extract."));
        assert!(text.contains("\"type\": \"object\""));
    }
}
