//! Configuration types for receipt extraction and page rasterisation.
//!
//! Extraction behaviour is controlled through [`ExtractionConfig`] and
//! rasterisation through [`RasterConfig`], each built via its builder.
//! Neither carries any display preference: the extraction core records the
//! currency a document was denominated in and never converts it.

use crate::error::ReceiptError;
use crate::pipeline::llm::ExtractionBackend;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Model used when a provider is named without a model.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Configuration for a receipt extraction.
///
/// # Example
/// ```rust
/// use receipt_extract::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .model("gpt-4o")
///     .timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.temperature, 0.0);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// LLM model identifier, e.g. "gpt-4o". If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini").
    /// If None along with `backend`, the provider is detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed extraction backend. Takes precedence over `provider_name`.
    pub backend: Option<Arc<dyn ExtractionBackend>>,

    /// Sampling temperature. Default: 0.0.
    ///
    /// Extraction must be as repeatable as the provider allows; any
    /// creativity shows up as invented vendors and amounts.
    pub temperature: f32,

    /// Maximum tokens the model may generate per document. Default: 4096.
    pub max_tokens: usize,

    /// Wall-clock budget for one extraction call in seconds. Default: 60.
    pub timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Documents processed at once by the batch APIs. Default: 4.
    pub concurrency: usize,

    /// PDF pages rasterised and attached to the model request. Default: 4.
    ///
    /// Vision providers only accept images, so PDFs are sent as PNG frames.
    pub max_pdf_pages: usize,

    /// Custom extraction instructions. If None, uses the built-in prompt.
    pub instructions: Option<String>,

    /// Progress events for batch runs.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            backend: None,
            temperature: 0.0,
            max_tokens: 4096,
            timeout_secs: 60,
            download_timeout_secs: 120,
            concurrency: 4,
            max_pdf_pages: 4,
            instructions: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("max_pdf_pages", &self.max_pdf_pages)
            .field("instructions", &self.instructions.as_ref().map(|s| s.len()))
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn backend(mut self, backend: Arc<dyn ExtractionBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_pdf_pages(mut self, n: usize) -> Self {
        self.config.max_pdf_pages = n.max(1);
        self
    }

    pub fn instructions(mut self, text: impl Into<String>) -> Self {
        self.config.instructions = Some(text.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ReceiptError> {
        let c = &self.config;
        if c.timeout_secs == 0 {
            return Err(ReceiptError::InvalidConfig(
                "Timeout must be at least 1 second".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(ReceiptError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if matches!(c.instructions.as_deref(), Some(s) if s.trim().is_empty()) {
            return Err(ReceiptError::InvalidConfig(
                "Custom instructions must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Rasterisation ────────────────────────────────────────────────────────

/// How each rasterised page is turned into a data URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FrameEncoding {
    /// PNG-encode the page's pixel buffer. (default)
    #[default]
    Png,
    /// Emit the source document's own bytes for every page, as the original
    /// web service did.
    SourcePassthrough,
}

/// Configuration for [`crate::raster::rasterize`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterConfig {
    /// Upper bound on the number of pages rendered. Default: 1.
    pub max_pages: usize,

    /// Viewport magnification relative to the page's intrinsic size. Default: 2.0.
    pub scale: f32,

    /// Frame encoding. Default: [`FrameEncoding::Png`].
    pub encoding: FrameEncoding,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            max_pages: 1,
            scale: 2.0,
            encoding: FrameEncoding::default(),
        }
    }
}

impl RasterConfig {
    pub fn builder() -> RasterConfigBuilder {
        RasterConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`RasterConfig`].
#[derive(Debug)]
pub struct RasterConfigBuilder {
    config: RasterConfig,
}

impl RasterConfigBuilder {
    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n;
        self
    }

    pub fn scale(mut self, scale: f32) -> Self {
        self.config.scale = scale;
        self
    }

    pub fn encoding(mut self, encoding: FrameEncoding) -> Self {
        self.config.encoding = encoding;
        self
    }

    pub fn build(self) -> Result<RasterConfig, ReceiptError> {
        let c = &self.config;
        if c.max_pages == 0 {
            return Err(ReceiptError::InvalidConfig(
                "max_pages must be ≥ 1".into(),
            ));
        }
        if !c.scale.is_finite() || c.scale <= 0.0 || c.scale > 10.0 {
            return Err(ReceiptError::InvalidConfig(format!(
                "Scale must be in (0, 10], got {}",
                c.scale
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_defaults() {
        let c = ExtractionConfig::default();
        assert_eq!(c.temperature, 0.0);
        assert_eq!(c.timeout_secs, 60);
        assert_eq!(c.concurrency, 4);
        assert!(c.backend.is_none());
    }

    #[test]
    fn builder_clamps_and_validates() {
        let c = ExtractionConfig::builder()
            .temperature(5.0)
            .concurrency(0)
            .max_pdf_pages(0)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.max_pdf_pages, 1);

        assert!(ExtractionConfig::builder().timeout_secs(0).build().is_err());
        assert!(ExtractionConfig::builder().instructions("  ").build().is_err());
    }

    #[test]
    fn raster_builder_rejects_bad_values() {
        assert!(RasterConfig::builder().max_pages(0).build().is_err());
        assert!(RasterConfig::builder().scale(0.0).build().is_err());
        assert!(RasterConfig::builder().scale(f32::NAN).build().is_err());
        let c = RasterConfig::builder().max_pages(3).build().unwrap();
        assert_eq!(c.max_pages, 3);
        assert_eq!(c.scale, 2.0);
        assert_eq!(c.encoding, FrameEncoding::Png);
    }
}
