//! Input resolution: turn a path, URL or byte buffer into a [`Document`].
//!
//! The media type is sniffed from magic bytes first and the file extension
//! second, so a mislabelled upload is still sent to the model with the right
//! type. Anything that is neither a PDF nor a common image format is rejected
//! before a provider is ever contacted.

use crate::error::ReceiptError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Media type of PDF documents.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// A receipt document held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Document {
    /// Wrap raw bytes, sniffing the media type.
    ///
    /// # Errors
    /// [`ReceiptError::InputMissing`] for an empty buffer,
    /// [`ReceiptError::UnsupportedDocument`] when the type cannot be determined.
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ReceiptError> {
        let file_name = file_name.into();
        if bytes.is_empty() {
            return Err(ReceiptError::InputMissing);
        }
        let mime_type = sniff_mime_type(&bytes, &file_name).ok_or_else(|| {
            ReceiptError::UnsupportedDocument {
                name: file_name.clone(),
                magic: bytes.iter().take(4).copied().collect(),
            }
        })?;
        Ok(Self {
            file_name,
            mime_type: mime_type.to_string(),
            bytes,
        })
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type == PDF_MIME_TYPE
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Media type from magic bytes, falling back to the file extension.
pub fn sniff_mime_type(bytes: &[u8], file_name: &str) -> Option<&'static str> {
    let by_magic = if bytes.starts_with(b"%PDF") {
        Some(PDF_MIME_TYPE)
    } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    };

    by_magic.or_else(|| {
        let ext = Path::new(file_name)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(PDF_MIME_TYPE),
            "png" => Some("image/png"),
            "jpg" | "jpeg" => Some("image/jpeg"),
            "gif" => Some("image/gif"),
            "webp" => Some("image/webp"),
            _ => None,
        }
    })
}

/// Resolve a local path or HTTP(S) URL into a [`Document`].
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<Document, ReceiptError> {
    if input.trim().is_empty() {
        return Err(ReceiptError::InputMissing);
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<Document, ReceiptError> {
    let path = PathBuf::from(path_str);

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => ReceiptError::PermissionDenied { path: path.clone() },
        _ => ReceiptError::FileNotFound { path: path.clone() },
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.to_string());

    debug!("Read local document: {} ({} bytes)", path.display(), bytes.len());
    Document::from_bytes(name, bytes)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Document, ReceiptError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ReceiptError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ReceiptError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ReceiptError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ReceiptError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ReceiptError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    Document::from_bytes(filename_from_url(url), bytes.to_vec())
}

/// Last path segment of the URL when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded-receipt".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/r.pdf"));
        assert!(is_url("http://example.com/r.pdf"));
        assert!(!is_url("/tmp/r.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn sniff_by_magic_beats_extension() {
        assert_eq!(sniff_mime_type(b"%PDF-1.4", "scan.png"), Some("application/pdf"));
        assert_eq!(
            sniff_mime_type(b"\x89PNG\r\n\x1a\n....", "scan.pdf"),
            Some("image/png")
        );
        assert_eq!(sniff_mime_type(&[0xFF, 0xD8, 0xFF, 0xE0], "x"), Some("image/jpeg"));
        assert_eq!(sniff_mime_type(b"RIFF\0\0\0\0WEBPVP8 ", "x"), Some("image/webp"));
    }

    #[test]
    fn sniff_falls_back_to_extension() {
        assert_eq!(sniff_mime_type(b"????", "Receipt.JPG"), Some("image/jpeg"));
        assert_eq!(sniff_mime_type(b"????", "notes.txt"), None);
    }

    #[test]
    fn empty_bytes_are_missing_input() {
        assert!(matches!(
            Document::from_bytes("a.pdf", Vec::new()),
            Err(ReceiptError::InputMissing)
        ));
    }

    #[test]
    fn unknown_bytes_are_unsupported() {
        let err = Document::from_bytes("a.bin", b"\x00\x01\x02\x03".to_vec()).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn url_filename() {
        assert_eq!(filename_from_url("https://x.test/a/receipt.pdf"), "receipt.pdf");
        assert_eq!(filename_from_url("https://x.test/a/"), "downloaded-receipt");
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = resolve_input("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, ReceiptError::FileNotFound { .. }));
    }
}
