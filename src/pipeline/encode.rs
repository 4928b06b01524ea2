//! Base64 and data-URI encoding.
//!
//! Documents travel to the vision model as base64 attachments, and rasterised
//! pages leave the crate as `data:` URIs. PNG is used for pages because it is
//! lossless; JPEG artefacts around small receipt print hurt extraction.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::error::{ParameterError, ParameterErrorKind};
use image::{ImageError, RgbaImage};
use std::io::Cursor;
use tracing::debug;

/// Base64 of the raw bytes, as vision APIs expect it.
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// `data:<mime>;base64,<payload>`
pub fn data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, to_base64(bytes))
}

/// PNG-encode an RGBA buffer and wrap it as a data URI.
///
/// Fails when `rgba.len()` is not `width * height * 4` or the image is empty.
pub fn png_data_uri(width: u32, height: u32, rgba: &[u8]) -> Result<String, ImageError> {
    let img = RgbaImage::from_raw(width, height, rgba.to_vec()).ok_or_else(|| {
        ImageError::Parameter(ParameterError::from_kind(
            ParameterErrorKind::DimensionMismatch,
        ))
    })?;

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded {}x{} page → {} bytes PNG", width, height, buf.len());

    Ok(data_uri("image/png", &buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_prefix() {
        let uri = data_uri("application/pdf", b"%PDF-1.7");
        assert_eq!(uri, "data:application/pdf;base64,JVBERi0xLjc=");
    }

    #[test]
    fn png_round_trips_through_decoder() {
        let rgba = vec![255u8; 4 * 3 * 2];
        let uri = png_data_uri(3, 2, &rgba).expect("encode should succeed");
        let payload = uri.strip_prefix("data:image/png;base64,").unwrap();
        let png = STANDARD.decode(payload).expect("valid base64");
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), 3);
        assert_eq!(decoded.height(), 2);
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        assert!(png_data_uri(10, 10, &[0u8; 12]).is_err());
    }
}
