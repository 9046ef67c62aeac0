//! Image encoding: uploaded bytes → `DynamicImage` → JPEG → base64.
//!
//! Gemini accepts the leaf photo as base64 `inline_data` tagged
//! `image/jpeg`, so every upload is re-encoded to JPEG whatever its source
//! format. The same JPEG bytes are what the report embeds.

use crate::error::EncodeError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageOutputFormat};
use std::io::{Cursor, Seek, Write};
use tracing::debug;

/// JPEG quality used for both the API payload and the report.
pub const JPEG_QUALITY: u8 = 85;

/// Decode an uploaded JPEG/PNG.
pub fn decode_upload(bytes: &[u8]) -> Result<DynamicImage, EncodeError> {
    if bytes.is_empty() {
        return Err(EncodeError::Empty);
    }
    let img = image::load_from_memory(bytes).map_err(EncodeError::Decode)?;
    debug!(
        "Decoded upload: {} bytes → {}x{}",
        bytes.len(),
        img.width(),
        img.height()
    );
    Ok(img)
}

/// Whether [`write_jpeg`] produces a single-channel JPEG for this image.
pub fn is_grayscale_jpeg(img: &DynamicImage) -> bool {
    matches!(img, DynamicImage::ImageLuma8(_))
}

/// Write an image as JPEG to any seekable sink.
///
/// JPEG has no alpha channel and no 16-bit samples, so anything other than
/// 8-bit gray or RGB is flattened to RGB first.
pub fn write_jpeg<W: Write + Seek>(img: &DynamicImage, out: &mut W) -> Result<(), EncodeError> {
    let flattened;
    let src = match img {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => img,
        other => {
            flattened = DynamicImage::ImageRgb8(other.to_rgb8());
            &flattened
        }
    };
    src.write_to(out, ImageOutputFormat::Jpeg(JPEG_QUALITY))
        .map_err(EncodeError::Codec)
}

/// Re-encode an image as JPEG in memory.
pub fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>, EncodeError> {
    let mut jpeg_bytes = Vec::new();
    write_jpeg(img, &mut Cursor::new(&mut jpeg_bytes))?;

    debug!("Encoded image → {} bytes JPEG", jpeg_bytes.len());
    Ok(jpeg_bytes)
}

/// JPEG-encode and base64-wrap an image for the API request body.
pub fn encode_base64(img: &DynamicImage) -> Result<String, EncodeError> {
    Ok(STANDARD.encode(encode_jpeg(img)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn leaf() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(12, 8, Rgba([40, 160, 60, 255])))
    }

    #[test]
    fn encodes_rgba_as_jpeg() {
        let bytes = encode_jpeg(&leaf()).expect("encode should succeed");
        assert_eq!(&bytes[..2], &[0xFF, 0xD8], "missing JPEG SOI marker");
        let back = image::load_from_memory(&bytes).expect("valid JPEG");
        assert_eq!((back.width(), back.height()), (12, 8));
    }

    #[test]
    fn base64_round_trips_to_jpeg() {
        let b64 = encode_base64(&leaf()).expect("encode should succeed");
        let decoded = STANDARD.decode(&b64).expect("valid base64");
        assert_eq!(&decoded[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn decodes_png_upload() {
        let mut png = Vec::new();
        leaf()
            .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
            .unwrap();
        let img = decode_upload(&png).expect("PNG should decode");
        assert_eq!(img.width(), 12);
    }

    #[test]
    fn rejects_empty_and_garbage_uploads() {
        assert!(matches!(decode_upload(&[]), Err(EncodeError::Empty)));
        assert!(matches!(
            decode_upload(b"definitely not an image"),
            Err(EncodeError::Decode(_))
        ));
    }
}
