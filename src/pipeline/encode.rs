//! Image encoding for the two kinds of slide pictures and for the notes request.
//!
//! Extracted images are PNG so they stay lossless when the user moves them
//! around. The background plate is JPEG: it covers the whole page at ≥2×
//! oversampling and PNG would make every slide several megabytes.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageError};
use std::io::Cursor;
use tracing::debug;

/// Encode as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Encode as baseline JPEG at `quality` (1–100).
///
/// Alpha is flattened away; JPEG has no alpha channel.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)?;
    debug!(
        "Encoded {}×{} plate → {} bytes JPEG (q={})",
        rgb.width(),
        rgb.height(),
        buf.len(),
        quality
    );
    Ok(buf)
}

/// Wrap an already-encoded JPEG plate for a multimodal LLM request.
///
/// `detail: "high"` keeps small chart labels readable to the model.
pub fn to_image_data(jpeg: &[u8]) -> ImageData {
    ImageData::new(STANDARD.encode(jpeg), "image/jpeg").with_detail("high")
}
