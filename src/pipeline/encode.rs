//! Image encoding: `DynamicImage` → PNG bytes.
//!
//! Rendered pages leave this module in two forms: a [`PreviewImage`] for the
//! presentation layer, and raw PNG bytes handed to the OCR engine. PNG is
//! lossless; JPEG artefacts around glyph edges measurably hurt recognition.

use crate::document::PreviewImage;
use crate::error::ExtractionError;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode an image as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        "Encoded {}x{} image → {} bytes PNG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

/// Encode a rendered page as a PNG preview.
pub fn encode_preview(img: &DynamicImage, page_num: usize) -> Result<PreviewImage, ExtractionError> {
    encode_png(img)
        .map(|png| PreviewImage::new(png, "image/png"))
        .map_err(|e| ExtractionError::RasterisationFailed {
            page: page_num,
            detail: format!("PNG encoding failed: {e}"),
        })
}
