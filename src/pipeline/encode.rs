//! Image encoding: raw page-image bytes → base64 [`PageImage`].
//!
//! PNG and JPEG within the size cap are forwarded untouched. Anything larger
//! is downscaled so neither side exceeds `max_dimension` and re-encoded as
//! PNG; other formats are re-encoded as PNG too.

use crate::error::ImageLoadError;
use crate::vision::PageImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{imageops::FilterType, DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// Encode a decoded image as a base64 PNG.
pub fn encode_png(img: &DynamicImage) -> Result<PageImage, ImageLoadError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| ImageLoadError::Decode(e.to_string()))?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());
    Ok(PageImage::new(b64, "image/png"))
}

/// Prepare raw image bytes for a vision request.
pub fn encode_image_bytes(bytes: &[u8], max_dimension: u32) -> Result<PageImage, ImageLoadError> {
    let format = image::guess_format(bytes).map_err(|e| ImageLoadError::Decode(e.to_string()))?;
    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ImageLoadError::Decode(e.to_string()))?;

    let oversized = img.width() > max_dimension || img.height() > max_dimension;
    if !oversized {
        if let Some(mime) = passthrough_mime(format) {
            return Ok(PageImage::new(STANDARD.encode(bytes), mime));
        }
        return encode_png(&img);
    }

    debug!(
        "Downscaling {}x{} page image to fit {}px",
        img.width(),
        img.height(),
        max_dimension
    );
    let scaled = img.resize(max_dimension, max_dimension, FilterType::Triangle);
    encode_png(&scaled)
}

fn passthrough_mime(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([255, 0, 0, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    #[test]
    fn small_png_passes_through() {
        let bytes = png_bytes(10, 10);
        let page = encode_image_bytes(&bytes, 2000).expect("encode should succeed");
        assert_eq!(page.mime_type, "image/png");
        assert_eq!(STANDARD.decode(&page.data).unwrap(), bytes);
    }

    #[test]
    fn oversized_image_is_downscaled() {
        let page = encode_image_bytes(&png_bytes(400, 200), 100).unwrap();
        let decoded = image::load_from_memory(&STANDARD.decode(&page.data).unwrap()).unwrap();
        assert_eq!(decoded.width(), 100);
        assert_eq!(decoded.height(), 50);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = encode_image_bytes(b"not an image", 2000).unwrap_err();
        assert!(matches!(err, ImageLoadError::Decode(_)));
    }
}
