//! Optical text enrichment
//!
//! A post-pass over persisted records: every media entry without text is
//! downloaded through the resilient fetch session and handed to an
//! [`OcrEngine`]. A failing entry is marked and never stops the batch.

mod enrich;
mod tesseract;

pub use enrich::{EnrichSummary, Enricher};
pub use tesseract::TesseractEngine;

use async_trait::async_trait;
use image::DynamicImage;
use thiserror::Error;

/// Errors raised while recognizing text in one image
#[derive(Debug, Error)]
pub enum OcrError {
    /// The bytes are not a decodable image
    #[error("Image decode failed: {0}")]
    Decode(String),

    #[error("OCR engine failed: {0}")]
    Engine(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Black-box image to text recognizer
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognizes the text of an encoded image
    ///
    /// Fails with [`OcrError::Decode`] on bytes that are not an image.
    async fn recognize_text(&self, image: &[u8]) -> Result<String, OcrError>;
}

/// Decodes image bytes in any supported format
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, OcrError> {
    image::load_from_memory(bytes).map_err(|e| OcrError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rejects_non_image() {
        let err = decode_image(b"<html>not an image</html>").unwrap_err();
        assert!(matches!(err, OcrError::Decode(_)));
    }

    #[test]
    fn test_decode_png() {
        let mut png = Vec::new();
        DynamicImage::new_rgb8(2, 2)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let decoded = decode_image(&png).unwrap();
        assert_eq!(decoded.width(), 2);
    }
}
