//! PDF processing module.

mod extractor;

pub use extractor::PdfExtractor;

use crate::error::PdfError;
use image::DynamicImage;

/// Kind of content found in a PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfType {
    /// Usable text layer.
    Text,
    /// Scanned pages only.
    Image,
    /// Usable text layer plus embedded images.
    Hybrid,
    /// Neither text nor decodable images.
    Empty,
}

impl PdfType {
    /// Classify from text-layer length and image count.
    pub fn classify(text_len: usize, min_text_length: usize, image_count: usize) -> Self {
        match (text_len >= min_text_length, image_count > 0) {
            (true, false) => PdfType::Text,
            (false, true) => PdfType::Image,
            (true, true) => PdfType::Hybrid,
            (false, false) => PdfType::Empty,
        }
    }
}

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Trait for PDF processing implementations.
pub trait PdfProcessor {
    /// Load a PDF from bytes.
    fn load(&mut self, data: &[u8]) -> Result<()>;

    /// Get the number of pages in the PDF.
    fn page_count(&self) -> u32;

    /// Extract the embedded text layer of the whole document.
    fn extract_text(&self) -> Result<String>;

    /// Decode the images embedded on a page (1-indexed).
    fn page_images(&self, page: u32) -> Result<Vec<DynamicImage>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(PdfType::classify(120, 50, 0), PdfType::Text);
        assert_eq!(PdfType::classify(10, 50, 2), PdfType::Image);
        assert_eq!(PdfType::classify(50, 50, 1), PdfType::Hybrid);
        assert_eq!(PdfType::classify(49, 50, 0), PdfType::Empty);
    }
}
