//! Rule-based field extractors for receipts.

pub mod amounts;
pub mod category;
pub mod currency;
pub mod dates;
pub mod items;
pub mod patterns;
pub mod payment;
pub mod vendor;

pub use amounts::{AmountExtractor, extract_total, parse_amount};
pub use category::{CategoryExtractor, classify_category};
pub use currency::{CurrencyExtractor, detect_currency};
pub use dates::{DateExtractor, extract_transaction_date};
pub use items::ItemExtractor;
pub use payment::PaymentExtractor;
pub use vendor::{VendorExtractor, normalize_whitespace};

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the best match for the field.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract all occurrences of the field.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// A matched value with its confidence and origin.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionMatch<T> {
    /// Extracted value.
    pub value: T,
    /// Confidence score (0.0 - 1.0).
    pub confidence: f32,
    /// Byte range in the source text.
    pub position: Option<(usize, usize)>,
    /// Source text that was matched.
    pub source: String,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, confidence: f32, source: impl Into<String>) -> Self {
        Self {
            value,
            confidence,
            position: None,
            source: source.into(),
        }
    }

    pub fn with_position(mut self, start: usize, end: usize) -> Self {
        self.position = Some((start, end));
        self
    }

    fn overlaps(&self, start: usize, end: usize) -> bool {
        self.position.is_some_and(|(s, e)| start < e && s < end)
    }
}
