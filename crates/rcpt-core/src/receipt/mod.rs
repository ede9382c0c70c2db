//! Receipt field inference.

mod parser;
pub mod rules;

pub use parser::RuleReceiptParser;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::extraction::{ExtractedText, TextSource};
use crate::models::receipt::{Category, Currency, ReceiptDraft};

use rules::ExtractionMatch;

/// An inferred value for one receipt field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldCandidate<T> {
    /// `None` when nothing usable was found.
    pub value: Option<T>,
    /// Confidence score (0.0 - 1.0).
    pub confidence: f32,
    /// Text the value was read from.
    pub source: Option<String>,
}

impl<T> FieldCandidate<T> {
    pub fn found(value: T, confidence: f32, source: impl Into<String>) -> Self {
        Self {
            value: Some(value),
            confidence,
            source: Some(source.into()),
        }
    }

    pub fn missing() -> Self {
        Self {
            value: None,
            confidence: 0.0,
            source: None,
        }
    }

    /// A fallback value that was not read from the text.
    pub fn defaulted(value: T, confidence: f32) -> Self {
        Self {
            value: Some(value),
            confidence,
            source: None,
        }
    }

    pub fn is_found(&self) -> bool {
        self.value.is_some()
    }
}

impl<T> From<ExtractionMatch<T>> for FieldCandidate<T> {
    fn from(m: ExtractionMatch<T>) -> Self {
        if m.source.is_empty() {
            Self::defaulted(m.value, m.confidence)
        } else {
            Self::found(m.value, m.confidence, m.source)
        }
    }
}

impl<T> From<Option<ExtractionMatch<T>>> for FieldCandidate<T> {
    fn from(m: Option<ExtractionMatch<T>>) -> Self {
        m.map(<Self as From<ExtractionMatch<T>>>::from)
            .unwrap_or_else(Self::missing)
    }
}

/// Inferred receipt fields for one document, shown to the user for correction.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub raw_text: String,
    pub vendor: FieldCandidate<String>,
    pub transaction_date: FieldCandidate<NaiveDate>,
    pub amount: FieldCandidate<Decimal>,
    pub category: FieldCandidate<Category>,
    pub currency: FieldCandidate<Currency>,
    pub payment_method: FieldCandidate<String>,
    pub items: Vec<String>,
    /// Overall confidence (0.0 - 1.0).
    pub confidence: f32,
    /// Confidence of the text itself; 1.0 for plain text input.
    pub text_confidence: f32,
    pub source: Option<TextSource>,
    pub warnings: Vec<String>,
    pub processing_time_ms: u64,
}

impl ExtractionResult {
    /// Combine text confidence with the vendor, date and amount confidences.
    pub(crate) fn recompute_confidence(&mut self) {
        let fields = [
            self.vendor.confidence,
            self.transaction_date.confidence,
            self.amount.confidence,
        ];
        let mean = fields.iter().sum::<f32>() / fields.len() as f32;
        self.confidence = ((self.text_confidence * mean) * 1000.0).round() / 1000.0;
    }

    /// Attach where the text came from and fold its confidence in.
    pub fn with_text_source(mut self, extracted: &ExtractedText) -> Self {
        self.source = Some(extracted.source);
        self.text_confidence = extracted.confidence.clamp(0.0, 1.0);
        self.processing_time_ms += extracted.processing_time_ms;
        self.warnings.extend(extracted.warnings.iter().cloned());
        self.recompute_confidence();
        self
    }

    /// Field names whose confidence is below `threshold` or that are missing.
    pub fn fields_needing_review(&self, threshold: f32) -> Vec<&'static str> {
        let fields = [
            ("vendor", self.vendor.is_found(), self.vendor.confidence),
            (
                "transaction_date",
                self.transaction_date.is_found(),
                self.transaction_date.confidence,
            ),
            ("amount", self.amount.is_found(), self.amount.confidence),
            ("category", self.category.is_found(), self.category.confidence),
            ("currency", self.currency.is_found(), self.currency.confidence),
            (
                "payment_method",
                self.payment_method.is_found(),
                self.payment_method.confidence,
            ),
        ];

        fields
            .into_iter()
            .filter(|(_, found, confidence)| !found || *confidence < threshold)
            .map(|(name, _, _)| name)
            .collect()
    }

    /// Pre-filled draft for the correction form.
    pub fn to_draft(&self, source_file: impl Into<String>) -> ReceiptDraft {
        ReceiptDraft {
            vendor: self.vendor.value.clone(),
            transaction_date: self
                .transaction_date
                .value
                .map(|d| d.format("%Y-%m-%d").to_string()),
            amount: self.amount.value.map(|a| a.to_string()),
            items: self.items.clone(),
            category: self.category.value.map(|c| c.to_string()),
            payment_method: self.payment_method.value.clone(),
            currency: self.currency.value.map(|c| c.to_string()),
            source_file: Some(source_file.into()),
            extracted_text: Some(self.raw_text.clone()),
            confidence: Some(self.confidence),
        }
    }
}

/// Trait for receipt parsing.
pub trait ReceiptParser: Send + Sync {
    /// Infer receipt fields from plain text.
    fn parse(&self, text: &str) -> ExtractionResult;

    /// Infer receipt fields from extracted document text.
    fn parse_extracted(&self, extracted: &ExtractedText) -> ExtractionResult {
        self.parse(&extracted.text).with_text_source(extracted)
    }
}
