//! Rule-based receipt parser.

use std::time::Instant;

use chrono::{Local, NaiveDate};
use tracing::{debug, info};

use crate::models::config::ExtractionConfig;
use crate::models::receipt::Currency;

use super::rules::{
    FieldExtractor, ItemExtractor, PaymentExtractor, VendorExtractor, classify_category,
    detect_currency, extract_total, extract_transaction_date,
};
use super::{ExtractionResult, FieldCandidate, ReceiptParser};

/// Receipt parser built from the rule extractors.
#[derive(Debug, Clone)]
pub struct RuleReceiptParser {
    /// Fixed "today" for date plausibility; the local date when unset.
    today: Option<NaiveDate>,
    default_currency: Currency,
    review_threshold: f32,
}

impl Default for RuleReceiptParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleReceiptParser {
    pub fn new() -> Self {
        Self {
            today: None,
            default_currency: Currency::USD,
            review_threshold: 0.6,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new()
            .with_default_currency(config.default_currency)
            .with_review_threshold(config.review_threshold)
    }

    /// Pin the reference date (tests, reprocessing old uploads).
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn with_default_currency(mut self, currency: Currency) -> Self {
        self.default_currency = currency;
        self
    }

    pub fn with_review_threshold(mut self, threshold: f32) -> Self {
        self.review_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn review_threshold(&self) -> f32 {
        self.review_threshold
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }
}

impl ReceiptParser for RuleReceiptParser {
    fn parse(&self, text: &str) -> ExtractionResult {
        let start = Instant::now();
        info!("Parsing receipt text ({} chars)", text.chars().count());

        let vendor = VendorExtractor::new().extract(text);
        let category = classify_category(text, vendor.as_ref().map(|v| v.value.as_str()));
        let transaction_date = extract_transaction_date(text, self.today());
        let amount = extract_total(text);
        let currency = detect_currency(text, self.default_currency);
        let payment_method = PaymentExtractor::new().extract_or_unknown(text);
        let items = ItemExtractor::new().descriptions(text);

        let mut warnings = Vec::new();
        if vendor.is_none() {
            warnings.push("No vendor name found".to_string());
        }
        if transaction_date.is_none() {
            warnings.push("No transaction date found".to_string());
        }
        if amount.is_none() {
            warnings.push("No total amount found".to_string());
        }

        let mut result = ExtractionResult {
            raw_text: text.to_string(),
            vendor: FieldCandidate::from(vendor),
            transaction_date: FieldCandidate::from(transaction_date),
            amount: FieldCandidate::from(amount),
            category: FieldCandidate::from(category),
            currency: FieldCandidate::from(currency),
            payment_method: FieldCandidate::from(payment_method),
            items,
            confidence: 0.0,
            text_confidence: 1.0,
            source: None,
            warnings,
            processing_time_ms: 0,
        };
        result.recompute_confidence();

        let review = result.fields_needing_review(self.review_threshold);
        if !review.is_empty() {
            debug!("Fields below review threshold: {}", review.join(", "));
        }

        result.processing_time_ms = start.elapsed().as_millis() as u64;
        info!(
            "Parsed receipt: vendor={:?}, amount={:?}, {} items, confidence {:.3}",
            result.vendor.value,
            result.amount.value,
            result.items.len(),
            result.confidence
        );

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{ExtractedText, TextSource};
    use crate::models::receipt::Category;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    const SAMPLE: &str = "\
STARBUCKS COFFEE
1234 Pike St, Seattle WA
Tel (206) 555-0100
Date: 03/14/2024 08:15
Caffe Latte        4.95
Blueberry Muffin   3.25
Subtotal           8.20
Tax                0.82
TOTAL             $9.02
VISA CREDIT ****4242
Thank you for visiting!";

    fn parser() -> RuleReceiptParser {
        RuleReceiptParser::new().with_today(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap())
    }

    #[test]
    fn test_parse_sample_receipt() {
        let result = parser().parse(SAMPLE);

        assert_eq!(result.vendor.value.as_deref(), Some("Starbucks Coffee"));
        assert_eq!(
            result.transaction_date.value,
            NaiveDate::from_ymd_opt(2024, 3, 14)
        );
        assert_eq!(result.amount.value, Some(Decimal::new(902, 2)));
        assert_eq!(result.category.value, Some(Category::Restaurants));
        assert_eq!(result.currency.value, Some(Currency::USD));
        assert_eq!(result.payment_method.value.as_deref(), Some("Credit Card (Visa)"));
        assert_eq!(
            result.items,
            vec!["Caffe Latte".to_string(), "Blueberry Muffin".to_string()]
        );
        assert!(result.warnings.is_empty());
        assert!(result.confidence > 0.8);
    }

    #[test]
    fn test_missing_fields_flagged() {
        let result = parser().parse("hello world");

        assert!(result.transaction_date.value.is_none());
        assert!(result.amount.value.is_none());
        assert_eq!(result.warnings.len(), 2);
        let review = result.fields_needing_review(0.6);
        assert!(review.contains(&"transaction_date"));
        assert!(review.contains(&"amount"));
        assert!(review.contains(&"payment_method"));
    }

    #[test]
    fn test_text_confidence_scales_overall() {
        let extracted = ExtractedText {
            text: SAMPLE.to_string(),
            source: TextSource::ImageOcr,
            confidence: 0.5,
            processing_time_ms: 12,
            warnings: vec!["low contrast".to_string()],
        };
        let plain = parser().parse(SAMPLE);
        let scanned = parser().parse_extracted(&extracted);

        assert_eq!(scanned.source, Some(TextSource::ImageOcr));
        assert!(scanned.confidence < plain.confidence);
        assert!(scanned.warnings.contains(&"low contrast".to_string()));
    }

    #[test]
    fn test_draft_prefilled() {
        let draft = parser().parse(SAMPLE).to_draft("latte.jpg");
        assert_eq!(draft.vendor.as_deref(), Some("Starbucks Coffee"));
        assert_eq!(draft.transaction_date.as_deref(), Some("2024-03-14"));
        assert_eq!(draft.amount.as_deref(), Some("9.02"));
        assert_eq!(draft.category.as_deref(), Some("restaurants"));
        assert_eq!(draft.source_file.as_deref(), Some("latte.jpg"));
    }

    #[test]
    fn test_default_currency_from_config() {
        let config = ExtractionConfig {
            default_currency: Currency::EUR,
            ..ExtractionConfig::default()
        };
        let result = RuleReceiptParser::from_config(&config).parse("Kiosk\nTOTAL 3.00");
        assert_eq!(result.currency.value, Some(Currency::EUR));
        assert!(result.currency.source.is_none());
    }
}
