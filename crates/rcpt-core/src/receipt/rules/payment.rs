//! Payment method detection.

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::receipt::UNKNOWN_PAYMENT_METHOD;

use super::patterns::PAYMENT_LABEL;
use super::{ExtractionMatch, FieldExtractor};

lazy_static! {
    static ref WALLETS: Vec<(Regex, &'static str)> = vec![
        (Regex::new(r"(?i)\bapple\s*pay\b").unwrap(), "Apple Pay"),
        (Regex::new(r"(?i)\bgoogle\s*pay\b").unwrap(), "Google Pay"),
        (Regex::new(r"(?i)\bpaypal\b").unwrap(), "PayPal"),
    ];

    static ref CARD_BRANDS: Vec<(Regex, &'static str)> = vec![
        (Regex::new(r"(?i)\bvisa\b").unwrap(), "Visa"),
        (Regex::new(r"(?i)\b(?:master\s*card|mc)\b").unwrap(), "Mastercard"),
        (Regex::new(r"(?i)\b(?:american\s+express|amex)\b").unwrap(), "American Express"),
        (Regex::new(r"(?i)\bdiscover\b").unwrap(), "Discover"),
    ];

    static ref DEBIT: Regex = Regex::new(r"(?i)\bdebit\b").unwrap();
    static ref CREDIT: Regex = Regex::new(r"(?i)\bcredit\b").unwrap();
    static ref GENERIC_CARD: Regex = Regex::new(r"(?i)\b(?:card|chip|contactless|tap)\b|\*{4}\s*\d{4}|x{4}\s*\d{4}").unwrap();
    static ref GIFT_CARD: Regex = Regex::new(r"(?i)\bgift\s*card\b").unwrap();
    static ref CHECK: Regex = Regex::new(r"(?i)\b(?:check|cheque)\s*(?:#|no\.?)?\s*\d*\b").unwrap();
    static ref CASH: Regex = Regex::new(r"(?i)\bcash\b").unwrap();
}

/// Payment method extractor.
///
/// Produces labels like `"Credit Card (Visa)"`, `"Cash"` or `"Apple Pay"`.
#[derive(Debug, Default)]
pub struct PaymentExtractor;

impl PaymentExtractor {
    pub fn new() -> Self {
        Self
    }

    fn classify_line(line: &str) -> Option<(String, f32)> {
        if let Some((_, name)) = WALLETS.iter().find(|(p, _)| p.is_match(line)) {
            return Some((name.to_string(), 0.85));
        }

        if GIFT_CARD.is_match(line) {
            return Some(("Gift Card".to_string(), 0.8));
        }

        let brand = CARD_BRANDS.iter().find(|(p, _)| p.is_match(line)).map(|(_, b)| *b);
        let kind = if DEBIT.is_match(line) {
            Some("Debit Card")
        } else if CREDIT.is_match(line) {
            Some("Credit Card")
        } else {
            None
        };

        match (kind, brand) {
            (Some(kind), Some(brand)) => return Some((format!("{kind} ({brand})"), 0.85)),
            (None, Some(brand)) => return Some((format!("Credit Card ({brand})"), 0.8)),
            (Some(kind), None) => return Some((kind.to_string(), 0.75)),
            (None, None) => {}
        }

        if GENERIC_CARD.is_match(line) {
            return Some(("Card".to_string(), 0.6));
        }
        if CASH.is_match(line) {
            return Some(("Cash".to_string(), 0.8));
        }
        if CHECK.is_match(line) {
            return Some(("Check".to_string(), 0.7));
        }

        None
    }
}

impl FieldExtractor for PaymentExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        let all = self.extract_all(text);
        all.iter()
            .max_by(|a, b| {
                a.confidence
                    .partial_cmp(&b.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    // On equal confidence the earlier line wins.
                    .then(b.position.cmp(&a.position))
            })
            .cloned()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut offset = 0;
        let mut results = Vec::new();

        for line in text.split_inclusive('\n') {
            let start = offset;
            offset += line.len();

            let Some((method, mut confidence)) = Self::classify_line(line) else {
                continue;
            };
            if PAYMENT_LABEL.is_match(line) {
                confidence = 0.9;
            }

            let trimmed = line.trim_end();
            results.push(
                ExtractionMatch::new(method, confidence, trimmed.trim_start())
                    .with_position(start, start + trimmed.len()),
            );
        }

        results
    }
}

impl PaymentExtractor {
    /// Best payment method, or [`UNKNOWN_PAYMENT_METHOD`] at zero confidence.
    pub fn extract_or_unknown(&self, text: &str) -> ExtractionMatch<String> {
        self.extract(text)
            .unwrap_or_else(|| ExtractionMatch::new(UNKNOWN_PAYMENT_METHOD.to_string(), 0.0, ""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn method(text: &str) -> String {
        PaymentExtractor::new().extract_or_unknown(text).value
    }

    #[test]
    fn test_card_with_brand() {
        assert_eq!(method("VISA DEBIT ****1234\nTOTAL 10.00"), "Debit Card (Visa)");
        assert_eq!(method("MASTERCARD CREDIT"), "Credit Card (Mastercard)");
        assert_eq!(method("AMEX XXXX1005"), "Credit Card (American Express)");
    }

    #[test]
    fn test_wallets_and_cash() {
        assert_eq!(method("Paid with Apple Pay"), "Apple Pay");
        assert_eq!(method("CASH 20.00\nCHANGE 5.00"), "Cash");
    }

    #[test]
    fn test_labelled_line_preferred() {
        let text = "Cash back offer inside!\nPayment Method: Visa";
        let found = PaymentExtractor::new().extract(text).unwrap();
        assert_eq!(found.value, "Credit Card (Visa)");
        assert_eq!(found.confidence, 0.9);
    }

    #[test]
    fn test_unknown() {
        let found = PaymentExtractor::new().extract_or_unknown("Latte 4.50\nTOTAL 4.50");
        assert_eq!(found.value, UNKNOWN_PAYMENT_METHOD);
        assert_eq!(found.confidence, 0.0);
    }
}
