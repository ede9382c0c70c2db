//! Currency detection from codes, symbols and currency words.

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::receipt::Currency;

use super::{ExtractionMatch, FieldExtractor};

lazy_static! {
    /// Indicators in descending order of reliability.
    static ref INDICATORS: Vec<(Regex, Currency, f32)> = vec![
        (Regex::new(r"\bUSD\b").unwrap(), Currency::USD, 0.95),
        (Regex::new(r"\bEUR\b").unwrap(), Currency::EUR, 0.95),
        (Regex::new(r"\bGBP\b").unwrap(), Currency::GBP, 0.95),
        (Regex::new(r"\bCAD\b").unwrap(), Currency::CAD, 0.95),
        (Regex::new(r"\bAUD\b").unwrap(), Currency::AUD, 0.95),
        (Regex::new(r"\bJPY\b").unwrap(), Currency::JPY, 0.95),
        (Regex::new(r"\bCHF\b").unwrap(), Currency::CHF, 0.95),
        (Regex::new(r"\b(?:CNY|RMB)\b").unwrap(), Currency::CNY, 0.95),
        (Regex::new(r"\bC\$").unwrap(), Currency::CAD, 0.9),
        (Regex::new(r"\bA\$").unwrap(), Currency::AUD, 0.9),
        (Regex::new(r"\bUS\$").unwrap(), Currency::USD, 0.9),
        (Regex::new(r"€").unwrap(), Currency::EUR, 0.9),
        (Regex::new(r"£").unwrap(), Currency::GBP, 0.9),
        (Regex::new(r"元").unwrap(), Currency::CNY, 0.85),
        (Regex::new(r"円").unwrap(), Currency::JPY, 0.85),
        (Regex::new(r"(?i)\beuros?\b").unwrap(), Currency::EUR, 0.8),
        (Regex::new(r"(?i)\b(?:pounds?\s+sterling|sterling)\b").unwrap(), Currency::GBP, 0.8),
        (Regex::new(r"(?i)\byen\b").unwrap(), Currency::JPY, 0.8),
        (Regex::new(r"(?i)\b(?:yuan|renminbi)\b").unwrap(), Currency::CNY, 0.8),
        (Regex::new(r"(?i)\bswiss\s+francs?\b").unwrap(), Currency::CHF, 0.8),
        (Regex::new(r"(?i)\bdollars?\b").unwrap(), Currency::USD, 0.7),
        // A bare dollar sign, not part of C$/A$/US$.
        (Regex::new(r"(?:^|[^A-Za-z])\$").unwrap(), Currency::USD, 0.6),
        (Regex::new(r"¥").unwrap(), Currency::JPY, 0.6),
    ];
}

/// Currency extractor; falls back to a configured default.
#[derive(Debug, Clone)]
pub struct CurrencyExtractor {
    default: Currency,
}

impl Default for CurrencyExtractor {
    fn default() -> Self {
        Self::new(Currency::default())
    }
}

impl CurrencyExtractor {
    pub fn new(default: Currency) -> Self {
        Self { default }
    }
}

impl FieldExtractor for CurrencyExtractor {
    type Output = ExtractionMatch<Currency>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text)
            .into_iter()
            .next()
            .or_else(|| Some(ExtractionMatch::new(self.default, 0.3, "")))
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        INDICATORS
            .iter()
            .filter_map(|(pattern, currency, confidence)| {
                pattern.find(text).map(|m| {
                    ExtractionMatch::new(*currency, *confidence, m.as_str().trim())
                        .with_position(m.start(), m.end())
                })
            })
            .collect()
    }
}

/// Detect the receipt currency, defaulting to `default` when no indicator is present.
pub fn detect_currency(text: &str, default: Currency) -> ExtractionMatch<Currency> {
    CurrencyExtractor::new(default)
        .extract(text)
        .unwrap_or_else(|| ExtractionMatch::new(default, 0.3, ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_beats_symbol() {
        let found = detect_currency("Total $12.00 CAD", Currency::USD);
        assert_eq!(found.value, Currency::CAD);
        assert_eq!(found.confidence, 0.95);
    }

    #[test]
    fn test_prefixed_dollar_signs() {
        assert_eq!(detect_currency("Total C$ 12.00", Currency::USD).value, Currency::CAD);
        assert_eq!(detect_currency("Total A$12.00", Currency::USD).value, Currency::AUD);
    }

    #[test]
    fn test_symbols() {
        assert_eq!(detect_currency("Summe 12,00 €", Currency::USD).value, Currency::EUR);
        assert_eq!(detect_currency("Total £4.20", Currency::USD).value, Currency::GBP);
        let dollar = detect_currency("Total $4.20", Currency::EUR);
        assert_eq!(dollar.value, Currency::USD);
        assert_eq!(dollar.confidence, 0.6);
    }

    #[test]
    fn test_words() {
        assert_eq!(detect_currency("paid in euros", Currency::USD).value, Currency::EUR);
    }

    #[test]
    fn test_default_when_absent() {
        let found = detect_currency("Total 4.20", Currency::GBP);
        assert_eq!(found.value, Currency::GBP);
        assert_eq!(found.confidence, 0.3);
    }

    #[test]
    fn test_all_indicators_reported() {
        let all = CurrencyExtractor::default().extract_all("EUR 10.00 / $11.00");
        let currencies: Vec<Currency> = all.iter().map(|m| m.value).collect();
        assert_eq!(currencies, vec![Currency::EUR, Currency::USD]);
    }
}
