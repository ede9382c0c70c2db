//! Vendor (merchant name) extraction from the receipt header.

use lazy_static::lazy_static;
use regex::Regex;

use super::patterns::{AMOUNT_PATTERN, DATE_NUMERIC, DATE_YMD, PHONE};
use super::{ExtractionMatch, FieldExtractor};

/// Maximum stored vendor length in characters.
pub const MAX_VENDOR_LEN: usize = 200;

/// Header lines inspected for the merchant name.
const HEADER_LINES: usize = 5;

const STOP_WORDS: &[&str] = &[
    "receipt", "invoice", "bill", "total", "amount", "date", "time", "thank", "you", "visit",
    "again", "store", "location", "address", "welcome",
];

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref NON_NAME_CHARS: Regex = Regex::new(r"[^\w\s&'\-]").unwrap();
}

/// Collapse whitespace runs to single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

/// Vendor extractor.
///
/// The merchant name is usually the first meaningful header line;
/// lines holding dates, phone numbers or prices are skipped.
#[derive(Debug, Default)]
pub struct VendorExtractor;

impl VendorExtractor {
    pub fn new() -> Self {
        Self
    }

    fn clean_line(line: &str) -> Option<String> {
        if line.chars().filter(|c| c.is_alphabetic()).count() < 2 {
            return None;
        }
        if PHONE.is_match(line)
            || DATE_NUMERIC.is_match(line)
            || DATE_YMD.is_match(line)
            || AMOUNT_PATTERN.is_match(line)
        {
            return None;
        }

        let stripped = NON_NAME_CHARS.replace_all(line, " ");
        let words: Vec<&str> = stripped
            .split_whitespace()
            .filter(|w| {
                let lower = w.to_lowercase();
                w.chars().count() > 2
                    && !w.chars().all(|c| c.is_ascii_digit())
                    && !STOP_WORDS.contains(&lower.as_str())
            })
            .collect();

        if words.is_empty() {
            return None;
        }

        let name = words.join(" ");
        Some(truncate(&title_case_if_uniform(&name), MAX_VENDOR_LEN))
    }
}

impl FieldExtractor for VendorExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next().or_else(|| {
            // Nothing looked like a name; fall back to the first line as-is.
            text.lines()
                .map(normalize_whitespace)
                .find(|l| !l.is_empty())
                .map(|first| ExtractionMatch::new(truncate(&first, MAX_VENDOR_LEN), 0.3, first))
        })
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .take(HEADER_LINES)
            .enumerate()
            .filter_map(|(index, line)| {
                Self::clean_line(line).map(|name| {
                    let confidence = 0.8 - 0.1 * index as f32;
                    ExtractionMatch::new(name, confidence, line)
                })
            })
            .collect()
    }
}

/// `"WALMART SUPERCENTER"` becomes `"Walmart Supercenter"`; mixed case is kept.
fn title_case_if_uniform(name: &str) -> String {
    let letters = || name.chars().filter(|c| c.is_alphabetic());
    let uniform = letters().all(char::is_uppercase) || letters().all(char::is_lowercase);
    if !uniform {
        return name.to_string();
    }

    name.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect::<String>().trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_first_header_line() {
        let text = "WHOLE FOODS MARKET\n123 Main St\nTel (555) 123-4567\nTOTAL 10.00";
        let vendor = VendorExtractor::new().extract(text).unwrap();
        assert_eq!(vendor.value, "Whole Foods Market");
        assert_eq!(vendor.confidence, 0.8);
    }

    #[test]
    fn test_skips_noise_lines() {
        let text = "*** RECEIPT ***\n03/14/2024\nJoe's Diner\nBurger 9.99";
        let vendor = VendorExtractor::new().extract(text).unwrap();
        assert_eq!(vendor.value, "Joe's Diner");
        assert!(vendor.confidence < 0.8);
    }

    #[test]
    fn test_mixed_case_preserved() {
        let text = "McDonald's #4411";
        assert_eq!(VendorExtractor::new().extract(text).unwrap().value, "McDonald's");
    }

    #[test]
    fn test_fallback_first_line() {
        let text = "12.00\nTOTAL 12.00";
        let vendor = VendorExtractor::new().extract(text).unwrap();
        assert_eq!(vendor.value, "12.00");
        assert_eq!(vendor.confidence, 0.3);
    }

    #[test]
    fn test_empty_text() {
        assert!(VendorExtractor::new().extract("  \n ").is_none());
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  Corner \t Cafe \n"), "Corner Cafe");
    }
}
