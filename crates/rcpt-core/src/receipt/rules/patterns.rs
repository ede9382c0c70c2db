//! Common regex patterns for receipt extraction.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Dates: 03/14/2024, 14.03.24, 3-14-2024
    pub static ref DATE_NUMERIC: Regex = Regex::new(
        r"\b(\d{1,2})[./\-](\d{1,2})[./\-](\d{4}|\d{2})\b"
    ).unwrap();

    // 2024-03-14, 2024/3/14
    pub static ref DATE_YMD: Regex = Regex::new(
        r"\b(\d{4})[./\-](\d{1,2})[./\-](\d{1,2})\b"
    ).unwrap();

    // March 14, 2024 / Mar 14th 2024
    pub static ref DATE_MONTH_NAME_FIRST: Regex = Regex::new(
        r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b"
    ).unwrap();

    // 14 March 2024 / 14th Mar, 2024
    pub static ref DATE_DAY_FIRST: Regex = Regex::new(
        r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s+(jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?,?\s+(\d{4})\b"
    ).unwrap();

    pub static ref DATE_LABEL: Regex = Regex::new(
        r"(?i)\b(?:transaction\s+date|trans\.?\s+date|purchase\s+date|date|dated)\b"
    ).unwrap();

    // Money: 1,234.56 / 1.234,56 / 12.50
    pub static ref AMOUNT_PATTERN: Regex = Regex::new(
        r"(\d{1,3}(?:[,.\u{00a0}]?\d{3})*)[.,](\d{2})\b"
    ).unwrap();

    pub static ref CURRENCY_SYMBOL_AMOUNT: Regex = Regex::new(
        r"[$€£¥]\s?\d"
    ).unwrap();

    // Labels marking the amount actually paid, strongest first.
    pub static ref TOTAL_STRONG: Regex = Regex::new(
        r"(?i)\b(?:grand\s+total|total\s+due|amount\s+due|balance\s+due|total\s+amount|amount\s+paid|total\s+paid|total\s+charged)\b"
    ).unwrap();

    pub static ref TOTAL_PLAIN: Regex = Regex::new(
        r"(?i)\btotal\b"
    ).unwrap();

    pub static ref TOTAL_WEAK: Regex = Regex::new(
        r"(?i)\b(?:amount|balance|sum|to\s+pay)\b"
    ).unwrap();

    // Lines that carry an amount which is not the receipt total.
    pub static ref NON_TOTAL_LINE: Regex = Regex::new(
        r"(?i)\b(?:sub\s*-?\s*total|tax|vat|gst|hst|pst|tip|gratuity|change|savings|saved|discount|coupon|tendered|cash\s+back|points|rewards?|items?\s+sold|qty|quantity)\b"
    ).unwrap();

    // Lines that never describe a purchased item.
    pub static ref NON_ITEM_LINE: Regex = Regex::new(
        r"(?i)\b(?:total|sub\s*-?\s*total|tax|vat|gst|hst|pst|tip|gratuity|change|cash|card|visa|mastercard|amex|debit|credit|balance|due|tender(?:ed)?|payment|paid|auth|approval|account|acct|ref|invoice|receipt|date|time|tel|phone|savings|saved|rewards?|points)\b"
    ).unwrap();

    // Description followed by a trailing price and an optional tax flag.
    pub static ref ITEM_LINE: Regex = Regex::new(
        r"^(?P<desc>.*?[A-Za-z].*?)\s+(?:\d+\s*[x@]\s*)?[$€£¥]?\s?(?P<price>\d{1,3}(?:[,.]?\d{3})*[.,]\d{2})\s*(?:[A-Z]{1,2})?$"
    ).unwrap();

    pub static ref PHONE: Regex = Regex::new(
        r"(?:\+?\d{1,2}[\s.\-]?)?\(?\d{3}\)?[\s.\-]?\d{3}[\s.\-]?\d{4}"
    ).unwrap();

    pub static ref PAYMENT_LABEL: Regex = Regex::new(
        r"(?i)\b(?:payment(?:\s+method|\s+type)?|paid\s+(?:by|with)|tender(?:\s+type)?)\b"
    ).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_pattern_variants() {
        for (text, int_part, dec) in [
            ("12.50", "12", "50"),
            ("1,234.56", "1,234", "56"),
            ("1.234,56", "1.234", "56"),
            ("1234.56", "1234", "56"),
        ] {
            let caps = AMOUNT_PATTERN.captures(text).unwrap();
            assert_eq!(&caps[1], int_part, "{text}");
            assert_eq!(&caps[2], dec, "{text}");
        }
    }

    #[test]
    fn test_total_labels() {
        assert!(TOTAL_STRONG.is_match("GRAND TOTAL 45.00"));
        assert!(TOTAL_PLAIN.is_match("Total: 12.00"));
        assert!(NON_TOTAL_LINE.is_match("SUBTOTAL 10.00"));
        assert!(NON_TOTAL_LINE.is_match("Sub-Total 10.00"));
        assert!(!NON_TOTAL_LINE.is_match("TOTAL 10.00"));
    }

    #[test]
    fn test_item_line() {
        let caps = ITEM_LINE.captures("Organic Bananas   3.49 F").unwrap();
        assert_eq!(&caps["desc"], "Organic Bananas");
        assert_eq!(&caps["price"], "3.49");

        let caps = ITEM_LINE.captures("2 x Latte $9.00").unwrap();
        assert_eq!(&caps["desc"], "2 x Latte");
        assert!(ITEM_LINE.captures("12.00").is_none());
    }
}
