//! Amount extraction for receipts.

use rust_decimal::Decimal;
use std::str::FromStr;

use super::patterns::{
    AMOUNT_PATTERN, CURRENCY_SYMBOL_AMOUNT, NON_TOTAL_LINE, TOTAL_PLAIN, TOTAL_STRONG, TOTAL_WEAK,
};
use super::{ExtractionMatch, FieldExtractor};

/// Smallest amount considered a plausible receipt total.
pub const MIN_PLAUSIBLE_TOTAL: Decimal = Decimal::from_parts(1, 0, 0, false, 2);
/// Largest unlabelled amount taken as the receipt total.
pub const MAX_PLAUSIBLE_TOTAL: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 2);

/// Amount field extractor; finds every money-looking number.
#[derive(Debug, Default)]
pub struct AmountExtractor;

impl AmountExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl FieldExtractor for AmountExtractor {
    type Output = ExtractionMatch<Decimal>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results = Vec::new();

        for caps in AMOUNT_PATTERN.captures_iter(text) {
            let Some(full) = caps.get(0) else { continue };
            if is_part_of_other_number(text, full.start(), full.end()) {
                continue;
            }

            let Some(amount) = parse_amount(full.as_str()) else {
                continue;
            };

            let confidence = if preceded_by_symbol(text, full.start()) { 0.7 } else { 0.6 };
            results.push(
                ExtractionMatch::new(amount, confidence, full.as_str())
                    .with_position(full.start(), full.end()),
            );
        }

        results
    }
}

/// Pick the amount paid.
///
/// Labelled totals win (`GRAND TOTAL` over `TOTAL` over `AMOUNT`), with
/// subtotal/tax/change lines ignored; otherwise the largest plausible amount.
pub fn extract_total(text: &str) -> Option<ExtractionMatch<Decimal>> {
    let extractor = AmountExtractor::new();
    let lines: Vec<&str> = text.lines().collect();
    let mut labelled: Vec<ExtractionMatch<Decimal>> = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if NON_TOTAL_LINE.is_match(line) {
            continue;
        }

        let confidence = if TOTAL_STRONG.is_match(line) {
            0.95
        } else if TOTAL_PLAIN.is_match(line) {
            0.9
        } else if TOTAL_WEAK.is_match(line) {
            0.75
        } else {
            continue;
        };

        // The amount sits on the label line or, in two-column layouts, on the next one.
        let found = extractor
            .extract_all(line)
            .pop()
            .or_else(|| lines.get(i + 1).and_then(|next| extractor.extract_all(next).pop()));

        if let Some(found) = found {
            if found.value >= MIN_PLAUSIBLE_TOTAL {
                labelled.push(ExtractionMatch::new(found.value, confidence, line.trim()));
            }
        }
    }

    let best_labelled = labelled.into_iter().max_by(|a, b| {
        a.confidence
            .partial_cmp(&b.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.value.cmp(&b.value))
    });
    if best_labelled.is_some() {
        return best_labelled;
    }

    extractor
        .extract_all(text)
        .into_iter()
        .filter(|m| in_plausible_range(m.value))
        .max_by(|a, b| a.value.cmp(&b.value))
        .map(|m| ExtractionMatch {
            confidence: m.confidence - 0.2,
            ..m
        })
}

fn in_plausible_range(amount: Decimal) -> bool {
    (MIN_PLAUSIBLE_TOTAL..=MAX_PLAUSIBLE_TOTAL).contains(&amount)
}

/// Digits glued to a date, time or code are not money.
fn is_part_of_other_number(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().rev().take(2).collect::<Vec<_>>();
    let after = text[end..].chars().take(2).collect::<Vec<_>>();

    let glued_before = match before.as_slice() {
        [c, ..] if c.is_ascii_digit() || c.is_ascii_alphabetic() => true,
        [sep, d, ..] if "/-:.".contains(*sep) && d.is_ascii_digit() => true,
        _ => false,
    };
    let glued_after = match after.as_slice() {
        [c, ..] if c.is_ascii_digit() => true,
        [sep, d, ..] if "/-:.,".contains(*sep) && d.is_ascii_digit() => true,
        _ => false,
    };

    glued_before || glued_after
}

fn preceded_by_symbol(text: &str, start: usize) -> bool {
    let window_start = text[..start]
        .char_indices()
        .rev()
        .nth(1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    CURRENCY_SYMBOL_AMOUNT.is_match(&text[window_start..(start + 1).min(text.len())])
}

/// Parse an amount with `.` or `,` as decimal separator
/// (e.g. `"1,234.56"`, `"1.234,56"`, `"$12.50"`).
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        // "1.234,56": comma is the decimal separator
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        // "1,234.56"
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        // "12,50" decimal comma, "1,234" thousands comma
        (Some(c), None) => {
            if cleaned.len() - c - 1 == 2 {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        _ => cleaned,
    };

    Decimal::from_str(&normalized).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1,234.56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("1.234,56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("12,50"), Some(dec("12.50")));
        assert_eq!(parse_amount("$12.50"), Some(dec("12.50")));
        assert_eq!(parse_amount("1,234"), Some(dec("1234")));
        assert_eq!(parse_amount("abc"), None);
    }

    #[test]
    fn test_labelled_total_beats_larger_amounts() {
        let text = "CORNER CAFE\nLatte 4.50\nSUBTOTAL 24.00\nTAX 1.98\nTOTAL 25.98\nCASH 40.00\nCHANGE 14.02";
        let total = extract_total(text).unwrap();
        assert_eq!(total.value, dec("25.98"));
        assert_eq!(total.confidence, 0.9);
    }

    #[test]
    fn test_grand_total_preferred() {
        let text = "TOTAL 20.00\nTIP 4.00\nGRAND TOTAL 24.00";
        assert_eq!(extract_total(text).unwrap().value, dec("24.00"));
    }

    #[test]
    fn test_total_on_next_line() {
        let text = "Amount Due\n$ 1,024.10";
        let total = extract_total(text).unwrap();
        assert_eq!(total.value, dec("1024.10"));
        assert_eq!(total.confidence, 0.95);
    }

    #[test]
    fn test_fallback_to_largest() {
        let text = "Widget 3.00\nGadget 12.49\nThanks";
        let total = extract_total(text).unwrap();
        assert_eq!(total.value, dec("12.49"));
        assert!(total.confidence < 0.6);
    }

    #[test]
    fn test_dates_and_times_are_not_amounts() {
        let extractor = AmountExtractor::new();
        assert!(extractor.extract_all("03.14.2024 12:30").is_empty());
        assert!(extractor.extract_all("Date: 14.03.24").is_empty());
        assert_eq!(extractor.extract_all("Total $7.25").len(), 1);
    }

    #[test]
    fn test_no_amounts() {
        assert!(extract_total("Thank you for shopping").is_none());
    }
}
