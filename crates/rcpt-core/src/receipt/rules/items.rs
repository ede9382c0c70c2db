//! Line item extraction.

use rust_decimal::Decimal;

use super::amounts::parse_amount;
use super::patterns::{ITEM_LINE, NON_ITEM_LINE, PHONE};
use super::vendor::normalize_whitespace;
use super::{ExtractionMatch, FieldExtractor};

/// A purchased item: description and line price.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub description: String,
    pub price: Decimal,
}

/// Item extractor: lines ending in a price that are not totals, taxes or payments.
#[derive(Debug, Default)]
pub struct ItemExtractor;

impl ItemExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Item descriptions in document order.
    pub fn descriptions(&self, text: &str) -> Vec<String> {
        self.extract_all(text).into_iter().map(|m| m.value.description).collect()
    }
}

impl FieldExtractor for ItemExtractor {
    type Output = ExtractionMatch<LineItem>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !NON_ITEM_LINE.is_match(line) && !PHONE.is_match(line))
            .filter_map(|line| {
                let caps = ITEM_LINE.captures(line)?;
                let description = normalize_whitespace(&caps["desc"]);
                let price = parse_amount(&caps["price"])?;
                if description.chars().filter(|c| c.is_alphabetic()).count() < 2 {
                    return None;
                }
                Some(ExtractionMatch::new(LineItem { description, price }, 0.7, line))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_items_in_order() {
        let text = "CORNER MARKET\n\
                    Organic   Bananas 3.49 F\n\
                    Whole Milk 1gal 4.19\n\
                    SUBTOTAL 7.68\n\
                    TAX 0.31\n\
                    TOTAL 7.99\n\
                    VISA 7.99";
        assert_eq!(
            ItemExtractor::new().descriptions(text),
            vec!["Organic Bananas".to_string(), "Whole Milk 1gal".to_string()]
        );
    }

    #[test]
    fn test_price_parsed() {
        let item = ItemExtractor::new().extract("2 x Latte $9.00").unwrap();
        assert_eq!(item.value.description, "2 x Latte");
        assert_eq!(item.value.price, Decimal::new(900, 2));
    }

    #[test]
    fn test_no_items() {
        assert!(ItemExtractor::new().extract_all("Thank you!\nTOTAL 3.00").is_empty());
    }
}
