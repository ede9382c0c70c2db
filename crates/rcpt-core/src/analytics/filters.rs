//! Receipt search filters and sorting.

use std::cmp::Ordering;

use chrono::NaiveDate;
use rapidfuzz::distance::indel;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationErrors;
use crate::models::receipt::{Category, Currency, Receipt};
use crate::validation::MAX_AMOUNT;

/// Minimum similarity for a fuzzy vendor match.
pub const FUZZY_THRESHOLD: f64 = 0.8;

/// Criteria for selecting receipts. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilters {
    /// Case-insensitive substring of the vendor name.
    pub vendor: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub amount_min: Option<Decimal>,
    pub amount_max: Option<Decimal>,
    pub category: Option<Category>,
    pub currency: Option<Currency>,
    pub min_confidence: Option<f32>,
    /// Also accept vendors within edit distance of the query.
    pub fuzzy: bool,
    pub limit: Option<usize>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.vendor.as_deref().is_none_or(|v| v.trim().is_empty())
            && self.date_from.is_none()
            && self.date_to.is_none()
            && self.amount_min.is_none()
            && self.amount_max.is_none()
            && self.category.is_none()
            && self.currency.is_none()
            && self.min_confidence.is_none()
    }

    /// Check that ranges are well formed.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if to < from {
                errors.push("date_to", "must not be before date_from");
            }
        }

        if self.amount_min.is_some_and(|a| a.is_sign_negative()) {
            errors.push("amount_min", "must not be negative");
        }
        if self.amount_max.is_some_and(|a| a.is_sign_negative()) {
            errors.push("amount_max", "must not be negative");
        }
        if self.amount_min.is_some_and(|a| a > MAX_AMOUNT) {
            errors.push("amount_min", format!("must not exceed {MAX_AMOUNT}"));
        }
        if self.amount_max.is_some_and(|a| a > MAX_AMOUNT) {
            errors.push("amount_max", format!("must not exceed {MAX_AMOUNT}"));
        }
        if let (Some(min), Some(max)) = (self.amount_min, self.amount_max) {
            if max < min {
                errors.push("amount_max", "must not be less than amount_min");
            }
        }

        if self
            .min_confidence
            .is_some_and(|c| !(0.0..=1.0).contains(&c))
        {
            errors.push("min_confidence", "must be between 0 and 1");
        }

        errors.into_result()
    }

    /// Whether a single receipt satisfies every set criterion.
    pub fn matches(&self, receipt: &Receipt) -> bool {
        if let Some(query) = self.vendor.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            if !vendor_matches(query, &receipt.vendor, self.fuzzy) {
                return false;
            }
        }

        self.date_from.is_none_or(|d| receipt.transaction_date >= d)
            && self.date_to.is_none_or(|d| receipt.transaction_date <= d)
            && self.amount_min.is_none_or(|a| receipt.amount >= a)
            && self.amount_max.is_none_or(|a| receipt.amount <= a)
            && self.category.is_none_or(|c| receipt.category == c)
            && self.currency.is_none_or(|c| receipt.currency == c)
            && self.min_confidence.is_none_or(|c| receipt.confidence >= c)
    }
}

/// Filter receipts in memory, keeping input order.
pub fn search<'a>(receipts: &'a [Receipt], filters: &SearchFilters) -> Vec<&'a Receipt> {
    let matched = receipts.iter().filter(|r| filters.matches(r));
    match filters.limit {
        Some(limit) => matched.take(limit).collect(),
        None => matched.collect(),
    }
}

/// Column to order receipts by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Date,
    Amount,
    Vendor,
    Category,
    Confidence,
    Currency,
}

impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "date" | "transaction_date" => Ok(SortKey::Date),
            "amount" => Ok(SortKey::Amount),
            "vendor" => Ok(SortKey::Vendor),
            "category" => Ok(SortKey::Category),
            "confidence" => Ok(SortKey::Confidence),
            "currency" => Ok(SortKey::Currency),
            other => Err(format!("unknown sort key {other:?}")),
        }
    }
}

/// Sort in place; ties fall back to id so the order is stable across calls.
pub fn sort(receipts: &mut [Receipt], key: SortKey, ascending: bool) {
    receipts.sort_by(|a, b| {
        let ord = match key {
            SortKey::Date => a.transaction_date.cmp(&b.transaction_date),
            SortKey::Amount => a.amount.cmp(&b.amount),
            SortKey::Vendor => a.vendor.to_lowercase().cmp(&b.vendor.to_lowercase()),
            SortKey::Category => a.category.as_str().cmp(b.category.as_str()),
            SortKey::Confidence => a
                .confidence
                .partial_cmp(&b.confidence)
                .unwrap_or(Ordering::Equal),
            SortKey::Currency => a.currency.code().cmp(b.currency.code()),
        }
        .then(a.id.cmp(&b.id));

        if ascending { ord } else { ord.reverse() }
    });
}

/// Case-insensitive substring match, or similarity at or above
/// [`FUZZY_THRESHOLD`] when `fuzzy` is set.
pub fn vendor_matches(query: &str, vendor: &str, fuzzy: bool) -> bool {
    let query = query.to_lowercase();
    let vendor = vendor.to_lowercase();

    vendor.contains(&query) || (fuzzy && similarity(&query, &vendor) >= FUZZY_THRESHOLD)
}

/// Indel-normalized similarity in `0.0..=1.0`: one minus insertions plus
/// deletions over the combined length.
pub fn similarity(a: &str, b: &str) -> f64 {
    indel::normalized_similarity(a.chars(), b.chars())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn receipt(id: i64, vendor: &str, date: (i32, u32, u32), cents: i64, category: Category) -> Receipt {
        Receipt {
            id,
            vendor: vendor.to_string(),
            transaction_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            amount: Decimal::new(cents, 2),
            items: vec![],
            category,
            payment_method: "Cash".to_string(),
            currency: Currency::USD,
            source_file: "r.jpg".to_string(),
            extracted_text: String::new(),
            confidence: 0.9,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample() -> Vec<Receipt> {
        vec![
            receipt(1, "Starbucks", (2024, 1, 5), 550, Category::Restaurants),
            receipt(2, "Whole Foods Market", (2024, 2, 10), 8420, Category::Groceries),
            receipt(3, "Shell", (2024, 3, 1), 4000, Category::Transportation),
        ]
    }

    #[test]
    fn test_similarity() {
        assert_eq!(similarity("walmart", "walmart"), 1.0);
        assert!((similarity("strbks", "starbucks") - 0.8).abs() < 1e-9);
        assert!(similarity("shell", "kroger") < 0.5);
        assert_eq!(similarity("", ""), 1.0);
    }

    #[test]
    fn test_vendor_substring_and_fuzzy() {
        assert!(vendor_matches("foods", "Whole Foods Market", false));
        assert!(!vendor_matches("starbuks", "Starbucks", false));
        assert!(vendor_matches("starbuks", "Starbucks", true));
        assert!(vendor_matches("strbks", "Starbucks", true));
        assert!(!vendor_matches("strbks", "Starbucks", false));
        // Whole-name ratio only; a close single word is not enough.
        assert!(!vendor_matches("markt", "Whole Foods Market", true));
    }

    #[test]
    fn test_combined_filters() {
        let receipts = sample();
        let filters = SearchFilters {
            date_from: NaiveDate::from_ymd_opt(2024, 2, 1),
            amount_min: Some(Decimal::new(1000, 2)),
            ..SearchFilters::default()
        };
        let ids: Vec<i64> = search(&receipts, &filters).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3]);

        let groceries = SearchFilters {
            category: Some(Category::Groceries),
            ..SearchFilters::default()
        };
        assert_eq!(search(&receipts, &groceries).len(), 1);
    }

    #[test]
    fn test_limit() {
        let receipts = sample();
        let filters = SearchFilters {
            limit: Some(2),
            ..SearchFilters::default()
        };
        assert_eq!(search(&receipts, &filters).len(), 2);
    }

    #[test]
    fn test_validate_ranges() {
        let filters = SearchFilters {
            date_from: NaiveDate::from_ymd_opt(2024, 3, 1),
            date_to: NaiveDate::from_ymd_opt(2024, 2, 1),
            amount_min: Some(Decimal::new(500, 2)),
            amount_max: Some(Decimal::new(100, 2)),
            min_confidence: Some(1.5),
            ..SearchFilters::default()
        };
        let errors = filters.validate().unwrap_err();
        assert!(errors.has("date_to"));
        assert!(errors.has("amount_max"));
        assert!(errors.has("min_confidence"));
        assert!(SearchFilters::default().validate().is_ok());

        let huge = SearchFilters {
            amount_min: Some(Decimal::new(i64::MAX, 0)),
            ..SearchFilters::default()
        };
        assert!(huge.validate().unwrap_err().has("amount_min"));
    }

    #[test]
    fn test_sort() {
        let mut receipts = sample();
        sort(&mut receipts, SortKey::Amount, false);
        let ids: Vec<i64> = receipts.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        sort(&mut receipts, SortKey::Vendor, true);
        let vendors: Vec<&str> = receipts.iter().map(|r| r.vendor.as_str()).collect();
        assert_eq!(vendors, vec!["Shell", "Starbucks", "Whole Foods Market"]);

        assert_eq!("amount".parse::<SortKey>(), Ok(SortKey::Amount));
    }
}
