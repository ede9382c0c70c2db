//! Schema checks between a user-corrected draft and the store.

use std::str::FromStr;

use chrono::{Local, Months, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use crate::error::ValidationErrors;
use crate::ingest::FileKind;
use crate::models::config::ExtractionConfig;
use crate::models::receipt::{
    Category, Currency, NewReceipt, ReceiptDraft, UNKNOWN_PAYMENT_METHOD,
};
use crate::receipt::rules::normalize_whitespace;
use crate::receipt::rules::vendor::MAX_VENDOR_LEN;

/// Largest amount a receipt may carry.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 2);

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Draft validator.
///
/// Every failing field is reported at once; a draft either passes as a
/// whole or not at all.
#[derive(Debug, Clone)]
pub struct Validator {
    today: NaiveDate,
    max_age_years: u32,
}

impl Validator {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            max_age_years: 10,
        }
    }

    /// Validator for the current local date.
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(Local::now().date_naive()).with_max_age_years(config.max_age_years)
    }

    pub fn with_max_age_years(mut self, years: u32) -> Self {
        self.max_age_years = years;
        self
    }

    /// Check a draft and turn it into a storable receipt.
    pub fn validate(&self, draft: &ReceiptDraft) -> Result<NewReceipt, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let vendor = self.check_vendor(draft.vendor.as_deref(), &mut errors);
        let transaction_date = self.check_date(draft.transaction_date.as_deref(), &mut errors);
        let amount = self.check_amount(draft.amount.as_deref(), &mut errors);
        let source_file = self.check_source_file(draft.source_file.as_deref(), &mut errors);

        let category = match non_blank(draft.category.as_deref()) {
            None => Some(Category::default()),
            Some(s) => Category::from_str(s)
                .map_err(|e| errors.push("category", e))
                .ok(),
        };

        let currency = match non_blank(draft.currency.as_deref()) {
            None => Some(Currency::default()),
            Some(s) => Currency::from_str(s)
                .map_err(|e| errors.push("currency", e))
                .ok(),
        };

        let confidence = match draft.confidence {
            None => Some(0.0),
            Some(c) if c.is_finite() && (0.0..=1.0).contains(&c) => {
                Some((c * 1000.0).round() / 1000.0)
            }
            Some(_) => {
                errors.push("confidence", "must be between 0 and 1");
                None
            }
        };

        let payment_method = non_blank(draft.payment_method.as_deref())
            .map(normalize_whitespace)
            .unwrap_or_else(|| UNKNOWN_PAYMENT_METHOD.to_string());

        let items: Vec<String> = draft
            .items
            .iter()
            .map(|item| normalize_whitespace(item))
            .filter(|item| !item.is_empty())
            .collect();

        match (
            vendor,
            transaction_date,
            amount,
            source_file,
            category,
            currency,
            confidence,
        ) {
            (
                Some(vendor),
                Some(transaction_date),
                Some(amount),
                Some(source_file),
                Some(category),
                Some(currency),
                Some(confidence),
            ) if errors.is_empty() => Ok(NewReceipt {
                vendor,
                transaction_date,
                amount,
                items,
                category,
                payment_method,
                currency,
                source_file,
                extracted_text: draft.extracted_text.clone().unwrap_or_default(),
                confidence,
            }),
            _ => {
                debug!("Draft rejected: {}", errors);
                Err(errors)
            }
        }
    }

    fn check_vendor(&self, value: Option<&str>, errors: &mut ValidationErrors) -> Option<String> {
        let Some(vendor) = non_blank(value).map(normalize_whitespace) else {
            errors.push("vendor", "is required");
            return None;
        };

        if vendor.chars().count() > MAX_VENDOR_LEN {
            errors.push(
                "vendor",
                format!("must be at most {MAX_VENDOR_LEN} characters"),
            );
            return None;
        }

        Some(vendor)
    }

    fn check_date(&self, value: Option<&str>, errors: &mut ValidationErrors) -> Option<NaiveDate> {
        let Some(raw) = non_blank(value) else {
            errors.push("transaction_date", "is required");
            return None;
        };

        let Some(date) = DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        else {
            errors.push(
                "transaction_date",
                format!("{raw:?} is not a valid date (expected YYYY-MM-DD)"),
            );
            return None;
        };

        if date > self.today {
            errors.push("transaction_date", "must not be in the future");
            return None;
        }

        let oldest = self
            .today
            .checked_sub_months(Months::new(self.max_age_years.saturating_mul(12)))
            .unwrap_or(NaiveDate::MIN);
        if date < oldest {
            errors.push(
                "transaction_date",
                format!("must be within the last {} years", self.max_age_years),
            );
            return None;
        }

        Some(date)
    }

    fn check_amount(&self, value: Option<&str>, errors: &mut ValidationErrors) -> Option<Decimal> {
        let Some(raw) = non_blank(value) else {
            errors.push("amount", "is required");
            return None;
        };

        let cleaned: String = raw.chars().filter(|c| !matches!(c, '$' | ',' | ' ')).collect();
        let Ok(amount) = Decimal::from_str(&cleaned) else {
            errors.push("amount", format!("{raw:?} is not a number"));
            return None;
        };

        let amount = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
        if amount.is_sign_negative() && !amount.is_zero() {
            errors.push("amount", "must not be negative");
            return None;
        }
        if amount > MAX_AMOUNT {
            errors.push("amount", format!("must not exceed {MAX_AMOUNT}"));
            return None;
        }

        // "-0.00" is stored as zero.
        Some(amount.abs())
    }

    fn check_source_file(&self, value: Option<&str>, errors: &mut ValidationErrors) -> Option<String> {
        let Some(name) = non_blank(value) else {
            errors.push("source_file", "is required");
            return None;
        };

        if FileKind::from_file_name(name).is_none() {
            errors.push(
                "source_file",
                "must be a PDF, JPG, PNG, TIFF or BMP file",
            );
            return None;
        }

        Some(name.to_string())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
