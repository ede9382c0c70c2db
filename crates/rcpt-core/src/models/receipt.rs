//! Receipt data models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Payment method used when nothing better is known.
pub const UNKNOWN_PAYMENT_METHOD: &str = "Unknown";

/// A persisted receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    /// Store-assigned identifier.
    pub id: i64,

    /// Merchant name, whitespace-normalized.
    pub vendor: String,

    pub transaction_date: NaiveDate,

    /// Total paid, scaled to two decimal places.
    pub amount: Decimal,

    /// Item descriptions in document order.
    #[serde(default)]
    pub items: Vec<String>,

    pub category: Category,

    pub payment_method: String,

    pub currency: Currency,

    /// Name of the uploaded file this receipt was read from.
    pub source_file: String,

    /// Raw text the fields were inferred from.
    #[serde(default)]
    pub extracted_text: String,

    /// Overall extraction confidence (0.0 - 1.0).
    pub confidence: f32,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// A validated receipt that has not been stored yet.
///
/// Only [`crate::validation::Validator`] produces values that the store
/// accepts without re-checking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReceipt {
    pub vendor: String,
    pub transaction_date: NaiveDate,
    pub amount: Decimal,
    pub items: Vec<String>,
    pub category: Category,
    pub payment_method: String,
    pub currency: Currency,
    pub source_file: String,
    pub extracted_text: String,
    pub confidence: f32,
}

impl Receipt {
    /// Attach store metadata to a validated receipt.
    pub fn from_new(id: i64, new: NewReceipt, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            vendor: new.vendor,
            transaction_date: new.transaction_date,
            amount: new.amount,
            items: new.items,
            category: new.category,
            payment_method: new.payment_method,
            currency: new.currency,
            source_file: new.source_file,
            extracted_text: new.extracted_text,
            confidence: new.confidence,
            created_at,
            updated_at: created_at,
        }
    }

    /// Editable copy of this receipt, used when a stored record is corrected.
    pub fn to_draft(&self) -> ReceiptDraft {
        ReceiptDraft {
            vendor: Some(self.vendor.clone()),
            transaction_date: Some(self.transaction_date.format("%Y-%m-%d").to_string()),
            amount: Some(self.amount.to_string()),
            items: self.items.clone(),
            category: Some(self.category.to_string()),
            payment_method: Some(self.payment_method.clone()),
            currency: Some(self.currency.to_string()),
            source_file: Some(self.source_file.clone()),
            extracted_text: Some(self.extracted_text.clone()),
            confidence: Some(self.confidence),
        }
    }
}

/// User-editable receipt fields before validation.
///
/// Values are kept as entered so that type errors surface as field errors
/// instead of request decoding failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiptDraft {
    pub vendor: Option<String>,
    pub transaction_date: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub amount: Option<String>,
    pub items: Vec<String>,
    pub category: Option<String>,
    pub payment_method: Option<String>,
    pub currency: Option<String>,
    pub source_file: Option<String>,
    pub extracted_text: Option<String>,
    pub confidence: Option<f32>,
}

impl ReceiptDraft {
    /// Overlay every field the user filled in on top of this draft.
    pub fn apply(&mut self, edits: ReceiptDraft) {
        fn take(slot: &mut Option<String>, value: Option<String>) {
            if value.is_some() {
                *slot = value;
            }
        }

        take(&mut self.vendor, edits.vendor);
        take(&mut self.transaction_date, edits.transaction_date);
        take(&mut self.amount, edits.amount);
        take(&mut self.category, edits.category);
        take(&mut self.payment_method, edits.payment_method);
        take(&mut self.currency, edits.currency);
        take(&mut self.source_file, edits.source_file);
        take(&mut self.extracted_text, edits.extracted_text);
        if !edits.items.is_empty() {
            self.items = edits.items;
        }
        if edits.confidence.is_some() {
            self.confidence = edits.confidence;
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    }))
}

/// Spending category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Groceries,
    Restaurants,
    Utilities,
    Transportation,
    Healthcare,
    Entertainment,
    Shopping,
    Services,
    Education,
    Travel,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::Groceries,
        Category::Restaurants,
        Category::Utilities,
        Category::Transportation,
        Category::Healthcare,
        Category::Entertainment,
        Category::Shopping,
        Category::Services,
        Category::Education,
        Category::Travel,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Groceries => "groceries",
            Category::Restaurants => "restaurants",
            Category::Utilities => "utilities",
            Category::Transportation => "transportation",
            Category::Healthcare => "healthcare",
            Category::Entertainment => "entertainment",
            Category::Shopping => "shopping",
            Category::Services => "services",
            Category::Education => "education",
            Category::Travel => "travel",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category {s:?}"))
    }
}

/// ISO 4217 currency codes accepted on receipts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Currency {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
    JPY,
    CHF,
    CNY,
}

impl Currency {
    pub const ALL: [Currency; 8] = [
        Currency::USD,
        Currency::EUR,
        Currency::GBP,
        Currency::CAD,
        Currency::AUD,
        Currency::JPY,
        Currency::CHF,
        Currency::CNY,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::CAD => "CAD",
            Currency::AUD => "AUD",
            Currency::JPY => "JPY",
            Currency::CHF => "CHF",
            Currency::CNY => "CNY",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_uppercase();
        Currency::ALL
            .into_iter()
            .find(|c| c.code() == s)
            .ok_or_else(|| format!("unsupported currency {s:?}"))
    }
}
