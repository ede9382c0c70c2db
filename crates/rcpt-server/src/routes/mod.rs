pub mod analytics;
pub mod export;
pub mod receipts;

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use chrono::NaiveDate;
use rcpt_core::analytics::sort;
use rcpt_core::{Category, Currency, Receipt, SearchFilters, SortKey};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::{ApiError, AppState};

/// Query string shared by listing, analytics and export.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReceiptQuery {
    pub vendor: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub amount_min: Option<Decimal>,
    pub amount_max: Option<Decimal>,
    pub category: Option<Category>,
    pub currency: Option<Currency>,
    pub min_confidence: Option<f32>,
    pub fuzzy: bool,
    pub limit: Option<usize>,
    pub sort: Option<SortKey>,
    pub ascending: bool,
}

impl ReceiptQuery {
    pub fn filters(&self) -> SearchFilters {
        SearchFilters {
            vendor: self.vendor.clone(),
            date_from: self.date_from,
            date_to: self.date_to,
            amount_min: self.amount_min,
            amount_max: self.amount_max,
            category: self.category,
            currency: self.currency,
            min_confidence: self.min_confidence,
            fuzzy: self.fuzzy,
            limit: self.limit,
        }
    }
}

/// Extracted straight from the query string so malformed parameters answer
/// with the JSON error body.
impl<S> FromRequestParts<S> for ReceiptQuery
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let Query(query) = Query::<ReceiptQuery>::from_request_parts(parts, state).await?;
            Ok(query)
        }
    }
}

/// Receipts selected by `query`, sorted when a sort key is given.
pub(crate) async fn select_receipts(
    state: &AppState,
    query: &ReceiptQuery,
) -> Result<Vec<Receipt>, ApiError> {
    let filters = query.filters();
    filters.validate()?;

    let mut receipts = state.with_store(move |store| store.search(&filters)).await?;
    if let Some(key) = query.sort {
        sort(&mut receipts, key, query.ascending);
    }
    debug!("Selected {} receipts", receipts.len());
    Ok(receipts)
}
