use axum::Json;
use axum::extract::State;
use chrono::Local;
use rcpt_core::analytics::{SpendingVelocity, spending_velocity, summarize};
use rcpt_core::{Analytics, DatabaseStatistics};
use serde::Serialize;

use super::{ReceiptQuery, select_receipts};
use crate::{ApiError, AppState};

/// Window used for the spending velocity figures.
pub const VELOCITY_DAYS: i64 = 30;

#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub summary: Analytics,
    pub velocity: SpendingVelocity,
    /// Whole-database figures, independent of the query.
    pub database: DatabaseStatistics,
}

pub async fn get_analytics(
    State(state): State<AppState>,
    query: ReceiptQuery,
) -> Result<Json<AnalyticsResponse>, ApiError> {
    let receipts = select_receipts(&state, &query).await?;
    let database = state
        .with_store(|store| store.database_statistics())
        .await?;

    let today = Local::now().date_naive();
    Ok(Json(AnalyticsResponse {
        summary: summarize(&receipts),
        velocity: spending_velocity(&receipts, today, VELOCITY_DAYS),
        database,
    }))
}
