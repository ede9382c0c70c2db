//! File downloads of the filtered record set.

use axum::extract::State;
use axum::http::{HeaderValue, header};
use axum::response::Response;
use rcpt_core::export::{to_csv, to_json};

use super::{ReceiptQuery, select_receipts};
use crate::{ApiError, AppState};

fn attachment(body: String, content_type: &'static str, filename: &'static str) -> Response {
    let mut resp = Response::new(body.into());
    let headers = resp.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::CONTENT_DISPOSITION, HeaderValue::from_static(filename));
    resp
}

pub async fn export_csv(
    State(state): State<AppState>,
    query: ReceiptQuery,
) -> Result<Response, ApiError> {
    let receipts = select_receipts(&state, &query).await?;
    Ok(attachment(
        to_csv(&receipts)?,
        "text/csv; charset=utf-8",
        "attachment; filename=receipts.csv",
    ))
}

pub async fn export_json(
    State(state): State<AppState>,
    query: ReceiptQuery,
) -> Result<Response, ApiError> {
    let receipts = select_receipts(&state, &query).await?;
    Ok(attachment(
        to_json(&receipts)?,
        "application/json",
        "attachment; filename=receipts.json",
    ))
}
