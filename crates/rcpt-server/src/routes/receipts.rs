//! Upload, review and CRUD endpoints.

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use rcpt_core::{
    ExtractionResult, FieldError, Receipt, ReceiptDraft, ReceiptParser, inspect_upload,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ReceiptQuery, select_receipts};
use crate::{ApiError, AppState};

/// Multipart field carrying the uploaded file.
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub result: ExtractionResult,
    /// Editable form of the result, ready to send back to `POST /api/receipts`.
    pub draft: ReceiptDraft,
    pub needs_review: Vec<&'static str>,
    pub validation_errors: Vec<FieldError>,
}

/// Run extraction and inference on one upload. Nothing is stored.
pub async fn extract_receipt(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ExtractResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FILE_FIELD) {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let data = field.bytes().await?;
            upload = Some((file_name, data.to_vec()));
            break;
        }
    }

    let (file_name, data) = upload.ok_or_else(|| {
        ApiError::BadRequest(format!("missing multipart field {FILE_FIELD:?}"))
    })?;
    let file = inspect_upload(&file_name, data, &state.limits())?;
    info!("Received {} ({} bytes)", file.file_name, file.size());

    let engine = state.engine.clone();
    let parser = state.parser.clone();
    let result = tokio::task::spawn_blocking(move || {
        engine
            .extract_text(&file)
            .map(|text| parser.parse_extracted(&text))
    })
    .await??;

    let draft = result.to_draft(&file_name);
    let validation_errors = match state.validator().validate(&draft) {
        Ok(_) => Vec::new(),
        Err(errors) => errors.errors,
    };
    let needs_review = result.fields_needing_review(state.parser.review_threshold());

    Ok(Json(ExtractResponse {
        result,
        draft,
        needs_review,
        validation_errors,
    }))
}

/// Validate a reviewed draft and store it.
pub async fn create_receipt(
    State(state): State<AppState>,
    Json(draft): Json<ReceiptDraft>,
) -> Result<impl IntoResponse, ApiError> {
    let new = state.validator().validate(&draft)?;
    let receipt = state.with_store(move |store| store.insert(new)).await?;
    info!("Saved receipt {} from {}", receipt.id, receipt.vendor);
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn list_receipts(
    State(state): State<AppState>,
    query: ReceiptQuery,
) -> Result<Json<Vec<Receipt>>, ApiError> {
    Ok(Json(select_receipts(&state, &query).await?))
}

pub async fn get_receipt(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Receipt>, ApiError> {
    Ok(Json(state.with_store(move |store| store.get(id)).await?))
}

/// Apply edits on top of the stored receipt and overwrite it.
///
/// Fields left out of the body keep their stored values.
pub async fn update_receipt(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(edits): Json<ReceiptDraft>,
) -> Result<Json<Receipt>, ApiError> {
    let existing = state.with_store(move |store| store.get(id)).await?;

    let mut draft = existing.to_draft();
    draft.apply(edits);
    let new = state.validator().validate(&draft)?;

    let receipt = state.with_store(move |store| store.update(id, new)).await?;
    info!("Updated receipt {}", id);
    Ok(Json(receipt))
}

pub async fn delete_receipt(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.with_store(move |store| store.delete(id)).await?;
    info!("Deleted receipt {}", id);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct BulkDeleteResponse {
    pub deleted: usize,
}

pub async fn bulk_delete(
    State(state): State<AppState>,
    Json(req): Json<BulkDeleteRequest>,
) -> Result<Json<BulkDeleteResponse>, ApiError> {
    if req.ids.is_empty() {
        return Err(ApiError::BadRequest("no receipt ids given".to_string()));
    }
    let deleted = state.with_store(move |store| store.bulk_delete(&req.ids)).await?;
    info!("Bulk deleted {} receipts", deleted);
    Ok(Json(BulkDeleteResponse { deleted }))
}
