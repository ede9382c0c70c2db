//! HTTP front-end for rcpt.
//!
//! One port serves the review page, a health check and a JSON API for
//! uploading, correcting, searching, summarizing and exporting receipts.

pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router, extract::State};
use rcpt_core::{
    ExtractionEngine, IngestLimits, RcptConfig, ReceiptStore, RuleReceiptParser, Validator,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ReceiptStore>,
    pub engine: ExtractionEngine,
    pub parser: RuleReceiptParser,
    pub config: Arc<RcptConfig>,
}

impl AppState {
    pub fn new(config: RcptConfig, store: ReceiptStore, engine: ExtractionEngine) -> Self {
        Self {
            store: Arc::new(store),
            engine,
            parser: RuleReceiptParser::from_config(&config.extraction),
            config: Arc::new(config),
        }
    }

    pub fn limits(&self) -> IngestLimits {
        IngestLimits {
            max_bytes: self.config.server.max_upload_bytes,
        }
    }

    /// Validator dated today.
    pub fn validator(&self) -> Validator {
        Validator::from_config(&self.config.extraction)
    }

    /// Run a store call on the blocking pool.
    pub async fn with_store<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&ReceiptStore) -> Result<T, rcpt_core::StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        Ok(tokio::task::spawn_blocking(move || f(&store)).await??)
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let body_limit = (state.config.server.max_upload_bytes + MULTIPART_OVERHEAD) as usize;

    Router::new()
        .route("/", get(serve_index))
        .route("/index.html", get(serve_index))
        .route("/health", get(health_check))
        .route("/api/receipts/extract", post(routes::receipts::extract_receipt))
        .route(
            "/api/receipts",
            get(routes::receipts::list_receipts).post(routes::receipts::create_receipt),
        )
        .route(
            "/api/receipts/{id}",
            get(routes::receipts::get_receipt)
                .put(routes::receipts::update_receipt)
                .delete(routes::receipts::delete_receipt),
        )
        .route("/api/receipts/bulk-delete", post(routes::receipts::bulk_delete))
        .route("/api/analytics", get(routes::analytics::get_analytics))
        .route("/api/export/csv", get(routes::export::export_csv))
        .route("/api/export/json", get(routes::export::export_json))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn serve_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub receipts: i64,
    pub ocr: Option<String>,
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let ocr = state.engine.ocr_name().map(str::to_string);
    match state.with_store(|store| store.count()).await {
        Ok(receipts) => Json(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            receipts,
            ocr,
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}
