//! Core library for receipt processing.
//!
//! This crate provides:
//! - An ingestion gate that admits PDF and raster receipt uploads
//! - Text extraction from PDF text layers with OCR fallback
//! - Image preprocessing (perspective correction, denoising, binarization)
//! - Rule-based inference of receipt fields with per-field confidence
//! - Validation of user-reviewed drafts into storable receipts
//! - SQLite persistence, search, analytics and CSV/JSON export

pub mod analytics;
pub mod error;
pub mod export;
pub mod extraction;
pub mod ingest;
pub mod models;
pub mod ocr;
pub mod pdf;
pub mod receipt;
pub mod store;
pub mod validation;

pub use analytics::{Analytics, SearchFilters, SortKey};
pub use error::{
    ExportError, ExtractionError, FieldError, IngestError, OcrError, PdfError, RcptError, Result,
    StoreError, ValidationErrors,
};
pub use extraction::{ExtractedText, ExtractionEngine, TextSource};
pub use ingest::{FileKind, IngestLimits, UploadedFile, inspect_upload};
pub use models::config::RcptConfig;
pub use models::receipt::{Category, Currency, NewReceipt, Receipt, ReceiptDraft};
pub use ocr::{OcrBackend, OcrResult, TextBox};
#[cfg(feature = "native")]
pub use ocr::PureOcrEngine;
pub use receipt::{ExtractionResult, FieldCandidate, ReceiptParser, RuleReceiptParser};
pub use store::{CategoryStats, DatabaseStatistics, MonthlyStats, ReceiptStore, VendorStats};
pub use validation::Validator;
