//! Configuration structures for the receipt pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::models::receipt::Currency;

/// Environment variable overriding the database path.
pub const ENV_DATABASE_PATH: &str = "RCPT_DATABASE_PATH";
/// Environment variable overriding the OCR model directory.
pub const ENV_OCR_MODEL_DIR: &str = "RCPT_OCR_MODEL_DIR";
/// Environment variable overriding the log level.
pub const ENV_LOG_LEVEL: &str = "RCPT_LOG_LEVEL";
/// Environment variable overriding the HTTP port.
pub const ENV_PORT: &str = "PORT";

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8501;

/// Default upload limit: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Main configuration for the rcpt pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RcptConfig {
    /// HTTP server configuration.
    pub server: ServerConfig,

    /// Receipt database configuration.
    pub database: DatabaseConfig,

    /// OCR engine configuration.
    pub ocr: OcrConfig,

    /// PDF processing configuration.
    pub pdf: PdfConfig,

    /// Field inference and validation configuration.
    pub extraction: ExtractionConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,

    /// Listen port (1 - 65535).
    pub port: u16,

    /// Largest accepted upload in bytes.
    pub max_upload_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Receipt database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("receipts.db"),
        }
    }
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Directory containing the OCR model files.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,

    /// Maximum image dimension (longer side) for processing.
    pub max_image_size: u32,

    /// Drop recognized boxes below this confidence (0.0 - 1.0).
    pub min_box_confidence: f32,

    /// Keep `[UNK]` markers emitted for unknown glyphs.
    pub keep_unk: bool,

    /// Attempt perspective correction of photographed receipts.
    pub perspective_correction: bool,

    /// Apply median denoising before binarization.
    pub denoise: bool,

    /// Adaptive threshold window (odd, in pixels).
    pub threshold_block_size: u32,

    /// Constant subtracted from the local mean.
    pub threshold_offset: i32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "latin_rec.onnx".to_string(),
            dictionary: "latin_dict.txt".to_string(),
            max_image_size: 2048,
            min_box_confidence: 0.0,
            keep_unk: false,
            perspective_correction: true,
            denoise: true,
            threshold_block_size: 11,
            threshold_offset: 2,
        }
    }
}

impl OcrConfig {
    pub fn detection_model_path(&self) -> PathBuf {
        self.model_dir.join(&self.detection_model)
    }

    pub fn recognition_model_path(&self) -> PathBuf {
        self.model_dir.join(&self.recognition_model)
    }

    pub fn dictionary_path(&self) -> PathBuf {
        self.model_dir.join(&self.dictionary)
    }

    /// Whether every model file is present on disk.
    pub fn models_present(&self) -> bool {
        self.detection_model_path().exists()
            && self.recognition_model_path().exists()
            && self.dictionary_path().exists()
    }
}

/// PDF processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Maximum pages to OCR when the text layer is missing (0 = unlimited).
    pub max_pages: usize,

    /// Minimum text-layer length before falling back to OCR.
    pub min_text_length: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            max_pages: 10,
            min_text_length: 50,
        }
    }
}

/// Field inference and validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Fields below this confidence are flagged for manual review.
    pub review_threshold: f32,

    /// Currency assumed when none is detected.
    pub default_currency: Currency,

    /// Oldest accepted transaction date, in years before today.
    pub max_age_years: u32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            review_threshold: 0.6,
            default_currency: Currency::USD,
            max_age_years: 10,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `rcpt_core=debug`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl RcptConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }

    /// Load from `path` if given, else defaults, then apply the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, std::io::Error> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Override settings from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Override settings from an arbitrary variable lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DATABASE_PATH).filter(|v| !v.trim().is_empty()) {
            self.database.path = PathBuf::from(path);
        }

        if let Some(dir) = lookup(ENV_OCR_MODEL_DIR).filter(|v| !v.trim().is_empty()) {
            self.ocr.model_dir = PathBuf::from(dir);
        }

        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|v| !v.trim().is_empty()) {
            self.logging.level = level.trim().to_string();
        }

        if let Some(raw) = lookup(ENV_PORT) {
            match parse_port(&raw) {
                Some(port) => self.server.port = port,
                None => warn!(
                    "Ignoring invalid {} value {:?}, keeping port {}",
                    ENV_PORT, raw, self.server.port
                ),
            }
        }
    }
}

/// Parse a TCP port in 1..=65535.
pub fn parse_port(raw: &str) -> Option<u16> {
    match raw.trim().parse::<u16>() {
        Ok(0) | Err(_) => None,
        Ok(port) => Some(port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RcptConfig::default();
        assert_eq!(config.server.port, 8501);
        assert_eq!(config.server.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.pdf.min_text_length, 50);
        assert_eq!(config.extraction.default_currency, Currency::USD);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RcptConfig::default();
        config.apply_env_from(env(&[
            (ENV_DATABASE_PATH, "/data/receipts.db"),
            (ENV_OCR_MODEL_DIR, "/opt/ocr"),
            (ENV_LOG_LEVEL, "debug"),
            (ENV_PORT, "9000"),
        ]));

        assert_eq!(config.database.path, PathBuf::from("/data/receipts.db"));
        assert_eq!(config.ocr.model_dir, PathBuf::from("/opt/ocr"));
        assert_eq!(config.ocr.detection_model_path(), PathBuf::from("/opt/ocr/det.onnx"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_invalid_port_keeps_default() {
        for raw in ["0", "70000", "http", ""] {
            let mut config = RcptConfig::default();
            config.apply_env_from(env(&[(ENV_PORT, raw)]));
            assert_eq!(config.server.port, DEFAULT_PORT, "port {raw:?}");
        }
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: RcptConfig =
            serde_json::from_str(r#"{"server": {"port": 8080}, "pdf": {"min_text_length": 10}}"#)
                .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.pdf.min_text_length, 10);
        assert_eq!(config.pdf.max_pages, 10);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = RcptConfig::default();
        config.database.path = PathBuf::from("other.db");
        config.save(&path).unwrap();

        let loaded = RcptConfig::from_file(&path).unwrap();
        assert_eq!(loaded.database.path, PathBuf::from("other.db"));
    }
}
