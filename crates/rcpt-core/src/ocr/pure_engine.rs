//! OCR backend wrapping `pure-onnx-ocr` (PaddleOCR models, no native runtime).

use std::sync::Mutex;
use std::time::Instant;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, info};

use crate::error::OcrError;
use crate::models::config::OcrConfig;

use super::{OcrBackend, OcrResult, TextBox};

/// OCR engine backed by `pure-onnx-ocr`.
pub struct PureOcrEngine {
    engine: Mutex<pure_onnx_ocr::engine::OcrEngine>,
    keep_unk: bool,
    min_box_confidence: f32,
}

impl PureOcrEngine {
    /// Load the detection and recognition models named in `config`.
    pub fn from_config(config: &OcrConfig) -> Result<Self, OcrError> {
        if !config.models_present() {
            return Err(OcrError::ModelLoad(format!(
                "model files missing in {} (expected {}, {}, {})",
                config.model_dir.display(),
                config.detection_model,
                config.recognition_model,
                config.dictionary
            )));
        }

        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&config.detection_model_path())
            .rec_model_path(&config.recognition_model_path())
            .dictionary_path(&config.dictionary_path())
            .build()
            .map_err(|e| OcrError::ModelLoad(format!("pure-onnx-ocr: {e}")))?;

        info!("Loaded OCR models from {}", config.model_dir.display());

        Ok(Self {
            engine: Mutex::new(engine),
            keep_unk: config.keep_unk,
            min_box_confidence: config.min_box_confidence,
        })
    }
}

impl OcrBackend for PureOcrEngine {
    fn name(&self) -> &str {
        "pure-onnx-ocr"
    }

    fn recognize(&self, image: &DynamicImage) -> Result<OcrResult, OcrError> {
        let start = Instant::now();
        let (width, height) = image.dimensions();

        // The detector expects three channels.
        let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
        let engine = self
            .engine
            .lock()
            .map_err(|_| OcrError::Recognition("OCR engine lock poisoned".to_string()))?;
        let regions = engine
            .run_from_image(&rgb)
            .map_err(|e| OcrError::Recognition(format!("pure-onnx-ocr: {e}")))?;

        debug!("pure-onnx-ocr returned {} text regions", regions.len());

        let boxes: Vec<TextBox> = regions
            .iter()
            .filter(|r| r.confidence >= self.min_box_confidence)
            .map(|r| TextBox {
                bbox: polygon_to_bbox(&r.bounding_box),
                text: if self.keep_unk {
                    r.text.clone()
                } else {
                    r.text.replace("[UNK]", " ")
                },
                confidence: r.confidence.clamp(0.0, 1.0),
            })
            .collect();

        let elapsed = start.elapsed().as_millis() as u64;
        info!("OCR complete: {} text boxes in {}ms", boxes.len(), elapsed);

        Ok(OcrResult::from_boxes(boxes, (width, height), elapsed))
    }
}

/// First four exterior points of the polygon as `[x1, y1, ..., x4, y4]`.
fn polygon_to_bbox(polygon: &pure_onnx_ocr::Polygon<f64>) -> [f32; 8] {
    let mut bbox = [0.0f32; 8];
    for (i, coord) in polygon.exterior().coords().take(4).enumerate() {
        bbox[i * 2] = coord.x as f32;
        bbox[i * 2 + 1] = coord.y as f32;
    }
    bbox
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_models_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = OcrConfig {
            model_dir: dir.path().to_path_buf(),
            ..OcrConfig::default()
        };

        match PureOcrEngine::from_config(&config) {
            Err(OcrError::ModelLoad(msg)) => assert!(msg.contains("det.onnx")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("engine loaded without models"),
        }
    }
}
