//! OCR pipeline: preprocessing plus a pluggable recognition backend.

mod preprocessing;
#[cfg(feature = "native")]
mod pure_engine;

pub use preprocessing::{ImagePreprocessor, Quad};
#[cfg(feature = "native")]
pub use pure_engine::PureOcrEngine;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::OcrError;

/// Text recognition engine.
///
/// Implementations receive an already preprocessed image.
pub trait OcrBackend: Send + Sync {
    /// Short engine name for logs and metadata.
    fn name(&self) -> &str;

    /// Detect and recognize text on an image.
    fn recognize(&self, image: &DynamicImage) -> Result<OcrResult, OcrError>;
}

/// A recognized text box with its coordinates and content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBox {
    /// Quadrilateral corners (x1, y1, x2, y2, x3, y3, x4, y4).
    pub bbox: [f32; 8],

    /// Recognized text content.
    pub text: String,

    /// Recognition confidence (0.0 - 1.0).
    pub confidence: f32,
}

impl TextBox {
    /// Get the axis-aligned bounding rectangle (min_x, min_y, max_x, max_y).
    pub fn rect(&self) -> (f32, f32, f32, f32) {
        let xs = [self.bbox[0], self.bbox[2], self.bbox[4], self.bbox[6]];
        let ys = [self.bbox[1], self.bbox[3], self.bbox[5], self.bbox[7]];

        let min_x = xs.iter().copied().fold(f32::INFINITY, f32::min);
        let max_x = xs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let min_y = ys.iter().copied().fold(f32::INFINITY, f32::min);
        let max_y = ys.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        (min_x, min_y, max_x, max_y)
    }

    fn height(&self) -> f32 {
        let (_, min_y, _, max_y) = self.rect();
        max_y - min_y
    }
}

/// Result of OCR processing on an image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrResult {
    /// Recognized text boxes in reading order.
    pub boxes: Vec<TextBox>,

    /// Full text, one line per visual row.
    pub text: String,

    /// Processing time in milliseconds.
    pub processing_time_ms: u64,

    /// Image dimensions (width, height).
    pub image_size: (u32, u32),
}

impl OcrResult {
    /// Build a result from unordered boxes.
    pub fn from_boxes(boxes: Vec<TextBox>, image_size: (u32, u32), processing_time_ms: u64) -> Self {
        let mut result = Self {
            boxes,
            text: String::new(),
            processing_time_ms,
            image_size,
        };
        result.sort_by_reading_order();
        result
    }

    /// Mean box confidence, 0.0 when nothing was recognized.
    pub fn mean_confidence(&self) -> f32 {
        if self.boxes.is_empty() {
            return 0.0;
        }
        self.boxes.iter().map(|b| b.confidence).sum::<f32>() / self.boxes.len() as f32
    }

    /// Sort boxes top-to-bottom, left-to-right and rebuild `text`.
    ///
    /// Boxes whose vertical centers lie within half a median box height
    /// share a row and are joined with spaces, so `Total   12.50` printed
    /// on one receipt line stays on one text line.
    pub fn sort_by_reading_order(&mut self) {
        let center = |b: &TextBox| {
            let (_, min_y, _, max_y) = b.rect();
            (min_y + max_y) / 2.0
        };

        self.boxes
            .sort_by(|a, b| center(a).partial_cmp(&center(b)).unwrap_or(std::cmp::Ordering::Equal));

        let mut heights: Vec<f32> = self.boxes.iter().map(TextBox::height).collect();
        heights.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let tolerance = heights.get(heights.len() / 2).copied().unwrap_or(0.0).max(1.0) / 2.0;

        let mut rows: Vec<Vec<TextBox>> = Vec::new();
        for text_box in self.boxes.drain(..) {
            match rows.last_mut() {
                Some(row) if (center(&text_box) - center(&row[0])).abs() <= tolerance => {
                    row.push(text_box)
                }
                _ => rows.push(vec![text_box]),
            }
        }

        let mut lines = Vec::with_capacity(rows.len());
        for mut row in rows {
            row.sort_by(|a, b| a.rect().0.partial_cmp(&b.rect().0).unwrap_or(std::cmp::Ordering::Equal));
            lines.push(
                row.iter()
                    .map(|b| b.text.trim())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join(" "),
            );
            self.boxes.extend(row);
        }

        self.text = lines
            .into_iter()
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text_box(text: &str, x: f32, y: f32, w: f32, h: f32, confidence: f32) -> TextBox {
        TextBox {
            bbox: [x, y, x + w, y, x + w, y + h, x, y + h],
            text: text.to_string(),
            confidence,
        }
    }

    #[test]
    fn test_reading_order_joins_rows() {
        let result = OcrResult::from_boxes(
            vec![
                text_box("12.50", 200.0, 52.0, 60.0, 20.0, 0.9),
                text_box("CORNER CAFE", 10.0, 10.0, 150.0, 20.0, 0.8),
                text_box("TOTAL", 10.0, 50.0, 60.0, 20.0, 0.7),
            ],
            (300, 100),
            5,
        );

        assert_eq!(result.text, "CORNER CAFE\nTOTAL 12.50");
        assert_eq!(result.boxes[1].text, "TOTAL");
        assert_eq!(result.boxes[2].text, "12.50");
    }

    #[test]
    fn test_mean_confidence() {
        assert_eq!(OcrResult::default().mean_confidence(), 0.0);

        let result = OcrResult::from_boxes(
            vec![
                text_box("A", 0.0, 0.0, 10.0, 10.0, 0.5),
                text_box("B", 0.0, 40.0, 10.0, 10.0, 1.0),
            ],
            (10, 50),
            0,
        );
        assert!((result.mean_confidence() - 0.75).abs() < 1e-6);
    }
}
