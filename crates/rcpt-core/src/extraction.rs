//! Turn an admitted upload into text: PDF text layer first, OCR as fallback.

use std::sync::Arc;
use std::time::Instant;

use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::ExtractionError;
use crate::ingest::{FileKind, UploadedFile};
use crate::models::config::{PdfConfig, RcptConfig};
use crate::ocr::{ImagePreprocessor, OcrBackend};
use crate::pdf::{PdfExtractor, PdfProcessor, PdfType};

/// Where the extracted text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    /// Embedded PDF text, no OCR.
    PdfTextLayer,
    /// OCR of the images embedded in a PDF.
    PdfOcr,
    /// OCR of an uploaded photo or scan.
    ImageOcr,
}

/// Text pulled out of one document.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedText {
    pub text: String,
    pub source: TextSource,
    /// Text-level confidence (0.0 - 1.0); 1.0 for a PDF text layer.
    pub confidence: f32,
    pub processing_time_ms: u64,
    pub warnings: Vec<String>,
}

/// Text extraction engine.
#[derive(Clone)]
pub struct ExtractionEngine {
    ocr: Option<Arc<dyn OcrBackend>>,
    preprocessor: ImagePreprocessor,
    pdf: PdfConfig,
}

impl ExtractionEngine {
    /// Engine without OCR; only PDFs with a usable text layer succeed.
    pub fn new(config: &RcptConfig) -> Self {
        Self {
            ocr: None,
            preprocessor: ImagePreprocessor::from_config(&config.ocr),
            pdf: config.pdf.clone(),
        }
    }

    /// Engine with the native OCR backend when its models can be loaded.
    #[cfg(feature = "native")]
    pub fn from_config(config: &RcptConfig) -> Self {
        let engine = Self::new(config);
        match crate::ocr::PureOcrEngine::from_config(&config.ocr) {
            Ok(backend) => engine.with_ocr(Arc::new(backend)),
            Err(e) => {
                warn!("OCR disabled: {}", e);
                engine
            }
        }
    }

    /// Use `backend` for OCR.
    pub fn with_ocr(mut self, backend: Arc<dyn OcrBackend>) -> Self {
        self.ocr = Some(backend);
        self
    }

    /// Replace the image preprocessor.
    pub fn with_preprocessor(mut self, preprocessor: ImagePreprocessor) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    pub fn has_ocr(&self) -> bool {
        self.ocr.is_some()
    }

    /// Name of the OCR backend, if any.
    pub fn ocr_name(&self) -> Option<&str> {
        self.ocr.as_deref().map(|b| b.name())
    }

    /// Extract text from an admitted upload.
    pub fn extract_text(&self, file: &UploadedFile) -> Result<ExtractedText, ExtractionError> {
        let start = Instant::now();
        info!("Extracting text from {} ({})", file.file_name, file.kind);

        let mut extracted = match file.kind {
            FileKind::Pdf => self.extract_pdf(file)?,
            _ => self.extract_image(file)?,
        };

        extracted.processing_time_ms = start.elapsed().as_millis() as u64;
        info!(
            "Extracted {} chars from {} via {:?} in {}ms",
            extracted.text.chars().count(),
            file.file_name,
            extracted.source,
            extracted.processing_time_ms
        );
        Ok(extracted)
    }

    fn extract_pdf(&self, file: &UploadedFile) -> Result<ExtractedText, ExtractionError> {
        let pdf = PdfExtractor::from_bytes(&file.data)?;
        let mut warnings = Vec::new();

        let layer = match pdf.extract_text() {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!("Text layer unreadable in {}: {}", file.file_name, e);
                warnings.push(format!("PDF text layer could not be read: {e}"));
                String::new()
            }
        };

        let layer_len = layer.chars().count();
        if layer_len >= self.pdf.min_text_length {
            debug!("Using PDF text layer ({} chars)", layer_len);
            return Ok(ExtractedText {
                text: layer,
                source: TextSource::PdfTextLayer,
                confidence: 1.0,
                processing_time_ms: 0,
                warnings,
            });
        }

        info!(
            "PDF text layer has {} chars (< {}), falling back to OCR",
            layer_len, self.pdf.min_text_length
        );

        let Some(ocr) = self.ocr.as_deref() else {
            if layer.is_empty() {
                return Err(ExtractionError::OcrUnavailable(format!(
                    "{} has no text layer and needs OCR",
                    file.file_name
                )));
            }
            warnings.push("OCR unavailable, using short PDF text layer".to_string());
            return Ok(ExtractedText {
                text: layer,
                source: TextSource::PdfTextLayer,
                confidence: 0.5,
                processing_time_ms: 0,
                warnings,
            });
        };

        let page_limit = match self.pdf.max_pages {
            0 => pdf.page_count(),
            n => pdf.page_count().min(n as u32),
        };

        let mut images = Vec::new();
        for page in 1..=page_limit {
            match pdf.page_images(page) {
                Ok(found) => images.extend(found),
                Err(e) => warnings.push(format!("page {page}: {e}")),
            }
        }
        debug!(
            "PDF {:?}: {} images on {} pages",
            PdfType::classify(layer_len, self.pdf.min_text_length, images.len()),
            images.len(),
            page_limit
        );

        let mut texts = Vec::new();
        let mut confidences = Vec::new();
        for (i, image) in images.iter().enumerate() {
            match self.ocr_image(ocr, image) {
                Ok((text, confidence)) if !text.trim().is_empty() => {
                    texts.push(text);
                    confidences.push(confidence);
                }
                Ok(_) => debug!("No text on embedded image {}", i + 1),
                Err(e) => {
                    warn!("OCR failed on embedded image {}: {}", i + 1, e);
                    warnings.push(format!("OCR failed on embedded image {}: {e}", i + 1));
                }
            }
        }

        let ocr_text = texts.join("\n\n");
        if ocr_text.trim().chars().count() > layer_len {
            let confidence = confidences.iter().sum::<f32>() / confidences.len().max(1) as f32;
            return Ok(ExtractedText {
                text: ocr_text,
                source: TextSource::PdfOcr,
                confidence,
                processing_time_ms: 0,
                warnings,
            });
        }

        if !layer.is_empty() {
            warnings.push("OCR found no additional text, using short PDF text layer".to_string());
            return Ok(ExtractedText {
                text: layer,
                source: TextSource::PdfTextLayer,
                confidence: 0.5,
                processing_time_ms: 0,
                warnings,
            });
        }

        Err(ExtractionError::NoText(file.file_name.clone()))
    }

    fn extract_image(&self, file: &UploadedFile) -> Result<ExtractedText, ExtractionError> {
        let image =
            image::load_from_memory(&file.data).map_err(|e| ExtractionError::Decode(e.to_string()))?;

        let ocr = self.ocr.as_deref().ok_or_else(|| {
            ExtractionError::OcrUnavailable(format!("{} is an image and needs OCR", file.file_name))
        })?;

        let (text, confidence) = self.ocr_image(ocr, &image)?;
        if text.trim().is_empty() {
            return Err(ExtractionError::NoText(file.file_name.clone()));
        }

        Ok(ExtractedText {
            text,
            source: TextSource::ImageOcr,
            confidence,
            processing_time_ms: 0,
            warnings: Vec::new(),
        })
    }

    fn ocr_image(
        &self,
        ocr: &dyn OcrBackend,
        image: &DynamicImage,
    ) -> Result<(String, f32), ExtractionError> {
        let prepared = self.preprocessor.prepare(image)?;
        let result = ocr.recognize(&prepared)?;
        debug!(
            "{} recognized {} boxes in {}ms",
            ocr.name(),
            result.boxes.len(),
            result.processing_time_ms
        );
        let confidence = result.mean_confidence();
        Ok((result.text, confidence))
    }
}
