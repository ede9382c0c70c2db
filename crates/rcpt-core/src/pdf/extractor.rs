//! PDF text-layer and embedded-image extraction using lopdf and pdf-extract.

use std::panic::{self, AssertUnwindSafe};

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, trace, warn};

use super::{PdfProcessor, Result};
use crate::error::PdfError;

/// PDF content extractor using lopdf.
#[derive(Default)]
pub struct PdfExtractor {
    document: Option<Document>,
    /// Bytes handed to pdf-extract; the decrypted copy for protected files.
    raw_data: Vec<u8>,
}

impl PdfExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a document in one step.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut extractor = Self::new();
        extractor.load(data)?;
        Ok(extractor)
    }

    fn document(&self) -> Result<&Document> {
        self.document
            .as_ref()
            .ok_or_else(|| PdfError::Parse("no document loaded".to_string()))
    }

    /// Resources of a page, following `Parent` links for inherited entries.
    fn page_resources(&self, doc: &Document, node_id: ObjectId) -> Option<Dictionary> {
        let Ok(Object::Dictionary(node)) = doc.get_object(node_id) else {
            return None;
        };

        if let Ok(resources) = node.get(b"Resources") {
            if let Ok((_, Object::Dictionary(dict))) = doc.dereference(resources) {
                return Some(dict.clone());
            }
        }

        match node.get(b"Parent") {
            Ok(Object::Reference(parent)) => self.page_resources(doc, *parent),
            _ => None,
        }
    }
}

impl PdfProcessor for PdfExtractor {
    fn load(&mut self, data: &[u8]) -> Result<()> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        if doc.is_encrypted() {
            // Owner-password-only files open with an empty user password.
            doc.decrypt("").map_err(|_| PdfError::Encrypted)?;
            let mut decrypted = Vec::new();
            doc.save_to(&mut decrypted)
                .map_err(|e| PdfError::Parse(format!("failed to save decrypted PDF: {e}")))?;
            debug!("Decrypted PDF with empty password");
            self.raw_data = decrypted;
        } else {
            self.raw_data = data.to_vec();
        }

        let pages = doc.get_pages().len();
        if pages == 0 {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", pages);
        self.document = Some(doc);
        Ok(())
    }

    fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.get_pages().len() as u32)
            .unwrap_or(0)
    }

    fn extract_text(&self) -> Result<String> {
        self.document()?;
        // pdf-extract panics on some malformed font and encoding dictionaries.
        let data = &self.raw_data;
        match panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(data))) {
            Ok(result) => result.map_err(|e| PdfError::TextExtraction(e.to_string())),
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown cause".to_string());
                warn!("pdf-extract panicked: {}", reason);
                Err(PdfError::TextExtraction(format!(
                    "text layer parser failed: {reason}"
                )))
            }
        }
    }

    fn page_images(&self, page: u32) -> Result<Vec<DynamicImage>> {
        let doc = self.document()?;
        let pages = doc.get_pages();
        let Some(page_id) = pages.get(&page) else {
            return Ok(Vec::new());
        };

        let mut images = Vec::new();
        let xobjects = self
            .page_resources(doc, *page_id)
            .and_then(|res| res.get(b"XObject").ok().cloned());

        if let Some(xobjects) = xobjects {
            if let Ok((_, Object::Dictionary(dict))) = doc.dereference(&xobjects) {
                for (name, reference) in dict.iter() {
                    let Ok((_, object)) = doc.dereference(reference) else {
                        continue;
                    };
                    match decode_image_xobject(doc, object) {
                        Some(img) => images.push(img),
                        None => trace!("Skipping XObject {}", String::from_utf8_lossy(name)),
                    }
                }
            }
        }

        debug!("Page {}: {} decodable images", page, images.len());
        Ok(images)
    }
}

/// Decode an image XObject stream.
///
/// Supports DCT (JPEG) streams and 8-bit DeviceRGB/DeviceGray samples.
fn decode_image_xobject(doc: &Document, object: &Object) -> Option<DynamicImage> {
    let Object::Stream(stream) = object else {
        return None;
    };
    let dict = &stream.dict;

    if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
        return None;
    }

    let width = u32::try_from(dict.get(b"Width").ok()?.as_i64().ok()?).ok()?;
    let height = u32::try_from(dict.get(b"Height").ok()?.as_i64().ok()?).ok()?;

    let filter = dict.get(b"Filter").ok().and_then(|f| match f {
        Object::Name(name) => Some(name.clone()),
        Object::Array(arr) => arr.last().and_then(|o| o.as_name().ok()).map(<[u8]>::to_vec),
        _ => None,
    });

    match filter.as_deref() {
        Some(b"DCTDecode") => {
            return image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg).ok();
        }
        Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
            trace!("Unsupported image filter");
            return None;
        }
        _ => {}
    }

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);
    if bits != 8 {
        return None;
    }

    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| match o {
            Object::Name(name) => Some(name.clone()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()).map(<[u8]>::to_vec),
            Object::Reference(r) => doc
                .get_object(*r)
                .ok()
                .and_then(|o| o.as_name().ok())
                .map(<[u8]>::to_vec),
            _ => None,
        })
        .unwrap_or_else(|| b"DeviceRGB".to_vec());

    let samples = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    raw_samples_to_image(&samples, width, height, &color_space)
}

fn raw_samples_to_image(
    samples: &[u8],
    width: u32,
    height: u32,
    color_space: &[u8],
) -> Option<DynamicImage> {
    let pixels = (width as usize).checked_mul(height as usize)?;

    match color_space {
        b"DeviceRGB" | b"RGB" | b"CalRGB" => {
            let len = pixels.checked_mul(3)?;
            let buf = samples.get(..len)?.to_vec();
            RgbImage::from_raw(width, height, buf).map(DynamicImage::ImageRgb8)
        }
        b"DeviceGray" | b"G" | b"CalGray" => {
            let buf = samples.get(..pixels)?.to_vec();
            GrayImage::from_raw(width, height, buf).map(DynamicImage::ImageLuma8)
        }
        other => {
            trace!("Unsupported color space {}", String::from_utf8_lossy(other));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream, dictionary};

    #[test]
    fn test_new_extractor_is_empty() {
        let extractor = PdfExtractor::new();
        assert_eq!(extractor.page_count(), 0);
        assert!(extractor.extract_text().is_err());
    }

    #[test]
    fn test_text_parser_panic_becomes_error() {
        let pdf = crate::extraction::testing::broken_font_pdf(&["TOTAL 41.20"], false);
        let extractor = PdfExtractor::from_bytes(&pdf).unwrap();
        assert_eq!(extractor.page_count(), 1);
        assert!(matches!(
            extractor.extract_text(),
            Err(PdfError::TextExtraction(_))
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            PdfExtractor::from_bytes(b"%PDF-1.4 definitely not a pdf"),
            Err(PdfError::Parse(_))
        ));
    }

    #[test]
    fn test_raw_gray_samples() {
        let img = raw_samples_to_image(&[0, 64, 128, 255], 2, 2, b"DeviceGray").unwrap();
        assert_eq!((img.width(), img.height()), (2, 2));
        assert_eq!(img.to_luma8().get_pixel(1, 1)[0], 255);
    }

    #[test]
    fn test_raw_samples_too_short() {
        assert!(raw_samples_to_image(&[0, 1, 2], 2, 2, b"DeviceRGB").is_none());
        assert!(raw_samples_to_image(&[0; 4], 2, 2, b"Indexed").is_none());
    }

    #[test]
    fn test_decode_gray_xobject() {
        let doc = Document::with_version("1.5");
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 3,
                "Height" => 1,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![10, 20, 30],
        );

        let img = decode_image_xobject(&doc, &Object::Stream(stream)).unwrap();
        assert_eq!((img.width(), img.height()), (3, 1));
    }
}
