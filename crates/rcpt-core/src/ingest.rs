//! Upload admission: size, type and content checks before any processing.

use std::fmt;
use std::path::Path;

use image::ImageFormat;
use serde::Serialize;
use tracing::debug;

use crate::error::{IngestError, RcptError};
use crate::models::config::DEFAULT_MAX_UPLOAD_BYTES;

/// Kind of document accepted by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Jpeg,
    Png,
    Tiff,
    Bmp,
}

impl FileKind {
    /// Map a file extension (without the dot, any case) to a kind.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(FileKind::Pdf),
            "jpg" | "jpeg" => Some(FileKind::Jpeg),
            "png" => Some(FileKind::Png),
            "tif" | "tiff" => Some(FileKind::Tiff),
            "bmp" => Some(FileKind::Bmp),
            _ => None,
        }
    }

    /// Map a file name to a kind by its extension.
    pub fn from_file_name(name: &str) -> Option<Self> {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn is_image(&self) -> bool {
        !matches!(self, FileKind::Pdf)
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            FileKind::Pdf => "application/pdf",
            FileKind::Jpeg => "image/jpeg",
            FileKind::Png => "image/png",
            FileKind::Tiff => "image/tiff",
            FileKind::Bmp => "image/bmp",
        }
    }

    fn image_format(&self) -> Option<ImageFormat> {
        match self {
            FileKind::Pdf => None,
            FileKind::Jpeg => Some(ImageFormat::Jpeg),
            FileKind::Png => Some(ImageFormat::Png),
            FileKind::Tiff => Some(ImageFormat::Tiff),
            FileKind::Bmp => Some(ImageFormat::Bmp),
        }
    }

    /// Whether `data` starts with this kind's signature.
    fn matches_content(&self, data: &[u8]) -> bool {
        match self.image_format() {
            None => data.starts_with(b"%PDF-"),
            Some(expected) => image::guess_format(data).map(|f| f == expected).unwrap_or(false),
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileKind::Pdf => "PDF",
            FileKind::Jpeg => "JPEG",
            FileKind::Png => "PNG",
            FileKind::Tiff => "TIFF",
            FileKind::Bmp => "BMP",
        };
        f.write_str(name)
    }
}

/// Limits enforced by the gate.
#[derive(Debug, Clone, Copy)]
pub struct IngestLimits {
    pub max_bytes: u64,
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl IngestLimits {
    /// Reject sizes over the limit without looking at content.
    pub fn check_size(&self, size: u64) -> Result<(), IngestError> {
        if size == 0 {
            return Err(IngestError::Empty);
        }
        if size > self.max_bytes {
            return Err(IngestError::TooLarge {
                size,
                limit: self.max_bytes,
            });
        }
        Ok(())
    }
}

/// An upload that passed the gate.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub kind: FileKind,
    pub data: Vec<u8>,
}

impl UploadedFile {
    /// Read a file from disk through the gate, checking its size before reading.
    pub fn from_path(path: &Path, limits: &IngestLimits) -> Result<Self, RcptError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        if FileKind::from_file_name(&file_name).is_none() {
            return Err(IngestError::UnsupportedType(extension_of(&file_name)).into());
        }
        limits.check_size(std::fs::metadata(path)?.len())?;

        let data = std::fs::read(path)?;
        Ok(inspect_upload(&file_name, data, limits)?)
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Admit or reject an upload.
///
/// Checks run cheapest first: extension, size, then leading bytes.
pub fn inspect_upload(
    file_name: &str,
    data: Vec<u8>,
    limits: &IngestLimits,
) -> Result<UploadedFile, IngestError> {
    let kind = FileKind::from_file_name(file_name)
        .ok_or_else(|| IngestError::UnsupportedType(extension_of(file_name)))?;

    limits.check_size(data.len() as u64)?;

    if !kind.matches_content(&data) {
        return Err(IngestError::ContentMismatch {
            declared: kind.to_string(),
        });
    }

    debug!("Accepted {} ({}, {} bytes)", file_name, kind, data.len());

    Ok(UploadedFile {
        file_name: file_name.to_string(),
        kind,
        data,
    })
}

fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = image::GrayImage::from_pixel(4, 4, image::Luma([255u8]));
        let mut data = Vec::new();
        img.write_to(&mut Cursor::new(&mut data), ImageFormat::Png).unwrap();
        data
    }

    #[test]
    fn test_extension_mapping() {
        assert_eq!(FileKind::from_file_name("scan.JPG"), Some(FileKind::Jpeg));
        assert_eq!(FileKind::from_file_name("scan.jpeg"), Some(FileKind::Jpeg));
        assert_eq!(FileKind::from_file_name("scan.tif"), Some(FileKind::Tiff));
        assert_eq!(FileKind::from_file_name("receipt.pdf"), Some(FileKind::Pdf));
        assert_eq!(FileKind::from_file_name("notes.txt"), None);
        assert_eq!(FileKind::from_file_name("README"), None);
    }

    #[test]
    fn test_rejects_oversized_upload() {
        let limits = IngestLimits::default();
        let mut data = b"%PDF-1.4\n".to_vec();
        data.resize(10 * 1024 * 1024 + 1, b' ');

        let err = inspect_upload("big.pdf", data, &limits).unwrap_err();
        assert_eq!(
            err,
            IngestError::TooLarge {
                size: 10 * 1024 * 1024 + 1,
                limit: 10 * 1024 * 1024
            }
        );
    }

    #[test]
    fn test_accepts_upload_at_limit() {
        let limits = IngestLimits::default();
        let mut data = b"%PDF-1.4\n".to_vec();
        data.resize(10 * 1024 * 1024, b' ');

        let file = inspect_upload("exact.pdf", data, &limits).unwrap();
        assert_eq!(file.kind, FileKind::Pdf);
    }

    #[test]
    fn test_rejects_unsupported_extension() {
        let err = inspect_upload("receipt.docx", b"PK\x03\x04".to_vec(), &IngestLimits::default())
            .unwrap_err();
        assert_eq!(err, IngestError::UnsupportedType("docx".to_string()));
    }

    #[test]
    fn test_rejects_empty_file() {
        let err = inspect_upload("empty.png", Vec::new(), &IngestLimits::default()).unwrap_err();
        assert_eq!(err, IngestError::Empty);
    }

    #[test]
    fn test_rejects_mismatched_content() {
        let err = inspect_upload("fake.png", b"%PDF-1.7".to_vec(), &IngestLimits::default())
            .unwrap_err();
        assert!(matches!(err, IngestError::ContentMismatch { .. }));
    }

    #[test]
    fn test_accepts_real_png() {
        let file = inspect_upload("photo.PNG", png_bytes(), &IngestLimits::default()).unwrap();
        assert_eq!(file.kind, FileKind::Png);
        assert!(file.kind.is_image());
        assert_eq!(file.kind.mime_type(), "image/png");
    }

    #[test]
    fn test_from_path_checks_size_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.pdf");
        std::fs::write(&path, b"%PDF-1.4 tiny").unwrap();

        let limits = IngestLimits { max_bytes: 4 };
        let err = UploadedFile::from_path(&path, &limits).unwrap_err();
        assert!(matches!(err, RcptError::Ingest(IngestError::TooLarge { .. })));
    }
}
