//! Input documents and extraction results.
//!
//! A [`Document`] is an immutable byte blob plus its media kind. It is cheap to
//! clone (`Arc<[u8]>`) so the orchestrator can hand the same bytes to
//! concurrent read-only passes (native text + preview render) without copying.

use crate::config::InputLimits;
use crate::error::ValidationError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

const PDF_MIME: &str = "application/pdf";
const IMAGE_MIMES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/webp"];

/// Declared kind of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Pdf,
    Image,
}

/// An uploaded document. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct Document {
    bytes: Arc<[u8]>,
    kind: MediaKind,
    media_type: String,
}

impl Document {
    /// Build a document from raw bytes and a declared media type, applying the
    /// upload checks (allowed type, non-empty, size cap).
    pub fn from_upload(
        bytes: impl Into<Arc<[u8]>>,
        media_type: &str,
        limits: &InputLimits,
    ) -> Result<Self, ValidationError> {
        let bytes = bytes.into();
        let media_type = media_type.trim().to_ascii_lowercase();
        let kind = kind_for_media_type(&media_type).ok_or_else(|| {
            ValidationError::UnsupportedType {
                media_type: media_type.clone(),
            }
        })?;

        if bytes.is_empty() {
            return Err(ValidationError::EmptyFile);
        }
        if bytes.len() as u64 > limits.max_file_bytes {
            return Err(ValidationError::FileTooLarge {
                max_mb: limits.max_file_bytes / (1024 * 1024),
            });
        }

        Ok(Self {
            bytes,
            kind,
            media_type,
        })
    }

    /// Read a document from disk, sniffing its media type from magic bytes
    /// and falling back to the file extension.
    pub async fn from_path(path: &Path, limits: &InputLimits) -> Result<Self, std::io::Error> {
        let bytes = tokio::fs::read(path).await?;
        let media_type = sniff_media_type(&bytes)
            .or_else(|| media_type_for_extension(path))
            .unwrap_or("application/octet-stream");
        Self::from_upload(bytes, media_type, limits)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the bytes, for moving into blocking tasks.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

fn kind_for_media_type(media_type: &str) -> Option<MediaKind> {
    if media_type == PDF_MIME {
        Some(MediaKind::Pdf)
    } else if IMAGE_MIMES.contains(&media_type) {
        Some(MediaKind::Image)
    } else {
        None
    }
}

/// Identify a supported media type from leading magic bytes.
pub fn sniff_media_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"%PDF") {
        Some(PDF_MIME)
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

fn media_type_for_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(PDF_MIME),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// A rendered preview of the document's first page (or the image itself).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewImage {
    pub media_type: String,
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl PreviewImage {
    pub fn new(data: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            data,
        }
    }

    /// `data:<mime>;base64,<payload>` URL, suitable for `<img src>`.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, STANDARD.encode(&self.data))
    }
}

/// Which strategy produced the accepted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStrategy {
    Native,
    Ocr,
}

/// Outcome of one extraction run.
///
/// `text` is always trimmed. `confidence_met` is true only when `text` reaches
/// the threshold that applies to `source`; the pipeline refuses results where
/// it is false.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub text: String,
    pub confidence_met: bool,
    pub source_strategy: SourceStrategy,
    #[serde(skip)]
    pub preview: Option<PreviewImage>,
}

impl ExtractionResult {
    /// Character count of the (already trimmed) text.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}
