//! Optical character recognition over rendered pages or uploaded images.
//!
//! The default engine shells out to the `tesseract` CLI: it is the most widely
//! packaged OCR engine and needs no native bindings at build time. Any other
//! engine (a cloud vision API, a bundled model) plugs in behind [`OcrEngine`].

use crate::error::ExtractionError;
use crate::progress::{status, OcrProgress};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, warn};

/// An encoded image ready for recognition.
#[derive(Debug, Clone)]
pub struct OcrImage {
    pub bytes: Arc<[u8]>,
    /// File extension matching the encoding, e.g. `"png"`.
    pub extension: &'static str,
}

impl OcrImage {
    pub fn png(bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into(),
            extension: "png",
        }
    }

    /// Wrap an uploaded image without re-encoding it.
    pub fn passthrough(bytes: Arc<[u8]>, media_type: &str) -> Self {
        let extension = match media_type {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            _ => "png",
        };
        Self { bytes, extension }
    }
}

/// Recognises text in a single image.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Return the trimmed recognised text, however short. Thresholds are the
    /// caller's business; see [`recognize_with_floor`].
    async fn recognize(
        &self,
        image: OcrImage,
        progress: &OcrProgress,
    ) -> Result<String, ExtractionError>;
}

/// Run recognition and fail unless at least `min_chars` characters were read.
///
/// Fewer characters means "nothing useful was read", not "little was read".
pub async fn recognize_with_floor(
    engine: &dyn OcrEngine,
    image: OcrImage,
    progress: &OcrProgress,
    min_chars: usize,
) -> Result<String, ExtractionError> {
    let text = engine.recognize(image, progress).await?;
    let found = text.trim().chars().count();
    if found < min_chars {
        return Err(ExtractionError::InsufficientText {
            found,
            required: min_chars,
        });
    }
    Ok(text.trim().to_string())
}

/// [`OcrEngine`] that runs `tesseract <image> stdout -l <lang>`.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    cmd: String,
    language: String,
}

impl TesseractOcr {
    pub fn new(cmd: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            language: language.into(),
        }
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new("tesseract", "eng")
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(
        &self,
        image: OcrImage,
        progress: &OcrProgress,
    ) -> Result<String, ExtractionError> {
        progress.report(0, status::INITIALIZING);

        // tesseract reads from a path; the temp file lives until this scope ends.
        let tmp = tempfile::Builder::new()
            .prefix("ocr-")
            .suffix(&format!(".{}", image.extension))
            .tempfile()
            .map_err(|e| ExtractionError::Internal(format!("tempfile: {e}")))?;
        tokio::fs::write(tmp.path(), &image.bytes)
            .await
            .map_err(|e| ExtractionError::Internal(format!("tempfile write: {e}")))?;

        progress.report(0, status::LOADING_ENGINE);
        let child = Command::new(&self.cmd)
            .arg(tmp.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .kill_on_drop(true)
            .output();

        progress.report(5, status::SCANNING);
        let output = child.await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ExtractionError::OcrFailed {
                    detail: format!("'{}' not found; install tesseract or set TESSERACT_CMD", self.cmd),
                }
            } else {
                ExtractionError::OcrFailed {
                    detail: format!("failed to start '{}': {e}", self.cmd),
                }
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("Tesseract failed: {}", stderr.trim());
            return Err(ExtractionError::OcrFailed {
                detail: stderr.trim().to_string(),
            });
        }

        progress.report(100, status::SCANNING);
        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!("Tesseract read {} chars", text.chars().count());
        Ok(text)
    }
}
