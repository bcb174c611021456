//! Progress-callback trait for extraction events.
//!
//! OCR is the slow part of an upload (seconds per page), so callers want
//! page-granular progress. Pass an [`Arc<dyn ExtractionProgressCallback>`] to
//! [`crate::extract::Extractor::extract`] to receive events; forward them to a
//! progress bar, a websocket, or a log line.
//!
//! # Example
//!
//! ```rust
//! use resume_review::progress::ExtractionProgressCallback;
//! use std::sync::atomic::{AtomicU8, Ordering};
//!
//! struct LastPercent(AtomicU8);
//!
//! impl ExtractionProgressCallback for LastPercent {
//!     fn on_ocr_progress(&self, percent: u8, status: &str) {
//!         self.0.store(percent, Ordering::SeqCst);
//!         eprintln!("{percent:>3}% {status}");
//!     }
//! }
//! ```

use crate::document::{MediaKind, SourceStrategy};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Status strings emitted by OCR engines.
pub mod status {
    pub const INITIALIZING: &str = "Initializing...";
    pub const LOADING_ENGINE: &str = "Loading OCR engine...";
    /// For engines that fetch language data on first use. The bundled
    /// tesseract engine reads installed traineddata and never reports it.
    pub const DOWNLOADING_MODEL: &str = "Downloading language model...";
    pub const SCANNING: &str = "Scanning text...";
    pub const PDF_FALLBACK: &str = "PDF not readable, using OCR...";
}

/// Called by the extraction orchestrator as it runs.
///
/// All methods default to no-ops so callers only override what they need.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once before any strategy runs.
    fn on_extraction_start(&self, kind: MediaKind) {
        let _ = kind;
    }

    /// Called when native PDF text was rejected and OCR fallback begins.
    ///
    /// `native_chars` is `None` when native extraction failed outright.
    fn on_fallback(&self, native_chars: Option<usize>) {
        let _ = native_chars;
    }

    /// Incremental OCR progress, `percent` in `0..=100`.
    ///
    /// During PDF fallback `status` is prefixed with `"Page i/n: "`.
    fn on_ocr_progress(&self, percent: u8, status: &str) {
        let _ = (percent, status);
    }

    /// Called after each OCR page finishes (1-indexed).
    fn on_page_complete(&self, page_num: usize, total_pages: usize, chars: usize) {
        let _ = (page_num, total_pages, chars);
    }

    /// Called once with the accepted strategy and text length.
    fn on_extraction_complete(&self, strategy: SourceStrategy, chars: usize) {
        let _ = (strategy, chars);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias for the shared callback handle.
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

/// Sink handed to an OCR engine for one recognition run.
///
/// Clamps the percentage to `0..=100` and never lets it go backwards, so a
/// caller's bar is monotonic even if the engine re-reports an earlier phase.
pub struct OcrProgress {
    inner: ProgressCallback,
    prefix: Option<String>,
    high_water: AtomicU8,
}

impl OcrProgress {
    pub fn new(inner: ProgressCallback) -> Self {
        Self {
            inner,
            prefix: None,
            high_water: AtomicU8::new(0),
        }
    }

    /// A sink whose status strings read `"Page {page_num}/{total_pages}: …"`.
    pub fn for_page(inner: ProgressCallback, page_num: usize, total_pages: usize) -> Self {
        Self {
            inner,
            prefix: Some(format!("Page {page_num}/{total_pages}: ")),
            high_water: AtomicU8::new(0),
        }
    }

    /// Report progress. Values above 100 are clamped.
    pub fn report(&self, percent: u8, status: &str) {
        let clamped = percent.min(100);
        let previous = self.high_water.fetch_max(clamped, Ordering::SeqCst);
        let effective = previous.max(clamped);
        match &self.prefix {
            Some(prefix) => self
                .inner
                .on_ocr_progress(effective, &format!("{prefix}{status}")),
            None => self.inner.on_ocr_progress(effective, status),
        }
    }
}
