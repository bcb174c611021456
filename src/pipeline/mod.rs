//! Text-extraction stages.
//!
//! Each submodule implements exactly one strategy or transformation and is
//! independently swappable behind a trait; [`crate::extract`] sequences them.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌──▶ native ──────────────────────────────┐
//! Document ──┤                                         ├──▶ ExtractionResult
//!            └──▶ render ──▶ encode ──▶ ocr (fallback) ┘
//!                (pdfium)    (PNG)     (tesseract)
//! ```
//!
//! 1. [`native`]: read the PDF text layer; runs in `spawn_blocking`
//! 2. [`render`]: rasterise pages at a caller-chosen scale
//! 3. [`encode`]: PNG-encode bitmaps for previews and OCR input
//! 4. [`ocr`]:    recognise text in one image; the slow stage

pub mod encode;
pub mod native;
pub mod ocr;
pub mod render;
