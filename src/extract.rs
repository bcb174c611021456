//! Extraction orchestrator: native text first, OCR when the text layer is
//! missing or useless.
//!
//! ## State machine
//!
//! ```text
//! image ──▶ OCR (floor enforced) ─────────────────────────────▶ ocr
//!
//! pdf ──┬─▶ native text ──┬─ ≥ native_min_chars ──────────────▶ native
//!       └─▶ preview (p.1) ┘
//!                         └─ < native_min_chars / error ──▶ render all pages
//!                                                           ──▶ OCR page 1..n ─▶ ocr
//! ```
//!
//! The fallback result is returned whatever its length; `confidence_met`
//! records whether it cleared `absolute_min_chars` and the pipeline decides
//! what to do with a result that didn't.

use crate::config::ExtractionConfig;
use crate::document::{Document, ExtractionResult, MediaKind, PreviewImage, SourceStrategy};
use crate::error::ExtractionError;
use crate::pipeline::encode;
use crate::pipeline::native::{NativeExtractor, PdfiumTextExtractor};
use crate::pipeline::ocr::{recognize_with_floor, OcrEngine, OcrImage, TesseractOcr};
use crate::pipeline::render::{PdfiumRasterizer, Rasterizer};
use crate::progress::{status, OcrProgress, ProgressCallback};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Sequences the extraction strategies for one document at a time.
///
/// Holds no per-document state, so one instance serves concurrent uploads.
#[derive(Clone)]
pub struct Extractor {
    native: Arc<dyn NativeExtractor>,
    rasterizer: Arc<dyn Rasterizer>,
    ocr: Arc<dyn OcrEngine>,
    config: ExtractionConfig,
}

impl Extractor {
    pub fn new(
        native: Arc<dyn NativeExtractor>,
        rasterizer: Arc<dyn Rasterizer>,
        ocr: Arc<dyn OcrEngine>,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            native,
            rasterizer,
            ocr,
            config,
        }
    }

    /// pdfium for native text and rendering, the tesseract CLI for OCR.
    pub fn from_config(config: &ExtractionConfig) -> Self {
        let lib_path = config.pdfium_lib_path.clone();
        Self::new(
            Arc::new(PdfiumTextExtractor::new(lib_path.clone())),
            Arc::new(PdfiumRasterizer::new(lib_path)),
            Arc::new(TesseractOcr::new(
                config.tesseract_cmd.clone(),
                config.ocr_language.clone(),
            )),
            config.clone(),
        )
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract text from `document`, reporting progress to `progress`.
    ///
    /// # Errors
    /// - image input whose OCR output is below `absolute_min_chars`
    /// - PDF input whose pages can't be rendered or recognised after the
    ///   native text was rejected
    pub async fn extract(
        &self,
        document: &Document,
        progress: ProgressCallback,
    ) -> Result<ExtractionResult, ExtractionError> {
        let start = Instant::now();
        progress.on_extraction_start(document.kind());

        let result = match document.kind() {
            MediaKind::Image => self.extract_image(document, &progress).await?,
            MediaKind::Pdf => self.extract_pdf(document, &progress).await?,
        };

        info!(
            "Extraction complete: {} chars via {:?} in {}ms",
            result.char_count(),
            result.source_strategy,
            start.elapsed().as_millis()
        );
        progress.on_extraction_complete(result.source_strategy, result.char_count());
        Ok(result)
    }

    async fn extract_image(
        &self,
        document: &Document,
        progress: &ProgressCallback,
    ) -> Result<ExtractionResult, ExtractionError> {
        let sink = OcrProgress::new(Arc::clone(progress));
        let image = OcrImage::passthrough(document.shared_bytes(), document.media_type());
        let text = recognize_with_floor(
            self.ocr.as_ref(),
            image,
            &sink,
            self.config.absolute_min_chars,
        )
        .await?;

        Ok(ExtractionResult {
            text,
            confidence_met: true,
            source_strategy: SourceStrategy::Ocr,
            preview: Some(PreviewImage::new(
                document.bytes().to_vec(),
                document.media_type(),
            )),
        })
    }

    async fn extract_pdf(
        &self,
        document: &Document,
        progress: &ProgressCallback,
    ) -> Result<ExtractionResult, ExtractionError> {
        // ── Step 1: native text and preview, concurrently ────────────────────
        let (native, preview) = tokio::join!(
            self.native.extract_text(document),
            self.render_preview(document)
        );

        // ── Step 2: quality gate ─────────────────────────────────────────────
        let native_chars = match native {
            Ok(text) => {
                let text = text.trim();
                let chars = text.chars().count();
                if chars >= self.config.native_min_chars {
                    debug!("Native text accepted ({} chars)", chars);
                    return Ok(ExtractionResult {
                        text: text.to_string(),
                        confidence_met: chars >= self.config.absolute_min_chars,
                        source_strategy: SourceStrategy::Native,
                        preview,
                    });
                }
                info!(
                    "Native text too short ({} < {} chars), falling back to OCR",
                    chars, self.config.native_min_chars
                );
                Some(chars)
            }
            Err(e) => {
                info!("Native extraction failed, falling back to OCR: {}", e);
                None
            }
        };

        // ── Step 3: OCR fallback, page by page ───────────────────────────────
        progress.on_fallback(native_chars);
        progress.on_ocr_progress(0, status::PDF_FALLBACK);

        let pages = self
            .rasterizer
            .render_pages(document, self.config.ocr_scale)
            .await?;
        let total = pages.len();
        if total == 0 {
            return Err(ExtractionError::NoPages);
        }

        let mut page_texts = Vec::with_capacity(total);
        for page in pages {
            let page_num = page.page_index + 1;
            let png = encode::encode_png(&page.image).map_err(|e| {
                ExtractionError::RasterisationFailed {
                    page: page_num,
                    detail: format!("PNG encoding failed: {e}"),
                }
            })?;
            let sink = OcrProgress::for_page(Arc::clone(progress), page_num, total);
            let text = self.ocr.recognize(OcrImage::png(png), &sink).await?;
            let chars = text.chars().count();
            debug!("OCR page {}/{}: {} chars", page_num, total, chars);
            progress.on_page_complete(page_num, total, chars);
            page_texts.push(text);
        }

        let text = page_texts.join("\n\n").trim().to_string();
        let chars = text.chars().count();

        // ── Step 4: preview from the original document ───────────────────────
        let preview = match preview {
            Some(p) => Some(p),
            None => self.render_preview(document).await,
        };

        Ok(ExtractionResult {
            text,
            confidence_met: chars >= self.config.absolute_min_chars,
            source_strategy: SourceStrategy::Ocr,
            preview,
        })
    }

    /// Render page 1 at preview scale. Failure is logged, never fatal.
    async fn render_preview(&self, document: &Document) -> Option<PreviewImage> {
        let rendered = self
            .rasterizer
            .render_page(document, 0, self.config.preview_scale)
            .await
            .and_then(|page| encode::encode_preview(&page.image, 1));
        match rendered {
            Ok(preview) => Some(preview),
            Err(e) => {
                warn!("Preview generation failed: {}", e);
                None
            }
        }
    }
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
