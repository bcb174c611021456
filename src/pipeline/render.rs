//! PDF rasterisation: render pages to `DynamicImage` via pdfium.
//!
//! Every pdfium call happens inside `spawn_blocking`: the bindings are
//! synchronous and a multi-page render at OCR scale takes long enough to
//! starve a runtime worker.
//!
//! ## Two scales
//!
//! Callers pick the scale per call: the preview uses a modest factor
//! (1.4 by default) while OCR input is rendered larger (2.0) because
//! recognition accuracy depends on glyph pixel height.

use crate::document::Document;
use crate::error::ExtractionError;
use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// One rendered page.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 0-based page index.
    pub page_index: usize,
    pub image: DynamicImage,
}

/// Renders document pages to bitmaps.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Render a single page (0-based) at `scale`.
    async fn render_page(
        &self,
        document: &Document,
        page_index: usize,
        scale: f32,
    ) -> Result<PageImage, ExtractionError>;

    /// Render every page at `scale`, in page order.
    async fn render_pages(
        &self,
        document: &Document,
        scale: f32,
    ) -> Result<Vec<PageImage>, ExtractionError>;
}

/// [`Rasterizer`] backed by pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    lib_path: Option<String>,
}

impl PdfiumRasterizer {
    /// `lib_path` overrides the system pdfium library (file or directory).
    pub fn new(lib_path: Option<String>) -> Self {
        Self { lib_path }
    }
}

#[async_trait]
impl Rasterizer for PdfiumRasterizer {
    async fn render_page(
        &self,
        document: &Document,
        page_index: usize,
        scale: f32,
    ) -> Result<PageImage, ExtractionError> {
        let bytes = document.shared_bytes();
        let lib_path = self.lib_path.clone();
        let mut pages = tokio::task::spawn_blocking(move || {
            render_blocking(&bytes, lib_path.as_deref(), scale, Some(page_index))
        })
        .await
        .map_err(|e| ExtractionError::Internal(format!("Render task panicked: {e}")))??;

        pages.pop().ok_or(ExtractionError::RasterisationFailed {
            page: page_index + 1,
            detail: "page out of range".into(),
        })
    }

    async fn render_pages(
        &self,
        document: &Document,
        scale: f32,
    ) -> Result<Vec<PageImage>, ExtractionError> {
        let bytes = document.shared_bytes();
        let lib_path = self.lib_path.clone();
        tokio::task::spawn_blocking(move || render_blocking(&bytes, lib_path.as_deref(), scale, None))
            .await
            .map_err(|e| ExtractionError::Internal(format!("Render task panicked: {e}")))?
    }
}

/// Bind to pdfium: an explicit path when given, else the system library.
pub(crate) fn bind_pdfium(lib_path: Option<&str>) -> Result<Pdfium, ExtractionError> {
    let bindings = match lib_path {
        Some(path) if Path::new(path).is_dir() => Pdfium::bind_to_library(
            Pdfium::pdfium_platform_library_name_at_path(&path.to_string()),
        ),
        Some(path) => Pdfium::bind_to_library(path.to_string()),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ExtractionError::PdfiumUnavailable(format!("{e:?}")))?;

    Ok(Pdfium::new(bindings))
}

/// Open a document from memory, classifying load failures.
pub(crate) fn load_document<'a>(
    pdfium: &'a Pdfium,
    bytes: &'a [u8],
) -> Result<PdfDocument<'a>, ExtractionError> {
    pdfium.load_pdf_from_byte_slice(bytes, None).map_err(|e| {
        let detail = format!("{e:?}");
        if detail.contains("Password") || detail.contains("password") {
            ExtractionError::Encrypted
        } else {
            ExtractionError::Corrupt { detail }
        }
    })
}

/// Blocking implementation of page rendering. `only` restricts to one page.
fn render_blocking(
    bytes: &[u8],
    lib_path: Option<&str>,
    scale: f32,
    only: Option<usize>,
) -> Result<Vec<PageImage>, ExtractionError> {
    let pdfium = bind_pdfium(lib_path)?;
    let document = load_document(&pdfium, bytes)?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    if total_pages == 0 {
        return Err(ExtractionError::NoPages);
    }
    info!("PDF loaded for rendering: {} pages at scale {}", total_pages, scale);

    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
    let indices: Vec<usize> = match only {
        Some(idx) if idx < total_pages => vec![idx],
        Some(_) => Vec::new(),
        None => (0..total_pages).collect(),
    };

    let mut results = Vec::with_capacity(indices.len());
    for idx in indices {
        let page = pages
            .get(idx as u16)
            .map_err(|e| ExtractionError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{e:?}"),
            })?;

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            ExtractionError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{e:?}"),
            }
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );

        results.push(PageImage {
            page_index: idx,
            image,
        });
    }

    Ok(results)
}
