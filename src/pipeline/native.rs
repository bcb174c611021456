//! Native text extraction: read the text layer pdfium already decoded.
//!
//! Each page yields positioned text segments; segments on a page are joined
//! with single spaces and pages are separated by a blank line. No layout
//! reconstruction happens here; the model only needs the words.

use crate::document::Document;
use crate::error::ExtractionError;
use crate::pipeline::render::{bind_pdfium, load_document};
use async_trait::async_trait;
use tracing::debug;

/// Pulls already-encoded text out of a document without rendering pixels.
#[async_trait]
pub trait NativeExtractor: Send + Sync {
    /// Extract the whole document's text. May return an empty string for
    /// image-only documents; fails on zero pages or undecodable input.
    async fn extract_text(&self, document: &Document) -> Result<String, ExtractionError>;
}

/// [`NativeExtractor`] backed by pdfium's text API.
#[derive(Debug, Clone, Default)]
pub struct PdfiumTextExtractor {
    lib_path: Option<String>,
}

impl PdfiumTextExtractor {
    pub fn new(lib_path: Option<String>) -> Self {
        Self { lib_path }
    }
}

#[async_trait]
impl NativeExtractor for PdfiumTextExtractor {
    async fn extract_text(&self, document: &Document) -> Result<String, ExtractionError> {
        let bytes = document.shared_bytes();
        let lib_path = self.lib_path.clone();
        tokio::task::spawn_blocking(move || extract_blocking(&bytes, lib_path.as_deref()))
            .await
            .map_err(|e| ExtractionError::Internal(format!("Text task panicked: {e}")))?
    }
}

fn extract_blocking(bytes: &[u8], lib_path: Option<&str>) -> Result<String, ExtractionError> {
    let pdfium = bind_pdfium(lib_path)?;
    let document = load_document(&pdfium, bytes)?;

    let pages = document.pages();
    if pages.len() == 0 {
        return Err(ExtractionError::NoPages);
    }

    let mut page_runs = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let text = page.text().map_err(|e| ExtractionError::NativeFailed {
            detail: format!("page {}: {e:?}", idx + 1),
        })?;
        let runs: Vec<String> = text.segments().iter().map(|s| s.text()).collect();
        debug!("Page {}: {} text runs", idx + 1, runs.len());
        page_runs.push(runs);
    }

    Ok(join_page_runs(&page_runs))
}

/// Join runs within a page with single spaces and pages with a blank line,
/// then trim. Empty runs are dropped so they don't produce double spaces.
pub fn join_page_runs<S: AsRef<str>>(pages: &[Vec<S>]) -> String {
    pages
        .iter()
        .map(|runs| {
            runs.iter()
                .map(AsRef::as_ref)
                .filter(|r| !r.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_runs_and_pages() {
        let pages = vec![
            vec!["Jane", "Doe", "", "Engineer"],
            vec!["Experience:", "Rust"],
        ];
        assert_eq!(
            join_page_runs(&pages),
            "Jane Doe Engineer\n\nExperience: Rust"
        );
    }

    #[test]
    fn image_only_document_yields_empty_text() {
        let pages: Vec<Vec<&str>> = vec![vec![], vec![]];
        assert_eq!(join_page_runs(&pages), "");
    }

    #[test]
    fn result_is_trimmed() {
        let pages = vec![vec!["  1  "]];
        assert_eq!(join_page_runs(&pages), "1");
    }
}
