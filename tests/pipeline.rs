//! End-to-end pipeline tests with in-process fakes at every I/O seam.
//!
//! Nothing here needs pdfium, tesseract or network access.

use async_trait::async_trait;
use image::{DynamicImage, Rgba, RgbaImage};
use resume_review::pipeline::native::NativeExtractor;
use resume_review::pipeline::ocr::{OcrEngine, OcrImage};
use resume_review::pipeline::render::{PageImage, Rasterizer};
use resume_review::progress::OcrProgress;
use resume_review::{
    AnalyzeRequest, ChatMessage, ChatModel, ChatOptions, Document, ExtractionError, Extractor, InputLimits,
    MemoryResumeStore, ModelError, NoopProgressCallback, PreviewImage, ProgressCallback,
    RateLimiter, ResumeStore, ReviewConfig, ReviewError, ReviewPipeline, SourceStrategy,
    UploadSession,
};
use resume_review::error::StoreError;
use resume_review::store::StoredDocument;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

// ── Fakes ────────────────────────────────────────────────────────────────────

struct FixedText(String);

#[async_trait]
impl NativeExtractor for FixedText {
    async fn extract_text(&self, _document: &Document) -> Result<String, ExtractionError> {
        Ok(self.0.clone())
    }
}

struct BlankPages(usize);

fn blank() -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255])))
}

#[async_trait]
impl Rasterizer for BlankPages {
    async fn render_page(
        &self,
        _document: &Document,
        page_index: usize,
        _scale: f32,
    ) -> Result<PageImage, ExtractionError> {
        Ok(PageImage {
            page_index,
            image: blank(),
        })
    }

    async fn render_pages(
        &self,
        _document: &Document,
        _scale: f32,
    ) -> Result<Vec<PageImage>, ExtractionError> {
        Ok((0..self.0)
            .map(|page_index| PageImage {
                page_index,
                image: blank(),
            })
            .collect())
    }
}

/// Returns "page N text ..." for the Nth call.
#[derive(Default)]
struct CountingOcr {
    calls: AtomicUsize,
}

#[async_trait]
impl OcrEngine for CountingOcr {
    async fn recognize(
        &self,
        image: OcrImage,
        progress: &OcrProgress,
    ) -> Result<String, ExtractionError> {
        assert_eq!(image.extension, "png");
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        progress.report(100, "Scanning text...");
        Ok(format!("page {n} text from the scanned resume"))
    }
}

/// Reads the same text from every page.
struct FixedOcr(&'static str);

#[async_trait]
impl OcrEngine for FixedOcr {
    async fn recognize(
        &self,
        _image: OcrImage,
        _progress: &OcrProgress,
    ) -> Result<String, ExtractionError> {
        Ok(self.0.to_string())
    }
}

/// Memory store whose first `put_document` holds after writing until `release`
/// fires.
#[derive(Default)]
struct GateStore {
    inner: MemoryResumeStore,
    entered: AtomicBool,
    release: Notify,
}

#[async_trait]
impl ResumeStore for GateStore {
    async fn put_document(&self, document: &Document) -> Result<String, StoreError> {
        let id = self.inner.put_document(document).await?;
        if !self.entered.swap(true, Ordering::SeqCst) {
            self.release.notified().await;
        }
        Ok(id)
    }

    async fn get_document(&self, id: &str) -> Result<Option<StoredDocument>, StoreError> {
        self.inner.get_document(id).await
    }

    async fn delete_document(&self, id: &str) -> Result<(), StoreError> {
        self.inner.delete_document(id).await
    }

    async fn put_preview(&self, id: &str, preview: &PreviewImage) -> Result<(), StoreError> {
        self.inner.put_preview(id, preview).await
    }

    async fn get_preview(&self, id: &str) -> Result<Option<PreviewImage>, StoreError> {
        self.inner.get_preview(id).await
    }

    async fn delete_preview(&self, id: &str) -> Result<(), StoreError> {
        self.inner.delete_preview(id).await
    }
}

/// Records prompts. The first call optionally blocks until `gate` fires.
struct RecordingModel {
    reply: String,
    prompts: Mutex<Vec<String>>,
    gate_first: bool,
    gate: Notify,
}

impl RecordingModel {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
            gate_first: false,
            gate: Notify::new(),
        })
    }

    fn gated(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
            gate_first: true,
            gate: Notify::new(),
        })
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for RecordingModel {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        _options: &ChatOptions,
    ) -> Result<String, ModelError> {
        let first = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(messages[1].content.clone());
            prompts.len() == 1
        };
        if first && self.gate_first {
            self.gate.notified().await;
        }
        Ok(self.reply.clone())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

const CARD: &str = r#"{"overallScore": 81, "ATS": {"score": 75, "tips": [{"type": "good", "tip": "Clear headings"}]}, "skills": {"score": 88, "tips": []}}"#;

fn build(
    native: &str,
    pages: usize,
    ocr: Arc<dyn OcrEngine>,
    model: Arc<RecordingModel>,
) -> ReviewPipeline {
    let config = ReviewConfig::builder()
        .rate_limit(10, Duration::from_secs(60))
        .build()
        .unwrap();
    let extractor = Extractor::new(
        Arc::new(FixedText(native.to_string())),
        Arc::new(BlankPages(pages)),
        ocr,
        config.extraction.clone(),
    );
    let limiter = RateLimiter::in_memory(config.rate_limit.clone());
    ReviewPipeline::new(config, limiter, extractor, model)
}

fn pdf() -> Document {
    Document::from_upload(
        b"%PDF-1.7 fake".to_vec(),
        "application/pdf",
        &InputLimits::default(),
    )
    .unwrap()
}

/// `RUST_LOG=resume_review=debug cargo test` shows the pipeline's logs.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn noop() -> ProgressCallback {
    Arc::new(NoopProgressCallback)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn text_pdf_skips_ocr() {
    init_tracing();
    let native = "Jane Doe. Senior backend engineer with eight years of Rust and Go.";
    assert!(native.chars().count() >= 50);

    let ocr = Arc::new(CountingOcr::default());
    let model = RecordingModel::new(CARD);
    let pipeline = build(native, 2, ocr.clone(), model.clone());

    let review = pipeline
        .review_document("203.0.113.9", &pdf(), Some("Platform Engineer"), None, noop())
        .await
        .unwrap();

    assert_eq!(review.extraction.source_strategy, SourceStrategy::Native);
    assert!(review.extraction.preview.is_some());
    assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
    assert_eq!(model.calls(), 1);
    assert_eq!(review.scorecard.overall_score, 81);
    assert_eq!(review.scorecard.skills.score, 88);
    assert_eq!(review.rate_limit.remaining, 9);

    let prompt = &model.prompts.lock().unwrap()[0];
    assert!(prompt.contains("The job title is: Platform Engineer"));
    assert!(prompt.ends_with(native));
}

#[tokio::test]
async fn scanned_pdf_runs_ocr_per_page_in_order() {
    init_tracing();
    let ocr = Arc::new(CountingOcr::default());
    let model = RecordingModel::new(CARD);
    let pipeline = build("Jane", 3, ocr.clone(), model.clone());

    let review = pipeline
        .review_document("203.0.113.9", &pdf(), None, None, noop())
        .await
        .unwrap();

    assert_eq!(ocr.calls.load(Ordering::SeqCst), 3);
    assert_eq!(review.extraction.source_strategy, SourceStrategy::Ocr);
    assert!(review.extraction.confidence_met);
    let expected = "page 1 text from the scanned resume\n\n\
                    page 2 text from the scanned resume\n\n\
                    page 3 text from the scanned resume";
    assert_eq!(review.extraction.text, expected);

    let prompt = &model.prompts.lock().unwrap()[0];
    assert!(prompt.ends_with(expected));
}

#[tokio::test]
async fn truncated_model_output_is_repaired() {
    let truncated = r#"Sure! {"overallScore": 70, "content": {"score": 65, "tips": [{"type": "improve", "tip": "Quantify impact"}, {"type": "good", "tip": "Cle"#;
    let model = RecordingModel::new(truncated);
    let pipeline = build("", 0, Arc::new(CountingOcr::default()), model);

    let outcome = pipeline
        .analyze("198.51.100.1", &AnalyzeRequest::new("Jane Doe, data engineer"))
        .await
        .unwrap();
    let card = outcome.scorecard;
    assert_eq!(card.overall_score, 70);
    assert_eq!(card.content.score, 65);
    assert_eq!(card.content.tips.len(), 1);
    assert_eq!(card.content.tips[0].tip, "Quantify impact");
}

#[tokio::test]
async fn blank_scan_is_rejected_before_the_model() {
    let model = RecordingModel::new(CARD);
    let pipeline = build("", 0, Arc::new(CountingOcr::default()), model.clone());

    let err = pipeline
        .review_document("203.0.113.9", &pdf(), None, None, noop())
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::Extraction(ExtractionError::NoPages)));
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn short_ocr_fallback_is_rejected_before_the_model() {
    let model = RecordingModel::new(CARD);
    let pipeline = build("", 1, Arc::new(FixedOcr("tiny")), model.clone());

    let err = pipeline
        .review_document("203.0.113.9", &pdf(), None, None, noop())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ReviewError::Extraction(ExtractionError::InsufficientText {
            found: 4,
            required: 10
        })
    ));
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn superseded_upload_writes_nothing() {
    let native = "Jane Doe. Senior backend engineer with eight years of Rust and Go.";
    let model = RecordingModel::gated(CARD);
    let pipeline = build(native, 1, Arc::new(CountingOcr::default()), model.clone());
    let store = Arc::new(MemoryResumeStore::new());
    let session = UploadSession::new(pipeline, store.clone());
    let doc = pdf();

    let older = session.submit("ip", &doc, None, None, noop());
    let newer = async {
        // Let the older upload reach the model first.
        while model.calls() == 0 {
            tokio::task::yield_now().await;
        }
        let saved = session.submit("ip", &doc, Some("SRE"), None, noop()).await;
        model.gate.notify_one();
        saved
    };
    let (older, newer) = tokio::join!(older, newer);

    assert!(older.unwrap().is_none());
    let newer = newer.unwrap().expect("newest upload is saved");
    assert_eq!(newer.job_title.as_deref(), Some("SRE"));

    assert_eq!(store.document_count().await, 1);
    assert_eq!(store.preview_count().await, 1);
    assert!(store.get_preview(&newer.review_id).await.unwrap().is_some());
}

#[tokio::test]
async fn upload_superseded_mid_save_rolls_back_its_document() {
    let native = "Jane Doe. Senior backend engineer with eight years of Rust and Go.";
    let model = RecordingModel::new(CARD);
    let pipeline = build(native, 1, Arc::new(CountingOcr::default()), model.clone());
    let store = Arc::new(GateStore::default());
    let session = UploadSession::new(pipeline, store.clone());
    let doc = pdf();

    let older = session.submit("ip", &doc, None, None, noop());
    let newer = async {
        // Start only once the older upload has written its document.
        while !store.entered.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        let saved = session.submit("ip", &doc, Some("SRE"), None, noop()).await;
        store.release.notify_one();
        saved
    };
    let (older, newer) = tokio::join!(older, newer);

    assert!(older.unwrap().is_none());
    let newer = newer.unwrap().expect("newest upload is saved");
    assert_eq!(model.calls(), 2);

    assert_eq!(store.inner.document_count().await, 1);
    assert_eq!(store.inner.preview_count().await, 1);
    assert!(store
        .get_document(&newer.document_id)
        .await
        .unwrap()
        .is_some());
    assert!(store.get_preview(&newer.review_id).await.unwrap().is_some());
}
