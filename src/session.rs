//! Upload sessions: run a review and persist it, unless a newer upload has
//! started in the meantime.
//!
//! Starting a new upload does not cancel an in-flight OCR or model call. The
//! older run keeps going, but its ticket is no longer current, so it returns
//! `Ok(None)`. The ticket is checked again after each store write; a run that
//! loses the race mid-save deletes what it already wrote.

use crate::document::{Document, ExtractionResult, PreviewImage};
use crate::error::ReviewError;
use crate::feedback::Scorecard;
use crate::progress::ProgressCallback;
use crate::review::ReviewPipeline;
use crate::store::ResumeStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Issues monotonically numbered upload tickets. The newest one is current.
#[derive(Debug, Default)]
pub struct UploadTracker {
    latest: AtomicU64,
}

impl UploadTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Start a new upload, superseding every earlier ticket.
    pub fn begin(self: &Arc<Self>) -> UploadTicket {
        let id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        UploadTicket {
            id,
            tracker: Arc::clone(self),
        }
    }
}

/// Proof that an upload was started; see [`UploadTicket::is_current`].
#[derive(Debug, Clone)]
pub struct UploadTicket {
    id: u64,
    tracker: Arc<UploadTracker>,
}

impl UploadTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// True until another upload begins on the same tracker.
    pub fn is_current(&self) -> bool {
        self.tracker.latest.load(Ordering::SeqCst) == self.id
    }
}

/// A persisted review.
#[derive(Debug, Clone)]
pub struct SavedReview {
    /// Key of the review and of its preview in the store.
    pub review_id: String,
    pub document_id: String,
    pub job_title: Option<String>,
    pub extraction: ExtractionResult,
    pub scorecard: Scorecard,
}

impl SavedReview {
    pub fn preview(&self) -> Option<&PreviewImage> {
        self.extraction.preview.as_ref()
    }
}

/// Ties a pipeline to a store for one user's uploads.
#[derive(Clone)]
pub struct UploadSession {
    pipeline: ReviewPipeline,
    store: Arc<dyn ResumeStore>,
    tracker: Arc<UploadTracker>,
}

impl UploadSession {
    pub fn new(pipeline: ReviewPipeline, store: Arc<dyn ResumeStore>) -> Self {
        Self {
            pipeline,
            store,
            tracker: UploadTracker::new(),
        }
    }

    pub fn tracker(&self) -> &Arc<UploadTracker> {
        &self.tracker
    }

    /// Review `document` and persist it with its preview.
    ///
    /// Returns `Ok(None)` when a newer submission started before this one
    /// finished. Nothing it wrote is left in the store.
    pub async fn submit(
        &self,
        client_id: &str,
        document: &Document,
        job_title: Option<&str>,
        job_description: Option<&str>,
        progress: ProgressCallback,
    ) -> Result<Option<SavedReview>, ReviewError> {
        let ticket = self.tracker.begin();
        let outcome = self
            .pipeline
            .review_document(client_id, document, job_title, job_description, progress)
            .await;

        if !ticket.is_current() {
            info!("Upload {} superseded; discarding its result", ticket.id());
            return Ok(None);
        }
        let review = outcome?;

        let document_id = self.store.put_document(document).await?;
        if !ticket.is_current() {
            self.discard(&ticket, &document_id, None).await;
            return Ok(None);
        }

        let review_id = Uuid::new_v4().to_string();
        if let Some(preview) = &review.extraction.preview {
            self.store.put_preview(&review_id, preview).await?;
            if !ticket.is_current() {
                self.discard(&ticket, &document_id, Some(&review_id)).await;
                return Ok(None);
            }
        }

        Ok(Some(SavedReview {
            review_id,
            document_id,
            job_title: job_title.map(str::to_string),
            extraction: review.extraction,
            scorecard: review.scorecard,
        }))
    }

    /// Roll back the writes of a run superseded mid-save. Failures are logged.
    async fn discard(&self, ticket: &UploadTicket, document_id: &str, preview_id: Option<&str>) {
        info!(
            "Upload {} superseded while saving; removing its writes",
            ticket.id()
        );
        if let Some(id) = preview_id {
            if let Err(e) = self.store.delete_preview(id).await {
                warn!("Failed to remove preview {}: {}", id, e);
            }
        }
        if let Err(e) = self.store.delete_document(document_id).await {
            warn!("Failed to remove document {}: {}", document_id, e);
        }
    }
}
