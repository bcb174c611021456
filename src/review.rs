//! The feedback pipeline: admission → validation → model call → parse.
//!
//! [`ReviewPipeline`] is the single entry point used by the HTTP surface, the
//! CLI and the upload session. Every step short-circuits on failure, and
//! nothing partial is ever returned: callers get a complete [`Scorecard`] or
//! a classified [`ReviewError`].
//!
//! ## Retry strategy
//!
//! Timeouts, 5xx and transport failures are transient. They are retried with
//! exponential backoff (`retry_backoff * 2^(attempt-1)`): with the defaults
//! (500 ms, 2 retries) the waits are 500 ms then 1 s. Invalid credentials,
//! upstream 429 and malformed output are returned immediately.

use crate::config::ReviewConfig;
use crate::document::{Document, ExtractionResult};
use crate::error::{ExtractionError, ModelError, ReviewError, UpstreamError};
use crate::extract::Extractor;
use crate::feedback::{parse_feedback, Scorecard};
use crate::limiter::{RateLimitDecision, RateLimiter};
use crate::model::{ChatMessage, ChatModel, ChatOptions, HttpChatModel};
use crate::progress::ProgressCallback;
use crate::prompts::build_messages;
use crate::validation::{validate_job_description, validate_job_title, AnalyzeRequest};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// A scorecard plus the admission decision that let it through.
#[derive(Debug, Clone)]
pub struct AnalyzeOutcome {
    pub scorecard: Scorecard,
    pub rate_limit: RateLimitDecision,
}

/// Result of reviewing an uploaded document end to end.
#[derive(Debug, Clone)]
pub struct DocumentReview {
    pub extraction: ExtractionResult,
    pub scorecard: Scorecard,
    pub rate_limit: RateLimitDecision,
}

/// Composes the limiter, the extractor and the model client.
#[derive(Clone)]
pub struct ReviewPipeline {
    config: Arc<ReviewConfig>,
    limiter: RateLimiter,
    extractor: Extractor,
    model: Arc<dyn ChatModel>,
}

impl ReviewPipeline {
    pub fn new(
        config: ReviewConfig,
        limiter: RateLimiter,
        extractor: Extractor,
        model: Arc<dyn ChatModel>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            limiter,
            extractor,
            model,
        }
    }

    /// In-memory limiter, pdfium + tesseract extraction, HTTP model client.
    pub fn from_config(config: ReviewConfig) -> Result<Self, ReviewError> {
        let limiter = RateLimiter::in_memory(config.rate_limit.clone());
        let extractor = Extractor::from_config(&config.extraction);
        let model = HttpChatModel::new(config.model.clone())?;
        Ok(Self::new(config, limiter, extractor, Arc::new(model)))
    }

    /// Swap the rate limiter, e.g. for one backed by a shared counter store.
    #[must_use]
    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    /// Count one request for `client_id`; deny with the unchanged reset time.
    pub async fn admit(&self, client_id: &str) -> Result<RateLimitDecision, ReviewError> {
        let decision = self.limiter.check(client_id).await;
        debug!(
            "Rate limit check: client={} allowed={} remaining={}",
            client_id, decision.allowed, decision.remaining
        );
        if decision.allowed {
            Ok(decision)
        } else {
            Err(ReviewError::RateLimited {
                limit: decision.limit,
                reset_at_ms: decision.reset_at_ms,
            })
        }
    }

    /// Admission, then [`Self::review_text`].
    pub async fn analyze(
        &self,
        client_id: &str,
        request: &AnalyzeRequest,
    ) -> Result<AnalyzeOutcome, ReviewError> {
        let rate_limit = self.admit(client_id).await?;
        let scorecard = self.review_text(request).await?;
        Ok(AnalyzeOutcome {
            scorecard,
            rate_limit,
        })
    }

    /// Validate, call the model and parse its answer. No admission check.
    pub async fn review_text(&self, request: &AnalyzeRequest) -> Result<Scorecard, ReviewError> {
        request.validate(&self.config.limits)?;

        let messages = build_messages(
            request.resume_text.as_deref().unwrap_or_default(),
            request.job_title.as_deref().unwrap_or_default(),
            request.job_description.as_deref().unwrap_or_default(),
        );

        let start = Instant::now();
        let raw = self.chat_with_retry(&messages).await?;
        let scorecard = parse_feedback(&raw).map_err(UpstreamError::from)?;
        info!(
            "Review complete: overall score {} in {}ms",
            scorecard.overall_score,
            start.elapsed().as_millis()
        );
        Ok(scorecard)
    }

    /// Extract text and refuse results below the absolute floor.
    pub async fn extract(
        &self,
        document: &Document,
        progress: ProgressCallback,
    ) -> Result<ExtractionResult, ReviewError> {
        let result = self.extractor.extract(document, progress).await?;
        if !result.confidence_met {
            return Err(ExtractionError::InsufficientText {
                found: result.char_count(),
                required: self.extractor.config().absolute_min_chars,
            }
            .into());
        }
        Ok(result)
    }

    /// Admission, extraction, then [`Self::review_text`] on the extracted text.
    pub async fn review_document(
        &self,
        client_id: &str,
        document: &Document,
        job_title: Option<&str>,
        job_description: Option<&str>,
        progress: ProgressCallback,
    ) -> Result<DocumentReview, ReviewError> {
        let rate_limit = self.admit(client_id).await?;

        // Cheap checks first so a bad job field doesn't cost an OCR run.
        if let Some(title) = job_title {
            validate_job_title(title, &self.config.limits)?;
        }
        if let Some(description) = job_description {
            validate_job_description(description, &self.config.limits)?;
        }

        let extraction = self.extract(document, progress).await?;

        let mut request = AnalyzeRequest::new(extraction.text.clone());
        request.job_title = job_title.map(str::to_string);
        request.job_description = job_description.map(str::to_string);
        let scorecard = self.review_text(&request).await?;

        Ok(DocumentReview {
            extraction,
            scorecard,
            rate_limit,
        })
    }

    async fn chat_with_retry(&self, messages: &[ChatMessage]) -> Result<String, ReviewError> {
        let model_config = &self.config.model;
        let options = ChatOptions::from(model_config);
        let mut last_err: Option<ReviewError> = None;

        for attempt in 0..=model_config.max_retries {
            if attempt > 0 {
                let backoff = model_config
                    .retry_backoff
                    .saturating_mul(2u32.saturating_pow(attempt - 1));
                warn!(
                    "Model call retry {}/{} after {}ms",
                    attempt,
                    model_config.max_retries,
                    backoff.as_millis()
                );
                sleep(backoff).await;
            }

            match self.model.chat(messages, &options).await {
                Ok(raw) => {
                    debug!("Model returned {} chars", raw.len());
                    return Ok(raw);
                }
                Err(e) => {
                    let err = ReviewError::from(e);
                    if !err.is_retryable() {
                        return Err(err);
                    }
                    warn!("Model call attempt {} failed: {}", attempt + 1, err);
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ModelError::EmptyResponse.into()))
    }
}

impl std::fmt::Debug for ReviewPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewPipeline")
            .field("config", &self.config)
            .field("limiter", &self.limiter)
            .field("extractor", &self.extractor)
            .finish_non_exhaustive()
    }
}
