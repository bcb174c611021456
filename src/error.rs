//! Error types for the resume-review library.
//!
//! One fatal error type, [`ReviewError`], is returned from every pipeline
//! entry point. It is a thin classification layer over the stage-specific
//! errors defined below:
//!
//! * [`ExtractionError`]: no usable text could be read from the document.
//! * [`UpstreamError`]:   the model call failed or returned nothing usable.
//! * [`ParseError`]:      the model output contained no JSON object at all.
//!   Never surfaced on its own: it is wrapped in
//!   [`UpstreamError::MalformedResponse`].
//! * [`ValidationError`]: the caller's input was rejected before any I/O.
//!
//! Library-specific error shapes (pdfium, reqwest, io) are converted into these
//! enums at the stage boundary, so callers only ever match on this module.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-distinguishable error category, stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Validation,
    RateLimited,
    Extraction,
    Upstream,
}

/// All fatal errors returned by the resume-review library.
#[derive(Debug, Error)]
pub enum ReviewError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// Credentials or model identifier are missing. Not retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// The request was rejected before any external call.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    // ── Admission errors ──────────────────────────────────────────────────
    /// The rate limiter denied the request.
    ///
    /// `reset_at_ms` is the unchanged window reset time (Unix epoch, ms).
    #[error("Too many requests. Please try again later.")]
    RateLimited { limit: u32, reset_at_ms: u64 },

    // ── Stage errors ──────────────────────────────────────────────────────
    /// No usable text could be extracted from the document.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// The model call failed.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (task panicked, tempfile failure, …).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReviewError {
    /// The error category, for callers that branch on kind rather than variant.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReviewError::Configuration(_) => ErrorKind::Configuration,
            ReviewError::Validation(_) => ErrorKind::Validation,
            ReviewError::RateLimited { .. } => ErrorKind::RateLimited,
            ReviewError::Extraction(_) => ErrorKind::Extraction,
            ReviewError::Upstream(_) | ReviewError::Internal(_) => ErrorKind::Upstream,
        }
    }

    /// Whether retrying the same request later can succeed without user action.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReviewError::RateLimited { .. } => true,
            ReviewError::Upstream(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Seconds until a rate-limited caller may retry, rounded up.
    pub fn retry_after_secs(&self, now_ms: u64) -> Option<u64> {
        match self {
            ReviewError::RateLimited { reset_at_ms, .. } => {
                Some(reset_at_ms.saturating_sub(now_ms).div_ceil(1000))
            }
            _ => None,
        }
    }
}

impl From<ModelError> for ReviewError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::NotConfigured(msg) => ReviewError::Configuration(msg),
            ModelError::InvalidCredentials => UpstreamError::InvalidCredentials.into(),
            ModelError::RateLimited => UpstreamError::RateLimited.into(),
            ModelError::Status { status, body } => UpstreamError::Status { status, body }.into(),
            ModelError::Timeout { secs } => UpstreamError::Timeout { secs }.into(),
            ModelError::EmptyResponse => UpstreamError::EmptyResponse.into(),
            ModelError::Transport(detail) => UpstreamError::Transport(detail).into(),
        }
    }
}

/// Text extraction failed after exhausting every applicable strategy.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionError {
    /// The document decoded but has no pages.
    #[error("Document has no pages")]
    NoPages,

    /// The document requires a password.
    #[error("Document is encrypted. Please upload an unprotected copy.")]
    Encrypted,

    /// The document could not be decoded at all.
    #[error("Document is corrupted or unreadable: {detail}")]
    Corrupt { detail: String },

    /// The native text layer could not be read.
    #[error("Native text extraction failed: {detail}")]
    NativeFailed { detail: String },

    /// Rendering a page to a bitmap failed.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// The OCR engine could not be started or crashed.
    #[error("OCR failed: {detail}")]
    OcrFailed { detail: String },

    /// Recognition ran but produced fewer characters than the absolute floor.
    #[error(
        "Unable to extract sufficient text ({found} of at least {required} characters). \
Please ensure the document is clear and contains readable text."
    )]
    InsufficientText { found: usize, required: usize },

    /// pdfium could not be loaded.
    #[error("Failed to bind to pdfium library: {0}\nSet PDFIUM_LIB_PATH=/path/to/libpdfium.")]
    PdfiumUnavailable(String),

    /// Unexpected internal failure during extraction.
    #[error("Extraction internal error: {0}")]
    Internal(String),
}

/// The model call failed or returned an unusable response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    /// HTTP 401 from the model endpoint.
    #[error("Invalid API key. Please check your NIM_API_KEY.")]
    InvalidCredentials,

    /// HTTP 429 from the model endpoint.
    #[error("Upstream rate limit exceeded. Please try again later.")]
    RateLimited,

    /// Any other non-2xx response.
    #[error("Model API error ({status}): {body}")]
    Status { status: u16, body: String },

    /// The request exceeded its timeout and was aborted.
    #[error("Request timeout after {secs}s. Please try again.")]
    Timeout { secs: u64 },

    /// The response carried no message content.
    #[error("Empty response from model API.")]
    EmptyResponse,

    /// Connection-level failure (DNS, TLS, reset).
    #[error("Failed to communicate with model API: {0}")]
    Transport(String),

    /// The response content had no locatable or repairable JSON object.
    #[error("Invalid model response: {0}")]
    MalformedResponse(#[from] ParseError),
}

impl UpstreamError {
    /// Timeouts, 5xx and transport failures are transient; everything else
    /// needs user action.
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::Timeout { .. } | UpstreamError::Transport(_) => true,
            UpstreamError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// The model output could not be turned into a JSON value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("No JSON object found in model response.")]
    NoJsonObject,

    #[error("Invalid JSON in model response: {0}")]
    InvalidJson(String),
}

/// Input rejected before any network call.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Missing resumeText")]
    MissingResumeText,

    #[error("Resume text cannot be empty")]
    EmptyResumeText,

    #[error("Resume text exceeds maximum length of {max} characters")]
    ResumeTextTooLong { max: usize },

    #[error("Job title exceeds maximum length of {max} characters")]
    JobTitleTooLong { max: usize },

    #[error("Job description exceeds maximum length of {max} characters")]
    JobDescriptionTooLong { max: usize },

    #[error("Only PDF and image files (JPG, PNG, WEBP) are allowed")]
    UnsupportedType { media_type: String },

    #[error("File is empty")]
    EmptyFile,

    #[error("File size must be less than {max_mb}MB")]
    FileTooLarge { max_mb: u64 },
}

/// Errors from a [`crate::model::ChatModel`] implementation.
///
/// Kept separate from [`UpstreamError`] because a missing key is a
/// configuration problem, not an upstream one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("{0}")]
    NotConfigured(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("upstream rate limited")]
    RateLimited,

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("empty response")]
    EmptyResponse,

    #[error("transport: {0}")]
    Transport(String),
}

/// Failure talking to a durable counter backend.
///
/// Never reaches a caller of the rate limiter: it triggers the in-memory
/// fallback instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("counter store unavailable: {0}")]
pub struct CounterStoreError(pub String);

/// Failure in a [`crate::store::ResumeStore`] implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for ReviewError {
    fn from(e: StoreError) -> Self {
        ReviewError::Internal(e.to_string())
    }
}
