//! # resume-review
//!
//! Turn a resume (PDF or image) into a structured feedback scorecard produced
//! by a chat-completion model, behind a per-client rate limit.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload / POST body
//!  │
//!  ├─ 1. Admit     fixed-window rate limit per client (memory or Redis)
//!  ├─ 2. Validate  length and type checks, before any I/O
//!  ├─ 3. Extract   pdfium text layer, OCR fallback for scans, page-1 preview
//!  ├─ 4. Prompt    system instruction + response schema + resume text
//!  ├─ 5. Model     chat completion with bounded retries
//!  └─ 6. Parse     JSON span, bracket repair, total scorecard coercion
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resume_review::{AnalyzeRequest, ReviewConfig, ReviewPipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // NIM_API_KEY / NIM_MODEL / NIM_BASE_URL are read from the environment
//!     let pipeline = ReviewPipeline::from_config(ReviewConfig::from_env())?;
//!     let request = AnalyzeRequest::new("Jane Doe\nBackend engineer, 6 years of Rust")
//!         .job_title("Site Reliability Engineer");
//!     let outcome = pipeline.analyze("127.0.0.1", &request).await?;
//!     println!("overall: {}", outcome.scorecard.overall_score);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `resume-review` binary (clap + anyhow + tracing-subscriber) |
//! | `redis` | off     | Shares rate-limit counters across processes via `REDIS_URL` |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod feedback;
pub mod limiter;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod review;
pub mod server;
pub mod session;
pub mod store;
pub mod validation;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ExtractionConfig, InputLimits, ModelConfig, RateLimitConfig, ReviewConfig, ReviewConfigBuilder,
};
pub use document::{Document, ExtractionResult, MediaKind, PreviewImage, SourceStrategy};
pub use error::{
    ErrorKind, ExtractionError, ModelError, ParseError, ReviewError, UpstreamError, ValidationError,
};
pub use extract::Extractor;
pub use feedback::{parse_feedback, CategoryScore, Scorecard, Tip, TipKind};
pub use limiter::{RateLimitDecision, RateLimiter};
pub use model::{ChatMessage, ChatModel, ChatOptions, HttpChatModel, ProviderChatModel};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use review::{AnalyzeOutcome, DocumentReview, ReviewPipeline};
pub use server::{ReviewServer, ServerError};
pub use session::{SavedReview, UploadSession};
pub use store::{MemoryResumeStore, ResumeStore};
pub use validation::AnalyzeRequest;
