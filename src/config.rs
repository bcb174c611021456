//! Configuration types for the document-to-feedback pipeline.
//!
//! Every knob lives in [`ReviewConfig`], built via [`ReviewConfigBuilder`] or
//! loaded from the environment with [`ReviewConfig::from_env`]. The config is
//! split into one sub-struct per component so each component can be
//! constructed in isolation (tests build a [`RateLimitConfig`] alone, for
//! instance) while the binary still passes a single value around.
//!
//! The threshold constants in [`ExtractionConfig`] are policy, not derived
//! from anything; they are configurable for that reason.

use crate::error::ReviewError;
use std::fmt;
use std::time::Duration;

/// Default OpenAI-compatible endpoint (NVIDIA NIM).
pub const DEFAULT_MODEL_BASE_URL: &str = "https://integrate.api.nvidia.com/v1";

/// Placeholder value shipped in example `.env` files; treated as "no key".
const API_KEY_PLACEHOLDER: &str = "your_api_key_here";

/// Upper bound for [`ModelConfig::max_retries`].
pub const MAX_RETRIES: u32 = 10;

/// Complete configuration for the resume-review pipeline.
///
/// # Example
/// ```rust
/// use resume_review::ReviewConfig;
/// use std::time::Duration;
///
/// let config = ReviewConfig::builder()
///     .rate_limit(5, Duration::from_secs(30))
///     .model("meta/llama-3.1-70b-instruct")
///     .api_key("nvapi-…")
///     .build()
///     .unwrap();
/// assert_eq!(config.rate_limit.max_requests, 5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReviewConfig {
    pub rate_limit: RateLimitConfig,
    pub extraction: ExtractionConfig,
    pub model: ModelConfig,
    pub limits: InputLimits,
}

/// Fixed-window admission control settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests allowed per identifier per window. Default: 10.
    pub max_requests: u32,
    /// Window length. Default: 60 s.
    pub window: Duration,
    /// How often the in-memory backend drops expired entries. Default: 5 min.
    pub sweep_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(5 * 60),
        }
    }
}

/// Text extraction policy and engine settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionConfig {
    /// Minimum trimmed characters for native PDF text to be accepted. Default: 50.
    ///
    /// Scanned PDFs often carry a handful of stray characters (page numbers)
    /// in their text layer; below this bar the orchestrator falls back to OCR.
    pub native_min_chars: usize,

    /// Absolute floor for any strategy's output. Default: 10.
    pub absolute_min_chars: usize,

    /// Scale factor for the page-1 preview render. Default: 1.4.
    pub preview_scale: f32,

    /// Scale factor for OCR input renders. Default: 2.0.
    ///
    /// Higher than the preview scale: recognition accuracy improves with pixel
    /// density far more than preview quality does.
    pub ocr_scale: f32,

    /// Tesseract language code(s), e.g. "eng" or "eng+deu". Default: "eng".
    pub ocr_language: String,

    /// Tesseract executable. Default: "tesseract".
    pub tesseract_cmd: String,

    /// Explicit pdfium library path. `None` binds the system library.
    pub pdfium_lib_path: Option<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            native_min_chars: 50,
            absolute_min_chars: 10,
            preview_scale: 1.4,
            ocr_scale: 2.0,
            ocr_language: "eng".to_string(),
            tesseract_cmd: "tesseract".to_string(),
            pdfium_lib_path: None,
        }
    }
}

/// Model endpoint and call settings.
#[derive(Clone)]
pub struct ModelConfig {
    /// OpenAI-compatible base URL, without the `/chat/completions` suffix.
    pub base_url: String,
    /// Model identifier. Required at call time.
    pub model: Option<String>,
    /// Bearer token. Required at call time.
    pub api_key: Option<String>,
    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,
    /// Completion token budget. Default: 3000.
    ///
    /// The scorecard JSON with five categories of tips routinely exceeds 1500
    /// tokens; lower budgets truncate it mid-object.
    pub max_tokens: usize,
    /// Per-call timeout; the in-flight request is aborted when it elapses. Default: 30 s.
    pub timeout: Duration,
    /// Retries for transient upstream failures (timeout, 5xx, transport).
    /// Default: 2, at most [`MAX_RETRIES`].
    pub max_retries: u32,
    /// Initial backoff, doubled per attempt. Default: 500 ms.
    pub retry_backoff: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_MODEL_BASE_URL.to_string(),
            model: None,
            api_key: None,
            temperature: 0.2,
            max_tokens: 3000,
            timeout: Duration::from_secs(30),
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff", &self.retry_backoff)
            .finish()
    }
}

impl ModelConfig {
    /// Resolve `(api_key, base_url, model)`, failing when either required
    /// value is absent.
    ///
    /// Called per request rather than at startup so a server can boot (and
    /// serve health checks) before credentials are provisioned.
    pub fn resolve(&self) -> Result<(&str, &str, &str), ReviewError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty() && *k != API_KEY_PLACEHOLDER)
            .ok_or_else(|| {
                ReviewError::Configuration(
                    "NIM_API_KEY is not configured. Please set it in your environment.".into(),
                )
            })?;
        let model = self
            .model
            .as_deref()
            .filter(|m| !m.is_empty())
            .ok_or_else(|| {
                ReviewError::Configuration("Missing NIM_MODEL environment variable.".into())
            })?;
        Ok((api_key, self.base_url.trim_end_matches('/'), model))
    }
}

/// Size limits applied to user input before any external call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputLimits {
    pub max_resume_chars: usize,
    pub max_job_title_chars: usize,
    pub max_job_description_chars: usize,
    /// Maximum uploaded document size. Default: 10 MiB.
    pub max_file_bytes: u64,
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            max_resume_chars: 50_000,
            max_job_title_chars: 200,
            max_job_description_chars: 10_000,
            max_file_bytes: 10 * 1024 * 1024,
        }
    }
}

impl ReviewConfig {
    /// Create a new builder for `ReviewConfig`.
    pub fn builder() -> ReviewConfigBuilder {
        ReviewConfigBuilder {
            config: Self::default(),
        }
    }

    /// Load configuration from process environment variables.
    ///
    /// Unset or unparsable numeric values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup (testable `from_env`).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let num = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        if let Some(max) = num("RATE_LIMIT_MAX").filter(|n| *n > 0) {
            config.rate_limit.max_requests = u32::try_from(max).unwrap_or(u32::MAX);
        }
        if let Some(ms) = num("RATE_LIMIT_WINDOW_MS").filter(|n| *n > 0) {
            config.rate_limit.window = Duration::from_millis(ms);
        }
        if let Some(mb) = num("MAX_FILE_SIZE_MB").filter(|n| *n > 0) {
            config.limits.max_file_bytes = mb * 1024 * 1024;
        }
        if let Some(url) = lookup("NIM_BASE_URL").filter(|v| !v.is_empty()) {
            config.model.base_url = url;
        }
        config.model.model = lookup("NIM_MODEL").filter(|v| !v.is_empty());
        config.model.api_key = lookup("NIM_API_KEY").filter(|v| !v.is_empty());
        if let Some(cmd) = lookup("TESSERACT_CMD").filter(|v| !v.is_empty()) {
            config.extraction.tesseract_cmd = cmd;
        }
        config.extraction.pdfium_lib_path = lookup("PDFIUM_LIB_PATH").filter(|v| !v.is_empty());
        config
    }
}

/// Builder for [`ReviewConfig`].
#[derive(Debug)]
pub struct ReviewConfigBuilder {
    config: ReviewConfig,
}

impl ReviewConfigBuilder {
    /// Start from an existing configuration (e.g. one loaded from env).
    pub fn from_config(config: ReviewConfig) -> Self {
        Self { config }
    }

    pub fn rate_limit(mut self, max_requests: u32, window: Duration) -> Self {
        self.config.rate_limit.max_requests = max_requests.max(1);
        self.config.rate_limit.window = window;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.rate_limit.sweep_interval = interval;
        self
    }

    pub fn native_min_chars(mut self, n: usize) -> Self {
        self.config.extraction.native_min_chars = n;
        self
    }

    pub fn absolute_min_chars(mut self, n: usize) -> Self {
        self.config.extraction.absolute_min_chars = n;
        self
    }

    pub fn preview_scale(mut self, scale: f32) -> Self {
        self.config.extraction.preview_scale = scale.clamp(0.25, 8.0);
        self
    }

    pub fn ocr_scale(mut self, scale: f32) -> Self {
        self.config.extraction.ocr_scale = scale.clamp(0.25, 8.0);
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.extraction.ocr_language = lang.into();
        self
    }

    pub fn tesseract_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.config.extraction.tesseract_cmd = cmd.into();
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<String>) -> Self {
        self.config.extraction.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.model.base_url = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model.model = Some(model.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.model.api_key = Some(key.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.model.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.model.max_tokens = n;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.model.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.model.max_retries = n.min(MAX_RETRIES);
        self
    }

    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.config.model.retry_backoff = backoff;
        self
    }

    pub fn limits(mut self, limits: InputLimits) -> Self {
        self.config.limits = limits;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ReviewConfig, ReviewError> {
        let c = &self.config;
        if c.rate_limit.window.is_zero() {
            return Err(ReviewError::Configuration(
                "Rate-limit window must be non-zero".into(),
            ));
        }
        if c.extraction.absolute_min_chars > c.extraction.native_min_chars {
            return Err(ReviewError::Configuration(format!(
                "absolute_min_chars ({}) must not exceed native_min_chars ({})",
                c.extraction.absolute_min_chars, c.extraction.native_min_chars
            )));
        }
        if c.model.max_tokens == 0 {
            return Err(ReviewError::Configuration("max_tokens must be ≥ 1".into()));
        }
        if c.model.timeout.is_zero() {
            return Err(ReviewError::Configuration("timeout must be non-zero".into()));
        }
        let mut config = self.config;
        config.model.max_retries = config.model.max_retries.min(MAX_RETRIES);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_policy() {
        let c = ReviewConfig::default();
        assert_eq!(c.rate_limit.max_requests, 10);
        assert_eq!(c.rate_limit.window, Duration::from_secs(60));
        assert_eq!(c.rate_limit.sweep_interval, Duration::from_secs(300));
        assert_eq!(c.extraction.native_min_chars, 50);
        assert_eq!(c.extraction.absolute_min_chars, 10);
        assert_eq!(c.model.timeout, Duration::from_secs(30));
        assert_eq!(c.limits.max_resume_chars, 50_000);
        assert_eq!(c.limits.max_job_title_chars, 200);
        assert_eq!(c.limits.max_job_description_chars, 10_000);
    }

    #[test]
    fn from_lookup_reads_env_names() {
        let env: HashMap<&str, &str> = [
            ("RATE_LIMIT_MAX", "3"),
            ("RATE_LIMIT_WINDOW_MS", "1500"),
            ("NIM_MODEL", "meta/llama"),
            ("NIM_API_KEY", "nvapi-abc"),
            ("NIM_BASE_URL", "http://localhost:9000/v1"),
            ("MAX_FILE_SIZE_MB", "2"),
        ]
        .into_iter()
        .collect();
        let c = ReviewConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(c.rate_limit.max_requests, 3);
        assert_eq!(c.rate_limit.window, Duration::from_millis(1500));
        assert_eq!(c.model.model.as_deref(), Some("meta/llama"));
        assert_eq!(c.model.base_url, "http://localhost:9000/v1");
        assert_eq!(c.limits.max_file_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn from_lookup_ignores_garbage_numbers() {
        let c = ReviewConfig::from_lookup(|k| match k {
            "RATE_LIMIT_MAX" => Some("ten".into()),
            "RATE_LIMIT_WINDOW_MS" => Some("0".into()),
            _ => None,
        });
        assert_eq!(c.rate_limit, RateLimitConfig::default());
    }

    #[test]
    fn resolve_requires_key_and_model() {
        let mut m = ModelConfig::default();
        assert!(matches!(m.resolve(), Err(ReviewError::Configuration(_))));

        m.api_key = Some(API_KEY_PLACEHOLDER.into());
        m.model = Some("x".into());
        assert!(matches!(m.resolve(), Err(ReviewError::Configuration(_))));

        m.api_key = Some("real".into());
        m.model = None;
        let err = m.resolve().unwrap_err();
        assert!(err.to_string().contains("NIM_MODEL"));

        m.model = Some("x".into());
        m.base_url = "http://h/v1/".into();
        assert_eq!(m.resolve().unwrap(), ("real", "http://h/v1", "x"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut m = ModelConfig::default();
        m.api_key = Some("nvapi-secret".into());
        let dbg = format!("{m:?}");
        assert!(!dbg.contains("nvapi-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn build_rejects_inverted_thresholds() {
        let err = ReviewConfig::builder()
            .native_min_chars(5)
            .absolute_min_chars(10)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("absolute_min_chars"));
    }

    #[test]
    fn builder_clamps_rate_limit() {
        let c = ReviewConfig::builder()
            .rate_limit(0, Duration::from_secs(1))
            .build()
            .unwrap();
        assert_eq!(c.rate_limit.max_requests, 1);
    }

    #[test]
    fn retries_are_capped() {
        let c = ReviewConfig::builder().max_retries(u32::MAX).build().unwrap();
        assert_eq!(c.model.max_retries, MAX_RETRIES);

        let mut raw = ReviewConfig::default();
        raw.model.max_retries = 40;
        let c = ReviewConfigBuilder::from_config(raw).build().unwrap();
        assert_eq!(c.model.max_retries, MAX_RETRIES);
    }
}
