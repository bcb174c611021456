//! CLI binary for resume-review.
//!
//! A thin shim over the library crate: `serve` runs the HTTP service,
//! `extract` prints the text read from a document, `review` prints the
//! scorecard JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use resume_review::{
    Document, ExtractionProgressCallback, Extractor, MediaKind, NoopProgressCallback,
    ProgressCallback, ProviderChatModel, RateLimiter, ReviewConfig, ReviewConfigBuilder,
    ReviewPipeline, ReviewServer, SourceStrategy,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner plus one log line per OCR page.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:32.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, kind: MediaKind) {
        self.bar.set_message(format!("{kind:?}"));
    }

    fn on_fallback(&self, native_chars: Option<usize>) {
        let why = match native_chars {
            Some(n) => format!("text layer has {n} chars"),
            None => "text layer unreadable".to_string(),
        };
        self.bar
            .println(format!("{} {}, falling back to OCR", cyan("◆"), why));
    }

    fn on_ocr_progress(&self, percent: u8, status: &str) {
        self.bar.set_position(u64::from(percent));
        self.bar.set_message(status.to_string());
    }

    fn on_page_complete(&self, page_num: usize, total_pages: usize, chars: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page_num,
            total_pages,
            dim(&format!("{chars:>5} chars")),
        ));
    }

    fn on_extraction_complete(&self, strategy: SourceStrategy, chars: usize) {
        self.bar.finish_and_clear();
        eprintln!("{} {chars} chars via {strategy:?}", green("✔"));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP service
  resume-review serve --port 3000

  # Print the text read from a scanned resume
  resume-review extract scan.pdf

  # Full review, scorecard JSON on stdout
  resume-review review cv.pdf --job-title "Backend Engineer"

ENVIRONMENT VARIABLES:
  NIM_API_KEY           Chat-completion API key (required for review/serve)
  NIM_MODEL             Model identifier (required for review/serve)
  NIM_BASE_URL          OpenAI-compatible endpoint base URL
  RATE_LIMIT_MAX        Requests per window (default 10)
  RATE_LIMIT_WINDOW_MS  Window length in ms (default 60000)
  MAX_FILE_SIZE_MB      Upload cap in MB (default 10)
  TESSERACT_CMD         OCR binary (default tesseract)
  PDFIUM_LIB_PATH       Path to libpdfium or its directory
  REDIS_URL             Shared rate-limit counters (redis feature)
  EDGEQUAKE_PROVIDER    Use an edgequake-llm provider instead of NIM
  EDGEQUAKE_MODEL       Model for that provider
"#;

/// Score resumes with a chat-completion model.
#[derive(Parser, Debug)]
#[command(
    name = "resume-review",
    version,
    about = "Score resumes with a chat-completion model",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "RESUME_REVIEW_VERBOSE")]
    verbose: bool,

    /// Suppress progress output.
    #[arg(short, long, global = true, env = "RESUME_REVIEW_QUIET")]
    quiet: bool,

    /// Retries per model call on transient failure.
    #[arg(long, global = true, env = "RESUME_REVIEW_MAX_RETRIES")]
    max_retries: Option<u32>,

    /// Model call timeout in seconds.
    #[arg(long, global = true, env = "RESUME_REVIEW_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// edgequake-llm provider (openai, anthropic, ollama, ...) used instead
    /// of the NIM endpoint.
    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Model for `--provider`. Falls back to NIM_MODEL.
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve {
        #[arg(long, env = "RESUME_REVIEW_BIND", default_value = "127.0.0.1")]
        bind: String,

        #[arg(short, long, env = "PORT", default_value_t = 3000)]
        port: u16,

        /// Request body cap in bytes.
        #[arg(long, env = "RESUME_REVIEW_MAX_BODY", default_value_t = 1_048_576)]
        max_body_size: usize,

        /// Redis URL for shared rate-limit counters.
        #[arg(long, env = "REDIS_URL")]
        redis_url: Option<String>,
    },

    /// Print the text extracted from a PDF or image.
    Extract {
        file: PathBuf,

        /// Output the full extraction result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Extract and review a document; prints the scorecard as JSON.
    Review {
        file: PathBuf,

        #[arg(long)]
        job_title: Option<String>,

        #[arg(long)]
        job_description: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;

    match cli.command {
        Command::Serve {
            ref bind,
            port,
            max_body_size,
            ref redis_url,
        } => {
            let limiter = build_limiter(&config, redis_url.clone()).await;
            let pipeline = build_pipeline(&cli, config)?.with_limiter(limiter);
            serve(pipeline, bind, port, max_body_size).await
        }
        Command::Extract { ref file, json } => {
            let pipeline = build_pipeline(&cli, config)?;
            let document = load(&pipeline, file).await?;
            let result = pipeline
                .extract(&document, progress(cli.quiet))
                .await
                .context("Extraction failed")?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&result).context("Failed to serialise output")?
                );
            } else {
                println!("{}", result.text);
            }
            Ok(())
        }
        Command::Review {
            ref file,
            ref job_title,
            ref job_description,
        } => {
            let pipeline = build_pipeline(&cli, config)?;
            let document = load(&pipeline, file).await?;
            let review = pipeline
                .review_document(
                    "cli",
                    &document,
                    job_title.as_deref(),
                    job_description.as_deref(),
                    progress(cli.quiet),
                )
                .await
                .context("Review failed")?;
            println!(
                "{}",
                serde_json::to_string_pretty(&review.scorecard)
                    .context("Failed to serialise scorecard")?
            );
            Ok(())
        }
    }
}

/// Environment first, then CLI overrides.
fn build_config(cli: &Cli) -> Result<ReviewConfig> {
    let mut builder = ReviewConfigBuilder::from_config(ReviewConfig::from_env());
    if let Some(n) = cli.max_retries {
        builder = builder.max_retries(n);
    }
    if let Some(secs) = cli.api_timeout {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder.build().context("Invalid configuration")
}

/// NIM over HTTP by default; an edgequake-llm provider when `--provider` is set.
fn build_pipeline(cli: &Cli, config: ReviewConfig) -> Result<ReviewPipeline> {
    let Some(provider) = cli.provider.as_deref() else {
        return ReviewPipeline::from_config(config).context("Invalid configuration");
    };
    let model = cli
        .model
        .clone()
        .or_else(|| config.model.model.clone())
        .context("--provider needs --model (or NIM_MODEL)")?;
    let chat = ProviderChatModel::from_name(provider, &model, config.model.timeout)
        .with_context(|| format!("Failed to create provider {provider}"))?;
    tracing::info!("Using {} provider with model {}", provider, model);

    let limiter = RateLimiter::in_memory(config.rate_limit.clone());
    let extractor = Extractor::from_config(&config.extraction);
    Ok(ReviewPipeline::new(config, limiter, extractor, Arc::new(chat)))
}

fn progress(quiet: bool) -> ProgressCallback {
    if quiet {
        Arc::new(NoopProgressCallback)
    } else {
        CliProgressCallback::new()
    }
}

async fn load(pipeline: &ReviewPipeline, file: &Path) -> Result<Document> {
    Document::from_path(file, &pipeline.config().limits)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))
}

async fn serve(
    pipeline: ReviewPipeline,
    bind: &str,
    port: u16,
    max_body_size: usize,
) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    ReviewServer::new(bind, port, pipeline, shutdown_rx)
        .with_max_body_size(max_body_size)
        .serve()
        .await
        .context("Server failed")
}

#[cfg(feature = "redis")]
async fn build_limiter(config: &ReviewConfig, redis_url: Option<String>) -> RateLimiter {
    use resume_review::limiter::RedisCounterStore;

    let Some(url) = redis_url else {
        return RateLimiter::in_memory(config.rate_limit.clone());
    };
    match RedisCounterStore::connect(&url).await {
        Ok(store) => {
            tracing::info!("Rate-limit counters shared via Redis");
            RateLimiter::with_store(config.rate_limit.clone(), Arc::new(store))
        }
        Err(e) => {
            tracing::warn!("Redis unavailable ({}), using in-memory rate limits", e);
            RateLimiter::in_memory(config.rate_limit.clone())
        }
    }
}

#[cfg(not(feature = "redis"))]
async fn build_limiter(config: &ReviewConfig, redis_url: Option<String>) -> RateLimiter {
    if redis_url.is_some() {
        tracing::warn!("REDIS_URL set but built without the `redis` feature; ignoring");
    }
    RateLimiter::in_memory(config.rate_limit.clone())
}
