//! CLI binary for edgequake-pdfcover.
//!
//! A thin shim over the library crate: `serve` runs the HTTP service, the
//! other subcommands run the same pipeline on local files.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_llm::ProviderFactory;
use edgequake_pdfcover::{
    config::parse_port, create_cover_file, create_covers_in_dir, inspect, serve, AppState,
    BatchProgressCallback, CaptionConfig, CaptionGenerator, CaptionSource, CoverRequest,
    NoopBatchProgress, ServerConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── Batch progress bar ───────────────────────────────────────────────────────

/// Renders one bar for the whole batch plus a log line per file.
struct CliBatchProgress {
    bar: ProgressBar,
}

impl CliBatchProgress {
    fn new() -> Self {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} files  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");

        let bar = ProgressBar::new(0);
        bar.set_style(style);
        bar.set_prefix("Covers");
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl BatchProgressCallback for CliBatchProgress {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn on_file_start(&self, _index: usize, _total: usize, source: &Path) {
        self.bar.set_message(display_name(source));
    }

    fn on_file_complete(&self, _index: usize, _total: usize, source: &Path, output: &Path) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            display_name(source),
            dim(&format!("→ {}", output.display()))
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, _index: usize, _total: usize, source: &Path, error: &str) {
        self.bar.println(format!(
            "  {} {}  {}",
            red("✗"),
            display_name(source),
            red(error)
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _total: usize, _succeeded: usize) {
        self.bar.finish_and_clear();
    }
}

// ── CLI definition ───────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP service on $PORT (default 8080)
  pdfcover serve

  # Upload a PDF and save the accessible cover
  curl -F "file=@book.pdf;type=application/pdf" http://localhost:8080/cover -o book_cover.pdf

  # Create a cover from a local file
  pdfcover convert book.pdf -o book_cover.pdf --title "Dune"

  # Create covers for every PDF in a directory
  pdfcover batch ./books ./covers

  # Show title, language and page count (no API key needed)
  pdfcover inspect book.pdf --json

  # Caption with another vision provider (reads ANTHROPIC_API_KEY)
  pdfcover convert book.pdf --provider anthropic --model claude-sonnet-4-20250514

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY   Key for alt-text generation. Without it the alt text is
                   always "Book cover image".
  EDGEQUAKE_PROVIDER
                   Caption through an edgequake-llm provider instead of the
                   built-in OpenAI client.
  PORT             Listen port for `serve` (default 8080).
  RUST_LOG         Log filter, overrides --verbose / --quiet.
"#;

/// Create accessible PDF/UA book covers with AI-generated alt text.
#[derive(Parser, Debug)]
#[command(
    name = "pdfcover",
    version,
    about = "Create accessible PDF/UA book covers with AI-generated alt text",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFCOVER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDFCOVER_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve {
        /// Listen port. Invalid values fall back to 8080.
        #[arg(long, env = "PORT")]
        port: Option<String>,

        /// Bind address.
        #[arg(long, env = "PDFCOVER_HOST", default_value = "0.0.0.0")]
        host: String,

        /// Maximum upload size in bytes.
        #[arg(long, env = "PDFCOVER_MAX_UPLOAD", default_value_t = edgequake_pdfcover::config::DEFAULT_MAX_UPLOAD_BYTES)]
        max_upload: usize,

        #[command(flatten)]
        caption: CaptionArgs,
    },

    /// Create a cover from one local PDF.
    Convert {
        /// Source PDF.
        input: PathBuf,

        /// Output path. Default: `<stem>_cover.pdf` next to the input.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Title override.
        #[arg(long)]
        title: Option<String>,

        /// Language override (BCP 47 tag, e.g. en-US).
        #[arg(long)]
        language: Option<String>,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        caption: CaptionArgs,
    },

    /// Create a cover for every PDF in a directory.
    Batch {
        /// Directory with source PDFs.
        src_dir: PathBuf,

        /// Directory for the `<stem>_cover.pdf` files.
        dest_dir: PathBuf,

        /// Disable progress bar.
        #[arg(long, env = "PDFCOVER_NO_PROGRESS")]
        no_progress: bool,

        #[command(flatten)]
        caption: CaptionArgs,
    },

    /// Print PDF metadata only.
    Inspect {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Flags shared by every subcommand that captions images.
#[derive(Args, Debug)]
struct CaptionArgs {
    /// API key for the vision model.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Vision model ID.
    #[arg(long, env = "PDFCOVER_MODEL", default_value = edgequake_pdfcover::config::DEFAULT_MODEL)]
    model: String,

    /// Chat-completions endpoint URL.
    #[arg(long, env = "PDFCOVER_ENDPOINT", default_value = edgequake_pdfcover::config::DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Max tokens for the generated alt text.
    #[arg(long, env = "PDFCOVER_MAX_TOKENS", default_value_t = 300)]
    max_tokens: u32,

    /// Per-call timeout in seconds. Unset means no timeout.
    #[arg(long, env = "PDFCOVER_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "Caption through an edgequake-llm provider. The provider reads its own\n\
          API key variable; --api-key and --endpoint are then ignored.\n\
          Unset: the built-in OpenAI-compatible client is used."
    )]
    provider: Option<String>,
}

impl CaptionArgs {
    fn captioner(&self) -> Result<CaptionGenerator> {
        let mut builder = CaptionConfig::builder()
            .maybe_api_key(self.api_key.clone())
            .model(&self.model)
            .endpoint(&self.endpoint)
            .max_tokens(self.max_tokens);
        if let Some(secs) = self.api_timeout {
            builder = builder.api_timeout_secs(secs);
        }
        if let Some(name) = self.provider.as_deref().filter(|n| !n.trim().is_empty()) {
            let provider = ProviderFactory::create_llm_provider(name, &self.model)
                .map_err(|e| anyhow::anyhow!("LLM provider '{name}' is not configured: {e}"))?;
            builder = builder.provider(provider);
        }
        let config = builder.build().context("Invalid configuration")?;
        if !config.can_caption() {
            warn!("OPENAI_API_KEY is not set; alt text will be \"Book cover image\"");
        }
        CaptionGenerator::new(config).context("Failed to create caption generator")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The batch bar replaces INFO logs; `serve` always logs at info.
    let bar_active = matches!(&cli.command, Command::Batch { no_progress: false, .. });
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || bar_active {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve {
            port,
            host,
            max_upload,
            caption,
        } => {
            let (port, fell_back) = parse_port(port.as_deref());
            if fell_back {
                warn!("Invalid PORT value, using default {}", port);
            }
            let config = ServerConfig {
                host,
                port,
                max_upload_bytes: max_upload,
            };
            let state = AppState::new(caption.captioner()?);
            serve(config, state).await.context("Server error")?;
        }

        Command::Convert {
            input,
            output,
            title,
            language,
            json,
            caption,
        } => {
            let captioner = caption.captioner()?;
            let output = output.unwrap_or_else(|| default_output(&input));

            let mut request = CoverRequest::new();
            if let Some(t) = title {
                request = request.with_title(t);
            }
            if let Some(l) = language {
                request = request.with_language(l);
            }

            let cover = create_cover_file(&input, &output, &request, &captioner)
                .await
                .context("Cover creation failed")?;

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&cover).context("Failed to serialise output")?
                );
            } else if !cli.quiet {
                let source = match cover.alt_text_source {
                    CaptionSource::Model => "model",
                    CaptionSource::Fallback => "fallback",
                };
                eprintln!(
                    "{}  {}  {}ms  →  {}",
                    green("✔"),
                    cover.title,
                    cover.duration_ms,
                    bold(&output.display().to_string())
                );
                eprintln!("   alt text ({}): {}", source, dim(&cover.alt_text));
            }
        }

        Command::Batch {
            src_dir,
            dest_dir,
            no_progress,
            caption,
        } => {
            let captioner = caption.captioner()?;
            let show_progress = !cli.quiet && !no_progress;

            let progress: Box<dyn BatchProgressCallback> = if show_progress {
                Box::new(CliBatchProgress::new())
            } else {
                Box::new(NoopBatchProgress)
            };
            let report = create_covers_in_dir(&src_dir, &dest_dir, &captioner, progress.as_ref())
                .await
                .with_context(|| format!("Batch failed for {}", src_dir.display()))?;

            info!("Batch finished: {} ok, {} failed", report.succeeded(), report.failed());
            if !cli.quiet {
                let mark = if report.failed() == 0 { green("✔") } else { red("✘") };
                eprintln!(
                    "{} {} covers created, {} failed",
                    mark,
                    bold(&report.succeeded().to_string()),
                    report.failed()
                );
            }
            if report.failed() > 0 && report.succeeded() == 0 && !report.items.is_empty() {
                anyhow::bail!("No covers could be created");
            }
        }

        Command::Inspect { input, json } => {
            let meta = inspect(&input).await.context("Failed to inspect PDF")?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
                );
            } else {
                println!("File:         {}", input);
                println!("Title:        {}", meta.title.as_deref().unwrap_or("-"));
                println!("Language:     {}", meta.language.as_deref().unwrap_or("-"));
                println!("Pages:        {}", meta.page_count);
                println!("PDF Version:  {}", meta.pdf_version);
            }
        }
    }

    Ok(())
}

/// `<dir>/<stem>_cover.pdf` next to the input.
fn default_output(input: &Path) -> PathBuf {
    let name = input.file_name().and_then(|n| n.to_str());
    input.with_file_name(edgequake_pdfcover::cover_filename(name))
}
