//! # edgequake-pdfcover
//!
//! Turn the cover image of a PDF into a single-page, accessible (PDF/UA-1)
//! document whose image carries alt text written by a vision language model.
//!
//! ## Why this crate?
//!
//! Publishers ship covers as the first page of a PDF, usually as one big
//! image with no description. Screen readers announce nothing useful. This
//! crate lifts that image out, asks a VLM to describe it, and writes a small
//! tagged document: language, title, structure tree and a `Figure` with
//! `/Alt`. When no model is configured, or the call fails, the fixed text
//! `"Book cover image"` is used instead, so a cover is always produced.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Input    check %PDF header, parse with lopdf (spawn_blocking)
//!  ├─ 2. Metadata title from /Info, language from /Lang
//!  ├─ 3. Locate   first image XObject on page 1
//!  ├─ 4. Caption  PNG → base64 → chat completions or an edgequake-llm
//!  │              provider (fallback on any error)
//!  └─ 5. Build    deep-copy image, tag it, serialise PDF/UA-1
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfcover::{create_cover, CaptionConfig, CaptionGenerator, CoverRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CaptionConfig::builder()
//!         .maybe_api_key(std::env::var("OPENAI_API_KEY").ok())
//!         .build()?;
//!     let captioner = CaptionGenerator::new(config)?;
//!
//!     let bytes = std::fs::read("book.pdf")?;
//!     let cover = create_cover(bytes, &CoverRequest::new(), &captioner).await?;
//!     std::fs::write("book_cover.pdf", &cover.pdf)?;
//!     eprintln!("alt text: {}", cover.alt_text);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfcover` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdfcover = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod cover;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{CaptionConfig, CaptionConfigBuilder, ServerConfig};
pub use cover::{
    cover_filename, create_cover, create_cover_file, create_covers_in_dir, extract_metadata,
    find_pdf_files, inspect, CoverRequest, DEFAULT_LANGUAGE, DEFAULT_TITLE,
};
pub use error::{CaptionError, CoverError};
pub use output::{BatchItem, BatchReport, CoverOutput, DocumentMetadata, PageGeometry};
pub use pipeline::build::AccessibleDocumentBuilder;
pub use pipeline::caption::{Caption, CaptionGenerator, CaptionSource};
pub use progress::{BatchProgressCallback, NoopBatchProgress};
pub use server::{router, serve, AppState};
