//! Cover generation entry points.
//!
//! Every entry point runs the same pipeline:
//!
//! 1. parse the source and locate the first-page image (`spawn_blocking`)
//! 2. resolve title and language: override, then document value, then default
//! 3. caption the image (async HTTP, never fails)
//! 4. build and serialise the cover (`spawn_blocking`)
//!
//! The in-memory variant serves HTTP uploads. The file variants add an
//! atomic write and a directory batch mode on top.

use crate::error::CoverError;
use crate::output::{BatchItem, BatchReport, CoverOutput, DocumentMetadata, PageGeometry};
use crate::pipeline::build::AccessibleDocumentBuilder;
use crate::pipeline::caption::CaptionGenerator;
use crate::pipeline::input::{self, SourceDocument};
use crate::pipeline::locate::{self, ExtractedImage};
use crate::pipeline::metadata;
use crate::progress::BatchProgressCallback;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Title used when neither the request nor the document supplies one.
pub const DEFAULT_TITLE: &str = "Book Cover";

/// Language used when neither the request nor the document supplies one.
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Source name used for in-memory uploads.
pub const UPLOAD_SOURCE_NAME: &str = "<upload>";

const DOWNLOAD_TIMEOUT_SECS: u64 = 120;

/// Optional title and language overrides for one cover.
///
/// Blank overrides are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverRequest {
    pub title: Option<String>,
    pub language: Option<String>,
}

impl CoverRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = non_blank(title.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = non_blank(language.into());
        self
    }

    fn resolve_title(&self, from_document: Option<String>) -> String {
        pick(self.title.as_deref(), from_document, DEFAULT_TITLE)
    }

    fn resolve_language(&self, from_document: Option<String>) -> String {
        pick(self.language.as_deref(), from_document, DEFAULT_LANGUAGE)
    }
}

/// Non-blank values are kept exactly as sent, surrounding whitespace included.
fn non_blank(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

fn pick(overridden: Option<&str>, from_document: Option<String>, default: &str) -> String {
    overridden
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .or(from_document)
        .unwrap_or_else(|| default.to_string())
}

/// Everything the CPU-bound first half hands to the caption step.
struct Prepared {
    source: SourceDocument,
    image: ExtractedImage,
    page: PageGeometry,
    metadata: DocumentMetadata,
}

/// Build an accessible cover from an uploaded PDF held in memory.
///
/// # Errors
/// - [`CoverError::NotAPdf`] / [`CoverError::CorruptPdf`] when the bytes do not parse
/// - [`CoverError::ImageExtraction`] when page 1 has no image
/// - [`CoverError::PdfWrite`] when serialisation fails
///
/// A failed caption is *not* an error; the fallback text is used.
pub async fn create_cover(
    bytes: Vec<u8>,
    request: &CoverRequest,
    captioner: &CaptionGenerator,
) -> Result<CoverOutput, CoverError> {
    run_pipeline(bytes, UPLOAD_SOURCE_NAME.to_string(), None, request, captioner).await
}

async fn run_pipeline(
    bytes: Vec<u8>,
    source_name: String,
    error_label: Option<String>,
    request: &CoverRequest,
    captioner: &CaptionGenerator,
) -> Result<CoverOutput, CoverError> {
    let start = Instant::now();
    info!("Creating cover for '{}' ({} bytes)", source_name, bytes.len());

    // ── Step 1: Parse and locate ─────────────────────────────────────────
    let prepared = blocking(move || prepare(&bytes, source_name, error_label.as_deref())).await?;
    let Prepared {
        source,
        image,
        page,
        metadata,
    } = prepared;

    // ── Step 2: Resolve title and language ───────────────────────────────
    let title = request.resolve_title(metadata.title);
    let language = request.resolve_language(metadata.language);
    debug!("Resolved title '{}', language '{}'", title, language);

    // ── Step 3: Caption ──────────────────────────────────────────────────
    let caption = captioner.generate(&image, &title).await;

    // ── Step 4: Build ────────────────────────────────────────────────────
    let (pdf, alt_text) = {
        let title = title.clone();
        let language = language.clone();
        let alt_text = caption.text.clone();
        blocking(move || {
            let mut builder = AccessibleDocumentBuilder::new(title, language);
            builder.add_page(page)?;
            builder.place_described_image(source.document(), &image, &alt_text)?;
            Ok((builder.save_to_vec()?, alt_text))
        })
        .await?
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Cover created: {} bytes, {:.0} x {:.0} pt, alt text from {:?}, {}ms",
        pdf.len(),
        page.width,
        page.height,
        caption.source,
        duration_ms
    );

    Ok(CoverOutput {
        pdf,
        title,
        language,
        alt_text,
        alt_text_source: caption.source,
        page,
        duration_ms,
    })
}

fn prepare(
    bytes: &[u8],
    source_name: String,
    error_label: Option<&str>,
) -> Result<Prepared, CoverError> {
    let source = SourceDocument::from_bytes(bytes, source_name)?;
    let metadata = metadata::read_metadata(&source);
    let image = locate::locate_cover_image(&source, error_label)?;
    let page = source.first_page_geometry()?;
    Ok(Prepared {
        source,
        image,
        page,
        metadata,
    })
}

/// Read title, language and page count from a PDF held in memory.
pub async fn extract_metadata(bytes: Vec<u8>) -> Result<DocumentMetadata, CoverError> {
    blocking(move || {
        let source = SourceDocument::from_bytes(&bytes, UPLOAD_SOURCE_NAME)?;
        Ok(metadata::read_metadata(&source))
    })
    .await
}

/// Read metadata from a local path or HTTP(S) URL.
///
/// Does not require an API key.
pub async fn inspect(input_str: impl AsRef<str>) -> Result<DocumentMetadata, CoverError> {
    let (bytes, name) = input::load_input(input_str.as_ref(), DOWNLOAD_TIMEOUT_SECS).await?;
    blocking(move || {
        let source = SourceDocument::from_bytes(&bytes, name)?;
        Ok(metadata::read_metadata(&source))
    })
    .await
}

/// Build a cover from `src` and write it to `dest`.
///
/// Uses atomic write (temp file in the destination directory + rename), so
/// a failed run never leaves a partial cover behind.
pub async fn create_cover_file(
    src: impl AsRef<Path>,
    dest: impl AsRef<Path>,
    request: &CoverRequest,
    captioner: &CaptionGenerator,
) -> Result<CoverOutput, CoverError> {
    let src = src.as_ref();
    let dest = dest.as_ref().to_path_buf();

    let bytes = input::read_local(src).await?;
    let label = src.display().to_string();
    let output = run_pipeline(bytes, label.clone(), Some(label), request, captioner).await?;

    let pdf = output.pdf.clone();
    let target = dest.clone();
    blocking(move || write_atomic(&target, &pdf)).await?;
    info!("Wrote {}", dest.display());
    Ok(output)
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<(), CoverError> {
    let failed = |source: std::io::Error| CoverError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(failed)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(failed)?;
    tmp.write_all(data).map_err(failed)?;
    tmp.as_file().sync_all().map_err(failed)?;
    tmp.persist(path).map_err(|e| failed(e.error))?;
    Ok(())
}

/// List `*.pdf` regular files in `dir` (case-insensitive), sorted by name.
pub async fn find_pdf_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, CoverError> {
    let dir = dir.as_ref();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|_| CoverError::FileNotFound {
            path: dir.to_path_buf(),
        })?;

    let mut files = Vec::new();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        let path = entry.path();
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if is_file && is_pdf {
            files.push(path);
        }
    }
    files.sort();
    debug!("Found {} PDF files in {}", files.len(), dir.display());
    Ok(files)
}

/// Create a cover for every PDF in `src_dir`, writing `<stem>_cover.pdf`
/// into `dest_dir`.
///
/// Per-file failures are recorded in the report and do not stop the batch.
pub async fn create_covers_in_dir(
    src_dir: impl AsRef<Path>,
    dest_dir: impl AsRef<Path>,
    captioner: &CaptionGenerator,
    progress: &dyn BatchProgressCallback,
) -> Result<BatchReport, CoverError> {
    let dest_dir = dest_dir.as_ref();
    let files = find_pdf_files(src_dir).await?;
    tokio::fs::create_dir_all(dest_dir)
        .await
        .map_err(|e| CoverError::OutputWriteFailed {
            path: dest_dir.to_path_buf(),
            source: e,
        })?;

    let total = files.len();
    info!("Batch: {} PDF files", total);
    progress.on_batch_start(total);

    let request = CoverRequest::default();
    let mut report = BatchReport::default();
    for (i, source) in files.into_iter().enumerate() {
        let index = i + 1;
        progress.on_file_start(index, total, &source);

        let file_name = source.file_name().and_then(|n| n.to_str());
        let output = dest_dir.join(cover_filename(file_name));

        match create_cover_file(&source, &output, &request, captioner).await {
            Ok(_) => {
                progress.on_file_complete(index, total, &source, &output);
                report.items.push(BatchItem {
                    source,
                    output: Some(output),
                    error: None,
                });
            }
            Err(e) => {
                warn!("Failed to create cover for {}: {}", source.display(), e);
                let message = e.to_string();
                progress.on_file_error(index, total, &source, &message);
                report.items.push(BatchItem {
                    source,
                    output: None,
                    error: Some(message),
                });
            }
        }
    }

    info!(
        "Batch complete: {} succeeded, {} failed",
        report.succeeded(),
        report.failed()
    );
    progress.on_batch_complete(total, report.succeeded());
    Ok(report)
}

/// Attachment name for the cover of an uploaded file.
///
/// `"book.pdf"` → `"book_cover.pdf"` (the `.pdf` match is case-insensitive),
/// any other name gets `_cover.pdf` appended, and a missing or blank name
/// gives `"cover.pdf"`. Directory components and `"` are dropped.
pub fn cover_filename(original: Option<&str>) -> String {
    let name = original
        .map(|n| n.rsplit(['/', '\\']).next().unwrap_or(n))
        .map(|n| n.replace('"', ""))
        .filter(|n| !n.trim().is_empty());

    match name {
        None => "cover.pdf".to_string(),
        Some(n) if n.to_ascii_lowercase().ends_with(".pdf") => {
            format!("{}_cover.pdf", &n[..n.len() - 4])
        }
        Some(n) => format!("{n}_cover.pdf"),
    }
}

/// Run CPU-bound PDF work off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, CoverError>
where
    F: FnOnce() -> Result<T, CoverError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CoverError::Internal(format!("blocking task failed: {e}")))?
}
