//! Error types for the edgequake-pdfcover library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`CoverError`]: **Fatal**: the cover cannot be produced at all (bad
//!   upload, corrupt PDF, no image on the first page). Returned as
//!   `Err(CoverError)` from the top-level entry points in [`crate::cover`].
//!
//! * [`CaptionError`]: **Non-fatal**: the vision model could not describe the
//!   image. It never leaves [`crate::pipeline::caption`]; the generator logs
//!   it and substitutes the fixed fallback caption so the cover is still built.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdfcover library.
#[derive(Debug, Error)]
pub enum CoverError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// The bytes were read, but they are not a PDF.
    #[error("'{source_name}' is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { source_name: String, magic: Vec<u8> },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{source_name}' is corrupt: {detail}")]
    CorruptPdf { source_name: String, detail: String },

    /// The first page carries no image XObject.
    ///
    /// This is a precondition on caller-supplied data rather than a system
    /// fault, so the HTTP layer reports it as `422 Unprocessable Entity`.
    #[error("{message}")]
    ImageExtraction { message: String },

    /// Serialising the cover document failed.
    #[error("Failed to write cover PDF: {0}")]
    PdfWrite(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoverError {
    /// Message used when the first page has no image resource.
    pub const NO_IMAGE_MESSAGE: &'static str = "No image found on the first page";

    /// Build the image-extraction failure, optionally naming the source.
    pub fn no_image(source: Option<&str>) -> Self {
        let message = match source {
            Some(s) => format!("{}: {}", Self::NO_IMAGE_MESSAGE, s),
            None => Self::NO_IMAGE_MESSAGE.to_string(),
        };
        CoverError::ImageExtraction { message }
    }

    /// `true` for the domain failure that maps to HTTP 422.
    pub fn is_image_extraction(&self) -> bool {
        matches!(self, CoverError::ImageExtraction { .. })
    }
}

/// Why the vision model did not produce a caption.
///
/// Only ever logged; the caller always receives a caption.
#[derive(Debug, Error)]
pub enum CaptionError {
    /// No API key is configured.
    #[error("no API key configured")]
    MissingCredential,

    /// The image XObject could not be turned into a PNG.
    #[error("image encoding failed: {0}")]
    Encode(String),

    /// Transport-level failure (DNS, TLS, timeout, body read).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A configured `edgequake-llm` provider returned an error.
    #[error("provider call failed: {0}")]
    Provider(String),

    /// The call did not finish within the configured timeout.
    #[error("timed out after {0}s")]
    Timeout(u64),

    /// The endpoint answered with a non-success status.
    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The body was not the expected chat-completion shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}
