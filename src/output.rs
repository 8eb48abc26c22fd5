//! Result types returned by the cover pipeline.

use crate::pipeline::caption::CaptionSource;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Title, language and page count of a source PDF.
///
/// Absent or blank values are `None`; they serialise as JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub language: Option<String>,
    pub page_count: usize,
    /// Header version, e.g. `"1.7"`.
    pub pdf_version: String,
}

/// Width and height of a page in PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
}

/// A finished cover document plus what went into it.
#[derive(Debug, Clone, Serialize)]
pub struct CoverOutput {
    /// Serialised PDF/UA-1 document.
    #[serde(skip)]
    pub pdf: Vec<u8>,
    pub title: String,
    pub language: String,
    /// Alt text attached to the cover image. Never empty.
    pub alt_text: String,
    pub alt_text_source: CaptionSource,
    pub page: PageGeometry,
    pub duration_ms: u64,
}

/// Outcome of converting one file in a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub source: PathBuf,
    /// Written cover path on success.
    pub output: Option<PathBuf>,
    pub error: Option<String>,
}

/// Summary of [`crate::cover::create_covers_in_dir`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.error.is_none()).count()
    }

    pub fn failed(&self) -> usize {
        self.items.iter().filter(|i| i.error.is_some()).count()
    }
}
