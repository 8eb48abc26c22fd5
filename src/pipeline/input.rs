//! Input resolution: turn bytes, a path or a URL into an opened [`SourceDocument`].
//!
//! Everything downstream works on an in-memory `lopdf::Document`, so local
//! files and downloads are both read fully into a buffer. We check for the
//! `%PDF` header before parsing so callers get [`CoverError::NotAPdf`] for an
//! uploaded JPEG rather than an opaque parser message.

use crate::error::CoverError;
use crate::output::PageGeometry;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Reference chains and page-tree walks stop after this many hops.
const MAX_DEPTH: usize = 32;

/// Conservative upper bound for where the `%PDF-` header may start.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// US Letter, used when a page tree carries no MediaBox at all.
const LETTER: PageGeometry = PageGeometry {
    width: 612.0,
    height: 792.0,
};

/// An opened, read-only source PDF.
///
/// Owns the parsed object graph for the lifetime of one request; dropping it
/// releases everything.
pub struct SourceDocument {
    doc: Document,
    name: String,
}

impl SourceDocument {
    /// Parse `bytes` as a PDF. `name` identifies the source in errors and logs.
    pub fn from_bytes(bytes: &[u8], name: impl Into<String>) -> Result<Self, CoverError> {
        let name = name.into();
        check_magic(bytes, &name)?;

        let doc = Document::load_mem(bytes).map_err(|e| CoverError::CorruptPdf {
            source_name: name.clone(),
            detail: e.to_string(),
        })?;

        debug!("Opened '{}': PDF {}, {} objects", name, doc.version, doc.objects.len());
        Ok(Self { doc, name })
    }

    /// Source identifier (file name, path or `"<upload>"`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parsed object graph.
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Number of leaf pages.
    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// Object id of page 1, if the document has any pages.
    pub fn first_page_id(&self) -> Option<ObjectId> {
        self.doc.get_pages().values().next().copied()
    }

    /// Follow indirect references until a direct object is reached.
    pub fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        resolve(&self.doc, obj)
    }

    /// Look up `key` on a page, walking up `/Parent` for inheritable attributes.
    pub fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut node: &Dictionary = self.doc.get_object(page_id).ok()?.as_dict().ok()?;
        for _ in 0..MAX_DEPTH {
            if let Ok(value) = node.get(key) {
                return Some(self.resolve(value));
            }
            let parent = node.get(b"Parent").ok()?;
            node = self.resolve(parent).as_dict().ok()?;
        }
        None
    }

    /// Width and height of the first page's MediaBox.
    pub fn first_page_geometry(&self) -> Result<PageGeometry, CoverError> {
        let page_id = self
            .first_page_id()
            .ok_or_else(|| CoverError::no_image(None))?;

        let Some(media_box) = self.inherited(page_id, b"MediaBox") else {
            warn!("'{}': first page has no MediaBox, assuming US Letter", self.name);
            return Ok(LETTER);
        };

        let corners: Vec<f32> = match media_box {
            Object::Array(items) => items
                .iter()
                .filter_map(|o| as_number(self.resolve(o)))
                .collect(),
            _ => Vec::new(),
        };

        if corners.len() != 4 {
            return Err(CoverError::CorruptPdf {
                source_name: self.name.clone(),
                detail: format!("MediaBox has {} numeric entries, expected 4", corners.len()),
            });
        }

        let width = (corners[2] - corners[0]).abs();
        let height = (corners[3] - corners[1]).abs();
        if width <= 0.0 || height <= 0.0 {
            return Err(CoverError::CorruptPdf {
                source_name: self.name.clone(),
                detail: format!("degenerate MediaBox {width} x {height}"),
            });
        }

        Ok(PageGeometry { width, height })
    }
}

/// Follow indirect references in `doc` until a direct object is reached.
///
/// A dangling reference resolves to itself.
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    let mut current = obj;
    for _ in 0..MAX_DEPTH {
        match current {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(target) => current = target,
                Err(_) => return current,
            },
            _ => return current,
        }
    }
    current
}

/// Numeric value of an `Integer` or `Real` object.
pub fn as_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Read a local file path or download a URL into memory.
///
/// Returns the bytes plus a display name for logs and errors.
pub async fn load_input(input: &str, timeout_secs: u64) -> Result<(Vec<u8>, String), CoverError> {
    if is_url(input) {
        let bytes = download_url(input, timeout_secs).await?;
        Ok((bytes, input.to_string()))
    } else if input.trim().is_empty() {
        Err(CoverError::InvalidInput {
            input: input.to_string(),
        })
    } else {
        let path = PathBuf::from(input);
        let bytes = read_local(&path).await?;
        Ok((bytes, path.display().to_string()))
    }
}

/// Read a local PDF, mapping I/O failures onto typed errors.
pub async fn read_local(path: &Path) -> Result<Vec<u8>, CoverError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            debug!("Read {} bytes from {}", bytes.len(), path.display());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(CoverError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => Err(CoverError::FileNotFound {
            path: path.to_path_buf(),
        }),
    }
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, CoverError> {
    info!("Downloading PDF from: {}", url);

    let failed = |reason: String| CoverError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            failed(format!("timed out after {timeout_secs}s"))
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}

/// Reject buffers without a `%PDF-` header near the start.
fn check_magic(bytes: &[u8], name: &str) -> Result<(), CoverError> {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    if window.windows(5).any(|w| w == b"%PDF-") {
        return Ok(());
    }
    Err(CoverError::NotAPdf {
        source_name: name.to_string(),
        magic: bytes.iter().take(4).copied().collect(),
    })
}
