//! Progress-callback trait for batch cover generation.
//!
//! Pass a [`BatchProgressCallback`] to [`crate::cover::create_covers_in_dir`]
//! to receive an event per file. The CLI drives an `indicatif` bar from it;
//! library callers can forward events wherever they like.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdfcover::BatchProgressCallback;
//! use std::path::Path;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Counter(AtomicUsize);
//!
//! impl BatchProgressCallback for Counter {
//!     fn on_file_complete(&self, _index: usize, _total: usize, _source: &Path, _output: &Path) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//! ```

use std::path::Path;

/// Called by the batch runner as it processes each file.
///
/// All methods default to no-ops. `index` is 1-based.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once with the number of PDFs found.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called before a file is read.
    fn on_file_start(&self, index: usize, total: usize, source: &Path) {
        let _ = (index, total, source);
    }

    /// Called after a cover was written.
    fn on_file_complete(&self, index: usize, total: usize, source: &Path, output: &Path) {
        let _ = (index, total, source, output);
    }

    /// Called when a file could not be converted. The batch continues.
    fn on_file_error(&self, index: usize, total: usize, source: &Path, error: &str) {
        let _ = (index, total, source, error);
    }

    /// Called once after every file was attempted.
    fn on_batch_complete(&self, total: usize, succeeded: usize) {
        let _ = (total, succeeded);
    }
}

/// Ignores every event.
pub struct NoopBatchProgress;

impl BatchProgressCallback for NoopBatchProgress {}
