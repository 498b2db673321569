//! Progress-callback trait for per-document batch events.
//!
//! Inject an [`Arc<dyn FormatProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the batch pipeline works through its documents.
//!
//! # Example
//!
//! ```rust
//! use codefence::{FormatProgressCallback, PipelineConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl FormatProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, source: &str, _status: codefence::DocumentStatus, code_blocks: usize) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{done}: {source} ({code_blocks} code blocks)");
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { completed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::DocumentStatus;
use std::sync::Arc;

/// Called by the batch pipeline as it processes each document.
///
/// Documents are processed concurrently, so `on_document_*` methods may be
/// called from several threads at once. All methods have default no-op
/// implementations so callers only override what they care about.
pub trait FormatProgressCallback: Send + Sync {
    /// Called once before any document is processed.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called when a document enters the pipeline, before the size check.
    fn on_document_start(&self, source: &str) {
        let _ = source;
    }

    /// Called when a document produced formatted output.
    ///
    /// # Arguments
    /// * `source`      — the document's source identity
    /// * `status`      — `Success` or `ClassificationDisabled`
    /// * `code_blocks` — number of fenced code blocks in the output
    fn on_document_complete(&self, source: &str, status: DocumentStatus, code_blocks: usize) {
        let _ = (source, status, code_blocks);
    }

    /// Called when a document was skipped, timed out, or failed.
    fn on_document_error(&self, source: &str, error: &str) {
        let _ = (source, error);
    }

    /// Called once after every document has an outcome.
    ///
    /// # Arguments
    /// * `total_documents` — documents submitted
    /// * `succeeded`       — documents that produced formatted output
    fn on_batch_complete(&self, total_documents: usize, succeeded: usize) {
        let _ = (total_documents, succeeded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl FormatProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn FormatProgressCallback>;
