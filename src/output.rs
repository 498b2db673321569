//! Output types: per-document outcomes and batch statistics.
//!
//! Everything here is `Serialize` so the CLI can print a batch report with
//! `--json` and library callers can log or persist it as-is.

use crate::error::{Diagnostic, DocumentError};
use crate::pipeline::segment::Segment;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Terminal state of one document in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentStatus {
    /// Formatted, with language detection.
    Success,
    /// Rejected by the size limit before any processing.
    SkippedTooLarge,
    /// Aborted by the per-document timeout; no output.
    TimedOut,
    /// Formatted, but detection was off so every fence is unlabeled.
    ClassificationDisabled,
    /// Unreadable input, or processing panicked; no output.
    Failed,
}

impl DocumentStatus {
    /// Whether the document produced formatted output.
    pub fn has_output(self) -> bool {
        matches!(
            self,
            DocumentStatus::Success | DocumentStatus::ClassificationDisabled
        )
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentStatus::Success => "success",
            DocumentStatus::SkippedTooLarge => "skipped-too-large",
            DocumentStatus::TimedOut => "timed-out",
            DocumentStatus::ClassificationDisabled => "classification-disabled",
            DocumentStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl From<&DocumentError> for DocumentStatus {
    fn from(e: &DocumentError) -> Self {
        match e {
            DocumentError::DocumentTooLarge { .. } => DocumentStatus::SkippedTooLarge,
            DocumentError::DocumentTimeout { .. } => DocumentStatus::TimedOut,
            DocumentError::InputUnreadable { .. } | DocumentError::ProcessingFailed { .. } => {
                DocumentStatus::Failed
            }
        }
    }
}

/// A fully formatted document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormattedDocument {
    /// Source identity, copied from the input document.
    pub source: String,
    pub page_count: usize,
    /// Final text, ending in exactly one newline.
    pub text: String,
    /// Segmentation of the input, in line order.
    pub segments: Vec<Segment>,
    /// Code segments emitted as fences (labeled or not).
    pub code_blocks: usize,
    /// Code segments that received a language label.
    pub labeled_blocks: usize,
    /// Labeled block count per canonical tag.
    pub languages: BTreeMap<String, usize>,
    /// Ambiguities the engine resolved with its safe fallback.
    pub diagnostics: Vec<Diagnostic>,
}

/// The result for one submitted document, tagged with its source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentOutcome {
    pub source: String,
    pub status: DocumentStatus,
    /// Present only when [`DocumentStatus::has_output`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<FormattedDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DocumentError>,
    /// Wall-clock time attributed to this document; 0 when it was rejected
    /// before processing.
    pub duration_ms: u64,
    /// Where the formatted text was written, for directory output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
}

impl DocumentOutcome {
    pub(crate) fn formatted(
        status: DocumentStatus,
        output: FormattedDocument,
        duration: Duration,
    ) -> Self {
        Self {
            source: output.source.clone(),
            status,
            output: Some(output),
            error: None,
            duration_ms: duration.as_millis() as u64,
            output_path: None,
        }
    }

    pub(crate) fn failed(source: String, error: DocumentError, duration: Duration) -> Self {
        Self {
            source,
            status: DocumentStatus::from(&error),
            output: None,
            error: Some(error),
            duration_ms: duration.as_millis() as u64,
            output_path: None,
        }
    }
}

/// Aggregate counts for a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    /// Documents submitted.
    pub total: usize,
    /// Documents with formatted output (`success` or `classification-disabled`).
    pub succeeded: usize,
    pub classification_disabled: usize,
    pub skipped_too_large: usize,
    pub timed_out: usize,
    pub failed: usize,
    /// Wall-clock time of the whole batch.
    pub total_duration_ms: u64,
}

impl BatchStats {
    /// Tally outcomes.
    pub fn from_outcomes(outcomes: &[DocumentOutcome], elapsed: Duration) -> Self {
        let count = |status: DocumentStatus| outcomes.iter().filter(|o| o.status == status).count();
        Self {
            total: outcomes.len(),
            succeeded: outcomes.iter().filter(|o| o.status.has_output()).count(),
            classification_disabled: count(DocumentStatus::ClassificationDisabled),
            skipped_too_large: count(DocumentStatus::SkippedTooLarge),
            timed_out: count(DocumentStatus::TimedOut),
            failed: count(DocumentStatus::Failed),
            total_duration_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Everything a batch run produced.
///
/// `documents` is in completion order, not submission order; use
/// [`BatchOutput::sort_by_source`] or [`BatchOutput::get`] when order matters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchOutput {
    pub documents: Vec<DocumentOutcome>,
    pub stats: BatchStats,
}

impl BatchOutput {
    /// The outcome for `source`, if it was submitted.
    pub fn get(&self, source: &str) -> Option<&DocumentOutcome> {
        self.documents.iter().find(|d| d.source == source)
    }

    /// Re-sort outcomes by source identity.
    pub fn sort_by_source(&mut self) {
        self.documents.sort_by(|a, b| a.source.cmp(&b.source));
    }
}
