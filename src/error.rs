//! Error types for the codefence library.
//!
//! Three tiers reflect three distinct failure modes:
//!
//! * [`FormatError`] — **Fatal**: the run cannot proceed at all (invalid
//!   configuration, unreadable input, output directory not writable).
//!   Returned as `Err(FormatError)` from the top-level `format_*` functions.
//!
//! * [`DocumentError`] — **Per-document**: one document was rejected, could
//!   not be read, timed out, or its processing panicked. Stored inside
//!   [`crate::output::DocumentOutcome`] so the rest of the batch is untouched.
//!
//! * [`Diagnostic`] — **Non-fatal**: the engine hit an ambiguous decision and
//!   took the safe fallback (plain prose, or an unlabeled fence). Collected in
//!   [`crate::output::FormattedDocument`] for reporting only.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the codefence library.
///
/// Document-level failures use [`DocumentError`] and are stored in
/// [`crate::output::DocumentOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum FormatError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Policy or limits are unusable. Raised before any document is processed,
    /// since every document would be misconfigured identically.
    #[error("Invalid configuration: {0}")]
    ConfigurationInvalid(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file was read but is not valid UTF-8 text.
    #[error("Input '{path}' is not UTF-8 text; run it through the PDF text converter first")]
    NotUtf8 { path: PathBuf },

    /// Any other I/O failure while reading an input.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write a formatted output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failure confined to a single document.
///
/// The batch continues; the document's outcome carries this error and no
/// formatted output.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentError {
    /// Rejected before any processing started.
    #[error("document is {size} bytes, exceeding the {limit}-byte limit")]
    DocumentTooLarge { size: u64, limit: u64 },

    /// Processing exceeded the per-document timeout; partial output discarded.
    #[error("processing timed out after {elapsed_ms}ms")]
    DocumentTimeout { elapsed_ms: u64 },

    /// The input file could not be read as UTF-8 text.
    #[error("input unreadable: {detail}")]
    InputUnreadable { detail: String },

    /// Processing panicked or its worker was lost.
    #[error("processing failed: {detail}")]
    ProcessingFailed { detail: String },
}

impl From<FormatError> for DocumentError {
    fn from(e: FormatError) -> Self {
        DocumentError::InputUnreadable {
            detail: e.to_string(),
        }
    }
}

/// The engine stopped because its document's budget ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cancelled;

/// A non-fatal decision the engine resolved with its safe fallback.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A code-candidate run was too weak to stand alone and was kept as prose.
    /// Line indices are 0-based, `end` exclusive.
    SegmentationAmbiguity { start: usize, end: usize },

    /// A code segment was fenced without a language label.
    ClassificationUncertain {
        start: usize,
        end: usize,
        reason: Uncertainty,
    },
}

/// Why the classifier declined to label a segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Uncertainty {
    /// The best language scored under the acceptance threshold.
    BelowThreshold { best: Option<&'static str>, score: f64 },
    /// The two best languages scored within the tie margin of each other.
    Tie {
        first: &'static str,
        second: &'static str,
        margin: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_invalid_display() {
        let e = FormatError::ConfigurationInvalid("supported language set is empty".into());
        assert!(e.to_string().contains("Invalid configuration"));
        assert!(e.to_string().contains("empty"));
    }

    #[test]
    fn too_large_display() {
        let e = DocumentError::DocumentTooLarge {
            size: 2048,
            limit: 1024,
        };
        let msg = e.to_string();
        assert!(msg.contains("2048"), "got: {msg}");
        assert!(msg.contains("1024"), "got: {msg}");
    }

    #[test]
    fn timeout_display() {
        let e = DocumentError::DocumentTimeout { elapsed_ms: 5000 };
        assert!(e.to_string().contains("5000ms"));
    }

    #[test]
    fn read_error_becomes_unreadable_input() {
        let e = DocumentError::from(FormatError::NotUtf8 {
            path: PathBuf::from("bad.txt"),
        });
        match e {
            DocumentError::InputUnreadable { ref detail } => {
                assert!(detail.contains("bad.txt"), "got: {detail}")
            }
            other => panic!("expected unreadable input, got {other:?}"),
        }
    }

    #[test]
    fn document_error_serialises_with_kind_tag() {
        let e = DocumentError::DocumentTimeout { elapsed_ms: 12 };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["kind"], "document_timeout");
        assert_eq!(json["elapsed_ms"], 12);
    }

    #[test]
    fn tie_diagnostic_serialises() {
        let d = Diagnostic::ClassificationUncertain {
            start: 3,
            end: 5,
            reason: Uncertainty::Tie {
                first: "python",
                second: "yaml",
                margin: 0.0,
            },
        };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["kind"], "classification_uncertain");
        assert_eq!(json["reason"]["kind"], "tie");
        assert_eq!(json["reason"]["first"], "python");
    }
}
