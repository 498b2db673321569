//! # codefence
//!
//! Find the source code buried in PDF-extracted text and fence it properly.
//!
//! ## Why this crate?
//!
//! Text converted from PDF loses its code blocks: the monospace font is gone,
//! fences were never there, and indentation survives only by luck. Left as
//! is, a shell command or a YAML manifest reads as a ragged paragraph and
//! every downstream renderer mangles it. This crate scans the text, finds the
//! runs that are code rather than prose, labels each with its language when
//! the evidence is clear, and wraps it in a Markdown fence while keeping the
//! whitespace that matters.
//!
//! The contract is best effort with a safe fallback: a run that might be
//! prose stays prose, and code whose language is unclear gets an unlabeled
//! fence rather than a wrong label.
//!
//! ## Pipeline Overview
//!
//! ```text
//! converted text
//!  │
//!  ├─ 1. Input     normalise line endings, invisible chars, page breaks
//!  ├─ 2. Segment   split into prose / code / pre-fenced runs
//!  ├─ 3. Classify  score each code run against the supported languages
//!  ├─ 4. Indent    preserve or normalise whitespace of labeled code
//!  ├─ 5. Render    fence code, assemble the document
//!  └─ 6. Batch     many documents concurrently, with size, memory and time limits
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use codefence::{format_batch, Document, FormattingPolicy, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder()
//!         .policy(FormattingPolicy::new(["python", "bash", "yaml"])?)
//!         .timeout_secs(60)
//!         .build()?;
//!     let doc = codefence::read_document("guide.txt").await?;
//!     let output = format_batch(vec![doc], &config).await?;
//!     for outcome in &output.documents {
//!         if let Some(ref formatted) = outcome.output {
//!             println!("{}", formatted.text);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `codefence` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! codefence = { version = "0.1", default-features = false }
//! ```
//!
//! ## Supported Languages
//!
//! | Tag | Aliases | Indent unit |
//! |-----|---------|-------------|
//! | `python`     | `py`, `python3`             | 4 |
//! | `go`         | `golang`                    | 4 |
//! | `rust`       | `rs`                        | 4 |
//! | `javascript` | `js`, `node`, `jsx`, `mjs`  | 2 |
//! | `bash`       | `sh`, `shell`, `zsh`, `console` | 2 |
//! | `json`       |                             | 2 |
//! | `yaml`       | `yml`                       | 2 |
//!
//! More can be added by implementing [`Language`] and registering it in a
//! [`LanguageRegistry`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod languages;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{
    format_batch, format_batch_sync, format_batch_to_dir, format_document, format_files,
    format_files_to_dir,
};
pub use config::{FormattingPolicy, PipelineConfig, PipelineConfigBuilder};
pub use error::{Diagnostic, DocumentError, FormatError, Uncertainty};
pub use languages::{Language, LanguageRegistry, Signature};
pub use output::{BatchOutput, BatchStats, DocumentOutcome, DocumentStatus, FormattedDocument};
pub use pipeline::classify::{classify, ClassificationResult, Verdict};
pub use pipeline::input::{collect_inputs, read_document, Document};
pub use pipeline::render::FormattedBlock;
pub use pipeline::segment::{segment, Segment, SegmentKind, Segmentation};
pub use progress::{FormatProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{format_stream, OutcomeStream};
