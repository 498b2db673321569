//! Batch Pipeline: format many documents under resource limits.
//!
//! [`format_document`] is the single-document engine: segment, classify,
//! resolve indentation and render, strictly in line order. Everything else in
//! this module schedules that engine across a batch:
//!
//! ```text
//! documents ──▶ size check ──▶ timeout( memory permits ──▶ load ──▶ spawn_blocking(engine) )
//!                  │                                                      │
//!                  ▼                                                      ▼
//!          skipped-too-large                              success / timed-out / failed
//! ```
//!
//! [`format_files`] takes paths instead of documents: the size check uses the
//! file's metadata and the text is read only at the `load` step, so an
//! unreadable file fails on its own.
//!
//! At most `max_concurrent_documents` documents are in flight
//! (`buffer_unordered`), and their combined size never exceeds the memory
//! budget. A timeout or a panic affects only the document it happened in;
//! outcomes arrive in completion order, each tagged with its source.

use crate::config::{FormattingPolicy, PipelineConfig};
use crate::error::{Cancelled, Diagnostic, DocumentError, FormatError};
use crate::output::{BatchOutput, BatchStats, DocumentOutcome, DocumentStatus, FormattedDocument};
use crate::pipeline::classify::{self, Verdict};
use crate::pipeline::indent;
use crate::pipeline::input::{io_error, read_document, Document};
use crate::pipeline::render::{self, FormattedBlock};
use crate::pipeline::segment::{self, SegmentKind};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Indent unit used when a labeled language is somehow missing from the policy.
const FALLBACK_INDENT_UNIT: usize = 4;

// ── Single-document engine ───────────────────────────────────────────────

/// Format one document with `policy`.
///
/// Pure and deterministic: no I/O, no shared state. Prose is copied through,
/// code segments are fenced, and every fallback taken along the way is
/// recorded in [`FormattedDocument::diagnostics`].
///
/// # Example
/// ```rust
/// use codefence::{format_document, Document, FormattingPolicy};
///
/// let policy = FormattingPolicy::new(["python"]).unwrap();
/// let doc = Document::from_text(
///     "intro.md",
///     "Intro text.\n    def f():\n        return 1\nMore text.\n",
/// );
/// let out = format_document(&doc, &policy);
/// assert_eq!(
///     out.text,
///     "Intro text.\n```python\n    def f():\n        return 1\n```\nMore text.\n"
/// );
/// ```
pub fn format_document(doc: &Document, policy: &FormattingPolicy) -> FormattedDocument {
    format_cancellable(doc, policy, &AtomicBool::new(false)).unwrap_or_default()
}

/// [`format_document`], abandoning work as soon as `cancel` is set.
///
/// The flag is checked per line while segmenting, per language while
/// classifying and before each segment is re-indented, so a cancelled
/// document stops within one signature score.
pub(crate) fn format_cancellable(
    doc: &Document,
    policy: &FormattingPolicy,
    cancel: &AtomicBool,
) -> Result<FormattedDocument, Cancelled> {
    let lines = &doc.lines[..];
    let segmentation = segment::segment_cancellable(lines, cancel)?;
    let mut diagnostics = segmentation.ambiguities;

    let mut blocks = Vec::with_capacity(segmentation.segments.len());
    let mut languages = BTreeMap::new();
    let mut code_blocks = 0;
    let mut labeled_blocks = 0;

    for seg in &segmentation.segments {
        if cancel.load(Ordering::Relaxed) {
            debug!("Cancelled {} at line {}", doc.source, seg.start);
            return Err(Cancelled);
        }

        let original = &lines[seg.start..seg.end];
        if seg.kind == SegmentKind::Prose {
            blocks.push(FormattedBlock::Prose {
                text: original.join("\n"),
            });
            continue;
        }

        code_blocks += 1;
        let body = &lines[seg.body.clone()];
        let result = classify::classify_cancellable(body, seg.info.as_deref(), policy, cancel)?;
        debug!(
            "Lines {}..{} of {}: {:?} (score {:.2})",
            seg.start, seg.end, doc.source, result.verdict, result.score
        );

        if let Some(reason) = result.uncertainty() {
            diagnostics.push(Diagnostic::ClassificationUncertain {
                start: seg.start,
                end: seg.end,
                reason,
            });
        }

        let block = match result.verdict {
            Verdict::Accepted { language } => {
                if cancel.load(Ordering::Relaxed) {
                    return Err(Cancelled);
                }
                let unit = policy
                    .language(language)
                    .map(|l| l.indent_width())
                    .unwrap_or(FALLBACK_INDENT_UNIT);
                labeled_blocks += 1;
                *languages.entry(language.to_string()).or_insert(0) += 1;
                FormattedBlock::Code {
                    language: Some(language),
                    body: indent::resolve(body, unit, policy).join("\n"),
                }
            }
            // an existing fence without an accepted label stays as written
            _ if seg.kind == SegmentKind::Fenced => FormattedBlock::Verbatim {
                text: original.join("\n"),
            },
            _ => FormattedBlock::Code {
                language: None,
                body: body.join("\n"),
            },
        };
        blocks.push(block);
    }

    Ok(FormattedDocument {
        source: doc.source.clone(),
        page_count: doc.page_count,
        text: render::assemble(&blocks),
        segments: segmentation.segments,
        code_blocks,
        labeled_blocks,
        languages,
        diagnostics,
    })
}

// ── Batch pipeline ───────────────────────────────────────────────────────

/// Format a batch of in-memory documents concurrently.
///
/// # Returns
/// `Ok(BatchOutput)` whenever the configuration is valid, even if every
/// document failed; check each outcome's `status` and the batch `stats`.
///
/// # Errors
/// Returns `Err(FormatError::ConfigurationInvalid)` before touching any
/// document when the configuration is unusable.
pub async fn format_batch(
    documents: Vec<Document>,
    config: &PipelineConfig,
) -> Result<BatchOutput, FormatError> {
    config.validate()?;
    let budget = Arc::new(Semaphore::new(config.budget_permits()));
    let total = documents.len();
    let jobs = documents
        .into_iter()
        .map(|doc| process_document(doc, config, Arc::clone(&budget)));
    Ok(run_batch(jobs, total, config).await)
}

/// Format a batch of text files, reading each one only when a worker
/// picks it up.
///
/// A file whose size on disk exceeds `max_document_bytes` is skipped
/// without being read. A file that cannot be read as UTF-8 text fails on
/// its own with [`DocumentError::InputUnreadable`]; the rest of the batch
/// goes on. Text is loaded only after the document holds its share of the
/// memory budget.
///
/// Each outcome's `source` is the path as given.
///
/// # Errors
/// `ConfigurationInvalid`, as for [`format_batch`].
pub async fn format_files(
    paths: Vec<PathBuf>,
    config: &PipelineConfig,
) -> Result<BatchOutput, FormatError> {
    config.validate()?;
    let budget = Arc::new(Semaphore::new(config.budget_permits()));
    let total = paths.len();
    let jobs = paths
        .into_iter()
        .map(|path| process_path(path, config, Arc::clone(&budget)));
    Ok(run_batch(jobs, total, config).await)
}

/// Format a batch and write each formatted document to `<out_dir>/<stem>.md`.
///
/// File names come from the source's file stem; sources sharing a stem get
/// `-2`, `-3`, … suffixes in source order. Each file is written to a
/// temporary file in `out_dir` and then renamed over the target, so a
/// reader never sees a partial file. The path written is recorded in the
/// document's [`DocumentOutcome::output_path`].
///
/// # Errors
/// `ConfigurationInvalid` as for [`format_batch`], or `OutputWriteFailed`
/// when the directory or a file cannot be written.
pub async fn format_batch_to_dir(
    documents: Vec<Document>,
    out_dir: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<BatchOutput, FormatError> {
    config.validate()?;
    let dir = out_dir.as_ref();
    create_output_dir(dir).await?;
    let mut output = format_batch(documents, config).await?;
    write_outputs(&mut output, dir).await?;
    Ok(output)
}

/// [`format_files`], writing results the way [`format_batch_to_dir`] does.
pub async fn format_files_to_dir(
    paths: Vec<PathBuf>,
    out_dir: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<BatchOutput, FormatError> {
    config.validate()?;
    let dir = out_dir.as_ref();
    create_output_dir(dir).await?;
    let mut output = format_files(paths, config).await?;
    write_outputs(&mut output, dir).await?;
    Ok(output)
}

/// Synchronous wrapper around [`format_batch`].
///
/// Creates a temporary tokio runtime internally; do not call it from inside
/// an async context.
pub fn format_batch_sync(
    documents: Vec<Document>,
    config: &PipelineConfig,
) -> Result<BatchOutput, FormatError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| FormatError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(format_batch(documents, config))
}

/// Drive per-document jobs with bounded concurrency and tally the results.
async fn run_batch<I, F>(jobs: I, total: usize, config: &PipelineConfig) -> BatchOutput
where
    I: Iterator<Item = F>,
    F: Future<Output = DocumentOutcome>,
{
    let start = Instant::now();
    info!(
        "Starting batch: {} documents, {} at a time, languages [{}]",
        total,
        config.max_concurrent_documents,
        config.policy.languages().join(", ")
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let documents: Vec<DocumentOutcome> = stream::iter(jobs)
        .buffer_unordered(config.max_concurrent_documents)
        .collect()
        .await;

    let stats = BatchStats::from_outcomes(&documents, start.elapsed());
    info!(
        "Batch complete: {}/{} formatted, {} too large, {} timed out, {} failed, {}ms",
        stats.succeeded,
        stats.total,
        stats.skipped_too_large,
        stats.timed_out,
        stats.failed,
        stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, stats.succeeded);
    }

    BatchOutput { documents, stats }
}

/// Run one in-memory document through the limits and the engine.
pub(crate) async fn process_document(
    doc: Document,
    config: &PipelineConfig,
    budget: Arc<Semaphore>,
) -> DocumentOutcome {
    let source = doc.source.clone();
    let size = doc.byte_len();
    process(source, Ok(size), async move { Ok(doc) }, config, budget).await
}

/// Run one file through the limits and the engine; the file is read only
/// once its size passed and its memory permits are held.
pub(crate) async fn process_path(
    path: PathBuf,
    config: &PipelineConfig,
    budget: Arc<Semaphore>,
) -> DocumentOutcome {
    let source = path.to_string_lossy().into_owned();
    let size = tokio::fs::metadata(&path)
        .await
        .map(|meta| meta.len())
        .map_err(|e| DocumentError::from(io_error(&path, e)));
    let load = async move { read_document(&path).await.map_err(DocumentError::from) };
    process(source, size, load, config, budget).await
}

/// Size check, then memory budget, loading and engine under the timeout,
/// reporting progress. Never fails: every problem becomes part of the
/// returned outcome.
async fn process<L>(
    source: String,
    size: Result<u64, DocumentError>,
    load: L,
    config: &PipelineConfig,
    budget: Arc<Semaphore>,
) -> DocumentOutcome
where
    L: Future<Output = Result<Document, DocumentError>>,
{
    if let Some(ref cb) = config.progress_callback {
        cb.on_document_start(&source);
    }

    let size = match size {
        Ok(size) => size,
        Err(error) => {
            warn!("Failed {}: {}", source, error);
            let outcome = DocumentOutcome::failed(source, error, Duration::ZERO);
            report(config, &outcome);
            return outcome;
        }
    };

    if size > config.max_document_bytes {
        warn!(
            "Skipping {}: {} bytes exceeds the {}-byte limit",
            source, size, config.max_document_bytes
        );
        let error = DocumentError::DocumentTooLarge {
            size,
            limit: config.max_document_bytes,
        };
        let outcome = DocumentOutcome::failed(source, error, Duration::ZERO);
        report(config, &outcome);
        return outcome;
    }

    let start = Instant::now();
    let cancel = Arc::new(AtomicBool::new(false));
    let work = run_engine(
        load,
        Arc::clone(&config.policy),
        Arc::clone(&cancel),
        budget,
        config.permits_for(size),
        config.include_metadata,
    );
    let result = tokio::time::timeout(config.timeout, work).await;
    let elapsed = start.elapsed();

    let outcome = match result {
        Ok(Ok(Ok(formatted))) => {
            let status = if config.policy.detect_languages() {
                DocumentStatus::Success
            } else {
                DocumentStatus::ClassificationDisabled
            };
            info!(
                "Formatted {}: {} code blocks ({} labeled) in {}ms",
                source,
                formatted.code_blocks,
                formatted.labeled_blocks,
                elapsed.as_millis()
            );
            DocumentOutcome::formatted(status, formatted, elapsed)
        }
        Ok(Err(error)) => {
            warn!("Failed {}: {}", source, error);
            DocumentOutcome::failed(source, error, elapsed)
        }
        Ok(Ok(Err(Cancelled))) | Err(_) => {
            cancel.store(true, Ordering::Relaxed);
            warn!(
                "Timed out {} after {}ms; output discarded",
                source,
                elapsed.as_millis()
            );
            let error = DocumentError::DocumentTimeout {
                elapsed_ms: elapsed.as_millis() as u64,
            };
            DocumentOutcome::failed(source, error, elapsed)
        }
    };

    report(config, &outcome);
    outcome
}

/// Wait for memory permits, load the document, then run the engine on the
/// blocking pool.
///
/// The permits belong to this future, not to the worker: when the timeout
/// drops it they go back to the budget at once, and the abandoned worker
/// winds down on its cancel flag without holding up other documents.
async fn run_engine<L>(
    load: L,
    policy: Arc<FormattingPolicy>,
    cancel: Arc<AtomicBool>,
    budget: Arc<Semaphore>,
    permits: u32,
    include_metadata: bool,
) -> Result<Result<FormattedDocument, Cancelled>, DocumentError>
where
    L: Future<Output = Result<Document, DocumentError>>,
{
    let _permit = budget
        .acquire_many_owned(permits)
        .await
        .map_err(|e| DocumentError::ProcessingFailed {
            detail: format!("memory budget unavailable: {}", e),
        })?;
    let doc = load.await?;

    tokio::task::spawn_blocking(move || -> Result<FormattedDocument, Cancelled> {
        let mut formatted = format_cancellable(&doc, &policy, &cancel)?;
        if include_metadata {
            let header = render::front_matter(
                &formatted.source,
                formatted.page_count,
                formatted.code_blocks,
                &formatted.languages,
            );
            formatted.text.insert_str(0, &header);
        }
        Ok(formatted)
    })
    .await
    .map_err(join_failure)
}

fn report(config: &PipelineConfig, outcome: &DocumentOutcome) {
    let Some(ref cb) = config.progress_callback else {
        return;
    };
    match (&outcome.output, &outcome.error) {
        (Some(formatted), _) => {
            cb.on_document_complete(&outcome.source, outcome.status, formatted.code_blocks)
        }
        (None, Some(error)) => cb.on_document_error(&outcome.source, &error.to_string()),
        (None, None) => cb.on_document_error(&outcome.source, &outcome.status.to_string()),
    }
}

/// Turn a lost or panicked worker into a per-document failure.
fn join_failure(e: tokio::task::JoinError) -> DocumentError {
    let detail = if e.is_panic() {
        let payload = e.into_panic();
        payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "worker panicked".to_string())
    } else {
        e.to_string()
    };
    DocumentError::ProcessingFailed { detail }
}

// ── Output files ─────────────────────────────────────────────────────────

async fn create_output_dir(dir: &Path) -> Result<(), FormatError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| FormatError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })
}

/// Write every formatted document into `dir`, naming files in source order.
async fn write_outputs(output: &mut BatchOutput, dir: &Path) -> Result<(), FormatError> {
    let mut order: Vec<usize> = (0..output.documents.len()).collect();
    order.sort_by(|&a, &b| output.documents[a].source.cmp(&output.documents[b].source));

    let mut used = HashSet::new();
    for i in order {
        let outcome = &mut output.documents[i];
        let Some(ref formatted) = outcome.output else {
            continue;
        };
        let path = dir.join(unique_file_name(&outcome.source, &mut used));
        write_atomic(dir, &path, formatted.text.clone()).await?;
        debug!("Wrote {} to {}", outcome.source, path.display());
        outcome.output_path = Some(path);
    }
    Ok(())
}

/// `<stem>.md`, suffixed until it is not in `used`.
fn unique_file_name(source: &str, used: &mut HashSet<String>) -> String {
    let stem = Path::new(source)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string());

    let mut name = format!("{}.md", stem);
    let mut n = 2;
    while !used.insert(name.clone()) {
        name = format!("{}-{}.md", stem, n);
        n += 1;
    }
    name
}

/// Write `text` to `path` via a temp file in `dir`, then rename.
async fn write_atomic(dir: &Path, path: &Path, text: String) -> Result<(), FormatError> {
    let tmp_dir = dir.to_path_buf();
    let target: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&tmp_dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| FormatError::Internal(format!("write task failed: {}", e)))?
    .map_err(|e| FormatError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    })
}
