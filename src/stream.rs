//! Streaming batch API: emit document outcomes as they complete.
//!
//! ## Why stream?
//!
//! A large batch takes a while. A stream lets callers write each formatted
//! document to disk as soon as it is ready, or wire up their own progress
//! display, instead of waiting for the whole batch.
//!
//! Unlike the eager [`crate::batch::format_batch`] which returns only after
//! every document has an outcome, [`format_stream`] yields
//! [`DocumentOutcome`] items in completion order (sort by `source` if order
//! matters). Limits, timeouts and isolation are exactly those of the eager
//! API.

use crate::batch::process_document;
use crate::config::PipelineConfig;
use crate::error::FormatError;
use crate::output::DocumentOutcome;
use crate::pipeline::input::Document;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of document outcomes.
pub type OutcomeStream = Pin<Box<dyn Stream<Item = DocumentOutcome> + Send>>;

/// Format documents, streaming outcomes as they are ready.
///
/// The configuration is validated up front. The progress callback receives
/// `on_batch_start` immediately and per-document events as the stream is
/// polled; `on_batch_complete` is left to the caller, who alone knows when
/// it stops consuming.
///
/// # Returns
/// - `Ok(OutcomeStream)` — one [`DocumentOutcome`] per submitted document
/// - `Err(FormatError)` — invalid configuration; no document was touched
///
/// # Example
/// ```rust,no_run
/// use codefence::{format_stream, Document, PipelineConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let docs = vec![Document::from_text("a.md", "kind: Pod\nmetadata:\n  name: a\n")];
/// let config = PipelineConfig::default();
/// let mut outcomes = format_stream(docs, &config)?;
/// while let Some(outcome) = outcomes.next().await {
///     println!("{}: {}", outcome.source, outcome.status);
/// }
/// # Ok(())
/// # }
/// ```
pub fn format_stream(
    documents: Vec<Document>,
    config: &PipelineConfig,
) -> Result<OutcomeStream, FormatError> {
    config.validate()?;
    info!("Starting streaming batch: {} documents", documents.len());

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(documents.len());
    }

    let concurrency = config.max_concurrent_documents;
    let budget = Arc::new(Semaphore::new(config.budget_permits()));
    let config = Arc::new(config.clone());

    let s = stream::iter(documents.into_iter().map(move |doc| {
        let cfg = Arc::clone(&config);
        let budget = Arc::clone(&budget);
        async move { process_document(doc, &cfg, budget).await }
    }))
    .buffer_unordered(concurrency);

    Ok(Box::pin(s))
}
