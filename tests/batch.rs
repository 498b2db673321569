//! Batch pipeline integration tests: limits, isolation, output and events.
//!
//! Custom `Language` implementations stand in for slow or faulty
//! signatures so timeouts and panics can be provoked deterministically.
//!
//! Run with:
//!   cargo test --test batch

use codefence::{
    format_batch, format_batch_sync, format_batch_to_dir, format_files, format_files_to_dir,
    format_stream, Document, DocumentError, DocumentStatus, FormatError, FormatProgressCallback,
    FormattingPolicy, Language, LanguageRegistry, PipelineConfig,
};
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

const SHELL_DOC: &str = "Install it:\nsudo apt-get install -y jq\nexport PATH=$PATH:/opt/bin\n";
const PROSE_DOC: &str = "Just words here, nothing else.\n";

fn big_doc(source: &str) -> Document {
    Document::from_text(source, &"word ".repeat(100))
}

fn policy_with(language: Arc<dyn Language>) -> FormattingPolicy {
    let tag = language.tag();
    let mut registry = LanguageRegistry::new();
    registry.register(language);
    FormattingPolicy::with_registry([tag], Arc::new(registry)).unwrap()
}

fn small_limits() -> PipelineConfig {
    PipelineConfig::builder().max_document_bytes(256).build().unwrap()
}

/// Counts how often it is asked to score.
struct Counting(Arc<AtomicUsize>);

impl Language for Counting {
    fn tag(&self) -> &'static str {
        "counting"
    }
    fn score(&self, _lines: &[&str]) -> f64 {
        self.0.fetch_add(1, Ordering::SeqCst);
        0.9
    }
}

/// Blocks the worker long enough to blow any short timeout.
struct Slow(Duration);

impl Language for Slow {
    fn tag(&self) -> &'static str {
        "slow"
    }
    fn score(&self, _lines: &[&str]) -> f64 {
        std::thread::sleep(self.0);
        0.9
    }
}

/// Blocks the worker only for documents carrying a `SLOW` line.
struct SlowOnMarker(Duration);

impl Language for SlowOnMarker {
    fn tag(&self) -> &'static str {
        "marked"
    }
    fn score(&self, lines: &[&str]) -> f64 {
        if lines.iter().any(|l| l.contains("SLOW")) {
            std::thread::sleep(self.0);
        }
        0.9
    }
}

/// Panics on a marker line.
struct Fragile;

impl Language for Fragile {
    fn tag(&self) -> &'static str {
        "fragile"
    }
    fn score(&self, lines: &[&str]) -> f64 {
        if lines.iter().any(|l| l.contains("PANIC_TRIGGER")) {
            panic!("signature blew up on PANIC_TRIGGER");
        }
        0.9
    }
}

/// Records the peak number of documents scored at once.
#[derive(Default)]
struct Gauge {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

struct Gauged(Arc<Gauge>);

impl Language for Gauged {
    fn tag(&self) -> &'static str {
        "gauged"
    }
    fn score(&self, _lines: &[&str]) -> f64 {
        let now = self.0.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.0.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(50));
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
        0.9
    }
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl FormatProgressCallback for Recorder {
    fn on_batch_start(&self, total_documents: usize) {
        self.push(format!("batch_start {total_documents}"));
    }
    fn on_document_start(&self, source: &str) {
        self.push(format!("start {source}"));
    }
    fn on_document_complete(&self, source: &str, status: DocumentStatus, code_blocks: usize) {
        self.push(format!("complete {source} {status} {code_blocks}"));
    }
    fn on_document_error(&self, source: &str, _error: &str) {
        self.push(format!("error {source}"));
    }
    fn on_batch_complete(&self, total_documents: usize, succeeded: usize) {
        self.push(format!("batch_complete {total_documents} {succeeded}"));
    }
}

// ── Limits ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn too_large_document_never_reaches_the_classifier() {
    let calls = Arc::new(AtomicUsize::new(0));
    let config = PipelineConfig::builder()
        .policy(policy_with(Arc::new(Counting(Arc::clone(&calls)))))
        .max_document_bytes(16)
        .build()
        .unwrap();

    let big = Document::from_text("big.md", &"x = 1\n".repeat(10));
    let small = Document::from_text("small.md", "a = 1\nb = 2\n");
    let output = format_batch(vec![big, small], &config).await.unwrap();

    let big = output.get("big.md").unwrap();
    assert_eq!(big.status, DocumentStatus::SkippedTooLarge);
    assert_eq!(big.duration_ms, 0);
    assert!(big.output.is_none());
    assert_eq!(
        big.error,
        Some(DocumentError::DocumentTooLarge { size: 59, limit: 16 })
    );

    assert_eq!(output.get("small.md").unwrap().status, DocumentStatus::Success);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(output.stats.skipped_too_large, 1);
    assert_eq!(output.stats.succeeded, 1);
}

#[tokio::test]
async fn timeout_fails_only_that_document() {
    let config = PipelineConfig::builder()
        .policy(policy_with(Arc::new(Slow(Duration::from_millis(500)))))
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    let docs = vec![
        Document::from_text("slow.md", "x = 1\ny = 2\n"),
        Document::from_text("prose.md", PROSE_DOC),
    ];
    let output = format_batch(docs, &config).await.unwrap();

    let slow = output.get("slow.md").unwrap();
    assert_eq!(slow.status, DocumentStatus::TimedOut);
    assert!(slow.output.is_none());
    match slow.error {
        Some(DocumentError::DocumentTimeout { elapsed_ms }) => assert!(elapsed_ms >= 50),
        ref other => panic!("expected timeout, got {other:?}"),
    }

    let prose = output.get("prose.md").unwrap();
    assert_eq!(prose.status, DocumentStatus::Success);
    assert_eq!(prose.output.as_ref().unwrap().text, PROSE_DOC);
    assert_eq!(output.stats.timed_out, 1);
}

#[tokio::test]
async fn memory_budget_bounds_documents_in_flight() {
    let gauge = Arc::new(Gauge::default());
    let config = PipelineConfig::builder()
        .policy(policy_with(Arc::new(Gauged(Arc::clone(&gauge)))))
        .max_document_bytes(1024)
        .memory_budget_bytes(1024)
        .max_concurrent_documents(3)
        .timeout_secs(10)
        .build()
        .unwrap();

    let docs = (0..3)
        .map(|i| Document::from_text(format!("doc{i}.md"), "x = 1\ny = 2\n"))
        .collect();
    let output = format_batch(docs, &config).await.unwrap();

    assert_eq!(output.stats.succeeded, 3);
    assert_eq!(gauge.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn timed_out_document_hands_its_memory_to_the_next() {
    let config = PipelineConfig::builder()
        .policy(policy_with(Arc::new(SlowOnMarker(Duration::from_millis(600)))))
        .timeout(Duration::from_millis(200))
        .max_document_bytes(1024)
        .memory_budget_bytes(1024)
        .max_concurrent_documents(1)
        .build()
        .unwrap();

    let docs = vec![
        Document::from_text("a-slow.md", "SLOW = 1\ny = 2\n"),
        Document::from_text("b-fast.md", "x = 1\ny = 2\n"),
    ];
    let output = format_batch(docs, &config).await.unwrap();

    assert_eq!(output.get("a-slow.md").unwrap().status, DocumentStatus::TimedOut);
    let fast = output.get("b-fast.md").unwrap();
    assert_eq!(fast.status, DocumentStatus::Success, "got: {:?}", fast.error);
    assert_eq!(
        fast.output.as_ref().unwrap().text,
        "```marked\nx = 1\ny = 2\n```\n"
    );
}

// ── Isolation ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn panic_is_confined_to_its_document() {
    let config = PipelineConfig::builder()
        .policy(policy_with(Arc::new(Fragile)))
        .build()
        .unwrap();

    let docs = vec![
        Document::from_text("bad.md", "x = 1\nPANIC_TRIGGER = 2\n"),
        Document::from_text("good.md", "a = 1\nb = 2\n"),
    ];
    let output = format_batch(docs, &config).await.unwrap();

    let bad = output.get("bad.md").unwrap();
    assert_eq!(bad.status, DocumentStatus::Failed);
    match bad.error {
        Some(DocumentError::ProcessingFailed { ref detail }) => {
            assert!(detail.contains("PANIC_TRIGGER"), "got: {detail}")
        }
        ref other => panic!("expected processing failure, got {other:?}"),
    }

    let good = output.get("good.md").unwrap();
    assert_eq!(good.status, DocumentStatus::Success);
    assert_eq!(
        good.output.as_ref().unwrap().text,
        "```fragile\na = 1\nb = 2\n```\n"
    );
    assert_eq!(output.stats.failed, 1);
    assert_eq!(output.stats.succeeded, 1);
}

// ── Configuration ────────────────────────────────────────────────────────────

#[tokio::test]
async fn invalid_config_is_fatal_before_any_document() {
    let recorder = Arc::new(Recorder::default());
    let mut config = PipelineConfig::default();
    config.timeout = Duration::ZERO;
    config.progress_callback = Some(recorder.clone() as Arc<dyn FormatProgressCallback>);

    let err = format_batch(vec![Document::from_text("a.md", "x = 1\ny = 2\n")], &config)
        .await
        .unwrap_err();
    assert!(matches!(err, FormatError::ConfigurationInvalid(_)));
    assert!(recorder.events.lock().unwrap().is_empty());

    config.timeout = Duration::from_secs(1);
    config.memory_budget_bytes = config.max_document_bytes - 1;
    let err = format_stream(vec![], &config).err().unwrap();
    assert!(err.to_string().contains("memory budget"));
}

#[tokio::test]
async fn detection_disabled_is_reported_as_such() {
    let config = PipelineConfig::builder()
        .policy(FormattingPolicy::default().with_detect_languages(false))
        .build()
        .unwrap();

    let output = format_batch(vec![Document::from_text("a.md", SHELL_DOC)], &config)
        .await
        .unwrap();
    let outcome = &output.documents[0];
    assert_eq!(outcome.status, DocumentStatus::ClassificationDisabled);
    assert_eq!(
        outcome.output.as_ref().unwrap().text,
        "Install it:\n```\nsudo apt-get install -y jq\nexport PATH=$PATH:/opt/bin\n```\n"
    );
    assert_eq!(output.stats.classification_disabled, 1);
    assert_eq!(output.stats.succeeded, 1);
}

// ── Output ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn metadata_front_matter_is_prepended() {
    let config = PipelineConfig::builder()
        .include_metadata(true)
        .build()
        .unwrap();
    let output = format_batch(vec![Document::from_text("guide.md", SHELL_DOC)], &config)
        .await
        .unwrap();
    let text = &output.documents[0].output.as_ref().unwrap().text;
    assert!(
        text.starts_with(
            "---\nsource: \"guide.md\"\npages: 1\ncode_blocks: 1\nlanguages: [bash]\n---\n\nInstall it:\n```bash\n"
        ),
        "got: {text}"
    );
}

#[tokio::test]
async fn directory_output_writes_each_formatted_document() {
    let tmp = tempfile::tempdir().unwrap();
    let out_dir = tmp.path().join("formatted");

    let docs = vec![
        Document::from_text("a/guide.md", SHELL_DOC),
        Document::from_text("b/guide.txt", PROSE_DOC),
        big_doc("c/huge.md"),
    ];
    let output = format_batch_to_dir(docs, &out_dir, &small_limits())
        .await
        .unwrap();

    let first = output.get("a/guide.md").unwrap();
    assert_eq!(first.output_path, Some(out_dir.join("guide.md")));
    let written = std::fs::read_to_string(out_dir.join("guide.md")).unwrap();
    assert_eq!(written, first.output.as_ref().unwrap().text);
    assert!(written.contains("```bash\n"));

    let second = std::fs::read_to_string(out_dir.join("guide-2.md")).unwrap();
    assert_eq!(second, PROSE_DOC);

    let huge = output.get("c/huge.md").unwrap();
    assert_eq!(huge.status, DocumentStatus::SkippedTooLarge);
    assert!(huge.output_path.is_none());

    // no temp files left behind
    assert_eq!(std::fs::read_dir(&out_dir).unwrap().count(), 2);
}

// ── Files ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unreadable_file_fails_alone() {
    let tmp = tempfile::tempdir().unwrap();
    let good = tmp.path().join("good.txt");
    let binary = tmp.path().join("binary.txt");
    let missing = tmp.path().join("missing.txt");
    std::fs::write(&good, SHELL_DOC).unwrap();
    std::fs::write(&binary, [0xff, 0xfe, 0x00]).unwrap();

    let paths = vec![good.clone(), binary.clone(), missing.clone()];
    let output = format_files(paths, &PipelineConfig::default()).await.unwrap();

    let good = output.get(&good.to_string_lossy()).unwrap();
    assert_eq!(good.status, DocumentStatus::Success);
    assert!(good.output.as_ref().unwrap().text.contains("```bash\n"));

    let binary = output.get(&binary.to_string_lossy()).unwrap();
    assert_eq!(binary.status, DocumentStatus::Failed);
    match binary.error {
        Some(DocumentError::InputUnreadable { ref detail }) => {
            assert!(detail.contains("binary.txt"), "got: {detail}")
        }
        ref other => panic!("expected unreadable input, got {other:?}"),
    }

    let missing = output.get(&missing.to_string_lossy()).unwrap();
    assert_eq!(missing.status, DocumentStatus::Failed);
    assert!(matches!(
        missing.error,
        Some(DocumentError::InputUnreadable { .. })
    ));

    assert_eq!(output.stats.total, 3);
    assert_eq!(output.stats.succeeded, 1);
    assert_eq!(output.stats.failed, 2);
}

#[tokio::test]
async fn oversized_file_is_skipped_by_its_size_on_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let huge = tmp.path().join("huge.txt");
    // not UTF-8 either, so reading it would fail instead of skip
    let mut bytes = vec![0xff; 300];
    bytes.extend_from_slice(b"\n");
    std::fs::write(&huge, &bytes).unwrap();

    let output = format_files(vec![huge.clone()], &small_limits()).await.unwrap();

    let outcome = &output.documents[0];
    assert_eq!(outcome.status, DocumentStatus::SkippedTooLarge);
    assert_eq!(outcome.duration_ms, 0);
    assert_eq!(
        outcome.error,
        Some(DocumentError::DocumentTooLarge { size: 301, limit: 256 })
    );
}

#[tokio::test]
async fn files_to_dir_writes_only_readable_documents() {
    let tmp = tempfile::tempdir().unwrap();
    let good = tmp.path().join("guide.txt");
    let binary = tmp.path().join("scan.txt");
    std::fs::write(&good, SHELL_DOC).unwrap();
    std::fs::write(&binary, [0xff, 0xfe, 0x00]).unwrap();
    let out_dir = tmp.path().join("formatted");

    let output = format_files_to_dir(vec![good.clone(), binary], &out_dir, &PipelineConfig::default())
        .await
        .unwrap();

    let written = output.get(&good.to_string_lossy()).unwrap();
    assert_eq!(written.output_path, Some(out_dir.join("guide.md")));
    assert!(std::fs::read_to_string(out_dir.join("guide.md"))
        .unwrap()
        .contains("```bash\n"));
    assert_eq!(std::fs::read_dir(&out_dir).unwrap().count(), 1);
    assert_eq!(output.stats.failed, 1);
}

#[test]
fn stream_yields_one_outcome_per_document() {
    let docs = vec![
        Document::from_text("a.md", SHELL_DOC),
        Document::from_text("b.md", PROSE_DOC),
        big_doc("c.md"),
    ];
    let config = small_limits();
    let mut outcomes: Vec<_> = tokio_test::block_on(async {
        format_stream(docs, &config).unwrap().collect::<Vec<_>>().await
    });
    outcomes.sort_by(|a, b| a.source.cmp(&b.source));

    let statuses: Vec<_> = outcomes.iter().map(|o| (o.source.as_str(), o.status)).collect();
    assert_eq!(
        statuses,
        [
            ("a.md", DocumentStatus::Success),
            ("b.md", DocumentStatus::Success),
            ("c.md", DocumentStatus::SkippedTooLarge),
        ]
    );
}

#[test]
fn sync_wrapper_runs_a_batch() {
    let output = format_batch_sync(
        vec![Document::from_text("a.md", SHELL_DOC)],
        &PipelineConfig::default(),
    )
    .unwrap();
    assert_eq!(output.stats.total, 1);
    assert_eq!(output.stats.succeeded, 1);
    let json = serde_json::to_value(&output).unwrap();
    assert_eq!(json["documents"][0]["status"], "success");
    assert_eq!(json["documents"][0]["output"]["languages"]["bash"], 1);
}

// ── Progress events ──────────────────────────────────────────────────────────

#[tokio::test]
async fn progress_events_cover_every_document() {
    let recorder = Arc::new(Recorder::default());
    let config = PipelineConfig::builder()
        .max_document_bytes(256)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    let docs = vec![
        Document::from_text("ok.md", SHELL_DOC),
        Document::from_text("prose.md", PROSE_DOC),
        big_doc("big.md"),
    ];
    format_batch(docs, &config).await.unwrap();

    let mut events = recorder.events.lock().unwrap().clone();
    assert_eq!(events.first().map(String::as_str), Some("batch_start 3"));
    assert_eq!(events.last().map(String::as_str), Some("batch_complete 3 2"));

    let n = events.len();
    let mut middle = events.drain(1..n - 1).collect::<Vec<_>>();
    middle.sort();
    assert_eq!(
        middle,
        [
            "complete ok.md success 1",
            "complete prose.md success 0",
            "error big.md",
            "start big.md",
            "start ok.md",
            "start prose.md",
        ]
    );
}
