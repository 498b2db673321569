//! Engine-level integration tests: segmentation, classification,
//! indentation and rendering of whole documents through the public API.
//!
//! Run with:
//!   cargo test --test formatting

use codefence::pipeline::indent::leading_width;
use codefence::{
    classify, format_document, segment, Diagnostic, Document, FormatError, FormattingPolicy,
    Language, LanguageRegistry, PipelineConfig, SegmentKind, Uncertainty,
};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

const RUNBOOK: &[&str] = &[
    "# Setup",
    "",
    "Install the tools first.",
    "sudo apt-get install -y jq",
    "export PATH=$PATH:/opt/bin",
    "",
    "```json",
    "{\"a\": 1}",
    "```",
    "Then write the config:",
    "server:",
    "  port: 8080",
    "  host: localhost",
    "That is all there is to it.",
    "Enjoy the rest of the guide.",
];

fn document(lines: &[&str]) -> Document {
    Document::new(
        "test.md",
        lines.iter().map(|l| l.to_string()).collect(),
        1,
    )
}

/// A language with a fixed score, for steering the classifier.
struct Fixed(&'static str, f64);

impl Language for Fixed {
    fn tag(&self) -> &'static str {
        self.0
    }
    fn score(&self, _lines: &[&str]) -> f64 {
        self.1
    }
}

/// Body lines of every fenced block in `text`, with the fence's label.
fn fenced_blocks(text: &str) -> Vec<(String, Vec<String>)> {
    let mut blocks = Vec::new();
    let mut current: Option<(String, Vec<String>)> = None;
    for line in text.lines() {
        match current.take() {
            None if line.starts_with("```") => {
                current = Some((line.trim_start_matches('`').to_string(), Vec::new()));
            }
            None => {}
            Some(block) if line.starts_with("```") => blocks.push(block),
            Some((label, mut body)) => {
                body.push(line.to_string());
                current = Some((label, body));
            }
        }
    }
    blocks
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[test]
fn indented_python_between_prose() {
    let lines = ["Intro text.", "    def f():", "        return 1", "More text."];
    let policy = FormattingPolicy::new(["python", "bash", "json", "yaml"]).unwrap();

    let seg = segment(&lines);
    let kinds: Vec<_> = seg.segments.iter().map(|s| (s.kind, s.start, s.end)).collect();
    assert_eq!(
        kinds,
        vec![
            (SegmentKind::Prose, 0, 1),
            (SegmentKind::Code, 1, 3),
            (SegmentKind::Prose, 3, 4),
        ]
    );

    let result = classify(&lines[1..3], None, &policy);
    assert_eq!(result.language(), Some("python"));
    assert!(result.score >= 0.35, "score {}", result.score);

    let out = format_document(&document(&lines), &policy);
    assert_eq!(
        out.text,
        "Intro text.\n```python\n    def f():\n        return 1\n```\nMore text.\n"
    );
    assert_eq!(out.code_blocks, 1);
    assert_eq!(out.labeled_blocks, 1);
}

#[test]
fn empty_language_set_fails_before_segmentation() {
    let err = FormattingPolicy::new(Vec::<&str>::new()).unwrap_err();
    assert!(matches!(err, FormatError::ConfigurationInvalid(_)));

    let err = PipelineConfig::builder()
        .policy(FormattingPolicy::default())
        .max_concurrent_documents(0)
        .build()
        .unwrap_err();
    assert!(matches!(err, FormatError::ConfigurationInvalid(_)));
}

#[test]
fn near_tie_is_left_unlabeled() {
    let mut registry = LanguageRegistry::new();
    registry.register(Arc::new(Fixed("alpha", 0.80)));
    registry.register(Arc::new(Fixed("beta", 0.78)));
    let policy = FormattingPolicy::with_registry(["alpha", "beta"], Arc::new(registry)).unwrap();

    let out = format_document(&document(&["x = 1", "y = 2"]), &policy);
    assert_eq!(out.text, "```\nx = 1\ny = 2\n```\n");
    assert_eq!(out.labeled_blocks, 0);
    match &out.diagnostics[..] {
        [Diagnostic::ClassificationUncertain {
            start: 0,
            end: 2,
            reason: Uncertainty::Tie { first, second, .. },
        }] => assert_eq!((*first, *second), ("alpha", "beta")),
        other => panic!("expected one tie diagnostic, got {other:?}"),
    }
}

#[test]
fn runbook_is_fenced_and_labeled() {
    let out = format_document(&document(RUNBOOK), &FormattingPolicy::default());
    assert_eq!(
        out.text,
        "# Setup\n\
         \n\
         Install the tools first.\n\
         ```bash\n\
         sudo apt-get install -y jq\n\
         export PATH=$PATH:/opt/bin\n\
         ```\n\
         \n\
         ```json\n\
         {\"a\": 1}\n\
         ```\n\
         Then write the config:\n\
         ```yaml\n\
         server:\n  port: 8080\n  host: localhost\n\
         ```\n\
         That is all there is to it.\n\
         Enjoy the rest of the guide.\n"
    );
    assert_eq!(out.code_blocks, 3);
    assert_eq!(out.labeled_blocks, 3);
    let tags: Vec<&str> = out.languages.keys().map(String::as_str).collect();
    assert_eq!(tags, ["bash", "json", "yaml"]);
}

#[test]
fn json_object_is_detected() {
    let lines = [
        "Response body:",
        "{",
        "  \"name\": \"demo\",",
        "  \"replicas\": 3",
        "}",
    ];
    let out = format_document(&document(&lines), &FormattingPolicy::default());
    assert_eq!(
        out.text,
        "Response body:\n```json\n{\n  \"name\": \"demo\",\n  \"replicas\": 3\n}\n```\n"
    );
}

#[test]
fn inline_example_in_prose_is_not_promoted() {
    let lines = [
        "Set the value like this.",
        "timeout: 30",
        "Then continue with the next step.",
        "The service restarts on its own.",
    ];
    let out = format_document(&document(&lines), &FormattingPolicy::default());
    assert_eq!(out.text, format!("{}\n", lines.join("\n")));
    assert_eq!(out.code_blocks, 0);
    assert!(matches!(
        out.diagnostics[..],
        [Diagnostic::SegmentationAmbiguity { start: 1, end: 2 }]
    ));
}

#[test]
fn english_lead_ins_are_left_as_prose() {
    let lines = [
        "If the service fails, check:",
        "the logs and the config.",
        "for example:",
        "restart it once",
        "node: a machine in the cluster",
        "pod: a group of containers",
    ];
    let out = format_document(&document(&lines), &FormattingPolicy::default());
    assert_eq!(out.text, format!("{}\n", lines.join("\n")));
    assert_eq!(out.code_blocks, 0);
}

// ── Properties ───────────────────────────────────────────────────────────────

#[test]
fn segmentation_reconstructs_every_document() {
    let samples: Vec<Vec<&str>> = vec![
        RUNBOOK.to_vec(),
        vec![],
        vec![""],
        vec!["```", "never closed", "    still inside"],
        vec!["    a = 1", "    b = 2", "    c = 3"],
        vec!["Only prose here.", "", "", "And more prose after blanks."],
        vec!["}", "{", "x", "", "", "Some closing words for the end."],
    ];
    for lines in samples {
        let seg = segment(&lines[..]);
        let mut rebuilt: Vec<&str> = Vec::new();
        let mut next = 0;
        for s in &seg.segments {
            assert_eq!(s.start, next, "gap or overlap in {lines:?}");
            rebuilt.extend_from_slice(&lines[s.start..s.end]);
            next = s.end;
        }
        assert_eq!(rebuilt, lines);
    }
}

#[test]
fn classification_is_repeatable_across_policies_built_alike() {
    let body = ["server:", "  port: 8080", "  host: localhost"];
    let first = classify(&body, None, &FormattingPolicy::default());
    let second = classify(&body, None, &FormattingPolicy::default());
    assert_eq!(first, second);
    assert_eq!(first.language(), Some("yaml"));
}

#[test]
fn detection_disabled_labels_nothing() {
    let policy = FormattingPolicy::default().with_detect_languages(false);
    let doc = document(RUNBOOK);
    let out = format_document(&doc, &policy);

    assert_eq!(out.code_blocks, 3);
    assert_eq!(out.labeled_blocks, 0);
    assert!(out.languages.is_empty());
    for s in out.segments.iter().filter(|s| s.kind.is_code()) {
        let body = &doc.lines[s.start..s.end];
        assert_eq!(classify(body, s.info.as_deref(), &policy).language(), None);
    }
    // detected runs get bare fences; the pre-existing fence is untouched
    assert!(out
        .text
        .contains("```\nsudo apt-get install -y jq\nexport PATH=$PATH:/opt/bin\n```\n"));
    assert!(out.text.contains("```json\n{\"a\": 1}\n```\n"));
}

#[test]
fn preserve_mode_keeps_leading_whitespace() {
    let lines = [
        "Example:",
        "\tdef f():   ",
        "\t    if x:",
        "",
        "",
        "",
        "\t        return 1  ",
    ];
    let policy = FormattingPolicy::new(["python"]).unwrap();
    let out = format_document(&document(&lines), &policy);

    let blocks = fenced_blocks(&out.text);
    assert_eq!(blocks.len(), 1);
    let (label, body) = &blocks[0];
    assert_eq!(label, "python");
    assert_eq!(body, &["\tdef f():", "\t    if x:", "", "\t        return 1"]);

    let leading = |l: &str| l[..l.len() - l.trim_start().len()].to_string();
    let before: Vec<String> = lines[1..]
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| leading(*l))
        .collect();
    let after: Vec<String> = body
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| leading(l.as_str()))
        .collect();
    assert_eq!(before, after);
}

#[test]
fn preserve_mode_without_cleanup_is_verbatim() {
    let lines = ["Example:", "    def f():   ", "        return 1"];
    let policy = FormattingPolicy::new(["python"])
        .unwrap()
        .with_minimal_cleanup(false);
    let out = format_document(&document(&lines), &policy);
    assert_eq!(
        out.text,
        "Example:\n```python\n    def f():   \n        return 1\n```\n"
    );
}

#[test]
fn normalize_mode_keeps_relative_depth() {
    let lines = [
        "Example:",
        "   def f():",
        "       if x:",
        "           return 1",
        "       return 2",
    ];
    let policy = FormattingPolicy::new(["python"])
        .unwrap()
        .with_preserve_indentation(false);
    let out = format_document(&document(&lines), &policy);

    let blocks = fenced_blocks(&out.text);
    let (label, body) = &blocks[0];
    assert_eq!(label, "python");
    assert_eq!(
        body,
        &["def f():", "    if x:", "        return 1", "    return 2"]
    );

    // strict order of widths survives
    let widths_in: Vec<usize> = lines[1..].iter().map(|l| leading_width(l)).collect();
    let widths_out: Vec<usize> = body.iter().map(|l| leading_width(l)).collect();
    for i in 0..widths_in.len() {
        for j in 0..widths_in.len() {
            assert_eq!(
                widths_in[i].cmp(&widths_in[j]),
                widths_out[i].cmp(&widths_out[j])
            );
        }
    }
}

#[test]
fn normalize_mode_uses_language_unit() {
    let lines = [
        "Then write the config:",
        "server:",
        "    port: 8080",
        "    tls:",
        "        enabled: true",
    ];
    let policy = FormattingPolicy::new(["yaml"])
        .unwrap()
        .with_preserve_indentation(false);
    let out = format_document(&document(&lines), &policy);
    assert_eq!(
        out.text,
        "Then write the config:\n```yaml\nserver:\n  port: 8080\n  tls:\n    enabled: true\n```\n"
    );
}

#[test]
fn converter_artefacts_are_normalised() {
    let raw = "Intro text.\r\n    def f():\r\n\u{200B}        return 1\r\n\u{000C}More text.\r\n";
    let doc = Document::from_text("raw.txt", raw);
    assert_eq!(doc.page_count, 2);
    let out = format_document(&doc, &FormattingPolicy::new(["python"]).unwrap());
    assert_eq!(
        out.text,
        "Intro text.\n```python\n    def f():\n        return 1\n```\nMore text.\n"
    );
}
