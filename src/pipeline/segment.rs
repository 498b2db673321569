//! Block Segmenter: split a document into prose and code-candidate runs.
//!
//! The scan is a single forward pass. Outside a run, a line opens a code
//! candidate when it shows one of three signals:
//!
//! 1. an **indentation jump**: indented at least two columns past the prose
//!    baseline right after a line at or below the baseline,
//! 2. a **structural line** (see [`is_structural`]), or
//! 3. **three consecutive lines** sharing one indent deeper than the baseline.
//!
//! A run then extends until two non-blank lines in a row read as prose
//! (sentence-like, at or below the baseline, no structural tokens), a fence
//! opener, a Markdown heading set off by blank lines, or the end of the
//! document. A run needs at least two non-blank lines and at least one line
//! that does not read as a sentence; weaker runs fold back into the
//! surrounding prose and are reported as
//! [`Diagnostic::SegmentationAmbiguity`].
//!
//! Fenced blocks (```` ``` ```` or `~~~`) already present in the text are
//! taken whole, up to their closer or the end of the document.
//!
//! The returned segments are contiguous, non-overlapping and cover every line
//! exactly once.

use super::indent::leading_width;
use crate::error::{Cancelled, Diagnostic};
use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};
use serde::Serialize;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Non-blank lines a code run needs to stand on its own.
pub const MIN_CODE_LINES: usize = 2;

/// Consecutive prose-like lines that end a code run.
const PROSE_STREAK_END: usize = 2;

/// Same-indent lines that open a run without an indentation jump.
const CONSTANT_INDENT_RUN: usize = 3;

/// Extra columns past the baseline that count as an indentation jump.
const INDENT_JUMP: usize = 2;

/// Patterns checked against the trimmed line. Any match marks it structural.
static STRUCTURAL: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        // shebang
        r"^#!/",
        // opens a block / closes one
        r"[{\[(]$",
        r"^[}\])]+[;,)]*$",
        // import forms and declarations
        r#"^import\s+[\w.{*"']"#,
        r"^from\s+[\w.]+\s+import\b",
        r"^package\s+[\w.]+;?$",
        r"^func\s",
        r"^(async\s+)?def\s+\w+\s*\(",
        r"^(pub\s+)?fn\s+\w+",
        r"^(export\s+)?(const|let|var)\s+[\w{}\[\], ]+\s*=",
        // assignments and terminated statements
        r#"^[A-Za-z_][\w.\[\]"']*\s*[+\-*/]?=\s*\S"#,
        r"[=(].*;$",
        // comments and prompts
        r"^//|^/\*",
        r"^\$\s+\S",
        r"^@[\w.]+",
        // shell
        r"^(sudo\s+)?(echo|export|cd|mkdir|rm|cp|mv|chmod|chown|grep|sed|awk|curl|wget|cat|tar|apt-get|yum|dnf|brew|kubectl|oc|helm|docker|podman|git|systemctl|pip|npm|ssh|scp)\s+\S",
        r"^(fi|done|esac|then|do|else)$",
        r";\s*(then|do)$",
        // yaml
        r"^-\s+[a-z_][\w.\-]*:(\s|$)",
        r"^---$",
    ])
    .unwrap()
});

/// A lower-case or quoted key followed by `:`; checked separately because a
/// trailing period or a wordy value means prose ("note: see below.",
/// "pod: a group of containers").
static KEY_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^"?[a-z_][\w.\-/]*"?\s*:(\s+(\S.*))?$"#).unwrap());

/// A keyword-led line ending in `:`. English lead-ins ("for example:") share
/// the shape, so these need more evidence; see [`is_block_header`].
static BLOCK_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(if|elif|else|for|while|with|try|except|finally|switch|case|class)\b(.*):$")
        .unwrap()
});

/// Header shapes that carry no punctuation but are still code.
static BARE_HEADER: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"^for\s+\w+(\s*,\s*\w+)*\s+in\s+[\w.]+:$",
        r"^(if|elif|while|except)\s+(not\s+)?\w+:$",
        r"^class\s+[A-Z]\w*:$",
        r"^case\s+\d+:$",
    ])
    .unwrap()
});

static ARTICLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(the|a|an)\b").unwrap());

static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s+\S").unwrap());

static BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([-*+]|\d+[.)])\s+(\S+\s+\S.*)$").unwrap());

/// Kind of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Prose,
    /// Detected from layout and syntax.
    Code,
    /// An explicit fence already present in the text.
    Fenced,
}

impl SegmentKind {
    /// Code candidates are everything but prose.
    pub fn is_code(self) -> bool {
        !matches!(self, SegmentKind::Prose)
    }
}

/// A contiguous run of lines, `start..end` within the parent document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub kind: SegmentKind,
    pub start: usize,
    /// Exclusive.
    pub end: usize,
    /// Info string of a [`SegmentKind::Fenced`] opener, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    /// Lines holding the content: the whole segment, or the lines between a
    /// fence's opener and closer.
    #[serde(skip)]
    pub body: Range<usize>,
}

impl Segment {
    fn new(kind: SegmentKind, start: usize, end: usize) -> Self {
        Self {
            kind,
            start,
            end,
            info: None,
            body: start..end,
        }
    }

    /// Number of lines covered.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Output of [`segment`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segmentation {
    pub segments: Vec<Segment>,
    /// Candidate runs folded back into prose.
    pub ambiguities: Vec<Diagnostic>,
}

/// Split `lines` into ordered, contiguous segments.
pub fn segment<S: AsRef<str>>(lines: &[S]) -> Segmentation {
    segment_cancellable(lines, &AtomicBool::new(false)).unwrap_or_default()
}

/// [`segment`], giving up as soon as `cancel` is set.
pub(crate) fn segment_cancellable<S: AsRef<str>>(
    lines: &[S],
    cancel: &AtomicBool,
) -> Result<Segmentation, Cancelled> {
    let lines: Vec<&str> = lines.iter().map(|l| l.as_ref()).collect();
    Scanner::new(&lines, cancel).run()
}

// ── Line classification ──────────────────────────────────────────────────

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Whether the trimmed line carries a code-only token.
pub fn is_structural(line: &str) -> bool {
    let t = line.trim();
    if t.is_empty() {
        return false;
    }
    STRUCTURAL.is_match(t) || is_key_value(t) || is_block_header(t)
}

fn is_key_value(t: &str) -> bool {
    let Some(caps) = KEY_VALUE.captures(t) else {
        return false;
    };
    if t.ends_with('.') {
        return false;
    }
    // "key: value" is fine, "term: a definition in words" is not
    caps.get(2).is_none_or(|value| {
        let value = value.as_str();
        value.split_whitespace().count() < 3 || !ARTICLE.is_match(value)
    })
}

/// A keyword header counts when it is bare (`else:`), carries code
/// punctuation (`if x > 0:`) or has a known code shape (`for x in xs:`), and
/// never when it reads like English ("if the service fails, check:").
pub fn is_block_header(line: &str) -> bool {
    let t = line.trim();
    let Some(caps) = BLOCK_HEADER.captures(t) else {
        return false;
    };
    let rest = caps[2].trim();
    if rest.is_empty() {
        return true;
    }
    if ARTICLE.is_match(rest) {
        return false;
    }
    rest.contains(['(', ')', '[', ']', '=', '<', '>', '!', '.', '"', '\'', '%'])
        || BARE_HEADER.is_match(t)
}

/// A keyword-led `:` line without articles, directly above a deeper indent.
fn header_above_block(line: &str, next: Option<&str>) -> bool {
    let t = line.trim();
    BLOCK_HEADER.is_match(t)
        && !ARTICLE.is_match(t)
        && next.is_some_and(|n| leading_width(n) > leading_width(line))
}

/// Whether the line reads like a sentence of running text.
pub fn is_sentence_like(line: &str) -> bool {
    let t = line.trim();
    if t.is_empty() || t.contains(['{', '}', '|', '=']) || t.ends_with(';') {
        return false;
    }
    if let Some(caps) = BULLET.captures(t) {
        return !is_structural(&caps[2]);
    }

    let words = t.split_whitespace().count();
    let tail = t.trim_end_matches(['"', '\'', ')', '*', '_']);
    let terminal = tail.ends_with(['.', '!', '?', ':']);
    let capitalised = t.chars().next().is_some_and(char::is_uppercase);

    (terminal && words >= 2) || (capitalised && words >= 4) || words >= 6
}

/// Opening fence: up to three spaces, then three or more backticks or
/// tildes. Returns the fence character, its length and the info string.
fn fence_open(line: &str) -> Option<(char, usize, String)> {
    if leading_width(line) > 3 {
        return None;
    }
    let t = line.trim_start();
    let ch = t.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = t.chars().take_while(|c| *c == ch).count();
    if len < 3 {
        return None;
    }
    let info = t[len..].trim();
    if ch == '`' && info.contains('`') {
        return None;
    }
    Some((ch, len, info.to_string()))
}

fn closes_fence(line: &str, ch: char, len: usize) -> bool {
    let t = line.trim();
    t.len() >= len && t.chars().all(|c| c == ch)
}

// ── Scanner ──────────────────────────────────────────────────────────────

struct Scanner<'a> {
    lines: &'a [&'a str],
    cancel: &'a AtomicBool,
    baseline: usize,
    segments: Vec<Segment>,
    ambiguities: Vec<Diagnostic>,
    /// Start of the prose run not yet emitted.
    prose_start: usize,
}

impl<'a> Scanner<'a> {
    fn new(lines: &'a [&'a str], cancel: &'a AtomicBool) -> Self {
        Self {
            lines,
            cancel,
            baseline: prose_baseline(lines),
            segments: Vec::new(),
            ambiguities: Vec::new(),
            prose_start: 0,
        }
    }

    fn run(mut self) -> Result<Segmentation, Cancelled> {
        let n = self.lines.len();
        let mut i = 0;
        while i < n {
            if self.cancel.load(Ordering::Relaxed) {
                return Err(Cancelled);
            }
            if let Some((ch, len, info)) = fence_open(self.lines[i]) {
                i = self.take_fence(i, ch, len, info);
                continue;
            }
            if self.starts_run(i) {
                i = self.take_run(i);
                continue;
            }
            i += 1;
        }
        self.flush_prose(n);
        debug!(
            "Segmented {} lines into {} segments (baseline {})",
            n,
            self.segments.len(),
            self.baseline
        );
        Ok(Segmentation {
            segments: self.segments,
            ambiguities: self.ambiguities,
        })
    }

    fn is_prose_like(&self, line: &str) -> bool {
        leading_width(line) <= self.baseline && is_sentence_like(line) && !is_structural(line)
    }

    fn previous_non_blank(&self, i: usize) -> Option<&'a str> {
        self.lines[..i].iter().rev().copied().find(|l| !is_blank(l))
    }

    fn next_non_blank(&self, i: usize) -> Option<&'a str> {
        self.lines[i + 1..].iter().copied().find(|l| !is_blank(l))
    }

    fn starts_run(&self, i: usize) -> bool {
        let line = self.lines[i];
        if is_blank(line) {
            return false;
        }
        let width = leading_width(line);

        let jump = width >= self.baseline + INDENT_JUMP
            && self
                .previous_non_blank(i)
                .is_none_or(|prev| leading_width(prev) <= self.baseline);

        let constant = width > self.baseline
            && i + CONSTANT_INDENT_RUN <= self.lines.len()
            && self.lines[i..i + CONSTANT_INDENT_RUN]
                .iter()
                .all(|l| !is_blank(l) && leading_width(l) == width);

        jump || constant || is_structural(line) || header_above_block(line, self.next_non_blank(i))
    }

    /// A Markdown heading with blank lines (or document edges) around it.
    fn is_isolated_heading(&self, j: usize) -> bool {
        let line = self.lines[j];
        leading_width(line) == 0
            && HEADING.is_match(line)
            && (j == 0 || is_blank(self.lines[j - 1]))
            && (j + 1 == self.lines.len() || is_blank(self.lines[j + 1]))
    }

    /// Extend a run from `start`; emits it as code or folds it into prose.
    /// Returns the index scanning resumes at.
    fn take_run(&mut self, start: usize) -> usize {
        let n = self.lines.len();
        let mut end = n;
        let mut streak = 0;
        let mut streak_start = None;

        for j in start + 1..n {
            let line = self.lines[j];
            if is_blank(line) {
                continue;
            }
            if fence_open(line).is_some() || self.is_isolated_heading(j) {
                end = j;
                streak_start = None;
                break;
            }
            if self.is_prose_like(line) {
                streak += 1;
                let first = *streak_start.get_or_insert(j);
                if streak >= PROSE_STREAK_END {
                    end = first;
                    streak_start = None;
                    break;
                }
            } else {
                streak = 0;
                streak_start = None;
            }
        }
        // a pending streak at end of document is prose too
        if let Some(first) = streak_start {
            end = first;
        }
        while end > start + 1 && is_blank(self.lines[end - 1]) {
            end -= 1;
        }

        let body = &self.lines[start..end];
        let non_blank: Vec<&str> = body.iter().copied().filter(|l| !is_blank(l)).collect();
        let qualifies =
            non_blank.len() >= MIN_CODE_LINES && !non_blank.iter().all(|l| is_sentence_like(l));

        if qualifies {
            self.flush_prose(start);
            debug!("Code candidate at lines {}..{}", start, end);
            self.segments.push(Segment::new(SegmentKind::Code, start, end));
            self.prose_start = end;
        } else {
            debug!("Folding weak candidate at lines {}..{} into prose", start, end);
            self.ambiguities
                .push(Diagnostic::SegmentationAmbiguity { start, end });
        }
        end
    }

    fn take_fence(&mut self, start: usize, ch: char, len: usize, info: String) -> usize {
        let n = self.lines.len();
        let closer = (start + 1..n).find(|&j| closes_fence(self.lines[j], ch, len));
        let (end, body_end) = match closer {
            Some(j) => (j + 1, j),
            None => (n, n),
        };

        self.flush_prose(start);
        let mut seg = Segment::new(SegmentKind::Fenced, start, end);
        seg.body = start + 1..body_end;
        seg.info = (!info.is_empty()).then_some(info);
        self.segments.push(seg);
        self.prose_start = end;
        end
    }

    fn flush_prose(&mut self, upto: usize) {
        if self.prose_start < upto {
            self.segments
                .push(Segment::new(SegmentKind::Prose, self.prose_start, upto));
        }
        self.prose_start = upto;
    }
}

/// The most common indent among sentence-like lines outside fences; 0 when
/// there are none. Ties go to the shallower indent.
fn prose_baseline(lines: &[&str]) -> usize {
    let mut counts: HashMap<usize, usize> = HashMap::new();
    let mut fence: Option<(char, usize)> = None;
    for line in lines {
        match fence {
            Some((ch, len)) => {
                if closes_fence(line, ch, len) {
                    fence = None;
                }
            }
            None => {
                if let Some((ch, len, _)) = fence_open(line) {
                    fence = Some((ch, len));
                } else if is_sentence_like(line) {
                    *counts.entry(leading_width(line)).or_default() += 1;
                }
            }
        }
    }
    counts
        .into_iter()
        .max_by(|(wa, ca), (wb, cb)| ca.cmp(cb).then(wb.cmp(wa)))
        .map(|(w, _)| w)
        .unwrap_or(0)
}
