//! Fence Renderer: turn formatted blocks back into document text.
//!
//! Prose passes through untouched. Code is wrapped in a backtick fence,
//! labeled with the canonical language tag when one was accepted and left
//! unlabeled otherwise. The fence is always longer than any backtick run
//! that starts a line of the body, so code that itself contains fences
//! cannot close the block early.

use serde::Serialize;
use std::collections::BTreeMap;

/// Shortest fence emitted.
const MIN_FENCE_LEN: usize = 3;

/// The rendered form of one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FormattedBlock {
    /// Original prose text.
    Prose { text: String },
    /// Code wrapped in a fence; `language` is `None` for an unlabeled fence.
    Code {
        language: Option<&'static str>,
        body: String,
    },
    /// Text emitted exactly as it appeared, fences included.
    Verbatim { text: String },
}

impl FormattedBlock {
    /// Final text of this block, without a trailing newline.
    pub fn render(&self) -> String {
        match self {
            FormattedBlock::Prose { text } | FormattedBlock::Verbatim { text } => text.clone(),
            FormattedBlock::Code { language, body } => {
                let fence = fence_for(body);
                format!("{fence}{}\n{body}\n{fence}", language.unwrap_or(""))
            }
        }
    }

    pub fn is_code(&self) -> bool {
        !matches!(self, FormattedBlock::Prose { .. })
    }
}

/// A backtick fence long enough to enclose `body`.
pub fn fence_for(body: &str) -> String {
    let longest = body
        .lines()
        .map(|l| l.trim_start().chars().take_while(|c| *c == '`').count())
        .max()
        .unwrap_or(0);
    "`".repeat(MIN_FENCE_LEN.max(longest + 1))
}

/// Join rendered blocks in order, ending the document with one newline.
pub fn assemble(blocks: &[FormattedBlock]) -> String {
    let body = blocks
        .iter()
        .map(FormattedBlock::render)
        .collect::<Vec<_>>()
        .join("\n");
    ensure_final_newline(&body)
}

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end_matches('\n');
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

/// YAML front matter summarising a formatted document.
pub fn front_matter(
    source: &str,
    pages: usize,
    code_blocks: usize,
    languages: &BTreeMap<String, usize>,
) -> String {
    let mut yaml = String::from("---\n");
    // a JSON string is a valid double-quoted YAML scalar
    let quoted = serde_json::to_string(source).unwrap_or_else(|_| format!("\"{}\"", source));
    yaml.push_str(&format!("source: {}\n", quoted));
    yaml.push_str(&format!("pages: {}\n", pages));
    yaml.push_str(&format!("code_blocks: {}\n", code_blocks));
    let tags: Vec<&str> = languages.keys().map(String::as_str).collect();
    yaml.push_str(&format!("languages: [{}]\n", tags.join(", ")));
    yaml.push_str("---\n\n");
    yaml
}
