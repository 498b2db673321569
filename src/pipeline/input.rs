//! Input: build a [`Document`] from converted text, or read one from disk.
//!
//! Text arriving from the PDF converter carries artefacts that would confuse
//! the segmenter: Windows line endings, zero-width characters that break
//! regex anchors, and form-feed page breaks. They are normalised here, once,
//! at the boundary, so every later stage sees plain `\n`-separated lines.

use crate::error::FormatError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File extensions picked up when a directory is given as input.
pub const INPUT_EXTENSIONS: &[&str] = &["md", "markdown", "txt"];

/// Zero-width space, BOM, soft hyphen, ZWNJ, ZWJ, word joiner.
const INVISIBLE_CHARS: [char; 6] = [
    '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
];

const FORM_FEED: char = '\u{000C}';

/// One converted document: its lines in order plus identifying metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Source identity (usually the originating file path).
    pub source: String,
    /// Lines without terminators.
    pub lines: Vec<String>,
    /// Pages in the source PDF.
    pub page_count: usize,
}

impl Document {
    /// Wrap already-split lines.
    pub fn new(source: impl Into<String>, lines: Vec<String>, page_count: usize) -> Self {
        Self {
            source: source.into(),
            lines,
            page_count,
        }
    }

    /// Build a document from raw converter output.
    ///
    /// Line endings become `\n`, invisible characters are dropped, and
    /// form feeds are counted as page breaks, then removed. A trailing
    /// newline does not produce an extra empty line.
    pub fn from_text(source: impl Into<String>, text: &str) -> Self {
        let text = normalise_line_endings(text);
        let text = remove_invisible_chars(&text);
        let page_count = count_pages(&text);
        let text = text.replace(FORM_FEED, "");

        let body = text.strip_suffix('\n').unwrap_or(&text);
        let lines = if text.is_empty() {
            Vec::new()
        } else {
            body.split('\n').map(str::to_string).collect()
        };

        Self::new(source, lines, page_count)
    }

    /// Size of the document text in bytes, counting one `\n` between lines.
    pub fn byte_len(&self) -> u64 {
        let text: usize = self.lines.iter().map(String::len).sum();
        (text + self.lines.len().saturating_sub(1)) as u64
    }

    /// The lines joined with `\n`.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(INVISIBLE_CHARS, "")
}

/// Pages are separated by form feeds; a final form feed closes the last
/// page rather than opening an empty one.
fn count_pages(text: &str) -> usize {
    let mut pages: Vec<&str> = text.split(FORM_FEED).collect();
    if pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    pages.len()
}

/// Read a UTF-8 text file into a [`Document`].
///
/// # Errors
/// [`FormatError::FileNotFound`], [`FormatError::PermissionDenied`],
/// [`FormatError::NotUtf8`], or [`FormatError::ReadFailed`].
pub async fn read_document(path: impl AsRef<Path>) -> Result<Document, FormatError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await.map_err(|e| io_error(path, e))?;

    let text = String::from_utf8(bytes).map_err(|_| FormatError::NotUtf8 {
        path: path.to_path_buf(),
    })?;

    let doc = Document::from_text(path.to_string_lossy(), &text);
    debug!(
        "Read {}: {} lines, {} pages",
        path.display(),
        doc.lines.len(),
        doc.page_count
    );
    Ok(doc)
}

/// Expand input paths: files are kept as given, directories contribute
/// their direct children with a known text extension, sorted by name.
pub fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, FormatError> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let entries = std::fs::read_dir(input).map_err(|e| io_error(input, e))?;
            let mut found: Vec<PathBuf> = Vec::new();
            for entry in entries {
                let path = entry.map_err(|e| io_error(input, e))?.path();
                if path.is_file() && has_input_extension(&path) {
                    found.push(path);
                }
            }
            found.sort();
            debug!("{}: {} input files", input.display(), found.len());
            files.extend(found);
        } else if input.exists() {
            files.push(input.clone());
        } else {
            return Err(FormatError::FileNotFound {
                path: input.clone(),
            });
        }
    }
    Ok(files)
}

fn has_input_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| INPUT_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

pub(crate) fn io_error(path: &Path, e: std::io::Error) -> FormatError {
    match e.kind() {
        std::io::ErrorKind::NotFound => FormatError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => FormatError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => FormatError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    }
}
