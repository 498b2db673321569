use super::{Language, Signature};
use once_cell::sync::Lazy;

static SIGNATURE: Lazy<Signature> = Lazy::new(|| {
    Signature::new(
        &[
            (r"^\s*(pub(\([\w:]+\))?\s+)?(async\s+)?(unsafe\s+)?fn\s+\w+", 1.0),
            (r"^\s*(pub(\([\w:]+\))?\s+)?use\s+[\w:{}, *]+;\s*$", 0.8),
            (r"^\s*let\s+(mut\s+)?\w+(\s*:\s*[^=]+)?\s*=.*;\s*$", 0.5),
            (r"^\s*(pub(\([\w:]+\))?\s+)?(struct|enum|trait|mod|impl)\b", 0.8),
            (r"\w::\w", 0.3),
            (r"\b\w+!\s*[(\[{]", 0.5),
            (r"^\s*#!?\[", 0.6),
            (r"&(mut\s+)?[a-z_]", 0.2),
            (r"\b(Option|Result|Vec|String|Box|Some|Ok|Err)\b", 0.2),
            (r"->\s*[\w<&(]", 0.2),
            (r"\bmatch\s+.*\{\s*$", 0.4),
            (r"^\s*//", 0.1),
            (r"^\s*(def|func|function|var)\b", -0.4),
        ],
        &[],
    )
});

/// The Rust language.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rust;

impl Language for Rust {
    fn tag(&self) -> &'static str {
        "rust"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["rs"]
    }

    fn score(&self, lines: &[&str]) -> f64 {
        SIGNATURE.score(lines)
    }
}
