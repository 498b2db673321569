//! Python: block statements ending in `:`, `def`/`class`, and import forms.

use super::{Language, Signature};
use once_cell::sync::Lazy;

static SIGNATURE: Lazy<Signature> = Lazy::new(|| {
    Signature::new(
        &[
            (r"^\s*(async\s+)?def\s+\w+\s*\(.*\)\s*(->\s*[^:]+)?:\s*$", 1.0),
            (r"^\s*class\s+\w+\s*(\([^)]*\))?\s*:\s*$", 1.0),
            (r"^\s*(if|elif|while|for|with|try|except|finally|else)\b[^;{]*:\s*$", 0.6),
            (r"^\s*from\s+[\w.]+\s+import\s+\S", 0.8),
            (r"^\s*import\s+[\w.]+(\s+as\s+\w+)?(\s*,\s*[\w.]+)*\s*$", 0.8),
            (r"^\s*@[\w.]+", 0.5),
            (r"\bself\.\w+", 0.4),
            (r"\b(None|True|False)\b", 0.2),
            (r"\bprint\(", 0.3),
            (r"^\s*return\b", 0.3),
            (r"^\s*(raise|yield|pass|lambda)\b", 0.4),
            // C-family terminators
            (r";\s*$", -0.4),
            (r"\{\s*$", -0.3),
        ],
        &[(r"\A#!.*\bpython", 1.0)],
    )
});

/// The Python language.
#[derive(Debug, Clone, Copy, Default)]
pub struct Python;

impl Language for Python {
    fn tag(&self) -> &'static str {
        "python"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["py", "python3"]
    }

    fn score(&self, lines: &[&str]) -> f64 {
        SIGNATURE.score(lines)
    }
}
