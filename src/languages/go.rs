use super::{Language, Signature};
use once_cell::sync::Lazy;

static SIGNATURE: Lazy<Signature> = Lazy::new(|| {
    Signature::new(
        &[
            (r"^\s*package\s+\w+\s*$", 1.0),
            (r"^\s*func\s+(\([^)]*\)\s*)?\w+\s*\(", 1.0),
            (r#"^\s*import\s+(\(\s*$|"[^"]+"\s*$)"#, 0.8),
            (r":=", 0.5),
            (r"\bfmt\.\w+\(", 0.6),
            (r"\berr\s*!=\s*nil\b", 0.7),
            (r"^\s*(var|const|type)\s+\w+\s+\w", 0.3),
            (r"\bstruct\s*\{", 0.3),
            (r"^\s*(if|for|switch)\s+[^(].*\{\s*$", 0.3),
            (r"^\s*defer\s|^\s*go\s+\w+\(|\bchan\b|<-", 0.5),
            (r"^\s*return\b", 0.2),
            (r"^\s*//", 0.2),
            (r"^\s*\}\s*$", 0.1),
            (r";\s*$", -0.3),
            (r"^\s*(def|fn|let|function)\b", -0.4),
        ],
        &[],
    )
});

/// The Go language.
#[derive(Debug, Clone, Copy, Default)]
pub struct Go;

impl Language for Go {
    fn tag(&self) -> &'static str {
        "go"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["golang"]
    }

    fn score(&self, lines: &[&str]) -> f64 {
        SIGNATURE.score(lines)
    }
}
