use super::{Language, Signature};
use once_cell::sync::Lazy;

static SIGNATURE: Lazy<Signature> = Lazy::new(|| {
    Signature::new(
        &[
            (r"^\s*(export\s+)?(const|let|var)\s+[\w{}\[\], ]+\s*=", 0.6),
            (r"\bfunction\b\s*\*?\s*\w*\s*\(", 0.9),
            (r"=>", 0.5),
            (r"\bconsole\.\w+\(", 0.7),
            (r#"^\s*import\s+.+\s+from\s+['"]"#, 0.9),
            (r#"^\s*import\s+['"]"#, 0.6),
            (r"^\s*export\s+(default|function|class|const|let|var|async)\b", 0.7),
            (r#"\brequire\(\s*['"]"#, 0.7),
            (r"===|!==", 0.5),
            (r"\b(document|window|module\.exports|process\.env)\b", 0.4),
            (r"\b(async|await)\b", 0.2),
            (r"\bnew\s+[A-Z]\w*\(", 0.3),
            (r";\s*$", 0.1),
            (r"^\s*//", 0.1),
            (r"^\s*(def|fn|func|package)\b", -0.5),
            (r"\blet\s+mut\b|::", -0.4),
        ],
        &[(r"\A#!.*\bnode\b", 1.0)],
    )
});

/// JavaScript (and the untyped subset of TypeScript it overlaps with).
#[derive(Debug, Clone, Copy, Default)]
pub struct JavaScript;

impl Language for JavaScript {
    fn tag(&self) -> &'static str {
        "javascript"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["js", "node", "jsx", "mjs"]
    }

    fn indent_width(&self) -> usize {
        2
    }

    fn score(&self, lines: &[&str]) -> f64 {
        SIGNATURE.score(lines)
    }
}
