use super::{Language, Signature};
use once_cell::sync::Lazy;

static SIGNATURE: Lazy<Signature> = Lazy::new(|| {
    Signature::new(
        &[
            (r"^\s*[A-Za-z_][\w.\-/]*:(\s.*)?$", 0.6),
            (r"^\s*-\s+[A-Za-z_][\w.\-/]*:(\s.*)?$", 0.7),
            (r"^\s*-\s+\S", 0.3),
            (r"^---\s*$|^\.\.\.\s*$", 0.5),
            (r":\s*[|>][-+]?\s*$", 0.5),
            (r"^\s*#\s", 0.1),
            (r"[;{}()]\s*$", -0.4),
            (
                r"^\s*(def|class|func|fn|if|for|while|return|import|package|echo|export)\b",
                -0.4,
            ),
            (r"^\s*\w+\s*=", -0.3),
            (r#"^\s*"[^"]+"\s*:"#, -0.2),
        ],
        &[(r"(?m)^(apiVersion|kind):\s", 0.4)],
    )
});

/// The YAML data format.
#[derive(Debug, Clone, Copy, Default)]
pub struct Yaml;

impl Language for Yaml {
    fn tag(&self) -> &'static str {
        "yaml"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["yml"]
    }

    fn indent_width(&self) -> usize {
        2
    }

    fn score(&self, lines: &[&str]) -> f64 {
        SIGNATURE.score(lines)
    }
}
