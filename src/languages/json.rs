//! JSON: quoted keys, bracket-only lines, and a strict-parse bonus.
//!
//! Line patterns alone cannot tell a pretty-printed JSON object from a
//! JavaScript object literal, so a segment that actually parses as a JSON
//! object or array gets [`PARSE_BONUS`] on top of its signature score.

use super::{Language, Signature};
use once_cell::sync::Lazy;
use serde_json::Value;

/// Added when the whole segment parses as a JSON object or array.
pub const PARSE_BONUS: f64 = 0.4;

static SIGNATURE: Lazy<Signature> = Lazy::new(|| {
    Signature::new(
        &[
            (r#"^\s*"[^"]+"\s*:"#, 0.8),
            (r"^\s*[\[{]\s*$", 0.4),
            (r"^\s*[\]}]\s*,?\s*$", 0.4),
            (
                r#"^\s*("([^"\\]|\\.)*"|-?\d+(\.\d+)?([eE][+-]?\d+)?|true|false|null)\s*,?\s*$"#,
                0.4,
            ),
            (r"^\s*[A-Za-z_][\w-]*\s*:\s", -0.4),
            (r"^\s*(#|//)", -0.5),
            (r";\s*$", -0.5),
            (r"\b(function|def|func|fn|let|var|const|return)\b", -0.5),
            (r"^\s*\w+\s*=", -0.4),
        ],
        &[(r"\A\s*[\[{][\s\S]*[\]}]\s*\z", 0.3)],
    )
});

/// The JSON data format.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl Language for Json {
    fn tag(&self) -> &'static str {
        "json"
    }

    fn indent_width(&self) -> usize {
        2
    }

    fn score(&self, lines: &[&str]) -> f64 {
        let base = SIGNATURE.score(lines);
        let text = lines.join("\n");
        match serde_json::from_str::<Value>(text.trim()) {
            Ok(Value::Object(_)) | Ok(Value::Array(_)) => (base + PARSE_BONUS).min(1.0),
            _ => base,
        }
    }
}
