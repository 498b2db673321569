//! Shell scripts and command transcripts.
//!
//! Runbooks exported from wiki pages are dominated by one-line commands
//! (`kubectl …`, `oc …`, `export FOO=…`) rather than full scripts, so common
//! command names carry as much weight as control-flow keywords.

use super::{Language, Signature};
use once_cell::sync::Lazy;

static SIGNATURE: Lazy<Signature> = Lazy::new(|| {
    Signature::new(
        &[
            (r"^\s*(then|fi|do|done|esac|else)\b\s*([;<|>&].*)?$", 0.8),
            (r"^\s*(if|elif|while|until)\s+(\[\[?|!|test\b)", 0.8),
            (r";\s*(then|do)\s*$", 0.6),
            (r"^\s*for\s+\w+\s+in\b", 0.6),
            (r"^\s*case\s+.+\s+in\s*$", 0.8),
            (r"^\s*;;\s*$", 0.6),
            (r"^\s*(function\s+\w+|\w+\s*\(\)\s*)\{?\s*$", 0.6),
            (
                r"^\s*(sudo\s+)?(echo|printf|export|local|source|cd|mkdir|rm|cp|mv|chmod|chown|grep|sed|awk|curl|wget|cat|tar|apt-get|apt|yum|dnf|brew|kubectl|oc|helm|docker|podman|git|systemctl|make|pip|npm|ssh|scp)\b",
                0.6,
            ),
            (r"\$\{[A-Za-z_][A-Za-z0-9_]*\}|\$[A-Za-z_][A-Za-z0-9_]*\b", 0.3),
            (r"\$\(", 0.4),
            (r"^\s*(export\s+)?[A-Za-z_][A-Za-z0-9_]*=\S", 0.4),
            (r"\s(\||&&|\|\|)\s", 0.2),
            (r"^\s*\$\s+\S", 0.5),
            (r"^\s*#\s", 0.1),
            (r"\s--?[a-zA-Z][\w-]*", 0.2),
            (r#"^\s*"[^"]*"\s*:"#, -0.5),
            (r"^\s*(def|class|func|fn|import|package)\b", -0.5),
        ],
        &[(r"\A#!\s*/(usr/)?bin/(env\s+)?(ba|z|k)?sh\b", 1.0)],
    )
});

/// Bash / POSIX shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bash;

impl Language for Bash {
    fn tag(&self) -> &'static str {
        "bash"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["sh", "shell", "zsh", "console"]
    }

    fn indent_width(&self) -> usize {
        2
    }

    fn score(&self, lines: &[&str]) -> f64 {
        SIGNATURE.score(lines)
    }
}
