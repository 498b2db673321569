//! Language signatures and the registry the classifier scores against.
//!
//! Every supported language is one implementation of [`Language`], registered
//! in a [`LanguageRegistry`] under its canonical lower-case tag. The
//! classifier never branches on language names; it asks each configured
//! language for a score and compares the numbers. Adding a language is an
//! additive change: write a module, register it.
//!
//! ## Scoring model
//!
//! Built-in languages describe themselves with a [`Signature`]: a list of
//! weighted per-line patterns and a list of weighted whole-segment markers.
//!
//! ```text
//! score = clamp( Σ line weights / non-blank lines  +  Σ marker weights , 0, 1 )
//! ```
//!
//! Line weights may be negative. A pattern that is characteristic of a
//! *different* language (a `def` line for YAML, a `;` terminator for JSON)
//! pulls the score down instead of being ignored.

mod bash;
mod go;
mod javascript;
mod json;
mod python;
mod rust;
mod yaml;

pub use bash::Bash;
pub use go::Go;
pub use javascript::JavaScript;
pub use json::Json;
pub use python::Python;
pub use rust::Rust;
pub use yaml::Yaml;

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A language the classifier can recognise and the resolver can indent.
///
/// Implementations must be cheap to call concurrently: one instance is shared
/// by every worker in a batch.
pub trait Language: Send + Sync {
    /// Canonical lower-case tag, used as the fence label.
    fn tag(&self) -> &'static str;

    /// Alternative spellings accepted in configuration and fence info strings.
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    /// Spaces per nesting level when indentation is normalised.
    fn indent_width(&self) -> usize {
        4
    }

    /// Confidence in `[0, 1]` that `lines` are written in this language.
    ///
    /// Never called with an empty or all-blank slice.
    fn score(&self, lines: &[&str]) -> f64;
}

/// Weighted lexical patterns characteristic of one language.
pub struct Signature {
    lines: Vec<(Regex, f64)>,
    markers: Vec<(Regex, f64)>,
}

impl Signature {
    /// Compile a signature from `(pattern, weight)` pairs.
    ///
    /// `lines` are matched against each non-blank line on its own; `markers`
    /// are matched once against the whole segment joined with `\n`.
    ///
    /// # Panics
    /// If a pattern is not a valid regex. Signatures are built from literals
    /// inside `Lazy` statics, so this surfaces on first use in tests.
    pub fn new(lines: &[(&str, f64)], markers: &[(&str, f64)]) -> Self {
        let compile = |pairs: &[(&str, f64)]| {
            pairs
                .iter()
                .map(|(pattern, weight)| {
                    let re = Regex::new(pattern)
                        .unwrap_or_else(|e| panic!("invalid signature pattern {pattern:?}: {e}"));
                    (re, *weight)
                })
                .collect()
        };
        Self {
            lines: compile(lines),
            markers: compile(markers),
        }
    }

    /// Sum of line weights divided by the non-blank line count, plus marker
    /// weights, clamped to `[0, 1]`. Returns 0 when every line is blank.
    pub fn score(&self, lines: &[&str]) -> f64 {
        let code: Vec<&str> = lines
            .iter()
            .copied()
            .filter(|l| !l.trim().is_empty())
            .collect();
        if code.is_empty() {
            return 0.0;
        }

        let line_total: f64 = code
            .iter()
            .map(|line| {
                self.lines
                    .iter()
                    .filter(|(re, _)| re.is_match(line))
                    .map(|(_, w)| w)
                    .sum::<f64>()
            })
            .sum();

        let text = lines.join("\n");
        let marker_total: f64 = self
            .markers
            .iter()
            .filter(|(re, _)| re.is_match(&text))
            .map(|(_, w)| w)
            .sum();

        (line_total / code.len() as f64 + marker_total).clamp(0.0, 1.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("lines", &self.lines.len())
            .field("markers", &self.markers.len())
            .finish()
    }
}

/// Lookup of languages keyed by canonical tag, with alias resolution.
#[derive(Clone, Default)]
pub struct LanguageRegistry {
    languages: HashMap<&'static str, Arc<dyn Language>>,
    aliases: HashMap<&'static str, &'static str>,
}

static BUILTIN: Lazy<Arc<LanguageRegistry>> = Lazy::new(|| Arc::new(LanguageRegistry::builtin()));

impl LanguageRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in language.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry
            .register(Arc::new(Python))
            .register(Arc::new(Go))
            .register(Arc::new(Rust))
            .register(Arc::new(JavaScript))
            .register(Arc::new(Bash))
            .register(Arc::new(Json))
            .register(Arc::new(Yaml));
        registry
    }

    /// Shared handle to the built-in registry.
    pub fn shared_builtin() -> Arc<Self> {
        Arc::clone(&BUILTIN)
    }

    /// Add (or replace) a language under its tag and aliases.
    pub fn register(&mut self, language: Arc<dyn Language>) -> &mut Self {
        let tag = language.tag();
        for alias in language.aliases() {
            self.aliases.insert(*alias, tag);
        }
        self.languages.insert(tag, language);
        self
    }

    /// Look up a language by canonical tag.
    pub fn get(&self, tag: &str) -> Option<&Arc<dyn Language>> {
        self.languages.get(tag)
    }

    /// Resolve a user-facing name (any case, alias allowed) to a canonical tag.
    pub fn resolve(&self, name: &str) -> Option<&'static str> {
        let name = name.trim().to_ascii_lowercase();
        if let Some((tag, _)) = self.languages.get_key_value(name.as_str()) {
            return Some(*tag);
        }
        self.aliases.get(name.as_str()).copied()
    }

    /// Every registered canonical tag, sorted.
    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<&'static str> = self.languages.keys().copied().collect();
        tags.sort_unstable();
        tags
    }
}

impl fmt::Debug for LanguageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LanguageRegistry")
            .field("languages", &self.tags())
            .finish()
    }
}
