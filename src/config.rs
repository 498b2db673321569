//! Configuration types for code block formatting.
//!
//! Two layers, resolved once per run and never mutated afterwards:
//!
//! * [`FormattingPolicy`] — *what* the engine does to a document: which
//!   languages it may label, and how it treats indentation. Shared read-only
//!   by every worker behind an `Arc`.
//! * [`PipelineConfig`] — *how* a batch runs: per-document timeout, size and
//!   memory limits, concurrency, and the progress callback. Built via
//!   [`PipelineConfigBuilder`], which validates every limit up front.
//!
//! Both are plain values passed into the functions that need them. There is
//! no process-wide configuration.

use crate::error::FormatError;
use crate::languages::{Language, LanguageRegistry};
use crate::progress::ProgressCallback;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Languages enabled when the caller does not name any.
pub const DEFAULT_LANGUAGES: &[&str] = &["json", "yaml", "bash"];

/// Default per-document processing budget.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default upper bound on a single document's size (100 MiB).
pub const DEFAULT_MAX_DOCUMENT_BYTES: u64 = 100 * 1024 * 1024;

/// Default number of documents formatted at the same time.
pub const DEFAULT_MAX_CONCURRENT_DOCUMENTS: usize = 4;

/// Granularity of the memory budget semaphore.
const BUDGET_UNIT_BYTES: u64 = 1024;

// ── FormattingPolicy ─────────────────────────────────────────────────────

/// Immutable formatting rules for one run.
///
/// The supported-language set is non-empty, holds canonical tags only, and
/// contains no duplicates. Classification never considers a language outside
/// this set, even if the registry knows it.
///
/// # Example
/// ```rust
/// use codefence::FormattingPolicy;
///
/// let policy = FormattingPolicy::new(["Python", "yml", "sh", "python"])
///     .unwrap()
///     .with_preserve_indentation(false);
/// assert_eq!(policy.languages(), &["python", "yaml", "bash"]);
/// ```
#[derive(Clone)]
pub struct FormattingPolicy {
    languages: Vec<&'static str>,
    registry: Arc<LanguageRegistry>,
    preserve_indentation: bool,
    minimal_cleanup: bool,
    detect_languages: bool,
}

impl FormattingPolicy {
    /// Build a policy over the built-in languages.
    ///
    /// Names are trimmed, matched case-insensitively, resolved through
    /// aliases (`yml`, `sh`, `py`, …) and de-duplicated, keeping first-seen
    /// order.
    ///
    /// # Errors
    /// [`FormatError::ConfigurationInvalid`] if the set is empty or names a
    /// language with no registered signature.
    pub fn new<I, S>(languages: I) -> Result<Self, FormatError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_registry(languages, LanguageRegistry::shared_builtin())
    }

    /// Build a policy over a caller-supplied registry.
    pub fn with_registry<I, S>(
        languages: I,
        registry: Arc<LanguageRegistry>,
    ) -> Result<Self, FormatError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut resolved: Vec<&'static str> = Vec::new();
        for name in languages {
            let name = name.as_ref();
            if name.trim().is_empty() {
                continue;
            }
            let tag = registry.resolve(name).ok_or_else(|| {
                FormatError::ConfigurationInvalid(format!(
                    "unsupported language '{}' (known: {})",
                    name.trim(),
                    registry.tags().join(", ")
                ))
            })?;
            if !resolved.contains(&tag) {
                resolved.push(tag);
            }
        }

        if resolved.is_empty() {
            return Err(FormatError::ConfigurationInvalid(
                "supported language set is empty".into(),
            ));
        }

        Ok(Self {
            languages: resolved,
            registry,
            preserve_indentation: true,
            minimal_cleanup: true,
            detect_languages: true,
        })
    }

    /// Keep original leading whitespace (`true`) or recompute it from nesting.
    pub fn with_preserve_indentation(mut self, v: bool) -> Self {
        self.preserve_indentation = v;
        self
    }

    /// In preserve mode, strip trailing whitespace and collapse long blank runs.
    pub fn with_minimal_cleanup(mut self, v: bool) -> Self {
        self.minimal_cleanup = v;
        self
    }

    /// When `false`, every code segment is fenced without a label.
    pub fn with_detect_languages(mut self, v: bool) -> Self {
        self.detect_languages = v;
        self
    }

    /// Canonical tags of the supported set, in configured order.
    pub fn languages(&self) -> &[&'static str] {
        &self.languages
    }

    /// Whether `tag` is in the supported set.
    pub fn supports(&self, tag: &str) -> bool {
        self.languages.iter().any(|t| *t == tag)
    }

    /// The registry the policy resolves languages against.
    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    /// Look up a supported language by canonical tag.
    pub fn language(&self, tag: &str) -> Option<&Arc<dyn Language>> {
        if self.supports(tag) {
            self.registry.get(tag)
        } else {
            None
        }
    }

    /// Resolve a user-facing name to a tag in the supported set.
    pub fn resolve(&self, name: &str) -> Option<&'static str> {
        self.registry.resolve(name).filter(|tag| self.supports(tag))
    }

    pub fn preserve_indentation(&self) -> bool {
        self.preserve_indentation
    }

    pub fn minimal_cleanup(&self) -> bool {
        self.minimal_cleanup
    }

    pub fn detect_languages(&self) -> bool {
        self.detect_languages
    }
}

impl Default for FormattingPolicy {
    /// `json`, `yaml` and `bash`, preserving indentation with minimal cleanup.
    fn default() -> Self {
        Self {
            languages: DEFAULT_LANGUAGES.to_vec(),
            registry: LanguageRegistry::shared_builtin(),
            preserve_indentation: true,
            minimal_cleanup: true,
            detect_languages: true,
        }
    }
}

impl fmt::Debug for FormattingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormattingPolicy")
            .field("languages", &self.languages)
            .field("preserve_indentation", &self.preserve_indentation)
            .field("minimal_cleanup", &self.minimal_cleanup)
            .field("detect_languages", &self.detect_languages)
            .finish()
    }
}

// ── PipelineConfig ───────────────────────────────────────────────────────

/// Resource limits and hooks for a batch run.
///
/// Built via [`PipelineConfig::builder()`] or [`PipelineConfig::default()`].
/// Fields are public so callers can adjust a default config directly; the
/// batch entry points call [`PipelineConfig::validate`] before touching any
/// document.
///
/// # Example
/// ```rust
/// use codefence::{FormattingPolicy, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .policy(FormattingPolicy::new(["python", "yaml"]).unwrap())
///     .timeout_secs(30)
///     .max_concurrent_documents(8)
///     .build()
///     .unwrap();
/// assert_eq!(config.memory_budget_bytes, 4 * config.max_document_bytes);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Formatting rules shared by every worker.
    pub policy: Arc<FormattingPolicy>,

    /// Wall-clock budget for one document, including the wait for memory.
    /// Default: 300 s.
    pub timeout: Duration,

    /// Documents larger than this are rejected before any processing.
    /// Default: 100 MiB.
    pub max_document_bytes: u64,

    /// Documents formatted at the same time. Default: 4.
    pub max_concurrent_documents: usize,

    /// Total bytes of document text being formatted at once. Each document
    /// holds its share from just before its text is loaded until it
    /// finishes or times out. Documents still queued in the caller's input
    /// and workers abandoned after a timeout are not counted.
    /// Default: four maximum-size documents.
    pub memory_budget_bytes: u64,

    /// Prepend YAML front matter to each formatted document. Default: false.
    pub include_metadata: bool,

    /// Optional per-document progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            policy: Arc::new(FormattingPolicy::default()),
            timeout: DEFAULT_TIMEOUT,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            max_concurrent_documents: DEFAULT_MAX_CONCURRENT_DOCUMENTS,
            memory_budget_bytes: 4 * DEFAULT_MAX_DOCUMENT_BYTES,
            include_metadata: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("policy", &self.policy)
            .field("timeout", &self.timeout)
            .field("max_document_bytes", &self.max_document_bytes)
            .field("max_concurrent_documents", &self.max_concurrent_documents)
            .field("memory_budget_bytes", &self.memory_budget_bytes)
            .field("include_metadata", &self.include_metadata)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn FormatProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
            memory_budget_set: false,
        }
    }

    /// Reject limits that would misconfigure every document identically.
    pub fn validate(&self) -> Result<(), FormatError> {
        if self.policy.languages().is_empty() {
            return Err(FormatError::ConfigurationInvalid(
                "supported language set is empty".into(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(FormatError::ConfigurationInvalid(
                "per-document timeout must be positive".into(),
            ));
        }
        if self.max_document_bytes == 0 {
            return Err(FormatError::ConfigurationInvalid(
                "maximum document size must be positive".into(),
            ));
        }
        if self.max_concurrent_documents == 0 {
            return Err(FormatError::ConfigurationInvalid(
                "maximum concurrent documents must be ≥ 1".into(),
            ));
        }
        if self.memory_budget_bytes < self.max_document_bytes {
            return Err(FormatError::ConfigurationInvalid(format!(
                "memory budget ({} bytes) is smaller than one maximum-size document ({} bytes)",
                self.memory_budget_bytes, self.max_document_bytes
            )));
        }
        if budget_units(self.max_document_bytes) > u64::from(u32::MAX)
            || budget_units(self.memory_budget_bytes) > tokio::sync::Semaphore::MAX_PERMITS as u64
        {
            return Err(FormatError::ConfigurationInvalid(
                "memory limits are too large".into(),
            ));
        }
        Ok(())
    }

    /// Semaphore permits representing the whole memory budget.
    pub(crate) fn budget_permits(&self) -> usize {
        budget_units(self.memory_budget_bytes) as usize
    }

    /// Permits a document of `size` bytes holds while it is processed.
    ///
    /// Only meaningful after [`validate`](Self::validate) and the size check:
    /// the result then fits in `u32` and never exceeds
    /// [`budget_permits`](Self::budget_permits).
    pub(crate) fn permits_for(&self, size: u64) -> u32 {
        u32::try_from(budget_units(size).max(1)).unwrap_or(u32::MAX)
    }
}

fn budget_units(bytes: u64) -> u64 {
    bytes.div_ceil(BUDGET_UNIT_BYTES)
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
    memory_budget_set: bool,
}

impl PipelineConfigBuilder {
    pub fn policy(mut self, policy: impl Into<Arc<FormattingPolicy>>) -> Self {
        self.config.policy = policy.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn timeout_secs(self, secs: u64) -> Self {
        self.timeout(Duration::from_secs(secs))
    }

    pub fn max_document_bytes(mut self, bytes: u64) -> Self {
        self.config.max_document_bytes = bytes;
        self
    }

    pub fn max_concurrent_documents(mut self, n: usize) -> Self {
        self.config.max_concurrent_documents = n;
        self
    }

    /// Override the memory budget. When unset it follows
    /// `max_document_bytes`, at four documents' worth.
    pub fn memory_budget_bytes(mut self, bytes: u64) -> Self {
        self.config.memory_budget_bytes = bytes;
        self.memory_budget_set = true;
        self
    }

    pub fn include_metadata(mut self, v: bool) -> Self {
        self.config.include_metadata = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<PipelineConfig, FormatError> {
        if !self.memory_budget_set {
            self.config.memory_budget_bytes = self.config.max_document_bytes.saturating_mul(4);
        }
        self.config.validate()?;
        Ok(self.config)
    }
}
