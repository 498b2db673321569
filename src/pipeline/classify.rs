//! Language Classifier: pick a label for a code segment, or decline.
//!
//! Every language in the policy's supported set scores the segment through
//! its [`Language::score`](crate::languages::Language::score). The best score
//! wins only if it clears [`ACCEPTANCE_THRESHOLD`] and beats the runner-up by
//! at least [`TIE_MARGIN`]. Otherwise the segment gets no label: an unlabeled
//! fence is safe, a wrong label misleads every downstream highlighter.
//!
//! Languages outside the supported set are never scored, whatever the
//! registry knows.

use crate::config::FormattingPolicy;
use crate::error::{Cancelled, Uncertainty};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

/// Minimum score for a label to be accepted.
pub const ACCEPTANCE_THRESHOLD: f64 = 0.35;

/// The best score must lead the second best by at least this much.
pub const TIE_MARGIN: f64 = 0.05;

/// Added to the language named by a fence's info string.
pub const FENCE_HINT_BONUS: f64 = 0.25;

/// Outcome of classifying one segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// Labeled with this canonical tag.
    Accepted { language: &'static str },
    /// The best candidate scored below the threshold.
    BelowThreshold { best: Option<&'static str> },
    /// The two best candidates were within the tie margin.
    Tie {
        first: &'static str,
        second: &'static str,
        margin: f64,
    },
    /// Detection is turned off in the policy.
    Disabled,
    /// The segment has no non-blank lines.
    Empty,
}

/// A language tag (or none) plus the winning confidence in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassificationResult {
    #[serde(flatten)]
    pub verdict: Verdict,
    pub score: f64,
}

impl ClassificationResult {
    fn none(verdict: Verdict, score: f64) -> Self {
        Self { verdict, score }
    }

    /// The accepted language, or `None`.
    pub fn language(&self) -> Option<&'static str> {
        match self.verdict {
            Verdict::Accepted { language } => Some(language),
            _ => None,
        }
    }

    /// Why the classifier declined, when it declined on the evidence.
    ///
    /// `Disabled` and `Empty` are not uncertainty: nothing was weighed.
    pub fn uncertainty(&self) -> Option<Uncertainty> {
        match self.verdict {
            Verdict::BelowThreshold { best } => Some(Uncertainty::BelowThreshold {
                best,
                score: self.score,
            }),
            Verdict::Tie {
                first,
                second,
                margin,
            } => Some(Uncertainty::Tie {
                first,
                second,
                margin,
            }),
            _ => None,
        }
    }
}

/// Classify `lines` against the policy's supported languages.
///
/// `hint` is a fence info string such as `"yaml"` or `"python title=x.py"`;
/// its first word, if it names a supported language, earns that language
/// [`FENCE_HINT_BONUS`].
///
/// Deterministic: the same lines and policy always give the same result.
pub fn classify<S: AsRef<str>>(
    lines: &[S],
    hint: Option<&str>,
    policy: &FormattingPolicy,
) -> ClassificationResult {
    classify_cancellable(lines, hint, policy, &AtomicBool::new(false))
        .unwrap_or(ClassificationResult::none(Verdict::BelowThreshold { best: None }, 0.0))
}

/// [`classify`], checking `cancel` before each language is scored.
pub(crate) fn classify_cancellable<S: AsRef<str>>(
    lines: &[S],
    hint: Option<&str>,
    policy: &FormattingPolicy,
    cancel: &AtomicBool,
) -> Result<ClassificationResult, Cancelled> {
    if !policy.detect_languages() {
        return Ok(ClassificationResult::none(Verdict::Disabled, 0.0));
    }

    let lines: Vec<&str> = lines.iter().map(|l| l.as_ref()).collect();
    if lines.iter().all(|l| l.trim().is_empty()) {
        return Ok(ClassificationResult::none(Verdict::Empty, 0.0));
    }

    let hinted = hint
        .and_then(|h| h.split_whitespace().next())
        .and_then(|word| policy.resolve(word.trim_start_matches('{').trim_start_matches('.')));

    let mut scores: Vec<(&'static str, f64)> = Vec::with_capacity(policy.languages().len());
    for &tag in policy.languages() {
        if cancel.load(Ordering::Relaxed) {
            return Err(Cancelled);
        }
        let Some(language) = policy.language(tag) else {
            continue;
        };
        let mut score = language.score(&lines);
        if hinted == Some(tag) {
            score += FENCE_HINT_BONUS;
        }
        scores.push((tag, score));
    }
    // stable: equal scores keep configured order
    scores.sort_by(|a, b| b.1.total_cmp(&a.1));

    let Some(&(best, top)) = scores.first() else {
        return Ok(ClassificationResult::none(Verdict::BelowThreshold { best: None }, 0.0));
    };
    let reported = top.clamp(0.0, 1.0);

    if top < ACCEPTANCE_THRESHOLD {
        let best = (top > 0.0).then_some(best);
        return Ok(ClassificationResult::none(Verdict::BelowThreshold { best }, reported));
    }

    if let Some(&(second, runner_up)) = scores.get(1) {
        let margin = top - runner_up;
        if margin < TIE_MARGIN {
            return Ok(ClassificationResult::none(
                Verdict::Tie {
                    first: best,
                    second,
                    margin,
                },
                reported,
            ));
        }
    }

    Ok(ClassificationResult {
        verdict: Verdict::Accepted { language: best },
        score: reported,
    })
}
