//! Indentation Resolver: decide what a code segment's whitespace looks like.
//!
//! Two modes, chosen by [`FormattingPolicy::preserve_indentation`]:
//!
//! * **Preserve** keeps every line's leading whitespace byte-for-byte. With
//!   minimal cleanup it also strips trailing whitespace, empties
//!   whitespace-only lines and collapses runs of three or more blank lines
//!   to one. Nothing else changes.
//! * **Normalize** rebuilds leading whitespace from relative nesting: the
//!   common left margin is removed, the smallest remaining indent becomes the
//!   source unit, and each line is re-indented by whole multiples of the
//!   language's canonical unit. Line count and order are kept, and lines
//!   that were deeper stay deeper.
//!
//! Neither mode touches non-whitespace characters.

use crate::config::FormattingPolicy;
use std::collections::{BTreeMap, BTreeSet};

/// Columns a tab advances when measuring indentation.
pub const TAB_WIDTH: usize = 4;

/// Leading whitespace width of `line` in columns.
pub fn leading_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { TAB_WIDTH } else { 1 })
        .sum()
}

/// Apply the policy's indentation mode to a labeled code segment.
///
/// `indent_unit` is the canonical spaces-per-level of the segment's
/// language; it is only used in normalize mode.
pub fn resolve<S: AsRef<str>>(
    lines: &[S],
    indent_unit: usize,
    policy: &FormattingPolicy,
) -> Vec<String> {
    if !policy.preserve_indentation() {
        normalize(lines, indent_unit)
    } else if policy.minimal_cleanup() {
        minimal_cleanup(lines)
    } else {
        lines.iter().map(|l| l.as_ref().to_string()).collect()
    }
}

/// Preserve mode with non-destructive cleanup.
pub fn minimal_cleanup<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut blank_run = 0usize;

    for line in lines {
        let line = line.as_ref();
        if line.trim().is_empty() {
            blank_run += 1;
            out.push(String::new());
            continue;
        }
        collapse_blank_run(&mut out, blank_run);
        blank_run = 0;
        out.push(line.trim_end().to_string());
    }
    collapse_blank_run(&mut out, blank_run);
    out
}

/// Shrink a trailing run of `run` empty lines in `out` to one when it is
/// three or longer.
fn collapse_blank_run(out: &mut Vec<String>, run: usize) {
    if run >= 3 {
        out.truncate(out.len() - (run - 1));
    }
}

/// Normalize mode: re-express indentation in multiples of `unit` spaces.
pub fn normalize<S: AsRef<str>>(lines: &[S], unit: usize) -> Vec<String> {
    let widths: Vec<Option<usize>> = lines
        .iter()
        .map(|l| {
            let l = l.as_ref();
            (!l.trim().is_empty()).then(|| leading_width(l))
        })
        .collect();

    let margin = widths.iter().flatten().copied().min().unwrap_or(0);
    let depths = depth_map(widths.iter().flatten().map(|w| w - margin));

    lines
        .iter()
        .zip(&widths)
        .map(|(line, width)| match width {
            None => String::new(),
            Some(w) => {
                let depth = depths.get(&(w - margin)).copied().unwrap_or(0);
                let content = line.as_ref().trim();
                format!("{}{}", " ".repeat(depth * unit), content)
            }
        })
        .collect()
}

/// Map each distinct relative width to a nesting depth.
///
/// Depth is the width in source units, rounded, but always at least one more
/// than the next-shallower width's depth so irregular indents never merge.
fn depth_map(widths: impl Iterator<Item = usize>) -> BTreeMap<usize, usize> {
    let distinct: BTreeSet<usize> = widths.collect();
    let source_unit = distinct.iter().copied().find(|w| *w > 0);

    let mut map = BTreeMap::new();
    let mut prev_depth: Option<usize> = None;
    for w in distinct {
        let depth = match (source_unit, prev_depth) {
            (Some(unit), Some(prev)) if w > 0 => {
                let rounded = (w as f64 / unit as f64).round() as usize;
                rounded.max(prev + 1)
            }
            (Some(unit), None) if w > 0 => (w as f64 / unit as f64).round() as usize,
            _ => 0,
        };
        map.insert(w, depth);
        prev_depth = Some(depth);
    }
    map
}
