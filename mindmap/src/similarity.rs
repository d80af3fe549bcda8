//! Lexical similarity measures for titles and tag sets.
//!
//! These are deliberately simple set measures; the thresholds they are
//! compared against live in the configuration.

use std::collections::BTreeSet;

/// Normalize a title or tag segment for comparison.
///
/// Lowercases, and collapses every run of non-alphanumeric characters into
/// a single `-`, trimming leading and trailing separators.
/// `"Quantum AI"` and `"quantum-ai"` both normalize to `"quantum-ai"`.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_sep = false;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('-');
            }
            pending_sep = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Words of a title, normalized.
pub fn title_words(title: &str) -> BTreeSet<String> {
    normalize(title)
        .split('-')
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Overlap between two titles: shared words over the larger word count.
///
/// Returns a value between 0.0 and 1.0. Identical titles score 1.0, and a
/// short title fully contained in a much longer one scores low.
pub fn title_overlap(a: &str, b: &str) -> f32 {
    let words_a = title_words(a);
    let words_b = title_words(b);
    let larger = words_a.len().max(words_b.len());
    if larger == 0 {
        return 0.0;
    }
    let shared = words_a.intersection(&words_b).count();
    shared as f32 / larger as f32
}

/// Jaccard similarity of two tag sets, compared case-insensitively.
///
/// Returns 0.0 when either set is empty.
pub fn tag_overlap<'a>(
    a: impl IntoIterator<Item = &'a String>,
    b: impl IntoIterator<Item = &'a String>,
) -> f32 {
    let a: BTreeSet<String> = a.into_iter().map(|t| t.to_lowercase()).collect();
    let b: BTreeSet<String> = b.into_iter().map(|t| t.to_lowercase()).collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(&b).count();
    let union = a.union(&b).count();
    shared as f32 / union as f32
}

/// Whether two tag sets share at least one tag, compared case-insensitively.
pub fn shares_tag<'a>(
    a: impl IntoIterator<Item = &'a String>,
    b: impl IntoIterator<Item = &'a String>,
) -> bool {
    let a: BTreeSet<String> = a.into_iter().map(|t| t.to_lowercase()).collect();
    b.into_iter().any(|t| a.contains(&t.to_lowercase()))
}
