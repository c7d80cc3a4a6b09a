//! Keyword matching.
//!
//! Matching is plain substring search on case-folded text. A keyword that
//! contains a space is treated as a *set of required words*: every token must
//! occur somewhere in the text, in any order and not necessarily adjacent.
//! `"bar baz"` therefore matches `"baz then bar"`. This is a loose rule, not a
//! phrase match.

/// An ordered keyword list with its case-folded copy cached alongside.
///
/// The original spelling is kept for reporting (startup summary, logs); the
/// folded copy is what the matcher compares against.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeywordSet {
    original: Vec<String>,
    folded: Vec<String>,
}

impl KeywordSet {
    /// Build a set, folding once. Duplicates (after folding) keep their first occurrence.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut original = Vec::new();
        let mut folded: Vec<String> = Vec::new();
        for kw in keywords {
            let kw = kw.into();
            let f = fold(&kw);
            if folded.contains(&f) {
                continue;
            }
            original.push(kw);
            folded.push(f);
        }
        Self { original, folded }
    }

    pub fn original(&self) -> &[String] {
        &self.original
    }

    pub fn folded(&self) -> &[String] {
        &self.folded
    }

    pub fn len(&self) -> usize {
        self.original.len()
    }

    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }

    /// Matching keywords in their original spelling, in set order.
    pub fn matches(&self, text: &str) -> Vec<&str> {
        matching_positions(text, &self.folded)
            .into_iter()
            .map(|i| self.original[i].as_str())
            .collect()
    }
}

/// Match `text` against pre-folded keywords.
///
/// Returns the matching (folded) keywords in input order without duplicates.
/// Empty text matches nothing.
pub fn match_keywords(text: &str, folded_keywords: &[String]) -> Vec<String> {
    matching_positions(text, folded_keywords)
        .into_iter()
        .map(|i| folded_keywords[i].clone())
        .collect()
}

/// Positions of the first occurrence of every keyword that hits `text`.
fn matching_positions(text: &str, folded_keywords: &[String]) -> Vec<usize> {
    if text.is_empty() {
        return Vec::new();
    }

    let haystack = fold(text);
    let mut out: Vec<usize> = Vec::new();
    for (i, kw) in folded_keywords.iter().enumerate() {
        if out.iter().any(|&j| folded_keywords[j] == *kw) {
            continue;
        }
        if keyword_hits(&haystack, kw) {
            out.push(i);
        }
    }
    out
}

pub fn fold(s: &str) -> String {
    s.to_lowercase()
}

fn keyword_hits(folded_text: &str, folded_kw: &str) -> bool {
    if folded_kw.contains(' ') {
        return folded_kw
            .split_whitespace()
            .all(|word| folded_text.contains(word));
    }
    folded_text.contains(folded_kw)
}
