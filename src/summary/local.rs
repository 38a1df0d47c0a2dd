//! Deterministic, network-free summaries.
//!
//! The fallback tier of the summarizer: strip markup, clip to a character
//! budget, split into sentences, and re-join between `band.min` and
//! `band.max` sentences. Short inputs are padded by repeating the last
//! sentence; no filler text is ever inserted.

use crate::utils::{strip_markup, truncate_chars};
use once_cell::sync::Lazy;
use regex::Regex;

/// Returned when there is no text at all to summarize.
pub const DEFAULT_SUMMARY: &str = "No summary is available for this article.";

static SENTENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^.!?]+[.!?]*").unwrap());

/// Inclusive bounds on the number of sentences in a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentenceBand {
    pub min: usize,
    pub max: usize,
}

impl SentenceBand {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    /// `max` is at least one and `min` never exceeds `max`.
    fn normalized(self) -> (usize, usize) {
        let max = self.max.max(1);
        (self.min.min(max), max)
    }
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Append a period unless `s` already ends with `.`, `!` or `?`.
pub fn ensure_terminal(s: &str) -> String {
    let s = s.trim_end();
    if s.ends_with(is_terminal) {
        s.to_string()
    } else {
        format!("{s}.")
    }
}

/// Split text on `.`, `!` and `?`, keeping the terminator with its sentence.
///
/// Fragments without any alphanumeric character are dropped, and a fragment
/// with no terminator (the tail of the text) gets a period.
pub fn split_sentences(text: &str) -> Vec<String> {
    SENTENCE
        .find_iter(text)
        .map(|m| m.as_str().trim())
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .map(ensure_terminal)
        .collect()
}

/// Reduce `text` to one paragraph of `band.min..=band.max` sentences.
///
/// # Arguments
///
/// * `text` - Article text, markup allowed
/// * `band` - Sentence bounds; text with too few sentences is padded by
///   repeating the last sentence
/// * `char_budget` - Characters of cleaned text considered
///
/// # Returns
///
/// Sentences joined by single spaces, ending with `.`, `!` or `?`, or
/// [`DEFAULT_SUMMARY`] when no sentence survives.
pub fn local_summary(text: &str, band: SentenceBand, char_budget: usize) -> String {
    let clean = strip_markup(text);
    let mut sentences = split_sentences(truncate_chars(&clean, char_budget));
    let (min, max) = band.normalized();

    sentences.truncate(max);
    let Some(last) = sentences.last().cloned() else {
        return DEFAULT_SUMMARY.to_string();
    };
    while sentences.len() < min {
        sentences.push(last.clone());
    }
    sentences.join(" ")
}

/// Summary for items whose text is too short to send anywhere.
///
/// Seeds the local summarizer with the title followed by whatever short text
/// the item has. The floor is the title itself as a sentence, then
/// [`DEFAULT_SUMMARY`] when the title is empty too.
pub fn title_seeded_summary(
    title: &str,
    text: Option<&str>,
    band: SentenceBand,
    char_budget: usize,
) -> String {
    let title = strip_markup(title);
    let body = text.map(strip_markup).unwrap_or_default();

    let seed = if body.is_empty() || body == title {
        title.clone()
    } else if title.is_empty() {
        body
    } else {
        format!("{}. {}", title.trim_end_matches(is_terminal), body)
    };

    let summary = local_summary(&seed, band, char_budget);
    if summary == DEFAULT_SUMMARY && !title.is_empty() {
        return ensure_terminal(&title);
    }
    summary
}
