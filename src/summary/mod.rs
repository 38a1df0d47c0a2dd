//! Item summarization with a remote tier and a local fallback.
//!
//! [`Summarizer::summarize`] never fails. The decision policy is:
//!
//! 1. Pick the best text: content, then snippet, then description, then title.
//! 2. Text shorter than [`SummarizerConfig::min_input_chars`] is not worth a
//!    remote call; the summary is seeded from the title locally.
//! 3. Without a configured client (no credential), use the local fallback.
//! 4. Otherwise ask the client; on any error fall back locally.
//!
//! Whatever tier produced it, the summary is one paragraph: line breaks and
//! list markers are collapsed and it ends with sentence punctuation.

pub mod local;

use crate::api::{SummaryClient, SummaryRequest};
use crate::models::{RawItem, SummaryResult, SummarySource};
use crate::utils::{collapse_whitespace, strip_markup, truncate_chars, truncate_for_log};
use local::{SentenceBand, ensure_terminal, local_summary, title_seeded_summary};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument, warn};

/// Used as the translated title when an item has no title at all.
pub const UNTITLED: &str = "Untitled";

static LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:[-*•·]|\d{1,2}[.)])\s+").unwrap());

/// Summarizer knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummarizerConfig {
    /// Inputs shorter than this (in characters) skip the remote call.
    pub min_input_chars: usize,
    /// Characters of cleaned text considered by the local fallback.
    pub char_budget: usize,
    /// Characters of cleaned text sent to the remote model.
    pub max_input_chars: usize,
    /// Sentence count requested from the remote model.
    pub remote_band: SentenceBand,
    /// Sentence count produced by the local fallback.
    pub fallback_band: SentenceBand,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            min_input_chars: 100,
            char_budget: 800,
            max_input_chars: 3000,
            remote_band: SentenceBand::new(8, 12),
            fallback_band: SentenceBand::new(3, 8),
        }
    }
}

/// Produces a [`SummaryResult`] for every item, with or without a remote client.
#[derive(Debug)]
pub struct Summarizer<C> {
    config: SummarizerConfig,
    client: Option<C>,
}

impl<C: SummaryClient> Summarizer<C> {
    /// `client` is `None` when no credential is configured.
    pub fn new(config: SummarizerConfig, client: Option<C>) -> Self {
        Self { config, client }
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    #[instrument(level = "debug", skip_all, fields(link = %item.link))]
    pub async fn summarize(&self, item: &RawItem) -> SummaryResult {
        let title = strip_markup(&item.title);
        let input = item.best_text();

        let long_enough = input
            .as_deref()
            .is_some_and(|t| t.chars().count() >= self.config.min_input_chars);
        let Some(input) = input.as_deref().filter(|_| long_enough) else {
            debug!("Input too short for a remote call; seeding from title");
            let summary = title_seeded_summary(
                &title,
                input.as_deref(),
                self.config.fallback_band,
                self.config.char_budget,
            );
            return finish(&title, None, summary, SummarySource::Title);
        };

        let Some(client) = &self.client else {
            return self.fallback(&title, input);
        };

        let request = SummaryRequest {
            title: &title,
            text: truncate_chars(input, self.config.max_input_chars),
            band: self.config.remote_band,
        };
        match client.summarize(&request).await {
            Ok(remote) => {
                let summary = LIST_MARKER.replace_all(&remote.summary, "");
                finish(
                    &title,
                    Some(&remote.translated_title),
                    summary.into_owned(),
                    SummarySource::Remote,
                )
            }
            Err(e) => {
                warn!(
                    error = %e,
                    title = %truncate_for_log(&title, 80),
                    "Remote summary failed; using local fallback"
                );
                self.fallback(&title, input)
            }
        }
    }

    fn fallback(&self, title: &str, input: &str) -> SummaryResult {
        let summary = local_summary(input, self.config.fallback_band, self.config.char_budget);
        finish(title, None, summary, SummarySource::Local)
    }
}

/// Normalize a summary to one terminated paragraph and pick a non-empty title.
fn finish(
    title: &str,
    translated: Option<&str>,
    summary: String,
    source: SummarySource,
) -> SummaryResult {
    let translated_title = translated
        .map(collapse_whitespace)
        .filter(|t| !t.is_empty())
        .or_else(|| Some(title.to_string()).filter(|t| !t.is_empty()))
        .unwrap_or_else(|| UNTITLED.to_string());

    let summary = collapse_whitespace(&summary);
    let summary = if summary.is_empty() {
        local::DEFAULT_SUMMARY.to_string()
    } else {
        ensure_terminal(&summary)
    };

    SummaryResult {
        translated_title,
        summary,
        source,
    }
}
