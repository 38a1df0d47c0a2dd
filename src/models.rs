//! Data models for feed items and the JSON documents written for the site.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Source`] and [`Category`]: the configured feed catalogue
//! - [`RawItem`]: one parsed feed entry before summarization
//! - [`SummaryResult`]: translated title and one-paragraph summary
//! - [`RunResult`]: the news document, one [`SourceEntry`] per configured source
//! - [`MarketCapBoard`]: the market-cap leaderboard document
//!
//! Output structs serialize with camelCase field names because the static site
//! reads these files directly; renaming a field breaks the consumer.

use crate::utils::strip_markup;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// A named, URL-addressed feed or page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Source {
    /// Display name shown on the source card.
    pub name: String,
    /// Feed (or page) URL.
    pub url: String,
    /// Element holding full content for this feed, when it differs from the
    /// run-wide setting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoded_field: Option<String>,
}

impl Source {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            encoded_field: None,
        }
    }
}

/// A grouping label (world, science, economy, ...) with its ordered sources.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Category {
    pub name: String,
    pub sources: Vec<Source>,
}

/// One entry extracted from an RSS or Atom document.
///
/// Consumed once by the summarizer and then discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub title: String,
    /// `<description>` (RSS) or `<summary>` (Atom).
    pub description: String,
    /// Full encoded content, usually HTML.
    pub content: String,
    /// `content` with markup stripped.
    pub content_snippet: String,
    pub link: String,
    /// Publish date, RFC 3339 when it could be normalized.
    pub published: Option<String>,
}

impl RawItem {
    /// The best text available for summarization: content, then snippet,
    /// then description, then title.
    ///
    /// Fields are compared after markup is stripped, so content that is only
    /// an `<img>` or an empty `<p>` does not hide a real description.
    pub fn best_text(&self) -> Option<String> {
        [
            &self.content,
            &self.content_snippet,
            &self.description,
            &self.title,
        ]
        .into_iter()
        .map(|s| strip_markup(s))
        .find(|s| !s.is_empty())
    }
}

/// Which tier of the summarizer produced a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarySource {
    /// The remote language model.
    Remote,
    /// The local sentence-extraction fallback.
    Local,
    /// Input was too short; summary seeded from the title.
    Title,
}

/// A translated title and a single-paragraph summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryResult {
    pub translated_title: String,
    pub summary: String,
    pub source: SummarySource,
}

/// A summarized feed item as written to the output file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedItem {
    pub title: String,
    pub translated_title: String,
    pub summary: String,
    pub url: String,
    pub published_at: Option<String>,
    pub summary_source: SummarySource,
}

/// Result for one configured source.
///
/// Always present in the output, even when the fetch or parse failed, so the
/// site can render a fixed number of source cards.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceEntry {
    pub source_name: String,
    pub source_url: String,
    pub items: Vec<ProcessedItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

impl SourceEntry {
    /// An entry with no items and an attached failure reason.
    pub fn failed(source: &Source, reason: impl Into<String>) -> Self {
        Self {
            source_name: source.name.clone(),
            source_url: source.url.clone(),
            items: Vec::new(),
            error_reason: Some(reason.into()),
        }
    }
}

/// A failure recorded during a run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RunError {
    pub category: String,
    pub source: String,
    pub reason: String,
}

/// Entries collected for one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryResult {
    pub name: String,
    pub entries: Vec<SourceEntry>,
}

/// Categories in configuration order, serialized as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Categories(pub Vec<CategoryResult>);

#[cfg(test)]
impl Categories {
    pub fn get(&self, name: &str) -> Option<&[SourceEntry]> {
        self.0
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.entries.as_slice())
    }
}

impl Serialize for Categories {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for category in &self.0 {
            map.serialize_entry(&category.name, &category.entries)?;
        }
        map.end()
    }
}

/// The news document written at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    /// RFC 3339 timestamp of when the run finished collecting.
    pub updated_at: String,
    pub categories: Categories,
    pub errors: Vec<RunError>,
}

/// One row of the market-cap leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RankedCompany {
    pub rank: usize,
    pub company: String,
}

/// The market-cap document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketCapBoard {
    pub updated_at: String,
    pub source_url: String,
    pub companies: Vec<RankedCompany>,
    /// True when the scrape failed and the static default list was written.
    pub used_fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}
