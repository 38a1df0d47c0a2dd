//! The collection driver: one sequential pass over every configured source.
//!
//! Per source the driver fetches, parses, summarizes each item and
//! accumulates a [`SourceEntry`], then sleeps [`CollectorOptions::source_delay`]
//! before the next source so the summarization API is not hit in bursts.
//! Nothing runs concurrently.
//!
//! Failures degrade content, never cardinality: a source that cannot be
//! fetched or parsed still yields an entry (no items, an `errorReason`) and a
//! [`RunError`], and every category ends with exactly one entry per
//! configured source.

use crate::api::SummaryClient;
use crate::feed::{FeedOptions, parse_feed};
use crate::fetch::{Fetch, FetchOutcome};
use crate::models::{
    Categories, Category, CategoryResult, MarketCapBoard, ProcessedItem, RunError, RunResult,
    Source, SourceEntry,
};
use crate::scrapers::marketcap::{ScrapeRules, default_companies, scrape_top_n};
use crate::summary::Summarizer;
use crate::utils::now_rfc3339;
use futures::stream::{self, StreamExt};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{Instrument, debug, info, info_span, instrument, warn};

/// Reason attached to entries added by [`ensure_cardinality`].
pub const MISSING_RESULT: &str = "missing result";

/// Driver knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorOptions {
    /// Pause between consecutive sources.
    pub source_delay: Duration,
    pub feed: FeedOptions,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self {
            source_delay: Duration::from_millis(1000),
            feed: FeedOptions::default(),
        }
    }
}

/// Runs the fetch → parse → summarize pipeline over a catalogue.
#[derive(Debug)]
pub struct Collector<F, C> {
    fetcher: F,
    summarizer: Summarizer<C>,
    options: CollectorOptions,
}

impl<F: Fetch, C: SummaryClient> Collector<F, C> {
    pub fn new(fetcher: F, summarizer: Summarizer<C>, options: CollectorOptions) -> Self {
        Self {
            fetcher,
            summarizer,
            options,
        }
    }

    /// Collect every category in order and return the document to write.
    #[instrument(level = "info", skip_all, fields(categories = categories.len()))]
    pub async fn run(&self, categories: &[Category]) -> RunResult {
        let t0 = Instant::now();
        let total: usize = categories.iter().map(|c| c.sources.len()).sum();
        let mut visited = 0usize;
        let mut results = Vec::with_capacity(categories.len());
        let mut errors = Vec::new();
        info!(
            sources = total,
            remote = self.summarizer.has_client(),
            "Starting collection"
        );

        for category in categories {
            let mut entries = Vec::with_capacity(category.sources.len());

            for source in &category.sources {
                let span = info_span!("source", category = %category.name, source = %source.name);
                let entry = self.collect_source(source).instrument(span).await;

                if let Some(reason) = &entry.error_reason {
                    errors.push(RunError {
                        category: category.name.clone(),
                        source: source.name.clone(),
                        reason: reason.clone(),
                    });
                }
                entries.push(entry);

                visited += 1;
                if visited < total && !self.options.source_delay.is_zero() {
                    sleep(self.options.source_delay).await;
                }
            }

            let entries = ensure_cardinality(category, entries, &mut errors);
            info!(
                category = %category.name,
                sources = entries.len(),
                items = entries.iter().map(|e| e.items.len()).sum::<usize>(),
                "Category collected"
            );
            results.push(CategoryResult {
                name: category.name.clone(),
                entries,
            });
        }

        info!(
            sources = total,
            failed = errors.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Collection finished"
        );
        RunResult {
            updated_at: now_rfc3339(),
            categories: Categories(results),
            errors,
        }
    }

    fn feed_options(&self, source: &Source) -> FeedOptions {
        match &source.encoded_field {
            Some(field) => FeedOptions {
                encoded_field: field.clone(),
                ..self.options.feed.clone()
            },
            None => self.options.feed.clone(),
        }
    }

    async fn collect_source(&self, source: &Source) -> SourceEntry {
        let body = match self.fetcher.fetch(&source.url).await {
            FetchOutcome::Ok { status, body } => {
                debug!(status, bytes = body.len(), "Fetched feed");
                body
            }
            FetchOutcome::Failed { reason } => {
                warn!(url = %source.url, %reason, "Fetch failed");
                return SourceEntry::failed(source, reason.to_string());
            }
        };

        let raw_items = match parse_feed(&body, &self.feed_options(source)) {
            Ok(items) => items,
            Err(e) => {
                warn!(url = %source.url, error = %e, "Feed parse failed");
                return SourceEntry::failed(source, e.to_string());
            }
        };
        debug!(count = raw_items.len(), "Summarizing items");

        let summarizer = &self.summarizer;
        let items: Vec<ProcessedItem> = stream::iter(raw_items)
            .then(move |item| async move {
                let summary = summarizer.summarize(&item).await;
                ProcessedItem {
                    title: item.title,
                    translated_title: summary.translated_title,
                    summary: summary.summary,
                    url: item.link,
                    published_at: item.published,
                    summary_source: summary.source,
                }
            })
            .collect()
            .await;

        SourceEntry {
            source_name: source.name.clone(),
            source_url: source.url.clone(),
            items,
            error_reason: None,
        }
    }
}

/// Make `entries` line up one-to-one with `category.sources`.
///
/// Missing entries are filled with an empty [`SourceEntry`] carrying
/// [`MISSING_RESULT`] and recorded in `errors`; extras are dropped.
pub fn ensure_cardinality(
    category: &Category,
    mut entries: Vec<SourceEntry>,
    errors: &mut Vec<RunError>,
) -> Vec<SourceEntry> {
    let expected = category.sources.len();
    if entries.len() != expected {
        warn!(
            category = %category.name,
            expected,
            actual = entries.len(),
            "Source entry count mismatch; padding"
        );
    }
    entries.truncate(expected);
    for source in &category.sources[entries.len()..] {
        errors.push(RunError {
            category: category.name.clone(),
            source: source.name.clone(),
            reason: MISSING_RESULT.to_string(),
        });
        entries.push(SourceEntry::failed(source, MISSING_RESULT));
    }
    entries
}

/// Fetch and scrape the leaderboard, falling back to [`default_companies`].
#[instrument(level = "info", skip_all, fields(%url, n = n))]
pub async fn collect_marketcap<F: Fetch>(
    fetcher: &F,
    url: &str,
    n: usize,
    rules: &ScrapeRules,
) -> MarketCapBoard {
    let scraped = match fetcher.fetch(url).await {
        FetchOutcome::Ok { body, .. } => scrape_top_n(&body, n, rules).map_err(|e| e.to_string()),
        FetchOutcome::Failed { reason } => Err(reason.to_string()),
    };

    match scraped {
        Ok(companies) => {
            info!(count = companies.len(), "Scraped market-cap leaderboard");
            MarketCapBoard {
                updated_at: now_rfc3339(),
                source_url: url.to_string(),
                companies,
                used_fallback: false,
                error_reason: None,
            }
        }
        Err(reason) => {
            warn!(%reason, "Market-cap scrape failed; using default list");
            MarketCapBoard {
                updated_at: now_rfc3339(),
                source_url: url.to_string(),
                companies: default_companies(),
                used_fallback: true,
                error_reason: Some(reason),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ChatClient;
    use crate::fetch::FetchFailure;
    use crate::models::SummarySource;
    use crate::summary::SummarizerConfig;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Serves canned outcomes by URL and records the order of requests.
    #[derive(Default)]
    struct FakeFetcher {
        responses: HashMap<String, FetchOutcome>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeFetcher {
        fn with(mut self, url: &str, outcome: FetchOutcome) -> Self {
            self.responses.insert(url.to_string(), outcome);
            self
        }
    }

    impl Fetch for FakeFetcher {
        async fn fetch(&self, url: &str) -> FetchOutcome {
            self.calls.borrow_mut().push(url.to_string());
            self.responses
                .get(url)
                .cloned()
                .unwrap_or(FetchOutcome::Failed {
                    reason: FetchFailure::Network("connection refused".to_string()),
                })
        }
    }

    fn ok(body: &str) -> FetchOutcome {
        FetchOutcome::Ok {
            status: 200,
            body: body.to_string(),
        }
    }

    const FEED: &str = r#"<rss><channel>
        <item>
          <title>Rates rise</title>
          <link>https://a.example/rates</link>
          <description>The central bank raised its policy rate by a quarter point on Tuesday. Officials cited persistent inflation in services. Markets had expected it.</description>
          <pubDate>Tue, 06 May 2025 08:30:00 GMT</pubDate>
        </item>
        <item>
          <title>Short one</title>
          <link>https://a.example/short</link>
          <description>Too short.</description>
        </item>
    </channel></rss>"#;

    fn catalog() -> Vec<Category> {
        vec![
            Category {
                name: "world".to_string(),
                sources: vec![
                    Source::new("Good", "https://a.example/rss"),
                    Source::new("Down", "https://b.example/rss"),
                    Source::new("Broken", "https://c.example/rss"),
                ],
            },
            Category {
                name: "science".to_string(),
                sources: vec![Source::new("Offline", "https://d.example/rss")],
            },
        ]
    }

    fn collector(fetcher: FakeFetcher) -> Collector<FakeFetcher, ChatClient> {
        let summarizer = Summarizer::new(SummarizerConfig::default(), None);
        let options = CollectorOptions {
            source_delay: Duration::ZERO,
            feed: FeedOptions::default(),
        };
        Collector::new(fetcher, summarizer, options)
    }

    #[tokio::test]
    async fn test_run_keeps_cardinality_and_records_errors() {
        let fetcher = FakeFetcher::default()
            .with("https://a.example/rss", ok(FEED))
            .with(
                "https://b.example/rss",
                FetchOutcome::Failed {
                    reason: FetchFailure::Status(503),
                },
            )
            .with("https://c.example/rss", ok("<rss><channel><item></rss>"));
        let collector = collector(fetcher);

        let result = collector.run(&catalog()).await;

        let world = result.categories.get("world").unwrap();
        assert_eq!(world.len(), 3);
        assert_eq!(result.categories.get("science").unwrap().len(), 1);

        assert_eq!(world[0].source_name, "Good");
        assert_eq!(world[0].items.len(), 2);
        assert_eq!(world[0].error_reason, None);

        assert!(world[1].items.is_empty());
        assert_eq!(world[1].error_reason.as_deref(), Some("status 503"));

        assert!(world[2].items.is_empty());
        assert!(world[2].error_reason.as_deref().unwrap().starts_with("malformed feed"));

        let reasons: Vec<_> = result
            .errors
            .iter()
            .map(|e| (e.category.as_str(), e.source.as_str()))
            .collect();
        assert_eq!(
            reasons,
            [("world", "Down"), ("world", "Broken"), ("science", "Offline")]
        );
    }

    #[tokio::test]
    async fn test_run_is_sequential_in_catalogue_order() {
        let collector = collector(FakeFetcher::default());
        collector.run(&catalog()).await;

        assert_eq!(
            *collector.fetcher.calls.borrow(),
            [
                "https://a.example/rss",
                "https://b.example/rss",
                "https://c.example/rss",
                "https://d.example/rss",
            ]
        );
    }

    #[tokio::test]
    async fn test_items_are_summarized() {
        let fetcher = FakeFetcher::default().with("https://a.example/rss", ok(FEED));
        let collector = collector(fetcher);
        let result = collector.run(&catalog()[..1]).await;

        let items = &result.categories.get("world").unwrap()[0].items;
        assert_eq!(items[0].title, "Rates rise");
        assert_eq!(items[0].url, "https://a.example/rates");
        assert_eq!(items[0].published_at.as_deref(), Some("2025-05-06T08:30:00Z"));
        assert_eq!(items[0].summary_source, SummarySource::Local);
        assert!(items[0].summary.starts_with("The central bank raised"));

        assert_eq!(items[1].summary_source, SummarySource::Title);
        assert!(items[1].summary.starts_with("Short one. Too short."));
        for item in items {
            assert!(!item.summary.contains('\n'));
        }
    }

    #[tokio::test]
    async fn test_output_document_shape() {
        let collector = collector(FakeFetcher::default());
        let result = collector.run(&catalog()).await;

        let value = serde_json::to_value(&result).unwrap();
        assert!(value["updatedAt"].is_string());
        assert_eq!(value["categories"]["world"].as_array().unwrap().len(), 3);
        assert_eq!(
            value["categories"]["science"][0]["errorReason"],
            "network: connection refused"
        );
        assert_eq!(value["errors"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_source_encoded_field_override() {
        let feed = r#"<rss><channel><item>
            <title>Override</title>
            <link>https://e.example/a</link>
            <body>The full body sits in a custom element. It is long enough to be summarized locally without falling back to the title.</body>
        </item></channel></rss>"#;
        let fetcher = FakeFetcher::default().with("https://e.example/rss", ok(feed));
        let mut source = Source::new("Custom", "https://e.example/rss");
        source.encoded_field = Some("body".to_string());
        let categories = vec![Category {
            name: "tech".to_string(),
            sources: vec![source],
        }];

        let result = collector(fetcher).run(&categories).await;

        let item = &result.categories.get("tech").unwrap()[0].items[0];
        assert_eq!(item.summary_source, SummarySource::Local);
        assert!(item.summary.starts_with("The full body sits in a custom element."));
    }

    #[test]
    fn test_ensure_cardinality_pads_missing_entries() {
        let catalog = catalog();
        let category = &catalog[0];
        let mut errors = Vec::new();
        let entries = vec![SourceEntry::failed(&category.sources[0], "timeout")];

        let entries = ensure_cardinality(category, entries, &mut errors);

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].source_name, "Down");
        assert_eq!(entries[2].error_reason.as_deref(), Some(MISSING_RESULT));
        assert_eq!(errors.len(), 2);
    }

    fn leaderboard(rows: usize) -> String {
        let body: String = (1..=rows)
            .map(|i| format!("<tr><td>{i}</td><td><a href=\"/c{i}\">Company {i}</a></td></tr>"))
            .collect();
        format!("<table><tr><th>Rank</th><th>Name</th></tr>{body}</table>")
    }

    #[tokio::test]
    async fn test_marketcap_success() {
        let url = "https://companiesmarketcap.com/";
        let fetcher = FakeFetcher::default().with(url, ok(&leaderboard(12)));

        let board = collect_marketcap(&fetcher, url, 10, &ScrapeRules::default()).await;

        assert!(!board.used_fallback);
        assert_eq!(board.companies.len(), 10);
        assert_eq!(board.companies[0].company, "Company 1");
        assert_eq!(board.error_reason, None);
    }

    #[tokio::test]
    async fn test_marketcap_partial_scrape_uses_defaults() {
        let url = "https://companiesmarketcap.com/";
        let fetcher = FakeFetcher::default().with(url, ok(&leaderboard(7)));

        let board = collect_marketcap(&fetcher, url, 10, &ScrapeRules::default()).await;

        assert!(board.used_fallback);
        assert_eq!(board.companies, default_companies());
        assert_eq!(board.companies.len(), 10);
        assert_eq!(board.error_reason.as_deref(), Some("found 7 of 10 companies"));
    }

    #[tokio::test]
    async fn test_marketcap_fetch_failure_uses_defaults() {
        let board = collect_marketcap(
            &FakeFetcher::default(),
            "https://companiesmarketcap.com/",
            10,
            &ScrapeRules::default(),
        )
        .await;

        assert!(board.used_fallback);
        assert_eq!(board.companies.len(), 10);
        assert_eq!(
            board.error_reason.as_deref(),
            Some("network: connection refused")
        );
    }
}
