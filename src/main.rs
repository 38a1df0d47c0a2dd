//! # News Digest
//!
//! A scheduled, one-shot pipeline that reads RSS/Atom feeds and a market-cap
//! leaderboard, summarizes feed items (optionally translated by an
//! OpenAI-compatible language model), and writes static JSON files for a site
//! generator.
//!
//! ## Usage
//!
//! ```sh
//! news_digest news -o ./data/news.json
//! news_digest marketcap -o ./data/marketcap.json
//! ```
//!
//! ## Architecture
//!
//! The `news` job is a sequential pipeline:
//! 1. **Fetching**: GET each feed with a per-attempt timeout and bounded retries
//! 2. **Parsing**: Extract up to N items per feed
//! 3. **Summarizing**: Remote model, then local sentence extraction as fallback
//! 4. **Output**: Write one JSON document with an entry for every source
//!
//! The `marketcap` job scrapes the leaderboard, substitutes a static top 10
//! when the scrape is incomplete, and keeps the previous file as `.prev`.
//!
//! Only a failure to write the output ends the process with a non-zero status.

use clap::Parser;
use std::error::Error;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod collect;
mod config;
mod feed;
mod fetch;
mod models;
mod outputs;
mod scrapers;
mod summary;
mod utils;

use api::{ChatClient, ChatClientConfig};
use cli::{Cli, Command, MarketCapArgs, NewsArgs};
use collect::{Collector, CollectorOptions, collect_marketcap};
use config::Catalog;
use feed::FeedOptions;
use fetch::HttpFetcher;
use outputs::json;
use scrapers::marketcap::ScrapeRules;
use summary::local::SentenceBand;
use summary::{Summarizer, SummarizerConfig};
use utils::ensure_writable_parent;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = Instant::now();
    info!("news_digest starting up");

    let args = Cli::parse();
    match args.command {
        Command::News(args) => run_news(args).await?,
        Command::Marketcap(args) => run_marketcap(args).await?,
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

#[instrument(level = "info", skip_all, fields(output = %args.output.display()))]
async fn run_news(args: NewsArgs) -> Result<(), Box<dyn Error>> {
    // Fail before any network work if the result could not be saved anyway.
    ensure_writable_parent(&args.output).await?;

    let catalog = Catalog::load(args.sources.as_deref())?;
    let fetcher = HttpFetcher::new(&args.fetch.user_agent, args.fetch.retry_policy())?;

    let summarizer_config = SummarizerConfig {
        remote_band: SentenceBand::new(args.min_sentences, args.max_sentences),
        ..SummarizerConfig::default()
    };
    let client = match args.credential() {
        Some(key) => {
            let mut config = ChatClientConfig::new(key);
            config.base_url = args.api_base.clone();
            config.model = args.model.clone();
            config.language = args.language.clone();
            if let Some(path) = &args.prompt_file {
                config.prompt_template = tokio::fs::read_to_string(path).await?;
            }
            info!(model = %config.model, base_url = %config.base_url, "Remote summaries enabled");
            Some(ChatClient::new(config)?)
        }
        None => {
            warn!("No API key configured; all summaries will be produced locally");
            None
        }
    };
    let summarizer = Summarizer::new(summarizer_config, client);

    let options = CollectorOptions {
        source_delay: Duration::from_millis(args.delay_ms),
        feed: FeedOptions {
            max_items: args.items_per_source,
            encoded_field: args.encoded_field.clone(),
        },
    };
    let collector = Collector::new(fetcher, summarizer, options);
    let result = collector.run(&catalog.categories).await;

    json::write_json(&args.output, &result, args.backup).await?;
    info!(
        sources = catalog.source_count(),
        errors = result.errors.len(),
        "News digest written"
    );
    Ok(())
}

#[instrument(level = "info", skip_all, fields(output = %args.output.display()))]
async fn run_marketcap(args: MarketCapArgs) -> Result<(), Box<dyn Error>> {
    ensure_writable_parent(&args.output).await?;

    let fetcher = HttpFetcher::new(&args.fetch.user_agent, args.fetch.retry_policy())?;
    let rules = ScrapeRules {
        name_selector: args.name_selector.clone(),
        name_cell: args.name_cell,
    };
    let board = collect_marketcap(&fetcher, &args.url, args.top, &rules).await;

    json::write_json(&args.output, &board, !args.no_backup).await?;
    info!(
        companies = board.companies.len(),
        used_fallback = board.used_fallback,
        "Market-cap leaderboard written"
    );
    Ok(())
}
