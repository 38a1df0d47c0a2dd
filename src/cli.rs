//! Command-line interface definitions for News Digest.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Credentials and API settings can also be provided via environment variables.

use crate::config::DEFAULT_MARKETCAP_URL;
use crate::fetch::{Backoff, RetryPolicy};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the News Digest application.
///
/// # Examples
///
/// ```sh
/// # Summarize the built-in feeds without a language model
/// news_digest news -o ./site/data/news.json
///
/// # With an API key and a custom catalogue
/// OPENAI_API_KEY=sk-... news_digest news -o ./data/news.json -s sources.yaml
///
/// # Refresh the market-cap leaderboard (keeps marketcap.json.prev)
/// news_digest marketcap -o ./data/marketcap.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch, summarize and write the configured news feeds
    News(NewsArgs),
    /// Scrape the market-cap leaderboard
    Marketcap(MarketCapArgs),
}

/// HTTP settings shared by both jobs.
#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// Attempts per URL before giving up
    #[arg(long, default_value_t = 3)]
    pub max_attempts: u32,

    /// Timeout for each attempt, in milliseconds
    #[arg(long, default_value_t = 10_000)]
    pub timeout_ms: u64,

    /// Wait with exponential backoff and jitter between attempts
    #[arg(long)]
    pub backoff: bool,

    /// User-Agent header sent with every request
    #[arg(long, default_value = concat!("news_digest/", env!("CARGO_PKG_VERSION")))]
    pub user_agent: String,
}

impl FetchArgs {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            timeout: Duration::from_millis(self.timeout_ms),
            backoff: self.backoff.then(Backoff::default),
        }
    }
}

#[derive(Args, Debug)]
pub struct NewsArgs {
    /// Path of the JSON file to write
    #[arg(short, long, default_value = "data/news.json")]
    pub output: PathBuf,

    /// Optional YAML source catalogue (built-in feeds when omitted)
    #[arg(short, long)]
    pub sources: Option<PathBuf>,

    /// Copy the previous output to `<output>.prev` before overwriting
    #[arg(long)]
    pub backup: bool,

    /// API key for the chat-completion endpoint; summaries are local without one
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub api_base: String,

    /// Model name
    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
    pub model: String,

    /// Language for translated titles and summaries
    #[arg(long, default_value = "Korean")]
    pub language: String,

    /// File holding a custom system prompt ({language}, {min_sentences}, {max_sentences})
    #[arg(long)]
    pub prompt_file: Option<PathBuf>,

    /// Items kept per feed
    #[arg(long, default_value_t = 5)]
    pub items_per_source: usize,

    /// Feed element holding full article content (a source may override it)
    #[arg(long, default_value = "content:encoded")]
    pub encoded_field: String,

    /// Pause between sources, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub delay_ms: u64,

    /// Fewest sentences requested from the model
    #[arg(long, default_value_t = 8)]
    pub min_sentences: usize,

    /// Most sentences requested from the model
    #[arg(long, default_value_t = 12)]
    pub max_sentences: usize,

    #[command(flatten)]
    pub fetch: FetchArgs,
}

impl NewsArgs {
    /// The API key, treating an empty value as absent.
    pub fn credential(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }
}

#[derive(Args, Debug)]
pub struct MarketCapArgs {
    /// Path of the JSON file to write
    #[arg(short, long, default_value = "data/marketcap.json")]
    pub output: PathBuf,

    /// Leaderboard page to scrape
    #[arg(long, default_value = DEFAULT_MARKETCAP_URL)]
    pub url: String,

    /// Number of companies to keep
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// CSS selector for the company name inside a row's link
    #[arg(long, default_value = ".company-name")]
    pub name_selector: String,

    /// Zero-based table cell holding the company name when a row has no link
    #[arg(long, default_value_t = 1)]
    pub name_cell: usize,

    /// Do not keep `<output>.prev`
    #[arg(long)]
    pub no_backup: bool,

    #[command(flatten)]
    pub fetch: FetchArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_news_defaults() {
        let cli = Cli::parse_from(["news_digest", "news", "--api-key", ""]);
        let Command::News(args) = cli.command else {
            panic!("expected news subcommand");
        };

        assert_eq!(args.output, PathBuf::from("data/news.json"));
        assert_eq!(args.items_per_source, 5);
        assert_eq!(args.delay_ms, 1000);
        assert_eq!(args.encoded_field, "content:encoded");
        assert_eq!(args.credential(), None);
        assert!(!args.backup);

        let policy = args.fetch.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.timeout, Duration::from_secs(10));
        assert_eq!(policy.backoff, None);
    }

    #[test]
    fn test_news_flags() {
        let cli = Cli::parse_from([
            "news_digest",
            "news",
            "-o",
            "/tmp/out.json",
            "-s",
            "sources.yaml",
            "--api-key",
            "sk-test",
            "--backoff",
            "--max-attempts",
            "5",
            "--language",
            "Japanese",
            "--encoded-field",
            "body",
        ]);
        let Command::News(args) = cli.command else {
            panic!("expected news subcommand");
        };

        assert_eq!(args.output, PathBuf::from("/tmp/out.json"));
        assert_eq!(args.sources, Some(PathBuf::from("sources.yaml")));
        assert_eq!(args.credential(), Some("sk-test"));
        assert_eq!(args.language, "Japanese");
        assert_eq!(args.encoded_field, "body");
        let policy = args.fetch.retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.backoff, Some(Backoff::default()));
    }

    #[test]
    fn test_marketcap_defaults() {
        let cli = Cli::parse_from(["news_digest", "marketcap"]);
        let Command::Marketcap(args) = cli.command else {
            panic!("expected marketcap subcommand");
        };

        assert_eq!(args.output, PathBuf::from("data/marketcap.json"));
        assert_eq!(args.url, DEFAULT_MARKETCAP_URL);
        assert_eq!(args.top, 10);
        assert_eq!(args.name_selector, ".company-name");
        assert!(!args.no_backup);
    }
}
