//! Source catalogue: which feeds to read, grouped by category.
//!
//! The catalogue is an optional YAML file; without one the built-in
//! [`Catalog::default`] is used. Category order in the file is the order of
//! the output document.
//!
//! ```yaml
//! categories:
//!   - name: world
//!     sources:
//!       - name: BBC World
//!         url: https://feeds.bbci.co.uk/news/world/rss.xml
//!       - name: Custom
//!         url: https://example.com/feed.xml
//!         encoded_field: body   # optional, overrides --encoded-field
//! ```

use crate::models::{Category, Source};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, instrument};
use url::Url;

/// Default market-cap leaderboard page.
pub const DEFAULT_MARKETCAP_URL: &str = "https://companiesmarketcap.com/";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {}", .path.display(), .source)]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid catalogue yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("catalogue has no categories")]
    NoCategories,
    #[error("category name must not be empty")]
    EmptyCategoryName,
    #[error("duplicate category {0:?}")]
    DuplicateCategory(String),
    #[error("source {source_name:?} in {category:?} has invalid url {url:?}: {reason}")]
    InvalidUrl {
        category: String,
        source_name: String,
        url: String,
        reason: String,
    },
}

/// Ordered categories of feed sources.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Catalog {
    pub categories: Vec<Category>,
}

impl Catalog {
    /// Parse and validate a YAML catalogue.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let catalog: Catalog = serde_yaml::from_str(yaml)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Read the catalogue at `path`, or the built-in one when `path` is `None`.
    #[instrument(level = "info", skip_all)]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            info!("Using built-in source catalogue");
            return Ok(Self::default());
        };
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_yaml(&yaml)?;
        info!(
            path = %path.display(),
            categories = catalog.categories.len(),
            sources = catalog.source_count(),
            "Loaded source catalogue"
        );
        Ok(catalog)
    }

    /// Reject empty or duplicate category names and non-http(s) URLs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.categories.is_empty() {
            return Err(ConfigError::NoCategories);
        }
        let mut seen = HashSet::new();
        for category in &self.categories {
            if category.name.trim().is_empty() {
                return Err(ConfigError::EmptyCategoryName);
            }
            if !seen.insert(category.name.as_str()) {
                return Err(ConfigError::DuplicateCategory(category.name.clone()));
            }
            for source in &category.sources {
                check_url(&source.url).map_err(|reason| ConfigError::InvalidUrl {
                    category: category.name.clone(),
                    source_name: source.name.clone(),
                    url: source.url.clone(),
                    reason,
                })?;
            }
        }
        Ok(())
    }

    pub fn source_count(&self) -> usize {
        self.categories.iter().map(|c| c.sources.len()).sum()
    }
}

fn check_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("unsupported scheme {other}")),
    }
}

fn category(name: &str, sources: &[(&str, &str)]) -> Category {
    Category {
        name: name.to_string(),
        sources: sources
            .iter()
            .map(|(name, url)| Source::new(*name, *url))
            .collect(),
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            categories: vec![
                category(
                    "world",
                    &[
                        ("BBC World", "https://feeds.bbci.co.uk/news/world/rss.xml"),
                        ("NYT World", "https://rss.nytimes.com/services/xml/rss/nyt/World.xml"),
                        ("Al Jazeera", "https://www.aljazeera.com/xml/rss/all.xml"),
                        ("The Guardian World", "https://www.theguardian.com/world/rss"),
                    ],
                ),
                category(
                    "science",
                    &[
                        ("ScienceDaily", "https://www.sciencedaily.com/rss/all.xml"),
                        ("Nature", "https://www.nature.com/nature.rss"),
                        ("NASA", "https://www.nasa.gov/news-release/feed/"),
                        (
                            "BBC Science",
                            "https://feeds.bbci.co.uk/news/science_and_environment/rss.xml",
                        ),
                    ],
                ),
                category(
                    "economy",
                    &[
                        ("BBC Business", "https://feeds.bbci.co.uk/news/business/rss.xml"),
                        (
                            "NYT Business",
                            "https://rss.nytimes.com/services/xml/rss/nyt/Business.xml",
                        ),
                        ("CNBC", "https://www.cnbc.com/id/100003114/device/rss/rss.html"),
                        ("The Guardian Business", "https://www.theguardian.com/uk/business/rss"),
                    ],
                ),
            ],
        }
    }
}
