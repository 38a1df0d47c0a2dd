//! Market-cap leaderboard scraper.
//!
//! Walks the table rows of a leaderboard page (for example
//! [companiesmarketcap.com](https://companiesmarketcap.com)) and keeps the
//! first `n` rows that look like company names. The markup is not under our
//! control, so extraction is heuristic: index symbols, numeric cells and
//! header labels are rejected, and anything short of `n` rows is a failure
//! so the caller can fall back to [`default_companies`].

use crate::models::RankedCompany;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, instrument, warn};

static ROW_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
static CELL_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("td, th").unwrap());
static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());

/// `^GSPC`, `.DJI`, `^IXIC`: index tickers rather than companies.
static INDEX_SYMBOL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\^.][A-Z0-9.]+$").unwrap());
/// `$3.21 T`, `1,234`, `-0.5%`, `₩ 420 B`.
static NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-+]?\s*[$€£¥₩]?\s*[-+]?[\d.,]+\s*[%TBMK]?$").unwrap());

const HEADER_LABELS: &[&str] = &[
    "#",
    "rank",
    "name",
    "company",
    "companies",
    "price",
    "market cap",
    "marketcap",
    "country",
    "symbol",
    "today",
    "price (30 days)",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScrapeError {
    #[error("found {found} of {required} companies")]
    Insufficient { found: usize, required: usize },
}

/// Where to look for a company name in a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRules {
    /// CSS selector for the name element inside the row's link. Leaderboard
    /// links usually wrap the name and the ticker in separate children.
    pub name_selector: String,
    /// Zero-based cell index holding the company name when a row has no link.
    pub name_cell: usize,
}

impl Default for ScrapeRules {
    fn default() -> Self {
        Self {
            name_selector: ".company-name".to_string(),
            name_cell: 1,
        }
    }
}

/// True when `name` looks like a company rather than a symbol, number or header.
pub fn is_company_name(name: &str) -> bool {
    let name = name.trim();
    if name.is_empty() || !name.chars().any(char::is_alphabetic) {
        return false;
    }
    if INDEX_SYMBOL.is_match(name) || NUMERIC.is_match(name) {
        return false;
    }
    let lower = name.to_lowercase();
    !HEADER_LABELS.contains(&lower.as_str())
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().flat_map(str::split_whitespace).join(" ")
}

fn link_text(link: ElementRef<'_>, name_selector: Option<&Selector>) -> String {
    name_selector
        .and_then(|sel| link.select(sel).next())
        .map(element_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| element_text(link))
}

fn row_company(
    row: ElementRef<'_>,
    name_selector: Option<&Selector>,
    rules: &ScrapeRules,
) -> Option<String> {
    let linked = row
        .select(&LINK_SELECTOR)
        .next()
        .map(|link| link_text(link, name_selector))
        .filter(|t| !t.is_empty());
    let name = linked.or_else(|| row.select(&CELL_SELECTOR).nth(rules.name_cell).map(element_text))?;
    is_company_name(&name).then_some(name)
}

/// Extract the top `n` companies from a leaderboard page.
///
/// # Errors
///
/// [`ScrapeError::Insufficient`] when fewer than `n` rows pass the filters;
/// partial results are never returned.
#[instrument(level = "info", skip_all, fields(n = n))]
pub fn scrape_top_n(
    html: &str,
    n: usize,
    rules: &ScrapeRules,
) -> Result<Vec<RankedCompany>, ScrapeError> {
    let name_selector = match Selector::parse(&rules.name_selector) {
        Ok(sel) => Some(sel),
        Err(e) => {
            warn!(selector = %rules.name_selector, error = %e, "Invalid name selector; using link text");
            None
        }
    };
    let document = Html::parse_document(html);
    let mut companies = Vec::with_capacity(n);

    for row in document.select(&ROW_SELECTOR) {
        if companies.len() >= n {
            break;
        }
        match row_company(row, name_selector.as_ref(), rules) {
            Some(company) => companies.push(RankedCompany {
                rank: companies.len() + 1,
                company,
            }),
            None => debug!("Skipped non-company row"),
        }
    }

    if companies.len() < n {
        return Err(ScrapeError::Insufficient {
            found: companies.len(),
            required: n,
        });
    }
    Ok(companies)
}

/// Static leaderboard written when the scrape fails.
pub fn default_companies() -> Vec<RankedCompany> {
    [
        "NVIDIA",
        "Microsoft",
        "Apple",
        "Alphabet (Google)",
        "Amazon",
        "Meta Platforms (Facebook)",
        "Broadcom",
        "Saudi Aramco",
        "TSMC",
        "Tesla",
    ]
    .into_iter()
    .enumerate()
    .map(|(i, company)| RankedCompany {
        rank: i + 1,
        company: company.to_string(),
    })
    .collect()
}
