//! Page scrapers for sources that do not publish a feed.
//!
//! # Supported Sources
//!
//! | Source | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | Market-cap leaderboard | [`marketcap`] | HTML table scraping | Falls back to a static top 10 |

pub mod marketcap;
