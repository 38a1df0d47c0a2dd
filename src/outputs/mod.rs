//! Output generation.
//!
//! # Submodules
//!
//! - [`json`]: Writes the news and market-cap documents read by the static site
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── news.json
//! ├── news.json.prev        # only with --backup
//! ├── marketcap.json
//! └── marketcap.json.prev
//! ```

pub mod json;
