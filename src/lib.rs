// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. search::SearchQuery)
    clippy::module_name_repetitions
)]

//! # tabless
//!
//! A pager engine for tabular text such as psql, mysql or sqlite output.
//!
//! tabless keeps the input in paged storage and works out its structure:
//! - Header, borders, column boundaries, title and footer
//! - Expanded (one field per line) record layouts
//! - Rows continued over several lines
//!
//! On top of that it sorts data rows by any column without moving stored
//! lines, searches in display order, and keeps bookmarks.
//!
//! ## Architecture
//!
//! Input is appended to a [`store::PagedLineStore`]. Once enough rows are
//! buffered, [`detect::analyze`] builds a [`detect::TableDescriptor`]. An
//! [`order::OrderIndex`] maps display positions to stored lines; sorting
//! replaces the index. Cursors and marks ([`cursor`]) are the only path for
//! per-line flag changes. A [`session::Session`] ties everything together.
//!
//! ## Modules
//!
//! - [`store`]: Paged line storage and per-line flags
//! - [`detect`]: Table structure detection
//! - [`order`]: Display order and sorting
//! - [`search`]: Pattern search
//! - [`cursor`]: Line iteration and marks
//! - [`rows`]: Pre-split row sources (CSV, TSV, matrices)
//! - [`session`]: The engine context
//! - [`watcher`]: File watching

pub mod config;
pub mod cursor;
pub mod detect;
pub mod error;
pub mod order;
pub mod perf;
pub mod rows;
pub mod search;
pub mod session;
pub mod store;
pub mod text;
pub mod watcher;

pub use error::{EngineError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{CaseMode, FooterPolicy, InputFormat};
    pub use crate::cursor::{LineIter, LineRef, Mark};
    pub use crate::detect::{DetectOptions, TableDescriptor};
    pub use crate::error::{EngineError, Result};
    pub use crate::order::{OrderIndex, SortDirection, SortRequest};
    pub use crate::rows::RowSet;
    pub use crate::search::{FoundPosition, SearchDirection, SearchQuery, SearchScope};
    pub use crate::session::{Session, SessionOptions};
}
