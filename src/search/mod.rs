//! Incremental prefix search over a sharded index.
//!
//! This module parses query text, matches and ranks entries from the shards the
//! manifest selects, and manages keystroke sessions where newer queries supersede
//! older ones.

// Module declarations
pub mod engine;
pub mod query;
pub mod result;
pub(crate) mod scoring;

// Public re-exports (used via lib.rs)
pub use engine::{DEFAULT_RESULT_LIMIT, Phase, Published, QueryEngine, SearchSession};
pub use query::Query;
pub use result::{MatchKind, RankedEntry, ResultGroup, ResultSet};
