//! Error taxonomy.
//!
//! Build-time errors halt index generation. Runtime errors from the shard store are
//! recovered by the query engine whenever another shard still covers the query.

use crate::index::key::KeyProblem;
use std::path::PathBuf;

/// A specialized Result type for the binary and other edges that mix error sources.
///
/// This is an alias for `anyhow::Result` with context added via `.context()` and
/// `.with_context()` at call sites.
pub type Result<T> = anyhow::Result<T>;

/// Fatal errors raised while partitioning a symbol table.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no symbol records to index")]
    EmptyInput,

    #[error("invalid search key {key:?} for '{display_name}': {problem}")]
    InvalidKey {
        key: String,
        display_name: String,
        problem: KeyProblem,
    },

    #[error("symbol '{display_name}' has no hits")]
    EmptyHits { display_name: String },

    #[error("target shard size must be at least 1")]
    InvalidShardSize,

    #[error("failed to encode shard {shard_id}: {source}")]
    Encode {
        shard_id: String,
        #[source]
        source: CodecError,
    },

    #[error("failed to serialize manifest: {0}")]
    Manifest(#[source] serde_json::Error),

    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Shard encoding and decoding failures.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("postcard: {0}")]
    Postcard(#[from] postcard::Error),
}

/// Errors reading or validating a manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("manifest could not be read: {0}")]
    Unavailable(String),

    #[error("manifest is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported manifest format {found} (expected {expected})")]
    Format { found: u32, expected: u32 },

    #[error("manifest has no buckets")]
    NoBuckets,

    #[error("manifest buckets are not contiguous at bucket {index}")]
    NotContiguous { index: usize },
}

/// Runtime failures of the shard store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("shard {shard_id} unavailable: {reason}")]
    ShardUnavailable { shard_id: String, reason: String },
}

impl StoreError {
    pub fn unavailable(shard_id: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::ShardUnavailable {
            shard_id: shard_id.into(),
            reason: reason.to_string(),
        }
    }

    pub fn shard_id(&self) -> &str {
        match self {
            Self::ShardUnavailable { shard_id, .. } => shard_id,
        }
    }
}

/// Internal signal that a query was superseded by a newer keystroke.
///
/// Not user visible: the UI drops it and waits for the newer result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("query {generation} was superseded")]
pub struct StaleQueryDiscarded {
    pub generation: u64,
}

/// Why a search produced no result set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// Every shard covering the query failed to load.
    #[error("search unavailable: {}", join_failures(.failures))]
    Unavailable { failures: Vec<StoreError> },

    #[error(transparent)]
    Stale(#[from] StaleQueryDiscarded),
}

fn join_failures(failures: &[StoreError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl QueryError {
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::Stale(_))
    }
}

/// Errors parsing Doxygen `searchData` files.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("{}: missing `var searchData = [...]` assignment", .path.display())]
    MissingAssignment { path: PathBuf },

    #[error("{}: syntax error at byte {offset}: {message}", .path.display())]
    Syntax {
        path: PathBuf,
        offset: usize,
        message: String,
    },

    #[error("{}: unexpected shape at item {index}: {message}", .path.display())]
    Shape {
        path: PathBuf,
        index: usize,
        message: String,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors loading `symdex.toml`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config value: {0}")]
    Invalid(String),
}
