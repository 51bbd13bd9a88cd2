//! Result sets emitted to the UI layer.

use crate::types::{Hit, ShardEntry};
use serde::Serialize;

/// How a matched key relates to the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// The key equals the whole normalized query.
    Exact,
    /// The key starts with the first query token.
    Prefix,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedEntry {
    pub search_key: String,
    pub display_name: String,
    pub group_label: Option<String>,
    pub hits: Vec<Hit>,
    pub match_kind: MatchKind,
    pub shard_id: String,
}

impl RankedEntry {
    pub fn new(entry: &ShardEntry, match_kind: MatchKind, shard_id: &str) -> Self {
        Self {
            search_key: entry.search_key.clone(),
            display_name: entry.display_name.clone(),
            group_label: entry.group_label.clone(),
            hits: entry.hits.clone(),
            match_kind,
            shard_id: shard_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultGroup {
    /// `None` for the implicit ungrouped group, which always comes first.
    pub label: Option<String>,
    pub entries: Vec<RankedEntry>,
}

/// The grouped, ranked output of one query evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultSet {
    /// The query as typed.
    pub query: String,
    pub groups: Vec<ResultGroup>,
    /// True if the result cap cut off further matches.
    pub truncated: bool,
    /// Shards that failed to load; non-empty means the result is degraded.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unavailable: Vec<String>,
}

impl ResultSet {
    pub fn empty(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Total entries across groups.
    pub fn len(&self) -> usize {
        self.groups.iter().map(|group| group.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|group| group.entries.is_empty())
    }

    pub fn is_degraded(&self) -> bool {
        !self.unavailable.is_empty()
    }

    /// All entries in display order.
    pub fn entries(&self) -> impl Iterator<Item = &RankedEntry> {
        self.groups.iter().flat_map(|group| group.entries.iter())
    }

    /// Renders the result set as indented text for terminals.
    pub fn render(&self) -> String {
        use std::fmt::Write as _;

        if self.is_empty() {
            let mut out = format!("No matches for '{}'.\n", self.query);
            if self.is_degraded() {
                let _ = writeln!(out, "(shards unavailable: {})", self.unavailable.join(", "));
            }
            return out;
        }

        let mut out = String::new();
        for group in &self.groups {
            let _ = writeln!(out, "{}:", group.label.as_deref().unwrap_or("Symbols"));
            for entry in &group.entries {
                let _ = writeln!(out, "  {}", entry.display_name);
                for hit in &entry.hits {
                    match &hit.scope {
                        Some(scope) => {
                            let _ = writeln!(out, "    {} ({})", scope, hit.url);
                        }
                        None => {
                            let _ = writeln!(out, "    {}", hit.url);
                        }
                    }
                }
            }
        }
        if self.truncated {
            out.push_str("(more results; refine the query)\n");
        }
        if self.is_degraded() {
            let _ = writeln!(out, "(shards unavailable: {})", self.unavailable.join(", "));
        }
        out
    }
}
