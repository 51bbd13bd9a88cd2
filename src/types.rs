//! Records flowing from the collector through the partitioner into shards.

use serde::{Deserialize, Serialize};

/// Kind of documented entity a hit points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Member,
    Class,
    Namespace,
    Group,
    Page,
    File,
}

impl EntityKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Class => "class",
            Self::Namespace => "namespace",
            Self::Group => "group",
            Self::Page => "page",
            Self::File => "file",
        }
    }
}

/// One documentation location for a search key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hit {
    /// Opaque locator (path plus anchor) into the documentation set.
    pub url: String,
    /// Owning entity when the key is defined in several contexts, e.g. `AftNode::name()`.
    // No skip_serializing_if here or below: shards are also written with postcard,
    // which is not self-describing and needs every field present.
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub kind: Option<EntityKind>,
}

impl Hit {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            scope: None,
            kind: None,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub const fn with_kind(mut self, kind: EntityKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

/// A collected symbol, as produced by the documentation generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRecord {
    /// Normalized, matchable form of the name (see [`crate::index::key`]).
    pub search_key: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_label: Option<String>,
    pub hits: Vec<Hit>,
}

impl SymbolRecord {
    /// Builds a record whose key is the normalized display name.
    pub fn from_name(display_name: impl Into<String>, hits: Vec<Hit>) -> Self {
        let display_name = display_name.into();
        Self {
            search_key: crate::index::key::normalize(&display_name),
            display_name,
            group_label: None,
            hits,
        }
    }

    pub fn with_group(mut self, label: impl Into<String>) -> Self {
        self.group_label = Some(label.into());
        self
    }
}

/// Persisted form of one (merged) symbol inside a shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardEntry {
    pub search_key: String,
    pub display_name: String,
    #[serde(default)]
    pub group_label: Option<String>,
    /// Never empty.
    pub hits: Vec<Hit>,
}

/// The unit of lazy fetch: a contiguous run of keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shard {
    pub shard_id: String,
    /// Sorted by `search_key`, byte-wise.
    pub entries: Vec<ShardEntry>,
}

impl Shard {
    /// Entries whose key starts with `prefix`, found by binary search.
    pub fn prefix_range(&self, prefix: &str) -> &[ShardEntry] {
        let start = self
            .entries
            .partition_point(|entry| entry.search_key.as_str() < prefix);
        let len = self.entries[start..]
            .partition_point(|entry| entry.search_key.starts_with(prefix));
        &self.entries[start..start + len]
    }

    /// Entries with exactly this key (one per group label).
    pub fn lookup(&self, search_key: &str) -> &[ShardEntry] {
        let start = self
            .entries
            .partition_point(|entry| entry.search_key.as_str() < search_key);
        let len = self.entries[start..]
            .partition_point(|entry| entry.search_key == search_key);
        &self.entries[start..start + len]
    }
}
