//! The manifest: mapping from normalized key prefixes to shards.
//!
//! Buckets are ordered by key. Bucket 0 starts at the empty prefix and every bucket
//! covers the keys `k` with `first_key_prefix <= k < next.first_key_prefix`, so the
//! buckets tile the whole key space and every key resolves to exactly one shard.

use super::codec::Codec;
use super::digest::Digest;
use crate::error::ManifestError;
use serde::{Deserialize, Serialize};

/// Current manifest format version.
pub const MANIFEST_FORMAT: u32 = 1;

/// File name of the manifest inside an index directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// One shard's key range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub shard_id: String,
    pub first_key_prefix: String,
    pub last_key_prefix: String,
    /// File name relative to the index directory.
    pub file: String,
    /// Number of entries in the shard.
    pub entries: usize,
    /// Digest of the encoded shard file, once written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<Digest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub format: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_id: Option<Digest>,
    #[serde(default)]
    pub codec: Codec,
    /// Group labels in display order (first occurrence in the symbol table).
    #[serde(default)]
    pub groups: Vec<String>,
    pub buckets: Vec<Bucket>,
}

impl Manifest {
    /// Parses and validates manifest JSON.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ManifestError> {
        let manifest: Self = serde_json::from_slice(bytes)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Pretty JSON, byte-identical for identical manifests.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Checks ordering and coverage of the buckets.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.format != MANIFEST_FORMAT {
            return Err(ManifestError::Format {
                found: self.format,
                expected: MANIFEST_FORMAT,
            });
        }

        let Some(first) = self.buckets.first() else {
            return Err(ManifestError::NoBuckets);
        };
        if !first.first_key_prefix.is_empty() {
            return Err(ManifestError::NotContiguous { index: 0 });
        }

        for (index, bucket) in self.buckets.iter().enumerate() {
            if bucket.first_key_prefix > bucket.last_key_prefix {
                return Err(ManifestError::NotContiguous { index });
            }
            if let Some(next) = self.buckets.get(index + 1)
                && bucket.last_key_prefix >= next.first_key_prefix
            {
                return Err(ManifestError::NotContiguous { index });
            }
        }
        Ok(())
    }

    /// Index of the bucket whose range contains `key`.
    pub fn bucket_index(&self, key: &str) -> usize {
        // Bucket 0 starts at "", so at least one bucket qualifies
        self.buckets
            .partition_point(|bucket| bucket.first_key_prefix.as_str() <= key)
            .saturating_sub(1)
    }

    /// Buckets that may hold keys starting with `prefix`.
    ///
    /// Binary search finds the bucket containing `prefix` itself; the following
    /// buckets qualify only while their first prefix still starts with `prefix`.
    pub fn resolve_buckets(&self, prefix: &str) -> &[Bucket] {
        if self.buckets.is_empty() {
            return &[];
        }
        let start = self.bucket_index(prefix);
        let extra = self.buckets[start + 1..]
            .iter()
            .take_while(|bucket| bucket.first_key_prefix.starts_with(prefix))
            .count();
        &self.buckets[start..=start + extra]
    }

    /// Shard ids that may hold keys starting with `prefix`.
    pub fn resolve(&self, prefix: &str) -> Vec<&str> {
        self.resolve_buckets(prefix)
            .iter()
            .map(|bucket| bucket.shard_id.as_str())
            .collect()
    }

    pub fn bucket(&self, shard_id: &str) -> Option<&Bucket> {
        self.buckets.iter().find(|bucket| bucket.shard_id == shard_id)
    }

    /// Total number of entries across all shards.
    pub fn entry_count(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.entries).sum()
    }

    /// Display rank of a group label; unlabeled entries sort first.
    pub fn group_rank(&self, label: Option<&str>) -> usize {
        match label {
            None => 0,
            Some(label) => self
                .groups
                .iter()
                .position(|group| group == label)
                .map_or(self.groups.len() + 1, |position| position + 1),
        }
    }
}
