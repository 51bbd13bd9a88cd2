//! Adaptive alphabet bucketing.
//!
//! The partitioner merges duplicate records, sorts them by key and packs them into
//! shards of at most `target_shard_size` entries. Packing works on *units*: runs of
//! entries sharing a leading character. A unit that alone exceeds the target is split
//! again on the next character, as deep as needed, so dense prefixes spread over
//! several shards while sparse letters share one. Entries with an identical key always
//! stay together.

use super::codec::Codec;
use super::key;
use super::manifest::{Bucket, MANIFEST_FORMAT, Manifest};
use crate::error::BuildError;
use crate::types::{ShardEntry, Shard, SymbolRecord};
use ahash::{AHashMap, AHashSet};
use std::ops::Range;

/// Partitions a symbol table into a manifest and its shards.
///
/// Pure function of its input: the same records and target always produce the same
/// manifest and shards. The manifest carries no digests yet; those are added when the
/// shards are encoded (see [`super::writer::encode_index`]).
pub fn partition(
    records: impl IntoIterator<Item = SymbolRecord>,
    target_shard_size: usize,
) -> Result<(Manifest, Vec<Shard>), BuildError> {
    if target_shard_size == 0 {
        return Err(BuildError::InvalidShardSize);
    }

    let start = std::time::Instant::now();
    let (mut entries, groups) = merge_records(records)?;
    if entries.is_empty() {
        return Err(BuildError::EmptyInput);
    }

    // Stable: entries sharing a key keep first-seen order
    entries.sort_by(|a, b| a.search_key.cmp(&b.search_key));

    let mut units = Vec::new();
    plan_units(&entries, 0..entries.len(), 0, target_shard_size, &mut units);
    let ranges = pack_units(units, target_shard_size);

    let buckets = bucket_ranges(&entries, &ranges);
    let mut shards = Vec::with_capacity(ranges.len());
    let mut remaining = entries.into_iter();
    for (bucket, range) in buckets.iter().zip(&ranges) {
        shards.push(Shard {
            shard_id: bucket.shard_id.clone(),
            entries: remaining.by_ref().take(range.len()).collect(),
        });
    }

    let manifest = Manifest {
        format: MANIFEST_FORMAT,
        build_id: None,
        codec: Codec::default(),
        groups,
        buckets,
    };

    tracing::info!(
        "Partitioned {} entries into {} shards (target {}) in {:?}",
        manifest.entry_count(),
        shards.len(),
        target_shard_size,
        start.elapsed()
    );

    Ok((manifest, shards))
}

/// Validates records and merges those sharing `(search_key, group_label)`.
///
/// Hits are concatenated in encounter order; the first display name wins. Also
/// returns group labels in first-seen order.
fn merge_records(
    records: impl IntoIterator<Item = SymbolRecord>,
) -> Result<(Vec<ShardEntry>, Vec<String>), BuildError> {
    let mut entries: Vec<ShardEntry> = Vec::new();
    let mut positions: AHashMap<(String, Option<String>), usize> = AHashMap::new();
    let mut groups = Vec::new();
    let mut seen_groups = AHashSet::new();
    let mut merged = 0usize;

    for record in records {
        if let Err(problem) = key::validate(&record.search_key) {
            return Err(BuildError::InvalidKey {
                key: record.search_key,
                display_name: record.display_name,
                problem,
            });
        }
        if record.hits.is_empty() {
            return Err(BuildError::EmptyHits {
                display_name: record.display_name,
            });
        }

        if let Some(label) = &record.group_label
            && seen_groups.insert(label.clone())
        {
            groups.push(label.clone());
        }

        let slot = (record.search_key, record.group_label);
        if let Some(&position) = positions.get(&slot) {
            entries[position].hits.extend(record.hits);
            merged += 1;
            continue;
        }

        positions.insert(slot.clone(), entries.len());
        entries.push(ShardEntry {
            search_key: slot.0,
            display_name: record.display_name,
            group_label: slot.1,
            hits: record.hits,
        });
    }

    if merged > 0 {
        tracing::debug!("Merged {} duplicate records into existing entries", merged);
    }

    Ok((entries, groups))
}

/// Splits `range` (entries sharing their first `depth` characters) into packing units.
fn plan_units(
    entries: &[ShardEntry],
    range: Range<usize>,
    depth: usize,
    target: usize,
    units: &mut Vec<Range<usize>>,
) {
    let mut run_start = range.start;
    while run_start < range.end {
        let lead = key::char_at(&entries[run_start].search_key, depth);
        let run_len = entries[run_start..range.end]
            .iter()
            .take_while(|entry| key::char_at(&entry.search_key, depth) == lead)
            .count();
        let run = run_start..run_start + run_len;

        // Keys exhausted at this depth are identical and cannot be split further
        if run_len <= target || lead.is_none() {
            units.push(run);
        } else {
            plan_units(entries, run, depth + 1, target, units);
        }
        run_start += run_len;
    }
}

/// Greedily packs consecutive units into shard ranges.
fn pack_units(units: Vec<Range<usize>>, target: usize) -> Vec<Range<usize>> {
    let mut ranges: Vec<Range<usize>> = Vec::new();
    let mut current: Option<Range<usize>> = None;

    for unit in units {
        current = match current {
            Some(open) if open.len() + unit.len() <= target => Some(open.start..unit.end),
            Some(open) => {
                ranges.push(open);
                Some(unit)
            }
            None => Some(unit),
        };
    }
    ranges.extend(current);
    ranges
}

/// Computes shard ids and key-range prefixes for packed ranges.
fn bucket_ranges(entries: &[ShardEntry], ranges: &[Range<usize>]) -> Vec<Bucket> {
    let mut buckets = Vec::with_capacity(ranges.len());

    for (index, range) in ranges.iter().enumerate() {
        let first_key = entries[range.start].search_key.as_str();
        let last_key = entries[range.end - 1].search_key.as_str();

        let first_key_prefix = if index == 0 {
            ""
        } else {
            let previous_last = entries[ranges[index - 1].end - 1].search_key.as_str();
            key::distinguishing_prefix(previous_last, first_key)
        };

        // Cut the last key just past where it diverges from the next shard, but never
        // below the bucket's own first prefix.
        let boundary = match ranges.get(index + 1) {
            Some(next) => key::shortest_lower_prefix(last_key, &entries[next.start].search_key),
            None => key::char_prefix(last_key, 1),
        };
        let floor = key::prefix_at_least(last_key, first_key_prefix);
        let last_key_prefix = if boundary.len() >= floor.len() {
            boundary
        } else {
            floor
        };

        let shard_id = shard_id(index);
        buckets.push(Bucket {
            file: Codec::default().file_name(&shard_id),
            shard_id,
            first_key_prefix: first_key_prefix.to_string(),
            last_key_prefix: last_key_prefix.to_string(),
            entries: range.len(),
            digest: None,
        });
    }
    buckets
}

/// Sequential base-36 shard id: `0`..`9`, `a`..`z`, `10`, ...
pub fn shard_id(mut index: usize) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut digits = Vec::new();
    loop {
        digits.push(DIGITS[index % 36]);
        index /= 36;
        if index == 0 {
            break;
        }
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}
