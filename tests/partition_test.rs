mod common;

use assert2::{check, let_assert};
use common::{doxygen_records, records};
use rstest::rstest;
use std::collections::BTreeMap;
use symdex::index::{Codec, Manifest, build_index, partition};
use symdex::types::{Hit, Shard, SymbolRecord};
use symdex::BuildError;

/// `(key, label)` → hits, from the input with duplicates merged in encounter order.
fn merged(records: &[SymbolRecord]) -> BTreeMap<(String, Option<String>), Vec<Hit>> {
    let mut merged: BTreeMap<_, Vec<Hit>> = BTreeMap::new();
    for record in records {
        merged
            .entry((record.search_key.clone(), record.group_label.clone()))
            .or_default()
            .extend(record.hits.iter().cloned());
    }
    merged
}

fn stored(shards: &[Shard]) -> BTreeMap<(String, Option<String>), Vec<Hit>> {
    shards
        .iter()
        .flat_map(|shard| &shard.entries)
        .map(|entry| {
            (
                (entry.search_key.clone(), entry.group_label.clone()),
                entry.hits.clone(),
            )
        })
        .collect()
}

fn check_manifest_covers(manifest: &Manifest) {
    check!(manifest.validate().is_ok());
    check!(manifest.buckets[0].first_key_prefix == "");
    for pair in manifest.buckets.windows(2) {
        check!(pair[0].last_key_prefix < pair[1].first_key_prefix);
        check!(pair[0].first_key_prefix < pair[1].first_key_prefix);
    }
}

// --- Structural properties over the Doxygen symbol table ---

#[rstest]
#[case(1)]
#[case(2)]
#[case(3)]
#[case(5)]
#[case(8)]
#[case(256)]
fn manifest_is_contiguous_and_covering(doxygen_records: Vec<SymbolRecord>, #[case] size: usize) {
    let (manifest, shards) = partition(doxygen_records, size).unwrap();
    check_manifest_covers(&manifest);
    check!(manifest.buckets.len() == shards.len());
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(4)]
#[case(7)]
#[case(256)]
fn every_key_lives_in_exactly_one_shard(doxygen_records: Vec<SymbolRecord>, #[case] size: usize) {
    let (manifest, shards) = partition(doxygen_records, size).unwrap();

    for (index, shard) in shards.iter().enumerate() {
        check!(manifest.buckets[index].shard_id == shard.shard_id);
        check!(manifest.buckets[index].entries == shard.entries.len());
        check!(shard.entries.is_sorted_by(|a, b| a.search_key <= b.search_key));

        for entry in &shard.entries {
            let key = entry.search_key.as_str();
            let holders: Vec<_> = shards
                .iter()
                .filter(|other| other.entries.iter().any(|e| e.search_key == key))
                .map(|other| other.shard_id.as_str())
                .collect();
            check!(holders == [shard.shard_id.as_str()]);
            check!(manifest.bucket_index(key) == index);
            check!(manifest.resolve(key).contains(&shard.shard_id.as_str()));
        }
    }
}

#[rstest]
fn shards_respect_target_except_identical_keys(doxygen_records: Vec<SymbolRecord>) {
    // "nodes" exists twice (member and group), so a target of 1 must still keep both together
    let (_, shards) = partition(doxygen_records, 1).unwrap();
    for shard in &shards {
        if shard.entries.len() > 1 {
            check!(shard.entries.iter().all(|e| e.search_key == shard.entries[0].search_key));
        }
    }
    let nodes = shards
        .iter()
        .find(|shard| shard.entries.iter().any(|e| e.search_key == "nodes"))
        .unwrap();
    check!(nodes.entries.len() == 2);
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(64)]
fn round_trip_preserves_merged_records(doxygen_records: Vec<SymbolRecord>, #[case] size: usize) {
    let expected = merged(&doxygen_records);
    let (manifest, shards) = partition(doxygen_records, size).unwrap();

    check!(stored(&shards) == expected);
    check!(manifest.entry_count() == expected.len());
    check!(manifest.groups == ["Groups"]);
}

#[rstest]
#[case(Codec::Json)]
#[case(Codec::Postcard)]
fn builds_are_byte_identical(doxygen_records: Vec<SymbolRecord>, #[case] codec: Codec) {
    let first = build_index(doxygen_records.clone(), 4, codec).unwrap();
    let second = build_index(doxygen_records, 4, codec).unwrap();

    check!(first.manifest_bytes().unwrap() == second.manifest_bytes().unwrap());
    check!(first.files == second.files);
    check!(first.manifest.build_id == second.manifest.build_id);
}

#[rstest]
fn build_id_changes_with_content(doxygen_records: Vec<SymbolRecord>) {
    let mut changed = doxygen_records.clone();
    changed[0].hits.push(Hit::new("../extra.html"));

    let before = build_index(doxygen_records, 4, Codec::Json).unwrap();
    let after = build_index(changed, 4, Codec::Json).unwrap();
    check!(before.manifest.build_id != after.manifest.build_id);
}

// --- Merging ---

#[test]
fn duplicate_keys_merge_hits_in_encounter_order() {
    let input = vec![
        SymbolRecord::from_name("close", vec![Hit::new("a.html#1")]),
        SymbolRecord::from_name("clear", vec![Hit::new("b.html#1")]),
        SymbolRecord::from_name("Close", vec![Hit::new("c.html#1"), Hit::new("c.html#2")]),
    ];
    let (_, shards) = partition(input, 256).unwrap();
    let_assert!([shard] = shards.as_slice());

    let close = &shard.entries[1];
    check!(close.search_key == "close");
    check!(close.display_name == "close");
    let urls: Vec<_> = close.hits.iter().map(|hit| hit.url.as_str()).collect();
    check!(urls == ["a.html#1", "c.html#1", "c.html#2"]);
}

// --- Errors ---

#[test]
fn empty_input_is_rejected() {
    let_assert!(Err(BuildError::EmptyInput) = partition(Vec::new(), 10));
}

#[rstest]
#[case("")]
#[case("Close")]
#[case("a b")]
#[case("bad_zz")]
#[case("trail_2")]
fn invalid_keys_are_rejected(#[case] key: &str) {
    let mut input = records(&["close"]);
    input.push(SymbolRecord {
        search_key: key.to_string(),
        display_name: "bad".to_string(),
        group_label: None,
        hits: vec![Hit::new("#bad")],
    });
    let_assert!(Err(BuildError::InvalidKey { .. }) = partition(input, 10));
}

#[test]
fn zero_target_is_rejected() {
    let_assert!(Err(BuildError::InvalidShardSize) = partition(records(&["close"]), 0));
}

// --- Adaptive bucketing ---

#[test]
fn sparse_letters_share_a_shard_and_dense_prefixes_split() {
    let mut names: Vec<String> = (0..6).map(|i| format!("node{i}")).collect();
    names.extend(["alpha", "beta", "gamma"].map(String::from));
    let input = names
        .iter()
        .map(|name| SymbolRecord::from_name(name.as_str(), vec![Hit::new("#x")]))
        .collect::<Vec<_>>();

    let (manifest, shards) = partition(input, 3).unwrap();
    check_manifest_covers(&manifest);

    // a, b and g fit together; the six "node*" keys need two shards
    check!(shards.len() == 3);
    check!(shards[0].entries.len() == 3);
    check!(manifest.resolve("node").len() == 2);
    check!(manifest.resolve("a") == ["0"]);
}
