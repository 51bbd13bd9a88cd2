//! Match classification, ranking and grouping.
//!
//! Ranking is deterministic for a given index and query: exact matches first, then
//! shorter keys, then candidate order (shard order, then key order within a shard).

use super::query::Query;
use super::result::{MatchKind, RankedEntry, ResultGroup};
use crate::index::Manifest;
use crate::index::key;
use crate::types::ShardEntry;

/// Classifies an entry against a query.
///
/// Single-token queries match any key starting with the token. Multi-token queries
/// additionally require every token, in order, in the key or the normalized display
/// name.
pub fn classify(entry: &ShardEntry, query: &Query) -> Option<MatchKind> {
    let first = query.first_token()?;
    if !entry.search_key.starts_with(first) {
        return None;
    }

    let tokens = query.token_refs();
    if tokens.len() > 1
        && !key::contains_in_order(&entry.search_key, &tokens)
        && !key::contains_in_order(&key::normalize(&entry.display_name), &tokens)
    {
        return None;
    }

    if entry.search_key == query.key() {
        Some(MatchKind::Exact)
    } else {
        Some(MatchKind::Prefix)
    }
}

/// Sorts candidates in place; the sort is stable, so ties keep candidate order.
pub fn rank(candidates: &mut [RankedEntry]) {
    candidates.sort_by_key(|entry| (entry.match_kind, entry.search_key.len()));
}

/// Groups ranked entries under their labels.
///
/// Groups appear in manifest order with the unlabeled group first. Labels missing
/// from the manifest follow, in order of first appearance.
pub fn group(ranked: Vec<RankedEntry>, manifest: &Manifest) -> Vec<ResultGroup> {
    let mut groups: Vec<ResultGroup> = Vec::new();
    for entry in ranked {
        match groups
            .iter_mut()
            .find(|group| group.label == entry.group_label)
        {
            Some(group) => group.entries.push(entry),
            None => groups.push(ResultGroup {
                label: entry.group_label.clone(),
                entries: vec![entry],
            }),
        }
    }
    groups.sort_by_key(|group| manifest.group_rank(group.label.as_deref()));
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Codec;
    use crate::types::Hit;
    use assert2::check;
    use rstest::rstest;

    fn entry(name: &str) -> ShardEntry {
        ShardEntry {
            search_key: key::normalize(name),
            display_name: name.to_string(),
            group_label: None,
            hits: vec![Hit::new(format!("#{name}"))],
        }
    }

    fn ranked(name: &str, label: Option<&str>) -> RankedEntry {
        let mut entry = RankedEntry::new(&entry(name), MatchKind::Prefix, "0");
        entry.group_label = label.map(str::to_string);
        entry
    }

    #[rstest]
    #[case("clear", "cl", Some(MatchKind::Prefix))]
    #[case("cl", "cl", Some(MatchKind::Exact))]
    #[case("CL", "cl", Some(MatchKind::Exact))]
    #[case("close", "ca", None)]
    #[case("name tables", "name tables", Some(MatchKind::Exact))]
    #[case("name_tables_init", "name tables", Some(MatchKind::Prefix))]
    #[case("name_lookup", "name tables", None)]
    #[case("tables_name", "name tables", None)]
    #[case("anything", "", None)]
    fn test_classify(#[case] name: &str, #[case] text: &str, #[case] expected: Option<MatchKind>) {
        check!(classify(&entry(name), &Query::parse(text)) == expected);
    }

    #[test]
    fn test_classify_uses_display_name_for_later_tokens() {
        // Key from the importer carries only the leaf name
        let entry = ShardEntry {
            search_key: "close".to_string(),
            display_name: "close (AftServer)".to_string(),
            group_label: None,
            hits: vec![Hit::new("#close")],
        };
        check!(classify(&entry, &Query::parse("close aft")) == Some(MatchKind::Prefix));
        check!(classify(&entry, &Query::parse("close node")) == None);
    }

    #[test]
    fn test_rank_exact_then_length_then_candidate_order() {
        let mut candidates = vec![
            ranked("clear", None),
            ranked("close", None),
            ranked("cl_long", None),
            ranked("cl", None),
        ];
        candidates[3].match_kind = MatchKind::Exact;
        rank(&mut candidates);

        let names: Vec<_> = candidates.iter().map(|e| e.display_name.as_str()).collect();
        check!(names == ["cl", "clear", "close", "cl_long"]);
    }

    #[test]
    fn test_group_order() {
        let mut manifest = crate::index::build_index(
            [crate::types::SymbolRecord::from_name("x", vec![Hit::new("#x")])],
            1,
            Codec::Json,
        )
        .unwrap()
        .manifest;
        manifest.groups = vec!["Pages".to_string(), "Files".to_string()];
        let entries = vec![
            ranked("readme", Some("Files")),
            ranked("reader", None),
            ranked("release", Some("Other")),
            ranked("read_me", Some("Pages")),
            ranked("reads", None),
        ];

        let groups = group(entries, &manifest);
        let labels: Vec<_> = groups.iter().map(|g| g.label.as_deref()).collect();
        check!(labels == [None, Some("Pages"), Some("Files"), Some("Other")]);
        check!(groups[0].entries.len() == 2);
        check!(groups[0].entries[1].display_name == "reads");
    }
}
