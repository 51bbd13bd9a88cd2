//! Shared test fixtures and utilities for integration tests.
//!
//! # Available Fixtures
//!
//! - `doxygen_records`: the symbol table parsed from the Doxygen fixtures in
//!   `tests/fixtures/` (two `searchData` files, 26 entries)
//! - `BuiltIndex::write`: partitions records and writes the index into a fresh
//!   temporary directory, for tests that go through the on-disk store
//!
//! In-memory tests use [`MemorySource::from_index`] directly.

use rstest::fixture;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use symdex::doxygen::parse_search_data;
use symdex::index::{Codec, EncodedIndex, build_index, write_index};
use symdex::store::{DirSource, MemorySource, ShardStore};
use symdex::types::{Hit, SymbolRecord};
use tempfile::TempDir;

/// Returns the project root directory (where Cargo.toml lives).
pub fn project_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

#[allow(dead_code)] // Used across different integration test crates
pub fn fixtures_dir() -> PathBuf {
    project_root().join("tests").join("fixtures")
}

/// Records parsed from every fixture file, in file order.
#[allow(dead_code)]
#[fixture]
pub fn doxygen_records() -> Vec<SymbolRecord> {
    let mut records = Vec::new();
    for name in ["all_3.js", "all_b.js"] {
        let path = fixtures_dir().join(name);
        let text = std::fs::read_to_string(&path).expect("Failed to read fixture");
        records.extend(parse_search_data(&text, &path).expect("Fixture should parse"));
    }
    records
}

/// A record keyed by its normalized name with one anchor hit.
#[allow(dead_code)]
pub fn record(name: &str) -> SymbolRecord {
    SymbolRecord::from_name(name, vec![Hit::new(format!("#{name}"))])
}

#[allow(dead_code)]
pub fn records(names: &[&str]) -> Vec<SymbolRecord> {
    names.iter().map(|name| record(name)).collect()
}

/// Store over an in-memory copy of `index`, plus the source for failure injection.
#[allow(dead_code)]
pub async fn memory_store(index: &EncodedIndex) -> (ShardStore, Arc<MemorySource>) {
    let source = Arc::new(MemorySource::from_index(index).unwrap());
    let store = ShardStore::open(source.clone())
        .await
        .expect("Manifest should load");
    (store, source)
}

/// An index written to a temporary directory that is removed on drop.
#[allow(dead_code)] // Methods used across different integration test crates
pub struct BuiltIndex {
    _temp: TempDir,
    root: PathBuf,
    pub index: EncodedIndex,
}

#[allow(dead_code)]
impl BuiltIndex {
    pub async fn write(records: Vec<SymbolRecord>, target_shard_size: usize, codec: Codec) -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let root = temp.path().join("index");
        let index = build_index(records, target_shard_size, codec).expect("Build should succeed");
        write_index(&root, &index).await.expect("Write should succeed");
        Self {
            _temp: temp,
            root,
            index,
        }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub async fn open(&self) -> ShardStore {
        ShardStore::open(Arc::new(DirSource::new(&self.root)))
            .await
            .expect("Manifest should load")
    }
}
