//! Sharded symbol search for generated API documentation.
//!
//! The offline partitioner ([`index`]) splits a symbol table into key-ordered shards
//! plus a small manifest. At query time a [`store::ShardStore`] fetches shards lazily
//! and memoizes them, and the [`search`] engine turns each keystroke into a grouped,
//! ranked result set.

pub mod cli;
pub mod config;
pub mod doxygen;
pub mod error;
pub mod index;
pub mod search;
pub mod server;
pub mod store;
pub mod tracing;
pub mod types;

pub use config::Config;
pub use error::{
    BuildError, CodecError, ConfigError, ImportError, ManifestError, QueryError, StaleQueryDiscarded,
    StoreError,
};
pub use index::{Codec, EncodedIndex, Manifest, build_index, partition, write_index};
pub use search::{QueryEngine, ResultSet, SearchSession};
pub use store::{DirSource, MemorySource, ShardSource, ShardStore};
pub use types::{EntityKind, Hit, Shard, ShardEntry, SymbolRecord};
