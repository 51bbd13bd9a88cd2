//! Offline index building: key normalization, partitioning, encoding and writing.

pub mod codec;
pub mod digest;
pub mod key;
pub mod manifest;
pub mod partition;
pub mod writer;

pub use codec::Codec;
pub use digest::Digest;
pub use manifest::{Bucket, MANIFEST_FILE, MANIFEST_FORMAT, Manifest};
pub use partition::partition;
pub use writer::{EncodedIndex, build_index, encode_index, write_index};
