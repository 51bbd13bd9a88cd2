//! Encoding and persisting built indexes.

use super::codec::Codec;
use super::digest::Digest;
use super::manifest::{MANIFEST_FILE, Manifest};
use super::partition::partition;
use crate::error::BuildError;
use crate::types::{Shard, SymbolRecord};
use std::path::Path;

/// A fully encoded index: the manifest with digests filled in, plus every shard file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedIndex {
    pub manifest: Manifest,
    /// `(file name, bytes)` in bucket order.
    pub files: Vec<(String, Vec<u8>)>,
}

impl EncodedIndex {
    pub fn manifest_bytes(&self) -> Result<Vec<u8>, BuildError> {
        self.manifest.to_json().map_err(BuildError::Manifest)
    }

    pub fn total_bytes(&self) -> usize {
        self.files.iter().map(|(_, bytes)| bytes.len()).sum()
    }
}

/// Encodes shards with `codec`, recording file names and digests in the manifest.
pub fn encode_index(
    mut manifest: Manifest,
    shards: &[Shard],
    codec: Codec,
) -> Result<EncodedIndex, BuildError> {
    let mut files = Vec::with_capacity(shards.len());
    let mut digests = Vec::with_capacity(shards.len());

    for (bucket, shard) in manifest.buckets.iter_mut().zip(shards) {
        let bytes = codec.encode(shard).map_err(|source| BuildError::Encode {
            shard_id: shard.shard_id.clone(),
            source,
        })?;
        let digest = Digest::of(&bytes);

        bucket.file = codec.file_name(&bucket.shard_id);
        bucket.digest = Some(digest);
        digests.push(digest);
        files.push((bucket.file.clone(), bytes));
    }

    manifest.codec = codec;
    manifest.build_id = Some(Digest::combine(&digests));

    Ok(EncodedIndex { manifest, files })
}

/// Partitions and encodes in one step.
pub fn build_index(
    records: impl IntoIterator<Item = SymbolRecord>,
    target_shard_size: usize,
    codec: Codec,
) -> Result<EncodedIndex, BuildError> {
    let (manifest, shards) = partition(records, target_shard_size)?;
    encode_index(manifest, &shards, codec)
}

/// Writes an encoded index into `dir`.
///
/// Shard files are written before the manifest, so a reader that sees the new
/// manifest can fetch every shard it names.
pub async fn write_index(dir: &Path, index: &EncodedIndex) -> Result<(), BuildError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| BuildError::Io { path, source }
    };

    let manifest_bytes = index.manifest_bytes()?;
    tokio::fs::create_dir_all(dir).await.map_err(io_err(dir))?;

    for (name, bytes) in &index.files {
        let path = dir.join(name);
        tokio::fs::write(&path, bytes).await.map_err(io_err(&path))?;
    }

    let manifest_path = dir.join(MANIFEST_FILE);
    tokio::fs::write(&manifest_path, manifest_bytes)
        .await
        .map_err(io_err(&manifest_path))?;

    tracing::info!(
        "Wrote index to {} ({} shards, {} bytes, build {})",
        dir.display(),
        index.files.len(),
        index.total_bytes(),
        index
            .manifest
            .build_id
            .map(|id| id.to_string())
            .unwrap_or_default()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Hit;
    use assert2::{check, let_assert};

    fn records() -> Vec<SymbolRecord> {
        ["close", "clear", "create", "nodes", "name"]
            .into_iter()
            .map(|name| SymbolRecord::from_name(name, vec![Hit::new(format!("#{name}"))]))
            .collect()
    }

    #[test]
    fn test_digests_match_file_bytes() {
        let index = build_index(records(), 2, Codec::Json).unwrap();

        check!(index.files.len() == index.manifest.buckets.len());
        for (bucket, (name, bytes)) in index.manifest.buckets.iter().zip(&index.files) {
            check!(&bucket.file == name);
            check!(bucket.digest == Some(Digest::of(bytes)));
        }
        check!(index.manifest.build_id.is_some());
    }

    #[test]
    fn test_codec_changes_file_names_and_build_id() {
        let json = build_index(records(), 2, Codec::Json).unwrap();
        let bin = build_index(records(), 2, Codec::Postcard).unwrap();

        check!(bin.manifest.codec == Codec::Postcard);
        check!(bin.files.iter().all(|(name, _)| name.ends_with(".bin")));
        check!(json.manifest.build_id != bin.manifest.build_id);
    }

    #[test]
    fn test_manifest_bytes_round_trip() {
        let index = build_index(records(), 2, Codec::Json).unwrap();
        let_assert!(Ok(bytes) = index.manifest_bytes());

        check!(bytes.ends_with(b"}\n"));
        let_assert!(Ok(parsed) = Manifest::from_json(&bytes));
        check!(parsed == index.manifest);
    }

    #[tokio::test]
    async fn test_write_index_layout() {
        let dir = tempfile::tempdir().unwrap();
        let index = build_index(records(), 2, Codec::Json).unwrap();
        write_index(dir.path(), &index).await.unwrap();

        let manifest_bytes = std::fs::read(dir.path().join(MANIFEST_FILE)).unwrap();
        let_assert!(Ok(manifest) = Manifest::from_json(&manifest_bytes));
        for bucket in &manifest.buckets {
            let bytes = std::fs::read(dir.path().join(&bucket.file)).unwrap();
            check!(bucket.digest == Some(Digest::of(&bytes)));
        }
    }
}
