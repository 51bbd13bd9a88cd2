//! Lazily fetched, memoized shard collection.
//!
//! The store is the only state shared between query sessions. Its cache is
//! append-only: a shard, once loaded, stays for the lifetime of the store. Concurrent
//! fetches of the same shard join one in-flight load through a shared future, and all
//! callers observe the same `Arc<Shard>`.

pub mod source;

pub use source::{DirSource, MemorySource, ShardSource};

use crate::error::{ManifestError, StoreError};
use crate::index::{Codec, Digest, MANIFEST_FILE, Manifest};
use crate::types::Shard;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

/// Type alias for shared shard loads.
type SharedShardFuture = Shared<BoxFuture<'static, Result<Arc<Shard>, StoreError>>>;

struct StoreInner {
    manifest: Manifest,
    source: Arc<dyn ShardSource>,

    /// Loaded shards, never evicted
    cache: RwLock<HashMap<String, Arc<Shard>>>,

    /// In-flight loads (can be awaited by multiple callers)
    in_flight: Mutex<HashMap<String, SharedShardFuture>>,
}

/// Read-only view of a built index, shared by every query session.
#[derive(Clone)]
pub struct ShardStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for ShardStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardStore")
            .field("source", &self.inner.source.describe())
            .field("buckets", &self.inner.manifest.buckets.len())
            .field(
                "cached",
                &self.inner.cache.try_read().map(|cache| cache.len()).ok(),
            )
            .finish_non_exhaustive()
    }
}

impl ShardStore {
    /// Loads and validates the manifest, then returns a store over `source`.
    pub async fn open(source: Arc<dyn ShardSource>) -> Result<Self, ManifestError> {
        let bytes = source
            .load(MANIFEST_FILE)
            .await
            .map_err(|e| ManifestError::Unavailable(format!("{}: {}", source.describe(), e)))?;
        let manifest = Manifest::from_json(&bytes)?;

        tracing::info!(
            "Opened index at {} ({} shards, {} entries, build {})",
            source.describe(),
            manifest.buckets.len(),
            manifest.entry_count(),
            manifest.build_id.map(|id| id.to_string()).unwrap_or_default()
        );

        Ok(Self::with_manifest(manifest, source))
    }

    /// Store over an already loaded manifest.
    pub fn with_manifest(manifest: Manifest, source: Arc<dyn ShardSource>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                manifest,
                source,
                cache: RwLock::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.inner.manifest
    }

    /// Shard ids that may hold keys starting with `prefix`.
    pub fn resolve(&self, prefix: &str) -> Vec<&str> {
        self.inner.manifest.resolve(prefix)
    }

    /// Returns a shard, loading it on first use.
    ///
    /// 1. Checks the cache
    /// 2. Joins an in-flight load if one exists
    /// 3. Starts a new load otherwise
    pub async fn fetch(&self, shard_id: &str) -> Result<Arc<Shard>, StoreError> {
        if let Some(shard) = self.get_cached(shard_id).await {
            tracing::trace!("Cache hit for shard {}", shard_id);
            return Ok(shard);
        }

        let future = {
            let mut in_flight = self.inner.in_flight.lock().await;

            // A load may have finished between the first check and taking the lock
            if let Some(shard) = self.get_cached(shard_id).await {
                return Ok(shard);
            }

            if let Some(future) = in_flight.get(shard_id) {
                tracing::debug!("Joining in-flight load of shard {}", shard_id);
                future.clone()
            } else {
                let future = self.load_future(shard_id)?.shared();
                in_flight.insert(shard_id.to_string(), future.clone());
                tracing::debug!("Starting load of shard {}", shard_id);
                future
            }
        };

        future.await
    }

    /// Like [`Self::fetch`], failing with `ShardUnavailable` once `deadline` passes.
    ///
    /// The load itself keeps running and still populates the cache for later callers.
    pub async fn fetch_with_deadline(
        &self,
        shard_id: &str,
        deadline: Duration,
    ) -> Result<Arc<Shard>, StoreError> {
        tokio::time::timeout(deadline, self.fetch(shard_id))
            .await
            .unwrap_or_else(|_| {
                Err(StoreError::unavailable(
                    shard_id,
                    format!("deadline of {:?} exceeded", deadline),
                ))
            })
    }

    /// Get a cached shard without triggering a load.
    pub async fn get_cached(&self, shard_id: &str) -> Option<Arc<Shard>> {
        self.inner.cache.read().await.get(shard_id).cloned()
    }

    /// Check if a shard has been loaded.
    pub async fn is_cached(&self, shard_id: &str) -> bool {
        self.inner.cache.read().await.contains_key(shard_id)
    }

    /// Check if a load is in progress for a shard.
    pub async fn is_loading(&self, shard_id: &str) -> bool {
        self.inner.in_flight.lock().await.contains_key(shard_id)
    }

    pub async fn cached_count(&self) -> usize {
        self.inner.cache.read().await.len()
    }

    /// Builds the load future for a shard named in the manifest.
    ///
    /// The load populates the cache itself, so the slot is filled even when every
    /// caller that started it has since been cancelled. It holds the store weakly so
    /// an abandoned store is not kept alive by its own loads.
    fn load_future(
        &self,
        shard_id: &str,
    ) -> Result<BoxFuture<'static, Result<Arc<Shard>, StoreError>>, StoreError> {
        let bucket = self
            .inner
            .manifest
            .bucket(shard_id)
            .ok_or_else(|| StoreError::unavailable(shard_id, "not in manifest"))?;

        let request = LoadRequest {
            shard_id: shard_id.to_string(),
            file: bucket.file.clone(),
            digest: bucket.digest,
            codec: self.inner.manifest.codec,
        };
        let source = self.inner.source.clone();
        let store = Arc::downgrade(&self.inner);

        // Runs as its own task so a load outlives the callers that started it
        let task = tokio::spawn(async move {
            let result = request.load(source.as_ref()).await;
            settle(&store, &request.shard_id, &result).await;
            result
        });

        let shard_id = shard_id.to_string();
        Ok(async move {
            task.await
                .unwrap_or_else(|e| Err(StoreError::unavailable(shard_id, e)))
        }
        .boxed())
    }
}

/// Everything needed to load one shard, detached from the store.
struct LoadRequest {
    shard_id: String,
    file: String,
    digest: Option<Digest>,
    codec: Codec,
}

impl LoadRequest {
    async fn load(&self, source: &dyn ShardSource) -> Result<Arc<Shard>, StoreError> {
        let bytes = source
            .load(&self.file)
            .await
            .map_err(|e| StoreError::unavailable(&self.shard_id, e))?;

        if let Some(expected) = self.digest {
            let actual = Digest::of(&bytes);
            if actual != expected {
                return Err(StoreError::unavailable(
                    &self.shard_id,
                    format!("digest mismatch (expected {}, got {})", expected, actual),
                ));
            }
        }

        // Decode in spawn_blocking since large shards are CPU intensive
        let codec = self.codec;
        let shard = tokio::task::spawn_blocking(move || codec.decode(&bytes))
            .await
            .map_err(|e| StoreError::unavailable(&self.shard_id, e))?
            .map_err(|e| StoreError::unavailable(&self.shard_id, format!("decode: {}", e)))?;

        if shard.shard_id != self.shard_id {
            return Err(StoreError::unavailable(
                &self.shard_id,
                format!("file holds shard {}", shard.shard_id),
            ));
        }

        Ok(Arc::new(shard))
    }
}

/// Publishes a finished load: caches successes, then clears the in-flight slot.
///
/// The cache is written before the slot is removed, so a fetch that finds no
/// in-flight load always finds the cached shard. Failures are not cached; the next
/// fetch retries.
async fn settle(store: &Weak<StoreInner>, shard_id: &str, result: &Result<Arc<Shard>, StoreError>) {
    let Some(store) = store.upgrade() else {
        return;
    };

    match result {
        Ok(shard) => {
            store
                .cache
                .write()
                .await
                .entry(shard_id.to_string())
                .or_insert_with(|| shard.clone());
            tracing::debug!(
                "Cached shard {} ({} entries)",
                shard_id,
                shard.entries.len()
            );
        }
        Err(e) => tracing::warn!("{}", e),
    }

    store.in_flight.lock().await.remove(shard_id);
}
