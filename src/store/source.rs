//! Transports that deliver manifest and shard bytes to a [`super::ShardStore`].

use crate::error::BuildError;
use crate::index::EncodedIndex;
use crate::index::manifest::MANIFEST_FILE;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Fetches index files by name.
///
/// Names come from the manifest (`manifest.json`, `shard_<id>.<ext>`), so a source
/// never needs to know about shard ids or key ranges.
pub trait ShardSource: Send + Sync + 'static {
    fn load(&self, name: &str) -> BoxFuture<'static, io::Result<Vec<u8>>>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Reads index files from a build directory.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Rejects names that would escape the index directory.
fn check_name(name: &str) -> io::Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid index file name '{}'", name),
        ));
    }
    Ok(())
}

impl ShardSource for DirSource {
    fn load(&self, name: &str) -> BoxFuture<'static, io::Result<Vec<u8>>> {
        if let Err(e) = check_name(name) {
            return futures::future::ready(Err(e)).boxed();
        }
        let path = self.root.join(name);
        async move { tokio::fs::read(&path).await }.boxed()
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// In-process source holding encoded files in memory.
///
/// Supports injected failures and latency, which the query engine tests use to
/// exercise degraded results and stale-query cancellation.
#[derive(Debug, Default)]
pub struct MemorySource {
    files: HashMap<String, Arc<[u8]>>,
    delays: HashMap<String, Duration>,
    failing: Mutex<HashSet<String>>,
    loads: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source serving the manifest and every shard of an encoded index.
    pub fn from_index(index: &EncodedIndex) -> Result<Self, BuildError> {
        let mut source = Self::new().with_file(MANIFEST_FILE, index.manifest_bytes()?);
        for (name, bytes) in &index.files {
            source = source.with_file(name, bytes.clone());
        }
        Ok(source)
    }

    pub fn with_file(mut self, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.files.insert(name.into(), Arc::from(bytes));
        self
    }

    /// Delays every load of `name` by `delay`.
    pub fn with_delay(mut self, name: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(name.into(), delay);
        self
    }

    /// Makes loads of `name` fail until [`Self::heal`] is called.
    pub fn fail(&self, name: impl Into<String>) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into());
    }

    pub fn heal(&self, name: &str) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }

    /// Number of loads started so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ShardSource for MemorySource {
    fn load(&self, name: &str) -> BoxFuture<'static, io::Result<Vec<u8>>> {
        self.loads.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name);
        let result = if failing {
            Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("injected failure for '{}'", name),
            ))
        } else {
            self.files
                .get(name)
                .map(|bytes| bytes.to_vec())
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, name.to_string()))
        };
        let delay = self.delays.get(name).copied();

        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            result
        }
        .boxed()
    }

    fn describe(&self) -> String {
        format!("memory ({} files)", self.files.len())
    }
}
