//! Incremental query evaluation over a [`ShardStore`].
//!
//! A [`QueryEngine`] evaluates one query at a time against the shared store. A
//! [`SearchSession`] wraps it for keystroke-driven use: each new query supersedes
//! the previous one, and only the latest query ever publishes a result set.

use super::query::Query;
use super::result::{RankedEntry, ResultSet};
use super::scoring;
use crate::error::{QueryError, StaleQueryDiscarded, StoreError};
use crate::store::ShardStore;
use crate::types::Shard;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Default cap on the number of entries in one result set.
pub const DEFAULT_RESULT_LIMIT: usize = 50;

#[derive(Debug, Clone)]
pub struct QueryEngine {
    store: ShardStore,
    limit: usize,
    fetch_deadline: Option<Duration>,
}

impl QueryEngine {
    pub fn new(store: ShardStore) -> Self {
        Self {
            store,
            limit: DEFAULT_RESULT_LIMIT,
            fetch_deadline: None,
        }
    }

    /// Caps result sets at `limit` entries (at least one).
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Treats shards that take longer than `deadline` to load as unavailable.
    pub fn with_fetch_deadline(mut self, deadline: Duration) -> Self {
        self.fetch_deadline = Some(deadline);
        self
    }

    pub fn store(&self) -> &ShardStore {
        &self.store
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Starts a new keystroke session over this engine.
    pub fn session(&self) -> SearchSession {
        SearchSession::new(self.clone())
    }

    /// Evaluates `text` once, with no supersession.
    pub async fn search(&self, text: &str) -> Result<ResultSet, QueryError> {
        self.evaluate(&Query::parse(text)).await
    }

    /// Evaluates a parsed query.
    ///
    /// Fails only if every shard covering the query is unavailable; if some load,
    /// the result set lists the failed shards in `unavailable`.
    pub async fn evaluate(&self, query: &Query) -> Result<ResultSet, QueryError> {
        let Some(first) = query.first_token() else {
            return Ok(ResultSet::empty(query.text()));
        };

        let shard_ids = self.store.resolve(first);
        tracing::debug!("Query '{}' resolved to shards {:?}", query.text(), shard_ids);

        let fetches = shard_ids.iter().map(|id| self.fetch(id));
        let mut shards = Vec::with_capacity(shard_ids.len());
        let mut failures = Vec::new();
        for result in futures::future::join_all(fetches).await {
            match result {
                Ok(shard) => shards.push(shard),
                Err(e) => failures.push(e),
            }
        }

        if shards.is_empty() && !failures.is_empty() {
            return Err(QueryError::Unavailable { failures });
        }
        for failure in &failures {
            tracing::warn!("Degraded result for '{}': {}", query.text(), failure);
        }

        let unavailable = failures
            .iter()
            .map(|failure| failure.shard_id().to_string())
            .collect();
        Ok(self.collect(query, &shards, unavailable))
    }

    async fn fetch(&self, shard_id: &str) -> Result<Arc<Shard>, StoreError> {
        match self.fetch_deadline {
            Some(deadline) => self.store.fetch_with_deadline(shard_id, deadline).await,
            None => self.store.fetch(shard_id).await,
        }
    }

    /// Matches, ranks, caps and groups entries from the fetched shards.
    fn collect(&self, query: &Query, shards: &[Arc<Shard>], unavailable: Vec<String>) -> ResultSet {
        let Some(first) = query.first_token() else {
            return ResultSet::empty(query.text());
        };

        let mut candidates: Vec<RankedEntry> = shards
            .iter()
            .flat_map(|shard| {
                shard
                    .prefix_range(first)
                    .iter()
                    .filter_map(|entry| {
                        scoring::classify(entry, query)
                            .map(|kind| RankedEntry::new(entry, kind, &shard.shard_id))
                    })
            })
            .collect();

        scoring::rank(&mut candidates);
        let truncated = candidates.len() > self.limit;
        candidates.truncate(self.limit);

        ResultSet {
            query: query.text().to_string(),
            groups: scoring::group(candidates, self.store.manifest()),
            truncated,
            unavailable,
        }
    }
}

/// Lifecycle of a session's latest query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No query issued yet.
    Idle,
    /// The latest query is waiting on shards.
    Matching,
    /// The latest query published its result.
    Settled,
    /// The latest query was cancelled without a successor.
    Cancelled,
}

/// A published outcome, tagged with the generation that produced it.
#[derive(Debug, Clone)]
pub struct Published {
    pub generation: u64,
    pub outcome: Result<ResultSet, QueryError>,
}

struct SessionState {
    generation: u64,
    token: CancellationToken,
    phase: Phase,
}

/// Keystroke-driven search where each query supersedes the previous one.
///
/// Result sets are published to a watch channel in generation order. A superseded
/// query is cancelled, returns [`QueryError::Stale`], and never publishes, so
/// subscribers never see an older result replace a newer one.
pub struct SearchSession {
    engine: QueryEngine,
    state: Mutex<SessionState>,
    published: watch::Sender<Published>,
}

impl std::fmt::Debug for SearchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchSession")
            .field("generation", &self.generation())
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl SearchSession {
    pub fn new(engine: QueryEngine) -> Self {
        let (published, _) = watch::channel(Published {
            generation: 0,
            outcome: Ok(ResultSet::empty("")),
        });
        Self {
            engine,
            state: Mutex::new(SessionState {
                generation: 0,
                token: CancellationToken::new(),
                phase: Phase::Idle,
            }),
            published,
        }
    }

    pub fn engine(&self) -> &QueryEngine {
        &self.engine
    }

    /// Receiver for published result sets.
    pub fn subscribe(&self) -> watch::Receiver<Published> {
        self.published.subscribe()
    }

    /// Generation of the most recently issued query.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// Issues a query, superseding any in flight.
    ///
    /// Returns the result set if this query is still the latest when it finishes.
    /// Shard loads started by a superseded query keep running and fill the cache.
    pub async fn search(&self, text: &str) -> Result<ResultSet, QueryError> {
        let (generation, token) = self.begin();
        let query = Query::parse(text);
        tracing::trace!("Query {} started: '{}'", generation, text);

        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => {
                tracing::trace!("Query {} cancelled", generation);
                return Err(StaleQueryDiscarded { generation }.into());
            }
            outcome = self.engine.evaluate(&query) => outcome,
        };

        if !self.publish(generation, &outcome) {
            return Err(StaleQueryDiscarded { generation }.into());
        }
        outcome
    }

    /// Cancels the in-flight query without issuing a new one.
    pub fn cancel(&self) {
        let mut state = self.lock();
        state.generation += 1;
        state.token.cancel();
        state.phase = Phase::Cancelled;
    }

    /// Allocates the next generation and cancels its predecessor atomically.
    fn begin(&self) -> (u64, CancellationToken) {
        let mut state = self.lock();
        state.generation += 1;
        state.token.cancel();
        state.token = CancellationToken::new();
        state.phase = Phase::Matching;
        (state.generation, state.token.clone())
    }

    /// Publishes `outcome` if `generation` is still the latest and newer than what
    /// subscribers have seen. Stale outcomes are dropped.
    fn publish(&self, generation: u64, outcome: &Result<ResultSet, QueryError>) -> bool {
        self.published.send_if_modified(|slot| {
            let mut state = self.lock();
            if generation != state.generation || generation <= slot.generation {
                return false;
            }
            state.phase = Phase::Settled;
            *slot = Published {
                generation,
                outcome: outcome.clone(),
            };
            true
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{Codec, build_index};
    use crate::store::MemorySource;
    use crate::types::{Hit, SymbolRecord};
    use assert2::{check, let_assert};

    fn records(names: &[&str]) -> Vec<SymbolRecord> {
        names
            .iter()
            .map(|name| SymbolRecord::from_name(*name, vec![Hit::new(format!("#{name}"))]))
            .collect()
    }

    async fn engine(names: &[&str], shard_size: usize) -> QueryEngine {
        let index = build_index(records(names), shard_size, Codec::Json).unwrap();
        let source = Arc::new(MemorySource::from_index(&index).unwrap());
        QueryEngine::new(ShardStore::open(source).await.unwrap())
    }

    fn names(set: &ResultSet) -> Vec<&str> {
        set.entries().map(|entry| entry.display_name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_prefix_query() {
        let engine = engine(&["clear", "close", "compare", "cases"], 2).await;
        let set = engine.search("cl").await.unwrap();
        check!(names(&set) == ["clear", "close"]);
        check!(!set.truncated);
        check!(!set.is_degraded());
    }

    #[tokio::test]
    async fn test_empty_query_fetches_nothing() {
        let engine = engine(&["clear", "close"], 1).await;
        let set = engine.search("   ").await.unwrap();
        check!(set.is_empty());
        check!(engine.store().cached_count().await == 0);
    }

    #[tokio::test]
    async fn test_no_match() {
        let engine = engine(&["clear", "close"], 1).await;
        check!(engine.search("zebra").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_truncation() {
        let engine = engine(&["ca", "cab", "cabin", "cable", "cache"], 2)
            .await
            .with_limit(3);
        let set = engine.search("ca").await.unwrap();
        check!(set.len() == 3);
        check!(set.truncated);
        check!(names(&set) == ["ca", "cab", "cabin"]);
    }

    #[tokio::test]
    async fn test_session_publishes_latest() {
        let session = engine(&["clear", "close"], 1).await.session();
        let mut results = session.subscribe();
        check!(session.phase() == Phase::Idle);

        let set = session.search("clo").await.unwrap();
        check!(names(&set) == ["close"]);
        check!(session.phase() == Phase::Settled);

        check!(results.has_changed().unwrap());
        let published = results.borrow_and_update().clone();
        check!(published.generation == 1);
        let_assert!(Ok(published) = published.outcome);
        check!(published == set);
    }

    #[tokio::test]
    async fn test_superseded_query_is_discarded() {
        let index = build_index(records(&["cases", "catch", "clear", "close"]), 2, Codec::Json).unwrap();
        // "c" needs both shards; "ca" only the first, which is fast
        let slow = index.manifest.buckets[1].file.clone();
        let source = MemorySource::from_index(&index).unwrap().with_delay(slow, Duration::from_millis(200));
        let store = ShardStore::open(Arc::new(source)).await.unwrap();
        let session = QueryEngine::new(store).session();
        let results = session.subscribe();

        let (first, second) = tokio::join!(session.search("c"), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            session.search("ca").await
        });

        let_assert!(Err(QueryError::Stale(StaleQueryDiscarded { generation: 1 })) = first);
        let_assert!(Ok(second) = second);
        check!(names(&second) == ["cases", "catch"]);

        let published = results.borrow().clone();
        check!(published.generation == 2);
        let_assert!(Ok(published) = published.outcome);
        check!(names(&published) == ["cases", "catch"]);
    }

    #[tokio::test]
    async fn test_cancel() {
        let index = build_index(records(&["clear", "close"]), 1, Codec::Json).unwrap();
        let slow = index.manifest.buckets[0].file.clone();
        let source = MemorySource::from_index(&index).unwrap().with_delay(slow, Duration::from_millis(200));
        let store = ShardStore::open(Arc::new(source)).await.unwrap();
        let session = QueryEngine::new(store).session();

        let (result, ()) = tokio::join!(session.search("cl"), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            session.cancel();
        });
        let_assert!(Err(e) = result);
        check!(e.is_stale());
        check!(session.phase() == Phase::Cancelled);
        check!(session.subscribe().borrow().generation == 0);
    }

    #[tokio::test]
    async fn test_degraded_and_unavailable() {
        let index = build_index(records(&["cases", "catch", "clear", "close"]), 2, Codec::Json).unwrap();
        let second_file = index.manifest.buckets[1].file.clone();
        let source = Arc::new(MemorySource::from_index(&index).unwrap());
        let engine = QueryEngine::new(ShardStore::open(source.clone()).await.unwrap());
        source.fail(second_file.clone());

        // One of two shards fails: partial result naming the failed shard
        let set = engine.search("c").await.unwrap();
        check!(names(&set) == ["cases", "catch"]);
        check!(set.unavailable == ["1"]);

        // The only covering shard fails: no result set at all
        let_assert!(Err(QueryError::Unavailable { failures }) = engine.search("cl").await);
        check!(failures.len() == 1);
        check!(failures[0].shard_id() == "1");

        source.heal(&second_file);
        check!(names(&engine.search("cl").await.unwrap()) == ["clear", "close"]);
    }

    #[tokio::test]
    async fn test_fetch_deadline_degrades() {
        let index = build_index(records(&["cases", "clear"]), 1, Codec::Json).unwrap();
        let slow = index.manifest.buckets[1].file.clone();
        let source = MemorySource::from_index(&index).unwrap().with_delay(slow, Duration::from_secs(2));
        let store = ShardStore::open(Arc::new(source)).await.unwrap();
        let engine = QueryEngine::new(store).with_fetch_deadline(Duration::from_millis(100));

        let set = engine.search("c").await.unwrap();
        check!(names(&set) == ["cases"]);
        check!(set.unavailable == ["1"]);
    }
}
