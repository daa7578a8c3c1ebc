//! Cache-first region loading
//!
//! The [`SyncCoordinator`] sits between the region pickers and the remote
//! endpoint. Every parent is fetched remotely at most once; afterwards its
//! children are served from the local store.
//!
//! ## Share-on-inflight
//!
//! Concurrent loads for the same parent await one shared future. The entry is
//! removed when the fetch completes, and the fetch re-checks the store before
//! going remote, so a caller that arrives just after completion is served
//! from cache.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use his_core::{PROVINCE_LEVEL, ROOT_PARENT, ReferenceNode, RegionRecord, RegionSource};
use his_storage::ReferenceRepository;

use crate::error::{SyncError, SyncResult};

type SharedLoad = Shared<BoxFuture<'static, SyncResult<Vec<ReferenceNode>>>>;
type SharedSeed = Shared<BoxFuture<'static, SyncResult<SeedOutcome>>>;

/// Result of [`SyncCoordinator::ensure_seed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeedOutcome {
    /// The store already held data; nothing was fetched
    AlreadySeeded,
    /// The root level was fetched and this many provinces were stored
    Seeded(usize),
    /// The root fetch failed or came back empty; the store is untouched
    Skipped,
}

/// Snapshot of the coordinator's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Remote requests issued (roots and children)
    pub remote_fetches: u64,
    /// Child loads answered from the local store
    pub cache_hits: u64,
    /// Remote requests that failed and were degraded to an empty result
    pub remote_failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    remote_fetches: AtomicU64,
    cache_hits: AtomicU64,
    remote_failures: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> SyncStats {
        SyncStats {
            remote_fetches: self.remote_fetches.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            remote_failures: self.remote_failures.load(Ordering::Relaxed),
        }
    }
}

struct CoordinatorInner {
    repository: ReferenceRepository,
    source: Arc<dyn RegionSource>,
    inflight: DashMap<String, SharedLoad>,
    seed_inflight: Mutex<Option<SharedSeed>>,
    counters: Counters,
}

/// Cache-first loader for the region tree
///
/// Cloning is cheap; clones share the in-flight table and counters.
#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl SyncCoordinator {
    /// Create a coordinator over a repository and a remote source
    pub fn new(repository: ReferenceRepository, source: Arc<dyn RegionSource>) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                repository,
                source,
                inflight: DashMap::new(),
                seed_inflight: Mutex::new(None),
                counters: Counters::default(),
            }),
        }
    }

    /// The repository this coordinator writes through
    pub fn repository(&self) -> &ReferenceRepository {
        &self.inner.repository
    }

    /// Current counter values
    pub fn stats(&self) -> SyncStats {
        self.inner.counters.snapshot()
    }

    /// Number of child loads currently waiting on the remote
    pub fn inflight_count(&self) -> usize {
        self.inner.inflight.len()
    }

    /// Populate the root level once
    ///
    /// A no-op when the store already holds data. A failed or empty root
    /// fetch leaves the store untouched so a later call can retry.
    #[instrument(skip(self))]
    pub async fn ensure_seed(&self) -> SyncResult<SeedOutcome> {
        if self.inner.repository.is_seeded().await? {
            return Ok(SeedOutcome::AlreadySeeded);
        }

        let seed = {
            let mut slot = self.inner.seed_inflight.lock();
            match slot.as_ref() {
                Some(pending) => pending.clone(),
                None => {
                    let inner = self.inner.clone();
                    let pending = async move {
                        let result = inner.seed().await;
                        *inner.seed_inflight.lock() = None;
                        result
                    }
                    .boxed()
                    .shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };

        seed.await
    }

    /// Provinces, seeding first if the store is empty
    pub async fn load_roots(&self) -> SyncResult<Vec<ReferenceNode>> {
        self.ensure_seed().await?;
        Ok(self.inner.repository.get_provinces().await?)
    }

    /// Direct children of `parent_code`, from cache or the remote
    ///
    /// Remote failures are logged and degrade to an empty list.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidArgument`] for an empty code, or a storage error.
    #[instrument(skip(self))]
    pub async fn load_children(&self, parent_code: &str) -> SyncResult<Vec<ReferenceNode>> {
        let parent = parent_code.trim();
        if parent.is_empty() {
            return Err(SyncError::invalid_argument("parent code is required"));
        }

        let local = self.inner.repository.get_children(parent).await?;
        if !local.is_empty() {
            self.inner.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!(count = local.len(), "Serving children from cache");
            return Ok(local);
        }

        let load = match self.inner.inflight.entry(parent.to_string()) {
            Entry::Occupied(entry) => {
                debug!("Joining in-flight load");
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                let inner = self.inner.clone();
                let key = parent.to_string();
                let load = async move {
                    let result = inner.fetch_children(&key).await;
                    inner.inflight.remove(&key);
                    result
                }
                .boxed()
                .shared();
                entry.insert(load.clone());
                load
            }
        };

        load.await
    }
}

impl CoordinatorInner {
    async fn seed(&self) -> SyncResult<SeedOutcome> {
        if self.repository.is_seeded().await? {
            return Ok(SeedOutcome::AlreadySeeded);
        }

        self.counters.remote_fetches.fetch_add(1, Ordering::Relaxed);
        let records = match self.source.fetch_roots().await {
            Ok(records) => records,
            Err(e) => {
                self.counters.remote_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Root fetch failed, seed skipped");
                return Ok(SeedOutcome::Skipped);
            }
        };

        let nodes = normalize(records, ROOT_PARENT, Some(PROVINCE_LEVEL));
        if nodes.is_empty() {
            warn!("Remote returned no provinces, seed skipped");
            return Ok(SeedOutcome::Skipped);
        }

        let count = nodes.len();
        self.repository.upsert_regions(nodes).await?;
        info!(count, "Seeded provinces");
        Ok(SeedOutcome::Seeded(count))
    }

    async fn fetch_children(&self, parent: &str) -> SyncResult<Vec<ReferenceNode>> {
        let local = self.repository.get_children(parent).await?;
        if !local.is_empty() {
            return Ok(local);
        }

        self.counters.remote_fetches.fetch_add(1, Ordering::Relaxed);
        let records = match self.source.fetch_children(parent).await {
            Ok(records) => records,
            Err(e) => {
                self.counters.remote_failures.fetch_add(1, Ordering::Relaxed);
                warn!(parent, error = %e, "Child fetch failed, serving empty result");
                return Ok(Vec::new());
            }
        };

        let nodes = normalize(records, parent, None);
        if nodes.is_empty() {
            debug!(parent, "Remote reports no children");
            return Ok(nodes);
        }

        self.repository.upsert_regions(nodes.clone()).await?;
        debug!(parent, count = nodes.len(), "Cached fetched children");
        Ok(nodes)
    }
}

/// Turn a fetched batch into nodes under `parent`, ordered by code
///
/// Records without a code are dropped. A code repeated in one batch keeps its
/// last occurrence.
fn normalize(
    records: Vec<RegionRecord>,
    parent: &str,
    default_level: Option<&str>,
) -> Vec<ReferenceNode> {
    let fetched_at = chrono::Utc::now().timestamp_millis();
    let mut by_code = BTreeMap::new();

    for record in records {
        let mut node = record.into_node(parent, fetched_at);
        if node.code.is_empty() {
            warn!(parent, name = %node.name, "Dropping region record without code");
            continue;
        }
        if node.level.is_none()
            && let Some(level) = default_level
        {
            node.level = Some(level.to_string());
        }
        by_code.insert(node.code.clone(), node);
    }

    by_code.into_values().collect()
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("inflight", &self.inner.inflight.len())
            .field("stats", &self.stats())
            .finish()
    }
}
