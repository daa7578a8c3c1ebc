//! # HIS Node
//!
//! Reference-data node for the clinical client.
//!
//! This crate provides [`ReferenceDataNode`], which ties together:
//! - Storage layer (redb-backed region cache)
//! - Sync layer (cache-first region loading, session dictionaries)
//! - Selector layer (cascading region pickers, code lookup fields)
//!
//! ## Example
//!
//! ```rust,ignore
//! use his_node::{NodeConfig, ReferenceDataNode};
//! use his_selectors::MatcherConfig;
//!
//! let node = ReferenceDataNode::open(NodeConfig::from_env())?;
//! node.start().await?;
//!
//! let region = node.region_selector(true, false).await?;
//! region.select(0, "110000").await?;
//!
//! let ethnicity = node.lookup_field(MatcherConfig::ethnicity());
//! ethnicity.input("汉族");
//! ethnicity.blur().await;
//! ```

pub mod cli;
mod config;
mod error;

pub use config::{
    DEFAULT_ETHNICITY_URL, DEFAULT_NATIONALITY_URL, DEFAULT_REGIONS_ENDPOINT, DictionaryLocation,
    ENV_DATA_DIR, ENV_ETHNICITY_URL, ENV_LOG_LEVEL, ENV_NATIONALITY_URL, ENV_REGIONS_ENDPOINT,
    NodeConfig,
};
pub use error::{NodeError, NodeResult};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use his_core::{DictionarySource, ReferenceNode, RegionSource};
use his_selectors::{CascadeConfig, CascadingSelectionController, LookupField, MatcherConfig};
use his_storage::{RedbReferenceStore, ReferenceRepository, ReferenceStore};
use his_sync::{
    DictionaryCache, FileDictionarySource, HttpDictionarySource, HttpRegionSource, SeedOutcome,
    SyncCoordinator, SyncStats,
};

/// Point-in-time view of the node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStats {
    /// Nodes in the local cache
    pub cached_nodes: usize,
    /// Coordinator counters since open
    pub sync: SyncStats,
}

/// One reference-data session: a store, its coordinator and dictionaries
///
/// The store is opened once here and shared by every selector the node
/// hands out.
pub struct ReferenceDataNode {
    config: NodeConfig,
    repository: ReferenceRepository,
    coordinator: SyncCoordinator,
    dictionaries: Arc<DictionaryCache>,
    started: AtomicBool,
}

impl ReferenceDataNode {
    /// Open the redb cache under the configured data directory and wire the
    /// HTTP sources
    #[instrument(skip(config), fields(data_dir = %config.data_dir.display()))]
    pub fn open(config: NodeConfig) -> NodeResult<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir)?;

        let store = Arc::new(RedbReferenceStore::open(config.storage.clone())?);
        let regions = Arc::new(HttpRegionSource::new(config.regions_endpoint.clone()));
        let dictionaries: Arc<dyn DictionarySource> = match &config.dictionaries {
            DictionaryLocation::Http {
                ethnicity_url,
                nationality_url,
            } => Arc::new(
                HttpDictionarySource::new()
                    .with_ethnicity_url(ethnicity_url.clone())
                    .with_nationality_url(nationality_url.clone()),
            ),
            DictionaryLocation::Files {
                ethnicity_path,
                nationality_path,
            } => Arc::new(
                FileDictionarySource::new()
                    .with_ethnicity_path(ethnicity_path.clone())
                    .with_nationality_path(nationality_path.clone()),
            ),
        };

        Self::with_parts(config, store, regions, dictionaries)
    }

    /// Assemble a node from explicit parts
    pub fn with_parts(
        config: NodeConfig,
        store: Arc<dyn ReferenceStore>,
        regions: Arc<dyn RegionSource>,
        dictionaries: Arc<dyn DictionarySource>,
    ) -> NodeResult<Self> {
        config.validate()?;

        let repository = ReferenceRepository::new(store);
        let coordinator = SyncCoordinator::new(repository.clone(), regions);
        info!(endpoint = %config.regions_endpoint, "Reference-data node created");

        Ok(Self {
            config,
            repository,
            coordinator,
            dictionaries: Arc::new(DictionaryCache::new(dictionaries)),
            started: AtomicBool::new(false),
        })
    }

    /// Seed the root level if the cache is empty
    ///
    /// Safe to call on every application start; a failed seed is retried by
    /// the next root load.
    pub async fn start(&self) -> NodeResult<SeedOutcome> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(NodeError::AlreadyStarted);
        }

        let outcome = self.coordinator.ensure_seed().await?;
        info!(?outcome, "Node started");
        Ok(outcome)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn repository(&self) -> &ReferenceRepository {
        &self.repository
    }

    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    pub fn dictionaries(&self) -> &Arc<DictionaryCache> {
        &self.dictionaries
    }

    /// A province/city(/county) picker with its first level loaded
    pub async fn region_selector(
        &self,
        show_county: bool,
        required: bool,
    ) -> NodeResult<CascadingSelectionController> {
        let controller = CascadingSelectionController::new(
            CascadeConfig::region(show_county).required(required),
            Arc::new(self.coordinator.clone()),
        )?;
        controller.init().await?;
        Ok(controller)
    }

    /// A type-ahead field over one of the session dictionaries
    pub fn lookup_field(&self, config: MatcherConfig) -> LookupField {
        LookupField::new(self.dictionaries.clone(), config)
    }

    /// Name-prefix search over the cache, defaulting to the configured limit
    pub async fn search(&self, text: &str, limit: Option<usize>) -> NodeResult<Vec<ReferenceNode>> {
        let limit = limit.unwrap_or(self.config.search_limit);
        Ok(self.repository.search_by_prefix(text, limit).await?)
    }

    pub async fn stats(&self) -> NodeResult<NodeStats> {
        Ok(NodeStats {
            cached_nodes: self.repository.count().await?,
            sync: self.coordinator.stats(),
        })
    }
}

impl std::fmt::Debug for ReferenceDataNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceDataNode")
            .field("config", &self.config)
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use his_core::{MockDictionarySource, MockRegionSource, RegionRecord};
    use his_storage::InMemoryReferenceStore;

    fn test_node() -> ReferenceDataNode {
        let regions = Arc::new(MockRegionSource::new());
        regions.set_roots(vec![RegionRecord::new("110000", "北京市")]);
        ReferenceDataNode::with_parts(
            NodeConfig::default(),
            Arc::new(InMemoryReferenceStore::new()),
            regions,
            Arc::new(MockDictionarySource::new()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_node_lifecycle() {
        let node = test_node();
        assert!(!node.is_started());

        assert_eq!(node.start().await.unwrap(), SeedOutcome::Seeded(1));
        assert!(node.is_started());

        assert!(matches!(node.start().await, Err(NodeError::AlreadyStarted)));
    }

    #[tokio::test]
    async fn test_search_uses_configured_limit() {
        let node = test_node();
        node.start().await.unwrap();

        assert_eq!(node.search("北京", None).await.unwrap().len(), 1);
        assert!(node.search("北京", Some(0)).await.unwrap().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = ReferenceDataNode::with_parts(
            NodeConfig::default().with_search_limit(0),
            Arc::new(InMemoryReferenceStore::new()),
            Arc::new(MockRegionSource::new()),
            Arc::new(MockDictionarySource::new()),
        );
        assert!(matches!(result, Err(NodeError::Config(_))));
    }
}
