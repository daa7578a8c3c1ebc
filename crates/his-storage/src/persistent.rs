//! Persistent reference store backed by redb
//!
//! One primary table keyed by code plus three secondary index tables
//! (parent, name, write time). Every upsert rewrites a node and its index
//! entries in a single write transaction. redb calls are blocking, so each
//! operation runs on tokio's blocking pool.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableTable, ReadableTableMetadata};
use tracing::{debug, info, instrument};

use his_core::ReferenceNode;

use crate::error::StorageError;
use crate::tables::{
    REGIONS, REGIONS_BY_NAME, REGIONS_BY_PARENT, REGIONS_BY_UPDATED, millis_key, name_key,
    parent_key, parent_prefix, updated_key,
};
use crate::{ReferenceStore, validate_key, validate_node};

/// Configuration for redb storage
#[derive(Debug, Clone)]
pub struct RedbStorageConfig {
    /// Path to the database file
    pub db_path: PathBuf,
    /// Cache size in bytes
    pub cache_size: usize,
}

impl Default for RedbStorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/his.redb"),
            cache_size: 64 * 1024 * 1024, // 64MB
        }
    }
}

impl RedbStorageConfig {
    /// Configuration for a database file at `db_path`
    pub fn at(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Default::default()
        }
    }
}

/// redb-backed implementation of [`ReferenceStore`]
///
/// Cloning is cheap and shares the same database handle.
#[derive(Clone)]
pub struct RedbReferenceStore {
    db: Arc<Database>,
    config: RedbStorageConfig,
}

impl std::fmt::Debug for RedbReferenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbReferenceStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RedbReferenceStore {
    /// Open or create the database
    #[instrument(skip(config), fields(path = %config.db_path.display()))]
    pub fn open(config: RedbStorageConfig) -> Result<Self, StorageError> {
        // Ensure parent directory exists
        if let Some(parent) = config.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::builder()
            .set_cache_size(config.cache_size)
            .create(&config.db_path)
            .map_err(StorageError::database)?;

        info!("Opened reference database");

        let store = Self {
            db: Arc::new(db),
            config,
        };
        store.init_tables()?;
        Ok(store)
    }

    /// Create all tables so read transactions never see a missing table
    fn init_tables(&self) -> Result<(), StorageError> {
        let write_txn = self.db.begin_write().map_err(StorageError::database)?;

        write_txn.open_table(REGIONS).map_err(StorageError::database)?;
        write_txn
            .open_table(REGIONS_BY_PARENT)
            .map_err(StorageError::database)?;
        write_txn
            .open_table(REGIONS_BY_NAME)
            .map_err(StorageError::database)?;
        write_txn
            .open_table(REGIONS_BY_UPDATED)
            .map_err(StorageError::database)?;

        write_txn.commit().map_err(StorageError::database)?;

        debug!("Initialized reference tables");
        Ok(())
    }

    /// Get the configuration
    pub fn config(&self) -> &RedbStorageConfig {
        &self.config
    }

    /// Run a blocking database operation on the blocking pool
    async fn run<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Database) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || op(&db)).await?
    }
}

#[async_trait]
impl ReferenceStore for RedbReferenceStore {
    async fn upsert_many(&self, nodes: Vec<ReferenceNode>) -> Result<(), StorageError> {
        for node in &nodes {
            validate_node(node)?;
        }
        if nodes.is_empty() {
            return Ok(());
        }

        let count = nodes.len();
        self.run(move |db| write_nodes(db, &nodes)).await?;
        debug!(count, "Upserted reference nodes");
        Ok(())
    }

    async fn query_by_parent(&self, parent_code: &str) -> Result<Vec<ReferenceNode>, StorageError> {
        validate_key("parent code", parent_code)?;
        let prefix = parent_prefix(parent_code);
        self.run(move |db| read_indexed(db, IndexScan::Prefix(prefix), usize::MAX))
            .await
    }

    async fn count(&self) -> Result<usize, StorageError> {
        self.run(|db| {
            let read_txn = db.begin_read().map_err(StorageError::database)?;
            let primary = read_txn.open_table(REGIONS).map_err(StorageError::database)?;
            let len = primary.len().map_err(StorageError::database)?;
            Ok(len as usize)
        })
        .await
    }

    async fn query_by_name_prefix(
        &self,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<ReferenceNode>, StorageError> {
        validate_key("name prefix", prefix)?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        let prefix = prefix.to_string();
        self.run(move |db| read_indexed(db, IndexScan::Name(prefix), limit))
            .await
    }

    async fn query_updated_since(
        &self,
        since_millis: i64,
    ) -> Result<Vec<ReferenceNode>, StorageError> {
        let start = millis_key(since_millis);
        self.run(move |db| read_indexed(db, IndexScan::Since(start), usize::MAX))
            .await
    }
}

/// Which secondary index to scan and from where
enum IndexScan {
    /// Parent index, keys starting with the given prefix
    Prefix(String),
    /// Name index, keys starting with the given name prefix
    Name(String),
    /// Updated index, every key at or after the given start
    Since(String),
}

fn write_nodes(db: &Database, nodes: &[ReferenceNode]) -> Result<(), StorageError> {
    let write_txn = db.begin_write().map_err(StorageError::database)?;

    {
        let mut primary = write_txn.open_table(REGIONS).map_err(StorageError::database)?;
        let mut by_parent = write_txn
            .open_table(REGIONS_BY_PARENT)
            .map_err(StorageError::database)?;
        let mut by_name = write_txn
            .open_table(REGIONS_BY_NAME)
            .map_err(StorageError::database)?;
        let mut by_updated = write_txn
            .open_table(REGIONS_BY_UPDATED)
            .map_err(StorageError::database)?;

        for node in nodes {
            let previous: Option<ReferenceNode> =
                match primary.get(node.code.as_str()).map_err(StorageError::database)? {
                    Some(value) => Some(postcard::from_bytes(value.value())?),
                    None => None,
                };

            // Overwrite in place: drop the index entries of the old version
            if let Some(old) = previous {
                by_parent
                    .remove(parent_key(&old).as_str())
                    .map_err(StorageError::database)?;
                by_name
                    .remove(name_key(&old).as_str())
                    .map_err(StorageError::database)?;
                by_updated
                    .remove(updated_key(&old).as_str())
                    .map_err(StorageError::database)?;
            }

            let value = postcard::to_allocvec(node)
                .map_err(|e| StorageError::serialization(e.to_string()))?;
            let code = node.code.as_str();

            primary
                .insert(code, value.as_slice())
                .map_err(StorageError::database)?;
            by_parent
                .insert(parent_key(node).as_str(), code)
                .map_err(StorageError::database)?;
            by_name
                .insert(name_key(node).as_str(), code)
                .map_err(StorageError::database)?;
            by_updated
                .insert(updated_key(node).as_str(), code)
                .map_err(StorageError::database)?;
        }
    }

    write_txn.commit().map_err(StorageError::database)?;
    Ok(())
}

fn read_indexed(
    db: &Database,
    scan: IndexScan,
    limit: usize,
) -> Result<Vec<ReferenceNode>, StorageError> {
    let read_txn = db.begin_read().map_err(StorageError::database)?;

    let (definition, start, prefix) = match &scan {
        IndexScan::Prefix(prefix) => (REGIONS_BY_PARENT, prefix.as_str(), Some(prefix.as_str())),
        IndexScan::Name(prefix) => (REGIONS_BY_NAME, prefix.as_str(), Some(prefix.as_str())),
        IndexScan::Since(start) => (REGIONS_BY_UPDATED, start.as_str(), None),
    };

    let index = read_txn
        .open_table(definition)
        .map_err(StorageError::database)?;
    let mut codes = Vec::new();

    for entry in index.range(start..).map_err(StorageError::database)? {
        if codes.len() >= limit {
            break;
        }
        let (key, code) = entry.map_err(StorageError::database)?;

        // Stop when we're past the prefix
        if let Some(prefix) = prefix
            && !key.value().starts_with(prefix)
        {
            break;
        }
        codes.push(code.value().to_string());
    }

    let primary = read_txn.open_table(REGIONS).map_err(StorageError::database)?;
    let mut nodes = Vec::with_capacity(codes.len());
    for code in codes {
        if let Some(value) = primary.get(code.as_str()).map_err(StorageError::database)? {
            nodes.push(postcard::from_bytes(value.value())?);
        }
    }

    Ok(nodes)
}
