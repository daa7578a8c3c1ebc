//! # HIS Storage
//!
//! Local-first storage for the hierarchical reference dataset.
//!
//! This crate provides pluggable backends for the region tree behind the
//! cascading province → city → county pickers, plus a typed repository on top.
//!
//! ## Features
//!
//! - **ReferenceStore trait**: Keyed table of [`ReferenceNode`]s with indexed queries
//! - **RedbReferenceStore**: redb-backed persistent implementation for production
//! - **InMemoryReferenceStore**: In-memory implementation for tests and ephemeral sessions
//! - **ReferenceRepository**: Domain vocabulary (provinces, children, search) over a store
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use his_core::ReferenceNode;
//! use his_storage::{InMemoryReferenceStore, ReferenceRepository};
//!
//! #[tokio::main]
//! async fn main() {
//!     let repo = ReferenceRepository::new(Arc::new(InMemoryReferenceStore::new()));
//!
//!     repo.upsert_regions(vec![ReferenceNode::new("110000", "北京市")]).await.unwrap();
//!     assert!(repo.is_seeded().await.unwrap());
//!
//!     let provinces = repo.get_provinces().await.unwrap();
//!     assert_eq!(provinces.len(), 1);
//! }
//! ```

pub mod error;
pub mod memory;
pub mod persistent;
pub mod repository;
mod tables;

// Re-exports
pub use error::StorageError;
pub use memory::InMemoryReferenceStore;
pub use persistent::{RedbReferenceStore, RedbStorageConfig};
pub use repository::{DEFAULT_SEARCH_LIMIT, ReferenceRepository};

use async_trait::async_trait;
use his_core::{INDEX_SEPARATOR, ReferenceNode};

/// Persistent keyed table of reference nodes
///
/// Implementations serve every query from local state; none of them touch the
/// network. `code` is the primary key, with secondary lookups by parent code,
/// name prefix and write time.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    /// Insert or overwrite nodes by code
    ///
    /// Re-inserting an existing code replaces the stored node in place and
    /// moves its index entries; it never creates a duplicate key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidArgument`] if a node has an empty code or
    /// a key containing the index separator. No node of the batch is written
    /// in that case.
    async fn upsert_many(&self, nodes: Vec<ReferenceNode>) -> Result<(), StorageError>;

    /// All nodes whose parent is `parent_code`, ordered by code
    ///
    /// `query_by_parent("")` is the same view as [`query_roots`](Self::query_roots).
    async fn query_by_parent(&self, parent_code: &str) -> Result<Vec<ReferenceNode>, StorageError>;

    /// All root nodes, ordered by code
    async fn query_roots(&self) -> Result<Vec<ReferenceNode>, StorageError> {
        self.query_by_parent(his_core::ROOT_PARENT).await
    }

    /// Number of stored nodes
    async fn count(&self) -> Result<usize, StorageError>;

    /// Up to `limit` nodes whose name starts with `prefix`, ordered by name
    async fn query_by_name_prefix(
        &self,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<ReferenceNode>, StorageError>;

    /// Nodes written at or after `since_millis`, oldest first
    async fn query_updated_since(
        &self,
        since_millis: i64,
    ) -> Result<Vec<ReferenceNode>, StorageError>;
}

/// Reject keys that cannot be stored in the secondary indices
pub(crate) fn validate_key(kind: &str, value: &str) -> Result<(), StorageError> {
    if value.contains(INDEX_SEPARATOR) {
        return Err(StorageError::invalid_argument(format!(
            "{kind} must not contain a NUL character"
        )));
    }
    Ok(())
}

/// Validate a node before any of its batch is written
pub(crate) fn validate_node(node: &ReferenceNode) -> Result<(), StorageError> {
    if node.code.trim().is_empty() {
        return Err(StorageError::invalid_argument("node code must not be empty"));
    }
    validate_key("code", &node.code)?;
    validate_key("parent code", &node.parent_code)?;
    validate_key("name", &node.name)
}
