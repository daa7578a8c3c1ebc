//! Region repository
//!
//! Typed query façade over a shared [`ReferenceStore`], speaking the
//! vocabulary of the region pickers.

use std::sync::Arc;

use tracing::debug;

use his_core::{ROOT_PARENT, ReferenceNode};

use crate::ReferenceStore;
use crate::error::StorageError;

/// Default number of hits returned by a name search
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// Repository for region nodes
///
/// Cloning is cheap; all clones share the same store.
#[derive(Clone)]
pub struct ReferenceRepository {
    store: Arc<dyn ReferenceStore>,
}

impl ReferenceRepository {
    /// Create a repository over a shared store
    pub fn new(store: Arc<dyn ReferenceStore>) -> Self {
        Self { store }
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<dyn ReferenceStore> {
        &self.store
    }

    /// All provinces (nodes with an empty parent code)
    pub async fn get_provinces(&self) -> Result<Vec<ReferenceNode>, StorageError> {
        self.store.query_roots().await
    }

    /// Direct children of `parent_code`
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidArgument`] for an empty code so callers
    /// can tell a bad request apart from "no children". Use
    /// [`get_provinces`](Self::get_provinces) for the top level.
    pub async fn get_children(&self, parent_code: &str) -> Result<Vec<ReferenceNode>, StorageError> {
        if parent_code.trim().is_empty() {
            return Err(StorageError::invalid_argument("parent code is required"));
        }
        self.store.query_by_parent(parent_code).await
    }

    /// Whether any node has been cached yet
    pub async fn is_seeded(&self) -> Result<bool, StorageError> {
        Ok(self.store.count().await? > 0)
    }

    /// Number of cached nodes
    pub async fn count(&self) -> Result<usize, StorageError> {
        self.store.count().await
    }

    /// Name-prefix search with the default limit
    pub async fn search(&self, text: &str) -> Result<Vec<ReferenceNode>, StorageError> {
        self.search_by_prefix(text, DEFAULT_SEARCH_LIMIT).await
    }

    /// Up to `limit` nodes whose name starts with `text`
    pub async fn search_by_prefix(
        &self,
        text: &str,
        limit: usize,
    ) -> Result<Vec<ReferenceNode>, StorageError> {
        self.store.query_by_name_prefix(text, limit).await
    }

    /// Nodes written at or after `since_millis`
    pub async fn updated_since(&self, since_millis: i64) -> Result<Vec<ReferenceNode>, StorageError> {
        self.store.query_updated_since(since_millis).await
    }

    /// Bulk insert or refresh a fetched level
    ///
    /// A whitespace-only parent code is normalized to the root marker.
    pub async fn upsert_regions(&self, nodes: Vec<ReferenceNode>) -> Result<(), StorageError> {
        let nodes: Vec<_> = nodes
            .into_iter()
            .map(|mut node| {
                if node.parent_code.trim().is_empty() {
                    node.parent_code = ROOT_PARENT.to_string();
                }
                node
            })
            .collect();

        let count = nodes.len();
        self.store.upsert_many(nodes).await?;
        debug!(count, "Upserted regions");
        Ok(())
    }
}

impl std::fmt::Debug for ReferenceRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceRepository").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryReferenceStore;

    fn create_test_repository() -> ReferenceRepository {
        ReferenceRepository::new(Arc::new(InMemoryReferenceStore::new()))
    }

    #[tokio::test]
    async fn test_get_children_requires_parent() {
        let repo = create_test_repository();

        let err = repo.get_children("").await.unwrap_err();
        assert!(err.is_invalid_argument());

        let err = repo.get_children("   ").await.unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[tokio::test]
    async fn test_provinces_only_returns_roots() {
        let repo = create_test_repository();
        repo.upsert_regions(vec![
            ReferenceNode::new("110000", "北京市"),
            ReferenceNode::new("110100", "市辖区").with_parent("110000"),
            ReferenceNode::new("310000", "上海市"),
        ])
        .await
        .unwrap();

        let provinces = repo.get_provinces().await.unwrap();
        assert_eq!(provinces.len(), 2);
        assert!(provinces.iter().all(|p| p.parent_code.is_empty()));
    }

    #[tokio::test]
    async fn test_is_seeded() {
        let repo = create_test_repository();
        assert!(!repo.is_seeded().await.unwrap());

        repo.upsert_regions(vec![ReferenceNode::new("110000", "北京市")])
            .await
            .unwrap();
        assert!(repo.is_seeded().await.unwrap());
    }

    #[tokio::test]
    async fn test_blank_parent_normalized_to_root() {
        let repo = create_test_repository();
        repo.upsert_regions(vec![ReferenceNode::new("110000", "北京市").with_parent("  ")])
            .await
            .unwrap();

        assert_eq!(repo.get_provinces().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_search_default_limit() {
        let repo = create_test_repository();
        let nodes = (0..30)
            .map(|i| ReferenceNode::new(format!("{:06}", 110101 + i), format!("测试区{i:02}")))
            .collect();
        repo.upsert_regions(nodes).await.unwrap();

        assert_eq!(repo.search("测试").await.unwrap().len(), DEFAULT_SEARCH_LIMIT);
        assert_eq!(repo.search_by_prefix("测试区0", 50).await.unwrap().len(), 10);
    }
}
