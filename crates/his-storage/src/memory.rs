//! In-memory storage implementation
//!
//! This module provides an in-memory implementation of [`ReferenceStore`],
//! suitable for testing and for sessions that do not need persistence.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::trace;

use his_core::ReferenceNode;

use crate::error::StorageError;
use crate::{ReferenceStore, validate_key, validate_node};

/// In-memory implementation of ReferenceStore
///
/// Nodes live in a `BTreeMap` keyed by code, so parent queries come back in
/// the same code order as the persistent store.
#[derive(Debug, Default)]
pub struct InMemoryReferenceStore {
    nodes: RwLock<BTreeMap<String, ReferenceNode>>,
}

impl InMemoryReferenceStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReferenceStore for InMemoryReferenceStore {
    async fn upsert_many(&self, nodes: Vec<ReferenceNode>) -> Result<(), StorageError> {
        for node in &nodes {
            validate_node(node)?;
        }

        let mut map = self.nodes.write().await;
        for node in nodes {
            trace!(code = %node.code, parent = %node.parent_code, "Upserting node");
            map.insert(node.code.clone(), node);
        }
        Ok(())
    }

    async fn query_by_parent(&self, parent_code: &str) -> Result<Vec<ReferenceNode>, StorageError> {
        validate_key("parent code", parent_code)?;
        let map = self.nodes.read().await;
        Ok(map
            .values()
            .filter(|n| n.parent_code == parent_code)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<usize, StorageError> {
        Ok(self.nodes.read().await.len())
    }

    async fn query_by_name_prefix(
        &self,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<ReferenceNode>, StorageError> {
        validate_key("name prefix", prefix)?;
        let map = self.nodes.read().await;
        let mut hits: Vec<_> = map
            .values()
            .filter(|n| n.name.starts_with(prefix))
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.code.cmp(&b.code)));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn query_updated_since(
        &self,
        since_millis: i64,
    ) -> Result<Vec<ReferenceNode>, StorageError> {
        let map = self.nodes.read().await;
        let mut hits: Vec<_> = map
            .values()
            .filter(|n| n.updated_at_millis.max(0) >= since_millis.max(0))
            .cloned()
            .collect();
        hits.sort_by(|a, b| {
            a.updated_at_millis
                .cmp(&b.updated_at_millis)
                .then_with(|| a.code.cmp(&b.code))
        });
        Ok(hits)
    }
}
