//! Session-scoped dictionary cache
//!
//! Flat code lists are small and change rarely. Each list is fetched at most
//! once per [`DictionaryCache`] and never persisted.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{info, warn};

use his_core::{CodeLookupEntry, DictionaryKind, DictionaryRecord, DictionarySource, SourceError};

/// Shared, immutable view of one loaded list
pub type DictionaryList = Arc<[CodeLookupEntry]>;

/// Lazily loaded ethnicity and nationality lists
pub struct DictionaryCache {
    source: Arc<dyn DictionarySource>,
    ethnicity: OnceCell<DictionaryList>,
    nationality: OnceCell<DictionaryList>,
}

impl DictionaryCache {
    pub fn new(source: Arc<dyn DictionarySource>) -> Self {
        Self {
            source,
            ethnicity: OnceCell::new(),
            nationality: OnceCell::new(),
        }
    }

    fn cell(&self, kind: DictionaryKind) -> &OnceCell<DictionaryList> {
        match kind {
            DictionaryKind::Ethnicity => &self.ethnicity,
            DictionaryKind::Nationality => &self.nationality,
        }
    }

    /// The list for `kind`, loading it on first use
    ///
    /// A failed load yields an empty list and is not cached, so the next call
    /// tries again. Concurrent first calls share one load.
    pub async fn get(&self, kind: DictionaryKind) -> DictionaryList {
        match self.cell(kind).get_or_try_init(|| self.load(kind)).await {
            Ok(list) => list.clone(),
            Err(e) => {
                warn!(%kind, error = %e, "Dictionary load failed, using empty list");
                Arc::from(Vec::new())
            }
        }
    }

    /// Whether `kind` has been loaded successfully
    pub fn is_loaded(&self, kind: DictionaryKind) -> bool {
        self.cell(kind).initialized()
    }

    async fn load(&self, kind: DictionaryKind) -> Result<DictionaryList, SourceError> {
        let records = self.source.fetch_dictionary(kind).await?;
        let list: DictionaryList = records
            .into_iter()
            .filter(|r| !r.code.trim().is_empty())
            .map(DictionaryRecord::into_entry)
            .collect();
        info!(%kind, count = list.len(), "Loaded dictionary");
        Ok(list)
    }
}

impl std::fmt::Debug for DictionaryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DictionaryCache")
            .field("ethnicity_loaded", &self.ethnicity.initialized())
            .field("nationality_loaded", &self.nationality.initialized())
            .finish()
    }
}
