//! Remote source abstractions
//!
//! The [`RegionSource`] and [`DictionarySource`] traits let the sync layer work
//! against the real HTTP backend or an in-memory mock.
//!
//! ## Implementations
//!
//! - [`MockRegionSource`](crate::MockRegionSource) / [`MockDictionarySource`](crate::MockDictionarySource):
//!   in-memory sources for testing (in this crate)
//! - `HttpRegionSource`, `HttpDictionarySource`, `FileDictionarySource`: real
//!   sources (in the his-sync crate)

use async_trait::async_trait;

use crate::dictionary::{DictionaryKind, DictionaryRecord};
use crate::error::SourceError;
use crate::node::RegionRecord;

/// Read-only remote source of administrative regions
///
/// The parent code is the only partitioning key passed to the remote.
#[async_trait]
pub trait RegionSource: Send + Sync {
    /// Fetch the top level of the tree (provinces)
    async fn fetch_roots(&self) -> Result<Vec<RegionRecord>, SourceError>;

    /// Fetch the direct children of `parent_code`
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-2xx response.
    async fn fetch_children(&self, parent_code: &str) -> Result<Vec<RegionRecord>, SourceError>;
}

/// Remote source of flat code lists, fetched whole
#[async_trait]
pub trait DictionarySource: Send + Sync {
    async fn fetch_dictionary(
        &self,
        kind: DictionaryKind,
    ) -> Result<Vec<DictionaryRecord>, SourceError>;
}
