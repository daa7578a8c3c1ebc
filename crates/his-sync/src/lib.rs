//! # HIS Sync
//!
//! Cache-first synchronization of reference data from the hospital backend.
//!
//! ## Components
//!
//! - [`SyncCoordinator`]: loads the region tree level by level, fetching each
//!   parent remotely at most once and sharing concurrent loads
//! - [`DictionaryCache`]: loads flat code lists once per session
//! - [`HttpRegionSource`], [`HttpDictionarySource`], [`FileDictionarySource`]:
//!   real remote sources
//!
//! ## Failure model
//!
//! Remote failures never reach callers. A failed child fetch yields an empty
//! list, a failed seed leaves the store untouched, and a failed dictionary load
//! yields an empty list; each is logged at `warn`. Invalid arguments and
//! storage failures are returned as [`SyncError`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use his_sync::{HttpRegionSource, SyncCoordinator};
//!
//! let source = Arc::new(HttpRegionSource::new("http://his.local/api/regions"));
//! let coordinator = SyncCoordinator::new(repository, source);
//!
//! coordinator.ensure_seed().await?;
//! let cities = coordinator.load_children("110000").await?;
//! ```

pub mod coordinator;
pub mod dictionary;
pub mod error;
pub mod http;

pub use coordinator::{SeedOutcome, SyncCoordinator, SyncStats};
pub use dictionary::{DictionaryCache, DictionaryList};
pub use error::{SyncError, SyncResult};
pub use http::{FileDictionarySource, HttpDictionarySource, HttpRegionSource, PARENT_CODE_PARAM};
