//! # HIS Core
//!
//! Core types, traits, and errors for the HIS reference-data layer.
//!
//! This crate provides the shared vocabulary that lets the storage, sync and
//! selector crates work against both the real HTTP backend and in-memory mocks
//! for testing.
//!
//! ## Key Traits
//!
//! - [`RegionSource`]: Remote source of administrative-region records
//! - [`DictionarySource`]: Remote source of flat code lists (ethnicity, nationality)
//!
//! ## Key Types
//!
//! - [`ReferenceNode`]: One cached node of the region tree
//! - [`RegionRecord`]: A region as delivered by the remote endpoint
//! - [`CodeLookupEntry`]: One entry of a flat code list
//! - [`MockRegionSource`]: Scriptable in-memory region source for tests

pub mod dictionary;
pub mod error;
pub mod mock_source;
pub mod node;
pub mod source;

// Re-export main types
pub use dictionary::*;
pub use error::*;
pub use mock_source::*;
pub use node::*;
pub use source::*;
