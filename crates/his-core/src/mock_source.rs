//! Mock remote sources for testing
//!
//! Provides scriptable in-memory sources for testing cache and selector logic
//! without a real backend.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use his_core::{MockRegionSource, RegionRecord, RegionSource};
//!
//! let source = MockRegionSource::new();
//! source.set_roots(vec![RegionRecord::new("110000", "北京市")]);
//! source.set_children("110000", vec![RegionRecord::new("110100", "市辖区")]);
//!
//! // Hold a response until the test releases it
//! let gate = source.hold("110000");
//! let pending = tokio::spawn(async move { source.fetch_children("110000").await });
//! gate.release();
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tokio::sync::watch;

use crate::dictionary::{DictionaryKind, DictionaryRecord};
use crate::error::SourceError;
use crate::node::{ROOT_PARENT, RegionRecord};
use crate::source::{DictionarySource, RegionSource};

/// A gate holding back responses for one parent
///
/// Fetches for the gated parent wait until [`MockGate::release`] is called or
/// the gate is dropped.
#[derive(Debug)]
pub struct MockGate {
    tx: watch::Sender<bool>,
}

impl MockGate {
    /// Let waiting and future fetches through
    pub fn release(&self) {
        self.tx.send_replace(true);
    }
}

/// In-memory region source with call counting and failure injection
///
/// Unknown parents answer with an empty list, like a backend with no
/// children for that code.
#[derive(Debug, Default)]
pub struct MockRegionSource {
    /// Records keyed by parent code, `""` for roots
    records: DashMap<String, Vec<RegionRecord>>,
    /// Parents whose fetches fail
    failing: DashSet<String>,
    /// Fail every request
    fail_all: AtomicBool,
    /// Gates holding back responses per parent
    gates: DashMap<String, watch::Receiver<bool>>,
    /// Fetch count per parent
    calls: DashMap<String, usize>,
    total_calls: AtomicUsize,
}

impl MockRegionSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the root records
    pub fn set_roots(&self, roots: Vec<RegionRecord>) {
        self.records.insert(ROOT_PARENT.to_string(), roots);
    }

    /// Set the child records for a parent
    pub fn set_children(&self, parent_code: impl Into<String>, children: Vec<RegionRecord>) {
        self.records.insert(parent_code.into(), children);
    }

    /// Make fetches for `parent_code` fail (`""` targets the root fetch)
    pub fn fail_parent(&self, parent_code: impl Into<String>) {
        self.failing.insert(parent_code.into());
    }

    /// Stop failing fetches for `parent_code`
    pub fn recover_parent(&self, parent_code: &str) {
        self.failing.remove(parent_code);
    }

    /// Fail or recover every request
    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Hold back responses for `parent_code` until the returned gate opens
    pub fn hold(&self, parent_code: impl Into<String>) -> MockGate {
        let (tx, rx) = watch::channel(false);
        self.gates.insert(parent_code.into(), rx);
        MockGate { tx }
    }

    /// Number of fetches issued for `parent_code`
    pub fn calls_for(&self, parent_code: &str) -> usize {
        self.calls.get(parent_code).map(|c| *c).unwrap_or(0)
    }

    /// Number of root fetches issued
    pub fn root_calls(&self) -> usize {
        self.calls_for(ROOT_PARENT)
    }

    /// Number of fetches issued in total
    pub fn total_calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }

    async fn respond(&self, key: &str) -> Result<Vec<RegionRecord>, SourceError> {
        *self.calls.entry(key.to_string()).or_insert(0) += 1;
        self.total_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gates.get(key).map(|g| g.value().clone());
        if let Some(mut rx) = gate {
            // A dropped gate counts as released
            let _ = rx.wait_for(|open| *open).await;
        }

        if self.fail_all.load(Ordering::SeqCst) || self.failing.contains(key) {
            return Err(SourceError::unavailable(format!("mock failure for '{key}'")));
        }

        Ok(self
            .records
            .get(key)
            .map(|r| r.value().clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl RegionSource for MockRegionSource {
    async fn fetch_roots(&self) -> Result<Vec<RegionRecord>, SourceError> {
        self.respond(ROOT_PARENT).await
    }

    async fn fetch_children(&self, parent_code: &str) -> Result<Vec<RegionRecord>, SourceError> {
        self.respond(parent_code).await
    }
}

/// In-memory dictionary source with call counting
#[derive(Debug, Default)]
pub struct MockDictionarySource {
    lists: HashMap<DictionaryKind, Vec<DictionaryRecord>>,
    gates: DashMap<DictionaryKind, watch::Receiver<bool>>,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl MockDictionarySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the list served for `kind`
    pub fn with_list(mut self, kind: DictionaryKind, records: Vec<DictionaryRecord>) -> Self {
        self.lists.insert(kind, records);
        self
    }

    /// Fail or recover every request
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Hold fetches of `kind` until the returned gate is released
    pub fn hold(&self, kind: DictionaryKind) -> MockGate {
        let (tx, rx) = watch::channel(false);
        self.gates.insert(kind, rx);
        MockGate { tx }
    }

    /// Number of fetches issued in total
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DictionarySource for MockDictionarySource {
    async fn fetch_dictionary(
        &self,
        kind: DictionaryKind,
    ) -> Result<Vec<DictionaryRecord>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gates.get(&kind).map(|g| g.value().clone());
        if let Some(mut rx) = gate {
            let _ = rx.wait_for(|open| *open).await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(SourceError::unavailable(format!("mock failure for {kind}")));
        }
        Ok(self.lists.get(&kind).cloned().unwrap_or_default())
    }
}
