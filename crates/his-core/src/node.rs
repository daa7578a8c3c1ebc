//! Region tree nodes
//!
//! A [`ReferenceNode`] is the cached, normalized form of one administrative
//! region. A [`RegionRecord`] is the raw form delivered by the remote endpoint.

use serde::{Deserialize, Serialize};

/// Parent code carried by every root node
pub const ROOT_PARENT: &str = "";

/// Level tag assigned to seeded root nodes
pub const PROVINCE_LEVEL: &str = "province";

/// Separator used by the persisted secondary indices
///
/// Codes and names containing it cannot be indexed and are rejected.
pub const INDEX_SEPARATOR: char = '\0';

/// One node of the administrative-region tree
///
/// `code` is globally unique and is the only identity used for upserts.
/// An empty `parent_code` marks a root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceNode {
    /// Unique region code, e.g. `110000`
    pub code: String,
    /// Display name, stored verbatim
    pub name: String,
    /// Code of the parent node, empty for roots
    pub parent_code: String,
    /// Optional level tag (`province`, `city`, ...)
    pub level: Option<String>,
    /// When this node was last written (Unix millis)
    pub updated_at_millis: i64,
}

impl ReferenceNode {
    /// Create a new root node stamped with the current time
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            parent_code: ROOT_PARENT.to_string(),
            level: None,
            updated_at_millis: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Set the parent code
    pub fn with_parent(mut self, parent_code: impl Into<String>) -> Self {
        self.parent_code = parent_code.into();
        self
    }

    /// Set the level tag
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// Set the write timestamp
    pub fn with_updated_at(mut self, millis: i64) -> Self {
        self.updated_at_millis = millis;
        self
    }

    /// Whether this node sits at the top of the tree
    pub fn is_root(&self) -> bool {
        self.parent_code.is_empty()
    }
}

/// A region as returned by the remote endpoint
///
/// Root responses usually omit `parentCode`. The legacy payload key `parent`
/// is accepted as an alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionRecord {
    pub code: String,
    pub name: String,
    #[serde(default, alias = "parent", skip_serializing_if = "Option::is_none")]
    pub parent_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl RegionRecord {
    /// Create a record without parent or level
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            parent_code: None,
            level: None,
        }
    }

    /// Set the level tag
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// Set the parent code reported by the remote
    pub fn with_parent(mut self, parent_code: impl Into<String>) -> Self {
        self.parent_code = Some(parent_code.into());
        self
    }

    /// Normalize into a cacheable node
    ///
    /// The parent comes from the request, never from the payload. The code is
    /// trimmed; the name is kept as delivered.
    pub fn into_node(self, parent_code: &str, fetched_at_millis: i64) -> ReferenceNode {
        ReferenceNode {
            code: self.code.trim().to_string(),
            name: self.name,
            parent_code: parent_code.to_string(),
            level: self.level.filter(|l| !l.trim().is_empty()),
            updated_at_millis: fetched_at_millis,
        }
    }
}
