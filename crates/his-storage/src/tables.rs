//! redb table definitions and index key layout
//!
//! Defines all tables used by the persistent reference store.

use redb::TableDefinition;

use his_core::{INDEX_SEPARATOR, ReferenceNode};

// Key: code, Value: serialized ReferenceNode
pub const REGIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("regions");

// Key: parent_code \0 code, Value: code
pub const REGIONS_BY_PARENT: TableDefinition<&str, &str> =
    TableDefinition::new("regions_by_parent");

// Key: name \0 code, Value: code
pub const REGIONS_BY_NAME: TableDefinition<&str, &str> = TableDefinition::new("regions_by_name");

// Key: zero-padded updated_at millis \0 code, Value: code
pub const REGIONS_BY_UPDATED: TableDefinition<&str, &str> =
    TableDefinition::new("regions_by_updated");

/// Join an index value and a code into a composite key
pub fn composite_key(prefix: &str, code: &str) -> String {
    format!("{prefix}{INDEX_SEPARATOR}{code}")
}

/// Scan prefix selecting every code under `parent_code`
pub fn parent_prefix(parent_code: &str) -> String {
    format!("{parent_code}{INDEX_SEPARATOR}")
}

/// Fixed-width, lexicographically ordered form of a timestamp
pub fn millis_key(millis: i64) -> String {
    format!("{:020}", millis.max(0))
}

pub fn parent_key(node: &ReferenceNode) -> String {
    composite_key(&node.parent_code, &node.code)
}

pub fn name_key(node: &ReferenceNode) -> String {
    composite_key(&node.name, &node.code)
}

pub fn updated_key(node: &ReferenceNode) -> String {
    composite_key(&millis_key(node.updated_at_millis), &node.code)
}
