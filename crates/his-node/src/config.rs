//! Configuration for the reference-data node

use std::path::PathBuf;

use his_storage::{DEFAULT_SEARCH_LIMIT, RedbStorageConfig};

use crate::error::{NodeError, NodeResult};

/// Same-origin paths the clinical client is served with
pub const DEFAULT_REGIONS_ENDPOINT: &str = "http://localhost/api/region";
pub const DEFAULT_ETHNICITY_URL: &str = "http://localhost/assets/dicts/ethnic.json";
pub const DEFAULT_NATIONALITY_URL: &str = "http://localhost/assets/dicts/country_full_cn.json";

pub const ENV_DATA_DIR: &str = "HIS_DATA_DIR";
pub const ENV_REGIONS_ENDPOINT: &str = "HIS_REGIONS_ENDPOINT";
pub const ENV_ETHNICITY_URL: &str = "HIS_ETHNIC_URL";
pub const ENV_NATIONALITY_URL: &str = "HIS_COUNTRY_URL";
pub const ENV_LOG_LEVEL: &str = "HIS_LOG_LEVEL";

const DB_FILE: &str = "regions.redb";

/// Where the flat code lists come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictionaryLocation {
    /// Static assets served over HTTP
    Http {
        ethnicity_url: String,
        nationality_url: String,
    },
    /// JSON files on disk
    Files {
        ethnicity_path: PathBuf,
        nationality_path: PathBuf,
    },
}

impl Default for DictionaryLocation {
    fn default() -> Self {
        Self::Http {
            ethnicity_url: DEFAULT_ETHNICITY_URL.to_string(),
            nationality_url: DEFAULT_NATIONALITY_URL.to_string(),
        }
    }
}

/// Configuration for a ReferenceDataNode
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Base directory for all node data
    pub data_dir: PathBuf,
    /// Storage configuration
    pub storage: RedbStorageConfig,
    /// Regions endpoint (roots without query, children with `parentCode`)
    pub regions_endpoint: String,
    /// Source of the ethnicity and nationality lists
    pub dictionaries: DictionaryLocation,
    /// Default number of search hits
    pub search_limit: usize,
    /// Default log level
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::with_data_dir("./his-data")
    }
}

impl NodeConfig {
    /// Create a configuration with a custom data directory
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            storage: RedbStorageConfig::at(data_dir.join(DB_FILE)),
            data_dir,
            regions_endpoint: DEFAULT_REGIONS_ENDPOINT.to_string(),
            dictionaries: DictionaryLocation::default(),
            search_limit: DEFAULT_SEARCH_LIMIT,
            log_level: "info".to_string(),
        }
    }

    /// Read overrides from `HIS_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`, starting from defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = match get(ENV_DATA_DIR) {
            Some(dir) => Self::with_data_dir(dir),
            None => Self::default(),
        };
        if let Some(endpoint) = get(ENV_REGIONS_ENDPOINT) {
            config.regions_endpoint = endpoint;
        }

        let ethnicity = get(ENV_ETHNICITY_URL);
        let nationality = get(ENV_NATIONALITY_URL);
        if ethnicity.is_some() || nationality.is_some() {
            config.dictionaries = DictionaryLocation::Http {
                ethnicity_url: ethnicity.unwrap_or_else(|| DEFAULT_ETHNICITY_URL.to_string()),
                nationality_url: nationality.unwrap_or_else(|| DEFAULT_NATIONALITY_URL.to_string()),
            };
        }

        if let Some(level) = get(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        config
    }

    /// Set the storage configuration
    pub fn with_storage(mut self, storage: RedbStorageConfig) -> Self {
        self.storage = storage;
        self
    }

    /// Set the regions endpoint
    pub fn with_regions_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.regions_endpoint = endpoint.into();
        self
    }

    /// Set where the code lists come from
    pub fn with_dictionaries(mut self, dictionaries: DictionaryLocation) -> Self {
        self.dictionaries = dictionaries;
        self
    }

    /// Set the default number of search hits
    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }

    /// Set the log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Check the configuration before opening a node
    pub fn validate(&self) -> NodeResult<()> {
        if self.search_limit == 0 {
            return Err(NodeError::config("search limit must be positive"));
        }
        if self.regions_endpoint.trim().is_empty() {
            return Err(NodeError::config("regions endpoint is empty"));
        }
        Ok(())
    }
}
