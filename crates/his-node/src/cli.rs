//! Command-line interface for `his-refdata`

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use his_core::DictionaryKind;
use his_logging::LogConfig;
use his_selectors::MatcherConfig;

use crate::config::{DictionaryLocation, NodeConfig};

#[derive(Debug, Parser)]
#[command(name = "his-refdata", about = "Inspect and warm the HIS reference-data cache")]
pub struct Cli {
    /// Data directory (overrides HIS_DATA_DIR)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Regions endpoint (overrides HIS_REGIONS_ENDPOINT)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Ethnicity list URL (overrides HIS_ETHNIC_URL)
    #[arg(long, global = true)]
    pub ethnic_url: Option<String>,

    /// Nationality list URL (overrides HIS_COUNTRY_URL)
    #[arg(long, global = true)]
    pub country_url: Option<String>,

    /// Read the ethnicity list from a JSON file instead
    #[arg(long, global = true, requires = "country_file")]
    pub ethnic_file: Option<PathBuf>,

    /// Read the nationality list from a JSON file instead
    #[arg(long, global = true, requires = "ethnic_file")]
    pub country_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Human-readable log output
    #[arg(long, global = true, conflicts_with = "log_dir")]
    pub pretty: bool,

    /// Write JSONL logs to daily files in this directory instead of the console
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the provinces if the cache is empty
    Seed,
    /// List cached provinces (seeding first)
    Roots,
    /// List the children of a region, fetching them if needed
    Children {
        /// Parent region code
        code: String,
    },
    /// Search cached regions by name prefix
    Search {
        /// Name prefix
        prefix: String,
        /// Maximum number of hits
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show cache size and sync counters
    Stats,
    /// Filter a code list and resolve exact matches
    Lookup {
        /// Which list to search
        kind: LookupKind,
        /// Text as typed by the user
        text: String,
        /// Also accept phonetic keys, English name or code as exact matches
        #[arg(long)]
        alias: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LookupKind {
    Ethnic,
    Nationality,
}

impl LookupKind {
    pub fn matcher_config(self) -> MatcherConfig {
        match self {
            LookupKind::Ethnic => MatcherConfig::ethnicity(),
            LookupKind::Nationality => MatcherConfig::nationality(),
        }
    }

    pub fn dictionary(self) -> DictionaryKind {
        self.matcher_config().kind
    }
}

impl Cli {
    /// Logging preset picked by `--log-dir` / `--pretty`
    pub fn log_config(&self) -> LogConfig {
        match &self.log_dir {
            Some(dir) => LogConfig::production(dir.clone()),
            None if self.pretty => LogConfig::development(),
            None => LogConfig::default(),
        }
    }

    /// Layer command-line flags over `base`
    pub fn apply(&self, base: NodeConfig) -> NodeConfig {
        let mut config = match &self.data_dir {
            Some(dir) => {
                let mut config = NodeConfig::with_data_dir(dir);
                config.regions_endpoint = base.regions_endpoint;
                config.dictionaries = base.dictionaries;
                config.search_limit = base.search_limit;
                config.log_level = base.log_level;
                config
            }
            None => base,
        };

        if let Some(endpoint) = &self.endpoint {
            config.regions_endpoint = endpoint.clone();
        }

        if let (Some(ethnicity_path), Some(nationality_path)) =
            (&self.ethnic_file, &self.country_file)
        {
            config.dictionaries = DictionaryLocation::Files {
                ethnicity_path: ethnicity_path.clone(),
                nationality_path: nationality_path.clone(),
            };
        } else if self.ethnic_url.is_some() || self.country_url.is_some() {
            let (mut ethnicity, mut nationality) = match config.dictionaries {
                DictionaryLocation::Http {
                    ethnicity_url,
                    nationality_url,
                } => (ethnicity_url, nationality_url),
                DictionaryLocation::Files { .. } => (
                    crate::DEFAULT_ETHNICITY_URL.to_string(),
                    crate::DEFAULT_NATIONALITY_URL.to_string(),
                ),
            };
            if let Some(url) = &self.ethnic_url {
                ethnicity = url.clone();
            }
            if let Some(url) = &self.country_url {
                nationality = url.clone();
            }
            config.dictionaries = DictionaryLocation::Http {
                ethnicity_url: ethnicity,
                nationality_url: nationality,
            };
        }

        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        config
    }
}
