use std::{
    fs,
    path::{Path, PathBuf},
    thread,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::moves::Metric;

/// Where the pruning tables are cached between runs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableCache {
    /// Always generate the tables in memory.
    Disabled,
    /// A per-metric file under the user's cache directory.
    #[default]
    Default,
    /// A specific file.
    Path(PathBuf),
}

impl TableCache {
    /// The cache file for `metric`, if caching is enabled and a location is
    /// known.
    #[must_use]
    pub fn path(&self, metric: Metric) -> Option<PathBuf> {
        match self {
            TableCache::Disabled => None,
            TableCache::Default => dirs::cache_dir().map(|dir| {
                dir.join("twophase-tables")
                    .join(format!("{}.bin", metric.tag()))
            }),
            TableCache::Path(path) => Some(path.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub metric: Metric,
    /// Worker threads. Zero means one per available core.
    pub threads: usize,
    /// How many ranges of first moves each search depth is split into.
    pub n_splits: usize,
    pub table_cache: TableCache,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            metric: Metric::default(),
            threads: 0,
            n_splits: 1,
            table_cache: TableCache::Default,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read the config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SolverConfig {
    /// Parses a config from TOML. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Fails if the text is not valid TOML or has fields of the wrong type.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads a config from a TOML file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or does not parse.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    /// The number of worker threads to spawn.
    #[must_use]
    pub fn worker_threads(&self) -> usize {
        if self.threads > 0 {
            self.threads
        } else {
            thread::available_parallelism().map_or(1, usize::from)
        }
    }

    #[must_use]
    pub fn splits(&self) -> usize {
        self.n_splits.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn empty_config_is_default() {
        assert_eq!(
            SolverConfig::from_toml_str("").unwrap(),
            SolverConfig::default()
        );
    }

    #[test_log::test]
    fn parses_every_field() {
        let config = SolverConfig::from_toml_str(
            r#"
            threads = 4
            n_splits = 3
            table_cache = { path = "/tmp/tables.bin" }

            [metric]
            quarter_turn = true
            axial = true
            "#,
        )
        .unwrap();

        assert_eq!(config.threads, 4);
        assert_eq!(config.worker_threads(), 4);
        assert_eq!(config.splits(), 3);
        assert!(config.metric.quarter_turn);
        assert!(config.metric.axial);
        assert!(!config.metric.five_face);
        assert_eq!(
            config.table_cache.path(config.metric),
            Some(PathBuf::from("/tmp/tables.bin"))
        );
    }

    #[test_log::test]
    fn disabled_cache_has_no_path() {
        let config = SolverConfig::from_toml_str(r#"table_cache = "disabled""#).unwrap();
        assert_eq!(config.table_cache, TableCache::Disabled);
        assert_eq!(config.table_cache.path(config.metric), None);
        assert!(config.worker_threads() >= 1);
    }

    #[test_log::test]
    fn rejects_wrong_types() {
        assert!(matches!(
            SolverConfig::from_toml_str("threads = \"many\""),
            Err(ConfigError::Toml(_))
        ));
    }
}
