//! Configuration file support.
//!
//! Settings are read from `querydef.toml` in the working directory, falling
//! back to `<config dir>/querydef/config.toml`. Both are optional.
//!
//! ```toml
//! [database]
//! url = "sqlite://queries.db"
//! max_connections = 1
//! strict_mode = true
//! projection_allow_list = ["id", "name"]
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::engine::ConnectionOptions;
use crate::error::{QueryError, QueryResult};

/// File name looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "querydef.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Connection URL. Command-line flags and `QUERYDEF_DATABASE_URL` take precedence.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_strict_mode")]
    pub strict_mode: bool,
    #[serde(default)]
    pub projection_allow_list: Option<Vec<String>>,
}

fn default_max_connections() -> u32 {
    1
}

fn default_strict_mode() -> bool {
    true
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            strict_mode: default_strict_mode(),
            projection_allow_list: None,
        }
    }
}

impl DatabaseConfig {
    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            max_connections: self.max_connections,
            strict_mode: self.strict_mode,
            projection_allow_list: self.projection_allow_list.clone(),
        }
    }
}

impl Config {
    /// Load the first config file found, or defaults when there is none.
    pub fn load() -> QueryResult<Self> {
        match Self::locate() {
            Some(path) => Self::from_path(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_path(path: &Path) -> QueryResult<Self> {
        let content = std::fs::read_to_string(path)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&content)
            .map_err(|e| QueryError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(content: &str) -> QueryResult<Self> {
        toml::from_str(content).map_err(|e| QueryError::Config(e.to_string()))
    }

    /// Candidate config files, in lookup order.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("querydef").join("config.toml"));
        }
        paths
    }

    fn locate() -> Option<PathBuf> {
        Self::search_paths().into_iter().find(|p| p.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let config = Config::from_toml_str(
            r#"
            [database]
            url = "sqlite::memory:"
            max_connections = 4
            strict_mode = false
            projection_allow_list = ["id", "name"]
            "#,
        )
        .unwrap();

        assert_eq!(config.database.url.as_deref(), Some("sqlite::memory:"));
        let options = config.database.connection_options();
        assert_eq!(options.max_connections, 4);
        assert!(!options.strict_mode);
        assert_eq!(
            options.projection_allow_list,
            Some(vec!["id".to_string(), "name".to_string()])
        );
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert!(config.database.url.is_none());
        assert_eq!(config.database.max_connections, 1);
        assert!(config.database.strict_mode);

        let config = Config::from_toml_str("[database]\nurl = \"sqlite://q.db\"").unwrap();
        assert_eq!(config.database.max_connections, 1);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = Config::from_toml_str("[database]\nuri = \"x\"").unwrap_err();
        assert!(matches!(err, QueryError::Config(_)));
    }

    #[test]
    fn test_search_paths_start_local() {
        assert_eq!(Config::search_paths()[0], PathBuf::from(LOCAL_CONFIG_FILE));
    }
}
