//! Configuration management
//!
//! Configuration is a JSON document (`neo4j-config.json` by default) with
//! required connection settings and optional store and scan sections.
//! Environment variables override file values:
//!
//! - `TRACEGRAPH_BOLT_URI`
//! - `TRACEGRAPH_USERNAME`
//! - `TRACEGRAPH_PASSWORD`
//! - `TRACEGRAPH_STORE_PATH`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file looked up when none is given on the command line
pub const DEFAULT_CONFIG_FILE: &str = "neo4j-config.json";

/// Where the embedded store lives unless configured otherwise
pub const DEFAULT_STORE_PATH: &str = ".tracegraph/graph.db";

pub const ENV_BOLT_URI: &str = "TRACEGRAPH_BOLT_URI";
pub const ENV_USERNAME: &str = "TRACEGRAPH_USERNAME";
pub const ENV_PASSWORD: &str = "TRACEGRAPH_PASSWORD";
pub const ENV_STORE_PATH: &str = "TRACEGRAPH_STORE_PATH";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub endpoints: Endpoints,
    pub credentials: Credentials,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoints {
    /// Bolt URI of the Neo4j server, e.g. `bolt://localhost:7687`
    pub bolt: String,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Which graph store backend to open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
    Neo4j,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: Backend,
    /// SQLite database file
    pub path: PathBuf,
    /// Neo4j database name; the server default when unset
    pub database: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Sqlite,
            path: PathBuf::from(DEFAULT_STORE_PATH),
            database: None,
        }
    }
}

/// Source-tree scanning configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// File extensions to scan, without the dot
    pub extensions: Vec<String>,
    /// Directory names never descended into
    pub exclude_dirs: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["py".to_string()],
            exclude_dirs: [".git", "__pycache__", ".venv", "venv", "node_modules", "target"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ScanConfig {
    pub fn accepts_extension(&self, ext: &str) -> bool {
        self.extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }

    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.exclude_dirs.iter().any(|d| d == name)
    }
}

impl Config {
    /// The local development server, used when no config file exists
    pub fn development_default() -> Self {
        Self {
            endpoints: Endpoints {
                bolt: "bolt://localhost:7687".to_string(),
            },
            credentials: Credentials {
                username: "neo4j".to_string(),
                password: "password".to_string(),
            },
            store: StoreConfig::default(),
            scan: ScanConfig::default(),
        }
    }

    /// Load configuration from a specific file, then apply environment
    /// overrides.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::from_json_str(&content)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or fall back to [`Config::development_default`]
    /// when the file does not exist. A file that exists but is malformed is
    /// still an error.
    pub fn load_or_development(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            return Self::from_file(path);
        }

        tracing::warn!(
            path = %path.display(),
            "config file not found, using development defaults"
        );
        let mut config = Self::development_default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document without consulting the environment.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(uri) = lookup(ENV_BOLT_URI) {
            self.endpoints.bolt = uri;
        }
        if let Some(username) = lookup(ENV_USERNAME) {
            self.credentials.username = username;
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            self.credentials.password = password;
        }
        if let Some(path) = lookup(ENV_STORE_PATH) {
            self.store.path = PathBuf::from(path);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoints.bolt.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoints.bolt is empty".to_string()));
        }
        if self.credentials.username.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "credentials.username is empty".to_string(),
            ));
        }
        if self.store.backend == Backend::Sqlite && self.store.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("store.path is empty".to_string()));
        }
        if self.scan.extensions.is_empty() {
            return Err(ConfigError::Invalid("scan.extensions is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const MINIMAL: &str = r#"{
        "endpoints": { "bolt": "bolt://db:7687" },
        "credentials": { "username": "neo4j", "password": "secret" }
    }"#;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = Config::from_json_str(MINIMAL).unwrap();
        assert_eq!(config.endpoints.bolt, "bolt://db:7687");
        assert_eq!(config.store.backend, Backend::Sqlite);
        assert_eq!(config.store.path, PathBuf::from(DEFAULT_STORE_PATH));
        assert_eq!(config.scan.extensions, vec!["py"]);
        assert!(config.scan.is_excluded_dir("__pycache__"));
    }

    #[test]
    fn test_missing_required_section_fails() {
        let err = Config::from_json_str(r#"{ "endpoints": { "bolt": "bolt://db:7687" } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_empty_bolt_is_invalid() {
        let json = r#"{
            "endpoints": { "bolt": " " },
            "credentials": { "username": "neo4j", "password": "x" }
        }"#;
        assert!(matches!(
            Config::from_json_str(json),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_store_and_scan_sections() {
        let json = r#"{
            "endpoints": { "bolt": "bolt://db:7687" },
            "credentials": { "username": "neo4j", "password": "x" },
            "store": { "backend": "neo4j", "database": "trace" },
            "scan": { "extensions": [".py", "pyi"] }
        }"#;
        let config = Config::from_json_str(json).unwrap();
        assert_eq!(config.store.backend, Backend::Neo4j);
        assert_eq!(config.store.database.as_deref(), Some("trace"));
        assert!(config.scan.accepts_extension("py"));
        assert!(config.scan.accepts_extension("PYI"));
        assert!(!config.scan.accepts_extension("rs"));
        // unspecified list keeps its default
        assert!(config.scan.is_excluded_dir(".git"));
    }

    #[test]
    fn test_overrides_win() {
        let mut config = Config::from_json_str(MINIMAL).unwrap();
        let env: HashMap<&str, &str> = [
            (ENV_BOLT_URI, "bolt://other:7687"),
            (ENV_PASSWORD, "from-env"),
            (ENV_STORE_PATH, "/tmp/g.db"),
        ]
        .into_iter()
        .collect();

        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.endpoints.bolt, "bolt://other:7687");
        assert_eq!(config.credentials.username, "neo4j");
        assert_eq!(config.credentials.password, "from-env");
        assert_eq!(config.store.path, PathBuf::from("/tmp/g.db"));
    }

    #[test]
    fn test_from_file_missing_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_or_development_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_development(dir.path().join("absent.json")).unwrap();
        assert_eq!(config.store.backend, Backend::Sqlite);
        assert!(!config.endpoints.bolt.is_empty());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = Config::from_json_str(MINIMAL).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret"));
    }
}
