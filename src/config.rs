use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub kinship: KinshipConfig,
    #[serde(default)]
    pub traversal: TraversalConfig,
    #[serde(default)]
    pub http_server: HttpServerConfig,
}

/// Kinship-specific configuration
#[derive(Debug, Clone, Deserialize)]
pub struct KinshipConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Traversal ceilings. Requests above a ceiling are clamped down to it.
#[derive(Debug, Clone, Deserialize)]
pub struct TraversalConfig {
    /// Maximum bidirectional-search rounds for connection paths
    #[serde(default = "default_max_path_rounds")]
    pub max_path_rounds: usize,
    /// Maximum hop depth for the relatives query
    #[serde(default = "default_max_relatives_depth")]
    pub max_relatives_depth: usize,
    /// Maximum hop depth for partner matching
    #[serde(default = "default_max_match_depth")]
    pub max_match_depth: usize,
    /// Maximum distinct persons one traversal may discover
    #[serde(default = "default_max_visited_nodes")]
    pub max_visited_nodes: usize,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_path_rounds: default_max_path_rounds(),
            max_relatives_depth: default_max_relatives_depth(),
            max_match_depth: default_max_match_depth(),
            max_visited_nodes: default_max_visited_nodes(),
        }
    }
}

fn default_max_path_rounds() -> usize {
    6
}

fn default_max_relatives_depth() -> usize {
    5
}

fn default_max_match_depth() -> usize {
    4
}

fn default_max_visited_nodes() -> usize {
    10_000
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default = "default_http_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default)]
    pub authless: bool,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            port: default_http_port(),
            api_key_env: default_http_api_key_env(),
            allowed_origins: Vec::new(),
            authless: false,
        }
    }
}

fn default_http_port() -> u16 {
    8080
}

fn default_http_api_key_env() -> String {
    "KINSHIP_API_KEY".to_string()
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in KINSHIP_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("KINSHIP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        Self::from_toml(&config_str)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str)
            .context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.kinship.db_path.as_os_str().is_empty() {
            anyhow::bail!("kinship.db_path must not be empty");
        }

        if self.traversal.max_path_rounds == 0 {
            anyhow::bail!("traversal.max_path_rounds must be greater than 0");
        }

        if self.traversal.max_relatives_depth == 0 {
            anyhow::bail!("traversal.max_relatives_depth must be greater than 0");
        }

        if self.traversal.max_match_depth == 0 {
            anyhow::bail!("traversal.max_match_depth must be greater than 0");
        }

        if self.traversal.max_visited_nodes < 2 {
            anyhow::bail!("traversal.max_visited_nodes must be at least 2");
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.kinship.db_path
    }

    /// Get migrations directory
    pub fn migrations_dir(&self) -> &Path {
        &self.kinship.migrations_dir
    }
}
