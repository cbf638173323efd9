//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/pagewatch/config.toml)
//! 3. Environment variables (PAGEWATCH_* prefix, plus GITHUB_* for the mirror)
//!
//! Environment variables take precedence over config file values.
//! The mirror credential is never read from the file; see `RemoteConfig::token`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable prefix
const ENV_PREFIX: &str = "PAGEWATCH";

/// Batch size used by the source deployment
const DEFAULT_CHUNK_SIZE: usize = 2;

/// Which local layout holds the snapshots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// One JSON document per target key
    #[default]
    Files,
    /// All snapshots packed into a single JSON archive
    Archive,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Files => f.write_str("files"),
            BackendKind::Archive => f.write_str("archive"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "files" | "file" => Ok(BackendKind::Files),
            "archive" => Ok(BackendKind::Archive),
            other => bail!("Unknown backend '{}'. Use 'files' or 'archive'.", other),
        }
    }
}

/// Remote mirror settings (GitHub repository)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Repository owner
    #[serde(default)]
    pub owner: String,

    /// Repository name
    #[serde(default)]
    pub repo: String,

    /// Branch holding the snapshots
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Remote directory of per-key documents
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: String,

    /// Remote path of the packed archive
    #[serde(default = "default_archive_path")]
    pub archive_path: String,

    /// Commit message used for every publish
    #[serde(default = "default_commit_message")]
    pub commit_message: String,

    /// Publish attempts when the branch moves underneath us
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// HTTP timeout for mirror requests
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            owner: String::new(),
            repo: String::new(),
            branch: default_branch(),
            snapshot_dir: default_snapshot_dir(),
            archive_path: default_archive_path(),
            commit_message: default_commit_message(),
            max_attempts: default_max_attempts(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RemoteConfig {
    /// Whether owner and repo are both set
    pub fn is_complete(&self) -> bool {
        !self.owner.is_empty() && !self.repo.is_empty()
    }

    /// Bearer credential from the environment
    ///
    /// Checked in order: `PAGEWATCH_TOKEN`, `GITHUB_TOKEN`.
    pub fn token() -> Option<String> {
        [format!("{}_TOKEN", ENV_PREFIX), "GITHUB_TOKEN".to_string()]
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|val| !val.is_empty())
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for the local working copy
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Local snapshot layout
    #[serde(default)]
    pub backend: BackendKind,

    /// Targets processed per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Publish after every chunk instead of once per run
    #[serde(default)]
    pub publish_per_chunk: bool,

    /// Log level for the CLI subscriber
    #[serde(default)]
    pub log_level: Option<String>,

    /// Remote mirror (optional)
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backend: BackendKind::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            publish_per_chunk: false,
            log_level: None,
            remote: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables
    /// 2. Config file (~/.config/pagewatch/config.toml or PAGEWATCH_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_BACKEND", ENV_PREFIX)) {
            self.backend = val.parse()?;
        }

        if let Ok(val) = std::env::var(format!("{}_CHUNK_SIZE", ENV_PREFIX)) {
            self.chunk_size = val
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}_CHUNK_SIZE: '{}'", ENV_PREFIX, val))?;
        }

        if let Ok(val) = std::env::var(format!("{}_LOG_LEVEL", ENV_PREFIX)) {
            self.log_level = if val.is_empty() { None } else { Some(val) };
        }

        // Mirror coordinates keep the names the deployment already uses
        let owner = std::env::var("GITHUB_OWNER").ok().filter(|v| !v.is_empty());
        let repo = std::env::var("GITHUB_REPO").ok().filter(|v| !v.is_empty());
        let branch = std::env::var("GITHUB_BRANCH").ok().filter(|v| !v.is_empty());

        if owner.is_some() || repo.is_some() || branch.is_some() {
            let remote = self.remote.get_or_insert_with(RemoteConfig::default);
            if let Some(owner) = owner {
                remote.owner = owner;
            }
            if let Some(repo) = repo {
                remote.repo = repo;
            }
            if let Some(branch) = branch {
                remote.branch = branch;
            }
        }

        Ok(())
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with PAGEWATCH_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pagewatch")
            .join("config.toml")
    }

    /// Chunk size, never zero
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }

    /// Remote settings when owner and repo are configured
    pub fn active_remote(&self) -> Option<&RemoteConfig> {
        self.remote.as_ref().filter(|r| r.is_complete())
    }

    /// Directory of per-key snapshot documents
    pub fn snapshot_dir(&self) -> PathBuf {
        self.data_dir.join("snapshots")
    }

    /// Path of the packed snapshot archive
    pub fn archive_path(&self) -> PathBuf {
        self.data_dir.join("snapshots.json")
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pagewatch")
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_snapshot_dir() -> String {
    "data/snapshots".to_string()
}

fn default_archive_path() -> String {
    "data/snapshots.json".to_string()
}

fn default_commit_message() -> String {
    "snapshots: bulk update".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    30
}
