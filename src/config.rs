use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::azure::{RepositoryCoordinates, DEFAULT_BASE_URL};

/// Name of the optional per-directory configuration file.
pub const CONFIG_FILE: &str = ".release-components.toml";
/// Overrides the location of the persisted state file.
pub const STATE_ENV: &str = "RELEASE_COMPONENTS_STATE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration loaded from .release-components.toml.
/// All fields are optional; the tool works with zero config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub azure: AzureConfig,

    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub state: StateConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AzureConfig {
    /// Service root, e.g. https://dev.azure.com
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// External credential helper speaking the git credential protocol.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_helper_program")]
    pub program: String,
    #[serde(default = "default_helper_args")]
    pub args: Vec<String>,
    /// Host sent to the helper
    #[serde(default = "default_helper_host")]
    pub host: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            program: default_helper_program(),
            args: default_helper_args(),
            host: default_helper_host(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// Placeholder owner written on every record
    #[serde(default = "default_owner")]
    pub owner: String,
    /// Spreadsheet file name, created under the workspace root
    #[serde(default = "default_file_name")]
    pub file_name: String,
    /// Hyperlink task cells to their work items
    #[serde(default = "default_true")]
    pub work_item_links: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            file_name: default_file_name(),
            work_item_links: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateConfig {
    /// State file path. If None, falls back to RELEASE_COMPONENTS_STATE,
    /// then to the user config directory.
    pub path: Option<PathBuf>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_helper_program() -> String {
    "git".to_string()
}

fn default_helper_args() -> Vec<String> {
    vec!["credential-manager".to_string(), "get".to_string()]
}

fn default_helper_host() -> String {
    "dev.azure.com".to_string()
}

fn default_owner() -> String {
    "unassigned".to_string()
}

fn default_file_name() -> String {
    "releaseComponents.xlsx".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from .release-components.toml in the current
    /// directory. Returns default config if the file doesn't exist.
    pub fn load() -> Result<Config, ConfigError> {
        let path = Path::new(CONFIG_FILE);
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the state file: config value takes precedence, then the
    /// RELEASE_COMPONENTS_STATE env var, then the user config directory.
    pub fn state_path(&self) -> PathBuf {
        self.state
            .path
            .clone()
            .or_else(|| std::env::var_os(STATE_ENV).map(PathBuf::from))
            .unwrap_or_else(|| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("release-components")
                    .join("state.toml")
            })
    }

    /// Work item link prefix for the given repository, if links are enabled.
    /// Organization and project are percent-encoded as path segments.
    pub fn work_item_url(&self, coordinates: &RepositoryCoordinates) -> Option<String> {
        if !self.report.work_item_links {
            return None;
        }
        let Ok(mut url) = reqwest::Url::parse(&self.azure.base_url) else {
            warn!(base_url = %self.azure.base_url, "invalid base URL, work item links disabled");
            return None;
        };
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .extend([
                coordinates.organization.as_str(),
                coordinates.project.as_str(),
                "_workitems",
                "edit",
            ]);
        Some(url.to_string())
    }
}
