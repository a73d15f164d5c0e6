use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::constants::{
    DEFAULT_API_BASE, DEFAULT_MAX_RETRY, DEFAULT_REALTIME_BASE, DEFAULT_TIMEOUT_MS,
};

pub const API_BASE_ENV_VAR: &str = "JARVIS_API_BASE";
pub const REALTIME_BASE_ENV_VAR: &str = "JARVIS_WS_BASE";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Base URL for request/response calls, including the version prefix
    pub api_base: String,
    /// Base URL for real-time channels (`ws://` or `wss://`)
    pub realtime_base: String,
    /// Declared retry budget. Exposed for callers but not applied by requests.
    pub max_retry: u32,
    /// Declared request timeout in milliseconds. Exposed but not applied.
    pub timeout_ms: u64,
    /// Persona `chat` signs in as when no session is active
    pub default_persona: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            realtime_base: DEFAULT_REALTIME_BASE.to_string(),
            max_retry: DEFAULT_MAX_RETRY,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            default_persona: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Config, Box<dyn std::error::Error>> {
        let mut config = match Self::config_path() {
            Some(path) => Self::load_from_path(&path)?,
            None => Config::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from_path(config_path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
        if config_path.exists() {
            let contents = fs::read_to_string(config_path)?;
            let config: Config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save_to_path(&self, config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "jarvis", "jarvis-client")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var(API_BASE_ENV_VAR).ok(),
            std::env::var(REALTIME_BASE_ENV_VAR).ok(),
        );
    }

    /// Replace the bases with any non-empty override.
    pub fn apply_overrides(&mut self, api_base: Option<String>, realtime_base: Option<String>) {
        if let Some(base) = api_base.filter(|value| !value.trim().is_empty()) {
            self.api_base = base;
        }
        if let Some(base) = realtime_base.filter(|value| !value.trim().is_empty()) {
            self.realtime_base = base;
        }
    }
}
