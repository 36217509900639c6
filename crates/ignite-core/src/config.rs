//! Application configuration

use ignite_api::{ApiConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use ignite_session::MutationPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::CoreError;
use crate::Result;

const ENV_API_URL: &str = "IGNITE_API_URL";
const ENV_REQUEST_TIMEOUT: &str = "IGNITE_REQUEST_TIMEOUT_SECS";
const ENV_DATA_DIR: &str = "IGNITE_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// API base endpoint
    pub api_base_url: String,
    /// Per-request timeout
    pub request_timeout_secs: u64,
    /// Path to the database file
    pub database_path: PathBuf,
    /// Remote logout endpoint; sign-out stays local when unset
    #[serde(default)]
    pub logout_path: Option<String>,
    #[serde(default)]
    pub mutation_policy: MutationPolicy,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            database_path: data_dir.join("ignite.db"),
            logout_path: None,
            mutation_policy: MutationPolicy::default(),
        }
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("IgniteGym"))
            .unwrap_or_else(|| PathBuf::from(".ignite"))
    }

    /// Defaults overridden by `IGNITE_API_URL`, `IGNITE_REQUEST_TIMEOUT_SECS`
    /// and `IGNITE_DATA_DIR`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = lookup(ENV_DATA_DIR)
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(Self::data_dir);

        let mut config = Self::new(data_dir);

        if let Some(url) = lookup(ENV_API_URL).filter(|url| !url.trim().is_empty()) {
            config.api_base_url = url.trim().to_string();
        }

        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT) {
            config.request_timeout_secs = match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(CoreError::Config(format!(
                        "{ENV_REQUEST_TIMEOUT} must be a positive number of seconds, got {raw:?}"
                    )))
                }
            };
        }

        Ok(config)
    }

    /// Gateway-level subset of this configuration.
    pub fn api_config(&self) -> ApiConfig {
        ApiConfig::new(self.api_base_url.clone())
            .with_timeout(Duration::from_secs(self.request_timeout_secs))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }
}
