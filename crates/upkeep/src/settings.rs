use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use upkeep_github::ReleaseClientOptions;
use upkeep_platform::{AppPaths, default_download_dir};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverSettings {
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    #[serde(default = "default_github_api_base")]
    pub github_api_base: String,

    #[serde(default)]
    pub github_token: Option<String>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default)]
    pub download_dir: Option<PathBuf>,

    #[serde(default)]
    pub host_arch: Option<String>,

    #[serde(default = "default_retry_delays")]
    pub retry_delays_secs: Vec<u64>,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,
}

fn default_http_timeout() -> u64 {
    30
}

fn default_probe_timeout() -> u64 {
    5
}

fn default_github_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_user_agent() -> String {
    format!("upkeep/{}", env!("CARGO_PKG_VERSION"))
}

fn default_retry_delays() -> Vec<u64> {
    vec![0, 2, 5]
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout(),
            probe_timeout_secs: default_probe_timeout(),
            github_api_base: default_github_api_base(),
            github_token: None,
            user_agent: default_user_agent(),
            download_dir: None,
            host_arch: None,
            retry_delays_secs: default_retry_delays(),
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
        }
    }
}

impl ResolverSettings {
    /// Load `settings.json` from the config directory, falling back to
    /// defaults when it is missing or unreadable.
    #[must_use]
    pub fn load() -> Self {
        let Ok(paths) = AppPaths::new() else {
            return Self::default();
        };
        Self::load_from(&paths.settings_file())
    }

    #[must_use]
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|error| {
                log::warn!("Ignoring malformed settings {}: {error}", path.display());
                Self::default()
            }),
            Err(error) => {
                log::warn!("Cannot read settings {}: {error}", path.display());
                Self::default()
            }
        }
    }

    /// # Errors
    /// Returns an error if the config directory or file cannot be written.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let paths = AppPaths::new().map_err(std::io::Error::other)?;
        paths.ensure_dirs()?;
        self.save_to(&paths.settings_file())
    }

    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    #[must_use]
    pub fn resolved_download_dir(&self) -> PathBuf {
        self.download_dir.clone().unwrap_or_else(default_download_dir)
    }

    #[must_use]
    pub fn release_client_options(&self) -> ReleaseClientOptions {
        ReleaseClientOptions {
            api_base: self.github_api_base.clone(),
            token: self.github_token.clone().filter(|token| !token.is_empty()),
            user_agent: self.user_agent.clone(),
            retry_delays_secs: self.retry_delays_secs.clone(),
        }
    }
}
