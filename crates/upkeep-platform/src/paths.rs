use std::path::{Path, PathBuf};

use thiserror::Error;

const APP_DIR: &str = "upkeep";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Could not determine the user {which} directory")]
pub struct AppPathsError {
    which: &'static str,
}

/// Per-user locations: settings live in the config directory, the log file
/// in the data directory.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl AppPaths {
    /// # Errors
    /// Returns an error when the platform reports no config or data
    /// directory for the current user.
    pub fn new() -> Result<Self, AppPathsError> {
        let config = dirs::config_dir().ok_or(AppPathsError { which: "config" })?;
        let data = dirs::data_dir().ok_or(AppPathsError { which: "data" })?;
        Ok(Self::under(&config, &data))
    }

    fn under(config_base: &Path, data_base: &Path) -> Self {
        Self {
            config_dir: config_base.join(APP_DIR),
            data_dir: data_base.join(APP_DIR),
        }
    }

    #[must_use]
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }

    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("debug.log")
    }

    /// # Errors
    /// Returns an error if either directory cannot be created.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.config_dir, &self.data_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Download directory under the system temp dir, shared by every source in
/// the process. It is created lazily by the first transfer.
#[must_use]
pub fn default_download_dir() -> PathBuf {
    std::env::temp_dir().join(APP_DIR).join("downloads")
}
