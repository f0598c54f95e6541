use std::path::PathBuf;
use std::time::Duration;

use upkeep_platform::{default_download_dir, normalize_arch};

use crate::probe::HttpProbe;

/// Everything a source needs from its environment.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub probe: HttpProbe,
    pub download_dir: PathBuf,
    pub host_arch: String,
}

impl SourceContext {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            probe: HttpProbe::new(client),
            download_dir: default_download_dir(),
            host_arch: normalize_arch(std::env::consts::ARCH),
        }
    }

    #[must_use]
    pub fn with_download_dir(mut self, download_dir: impl Into<PathBuf>) -> Self {
        self.download_dir = download_dir.into();
        self
    }

    #[must_use]
    pub fn with_host_arch(mut self, host_arch: &str) -> Self {
        self.host_arch = normalize_arch(host_arch);
        self
    }

    #[must_use]
    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe = self.probe.with_probe_timeout(probe_timeout);
        self
    }

    #[must_use]
    pub fn client(&self) -> &reqwest::Client {
        self.probe.client()
    }
}
