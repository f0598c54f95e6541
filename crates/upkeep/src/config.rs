use serde::{Deserialize, Serialize};
use upkeep_source::SourceKind;

/// Update configuration stored per installed artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppUpdateConfig {
    #[serde(default)]
    pub update_url: Option<String>,

    /// Persisted source name, e.g. `GithubUpdater`.
    #[serde(default)]
    pub update_url_manager: Option<String>,
}

impl AppUpdateConfig {
    #[must_use]
    pub fn new(update_url: impl Into<String>) -> Self {
        Self {
            update_url: Some(update_url.into()),
            update_url_manager: None,
        }
    }

    #[must_use]
    pub fn with_manager(mut self, kind: SourceKind) -> Self {
        self.update_url_manager = Some(kind.as_str().to_string());
        self
    }

    /// The source kind dispatch is narrowed to. Unknown names do not narrow.
    #[must_use]
    pub fn forced_kind(&self) -> Option<SourceKind> {
        let name = self
            .update_url_manager
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())?;

        match name.parse() {
            Ok(kind) => Some(kind),
            Err(err) => {
                log::warn!("Ignoring configured manager: {err}");
                None
            }
        }
    }
}
