use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::SourceError;

/// The closed set of update source variants, in dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    Static,
    Dynamic,
    Github,
}

impl SourceKind {
    pub const ALL: [Self; 3] = [Self::Static, Self::Dynamic, Self::Github];

    /// Identifier persisted in per-app update configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Static => "StaticFileUpdater",
            Self::Dynamic => "DynamicUpdater",
            Self::Github => "GithubUpdater",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Static => "Static URL",
            Self::Dynamic => "Dynamic URL",
            Self::Github => "GitHub",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "StaticFileUpdater" | "static" => Some(Self::Static),
            "DynamicUpdater" | "dynamic" => Some(Self::Dynamic),
            "GithubUpdater" | "github" => Some(Self::Github),
            _ => None,
        }
    }
}

impl FromStr for SourceKind {
    type Err = SourceError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::from_name(name).ok_or_else(|| SourceError::UnknownSourceKind {
            name: name.to_string(),
        })
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A GitHub release reference, either from a `gh-releases-zsync|...` string
/// or decomposed from a release asset URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubReleaseRef {
    pub owner: String,
    pub repo: String,
    pub release_selector: String,
    pub filename_pattern: String,
    pub tag_pattern: String,
}

impl GithubReleaseRef {
    #[must_use]
    pub fn canonical_url(&self) -> String {
        format!(
            "https://github.com/{}/{}/releases/download/{}/{}",
            self.owner, self.repo, self.tag_pattern, self.filename_pattern
        )
    }
}

impl fmt::Display for GithubReleaseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}@{} ({})",
            self.owner, self.repo, self.release_selector, self.filename_pattern
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateDescriptor {
    Static { url: String },
    Dynamic { url: String },
    GithubRelease(GithubReleaseRef),
}

impl UpdateDescriptor {
    #[must_use]
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Static { .. } => SourceKind::Static,
            Self::Dynamic { .. } => SourceKind::Dynamic,
            Self::GithubRelease(_) => SourceKind::Github,
        }
    }

    #[must_use]
    pub fn url(&self) -> String {
        match self {
            Self::Static { url } | Self::Dynamic { url } => url.clone(),
            Self::GithubRelease(reference) => reference.canonical_url(),
        }
    }
}

/// Snapshot of a release asset as reported by the GitHub Releases API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
    pub id: u64,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub content_type: String,
}

/// The installed artifact an update is checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    file_path: PathBuf,
}

impl ArtifactHandle {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }

    #[must_use]
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Size of the artifact on disk.
    ///
    /// # Errors
    /// Returns an error if the file metadata cannot be read.
    pub fn file_size(&self) -> std::io::Result<u64> {
        std::fs::metadata(&self.file_path).map(|meta| meta.len())
    }
}

/// Result of a completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub path: PathBuf,
    /// Etag of the response, or the release asset id for GitHub sources.
    pub fingerprint: String,
}
