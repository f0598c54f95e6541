use std::sync::LazyLock;

use async_trait::async_trait;
use log::{debug, warn};
use regex::Regex;
use tokio::process::Command;
use upkeep_source::ArtifactHandle;

/// ELF section holding the update descriptor.
pub const UPDATE_INFO_SECTION: &str = ".upd_info";

static GITHUB_DESCRIPTOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"gh-releases-zsync\|\S*\.zsync").expect("github descriptor pattern is valid")
});

static STATIC_DESCRIPTOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)zsync\|(http\S*)").expect("static descriptor pattern is valid")
});

/// Pull an update descriptor out of a flattened string-table dump.
///
/// A `gh-releases-zsync|...zsync` reference wins over a `zsync|http...` URL.
/// The static form is returned without its `zsync|` prefix.
#[must_use]
pub fn extract_descriptor(dump: &str) -> Option<String> {
    if let Some(found) = GITHUB_DESCRIPTOR.find(dump) {
        return Some(found.as_str().trim().to_string());
    }

    STATIC_DESCRIPTOR
        .captures(dump)
        .and_then(|captures| captures.get(1))
        .map(|url| url.as_str().trim().to_string())
}

/// Produces the raw string-table dump for an artifact.
#[async_trait]
pub trait MetadataReader: Send + Sync {
    async fn read_update_section(&self, artifact: &ArtifactHandle) -> Option<String>;
}

/// Reads the update section with `readelf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadelfReader;

#[async_trait]
impl MetadataReader for ReadelfReader {
    async fn read_update_section(&self, artifact: &ArtifactHandle) -> Option<String> {
        let readelf = match which::which("readelf") {
            Ok(path) => path,
            Err(error) => {
                warn!("readelf not available, skipping embedded update info: {error}");
                return None;
            }
        };

        let output = Command::new(readelf)
            .arg(format!("--string-dump={UPDATE_INFO_SECTION}"))
            .arg("--wide")
            .arg(artifact.file_path())
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => {
                Some(flatten_dump(&String::from_utf8_lossy(&output.stdout)))
            }
            Ok(output) => {
                debug!(
                    "readelf failed for {}: {}",
                    artifact.file_path().display(),
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                None
            }
            Err(error) => {
                warn!("Failed to run readelf: {error}");
                None
            }
        }
    }
}

/// Read and extract the embedded descriptor of `artifact`, if any.
pub async fn embedded_descriptor(
    reader: &dyn MetadataReader,
    artifact: &ArtifactHandle,
) -> Option<String> {
    let dump = reader.read_update_section(artifact).await?;
    let descriptor = extract_descriptor(&dump);
    debug!(
        "Embedded update info for {}: {descriptor:?}",
        artifact.file_path().display()
    );
    descriptor
}

fn flatten_dump(raw: &str) -> String {
    let mut flat = raw.replace('\n', " ");
    flat.push(' ');
    flat
}
