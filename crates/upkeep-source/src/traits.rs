use async_trait::async_trait;

use crate::error::SourceError;
use crate::types::{ArtifactHandle, DownloadOutcome, SourceKind, UpdateDescriptor};

/// Progress callback receiving the downloaded fraction in `[0, 1]`.
pub type ProgressFn<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// A strategy able to check for and fetch a newer artifact.
///
/// Every method takes `&self` so one task can call
/// [`cancel_download`](UpdateSource::cancel_download) while another awaits
/// [`download`](UpdateSource::download). A single source still runs at most
/// one transfer at a time.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    fn descriptor(&self) -> UpdateDescriptor;

    /// Whether the source was built from metadata embedded in the artifact.
    fn is_embedded(&self) -> bool;

    fn source_url(&self) -> String {
        self.descriptor().url()
    }

    /// Report whether a different artifact is published upstream.
    ///
    /// Failures degrade to `false`.
    async fn is_update_available(&self, artifact: &ArtifactHandle) -> bool;

    /// Fetch the newest artifact into the download directory.
    ///
    /// `on_progress` is only called when the server advertises a size.
    async fn download(&self, on_progress: ProgressFn<'_>) -> Result<DownloadOutcome, SourceError>;

    /// Abort the active transfer, if any. Safe to call when idle.
    fn cancel_download(&self);

    /// Remove the download directory.
    ///
    /// # Errors
    /// Returns an error if the directory exists but cannot be removed.
    fn cleanup(&self) -> Result<(), SourceError> {
        Ok(())
    }
}

impl<T: UpdateSource + 'static> From<T> for Box<dyn UpdateSource> {
    fn from(source: T) -> Self {
        Box::new(source)
    }
}
