use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio_util::sync::CancellationToken;
use upkeep_core::{SourceContext, StaticSource, is_supported_content_type, remove_download_dir};
use upkeep_source::{
    ArtifactHandle, DownloadOutcome, GithubReleaseRef, ProgressFn, ReleaseAsset, SourceError,
    SourceKind, UpdateDescriptor, UpdateSource,
};

use crate::descriptor::{DescriptorError, parse_release_ref};
use crate::release::ReleaseClient;
use crate::selection::select_target_asset;

/// GitHub serves some assets as `raw`.
const RAW_CONTENT_TYPE: &str = "raw";

fn accepts_content_type(content_type: &str) -> bool {
    is_supported_content_type(content_type) || content_type == RAW_CONTENT_TYPE
}

/// An update published as a GitHub release asset.
///
/// The asset is re-selected from release metadata on every check and
/// download, so a new release is picked up without reconfiguring.
#[derive(Debug)]
pub struct GithubReleaseSource {
    ctx: SourceContext,
    releases: ReleaseClient,
    reference: GithubReleaseRef,
    embedded: bool,
    staged: Mutex<Option<Arc<StaticSource>>>,
    pending: Mutex<Option<CancellationToken>>,
}

impl GithubReleaseSource {
    /// # Errors
    /// Returns an error if `descriptor` is neither the pipe form nor a
    /// release download URL.
    pub fn new(
        ctx: SourceContext,
        releases: ReleaseClient,
        descriptor: &str,
        embedded: bool,
    ) -> Result<Self, DescriptorError> {
        let reference = parse_release_ref(descriptor)?;
        Ok(Self {
            ctx,
            releases,
            reference,
            embedded,
            staged: Mutex::new(None),
            pending: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn can_handle(descriptor: &str) -> bool {
        match parse_release_ref(descriptor) {
            Ok(_) => true,
            Err(err) => {
                debug!("Not a GitHub release reference ({err}): {descriptor}");
                false
            }
        }
    }

    #[must_use]
    pub fn reference(&self) -> &GithubReleaseRef {
        &self.reference
    }

    /// Fetch release metadata and select the asset this source points at.
    pub async fn fetch_target_asset(&self) -> Option<ReleaseAsset> {
        let release = match self.releases.fetch_release(&self.reference).await {
            Ok(release) => release,
            Err(err) => {
                error!("Failed to fetch release for {}: {err}", self.reference);
                return None;
            }
        };

        debug!(
            "Release {} of {}/{} has {} assets",
            release.tag_name,
            self.reference.owner,
            self.reference.repo,
            release.assets.len()
        );

        select_target_asset(&release, &self.reference, self.embedded, &self.ctx.host_arch)
    }

    fn staged(&self) -> Option<Arc<StaticSource>> {
        self.staged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_staged(&self, source: Option<Arc<StaticSource>>) {
        *self.staged.lock().unwrap_or_else(PoisonError::into_inner) = source;
    }

    fn set_pending(&self, token: Option<CancellationToken>) -> Option<CancellationToken> {
        std::mem::replace(
            &mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner),
            token,
        )
    }

    async fn download_asset(
        &self,
        on_progress: ProgressFn<'_>,
    ) -> Result<DownloadOutcome, SourceError> {
        let Some(asset) = self.fetch_target_asset().await else {
            return Err(SourceError::NoMatchingAsset {
                reference: self.reference.to_string(),
            });
        };

        if !accepts_content_type(&asset.content_type) {
            return Err(SourceError::UnsupportedContentType {
                url: asset.download_url,
                content_type: asset.content_type,
            });
        }

        let staged = Arc::new(StaticSource::new(
            self.ctx.clone(),
            &asset.download_url,
            false,
        ));
        self.set_staged(Some(Arc::clone(&staged)));
        let outcome = staged.download(on_progress).await?;

        Ok(DownloadOutcome {
            path: outcome.path,
            fingerprint: asset.id.to_string(),
        })
    }
}

#[async_trait]
impl UpdateSource for GithubReleaseSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Github
    }

    fn descriptor(&self) -> UpdateDescriptor {
        UpdateDescriptor::GithubRelease(self.reference.clone())
    }

    fn is_embedded(&self) -> bool {
        self.embedded
    }

    async fn is_update_available(&self, artifact: &ArtifactHandle) -> bool {
        let Some(asset) = self.fetch_target_asset().await else {
            return false;
        };

        if !accepts_content_type(&asset.content_type) {
            warn!(
                "Asset {} has unsupported content type {:?}",
                asset.name, asset.content_type
            );
            return false;
        }

        match artifact.file_size() {
            Ok(local_size) => {
                debug!(
                    "Asset {} has size {}, installed artifact has {local_size}",
                    asset.name, asset.size
                );
                asset.size != local_size
            }
            Err(err) => {
                error!(
                    "Cannot read size of {}: {err}",
                    artifact.file_path().display()
                );
                false
            }
        }
    }

    /// Covers the release lookup as well as the transfer: a cancel issued
    /// at any point of the download is honoured.
    async fn download(&self, on_progress: ProgressFn<'_>) -> Result<DownloadOutcome, SourceError> {
        let token = CancellationToken::new();
        self.set_pending(Some(token.clone()));

        let result = tokio::select! {
            biased;
            () = token.cancelled() => Err(SourceError::Cancelled),
            result = self.download_asset(on_progress) => result,
        };
        self.set_pending(None);
        self.set_staged(None);

        if let Err(err) = &result
            && !err.is_cancelled()
        {
            error!("Download of {} failed: {err}", self.reference);
        }
        result
    }

    fn cancel_download(&self) {
        if let Some(token) = self.set_pending(None) {
            info!("Cancelling download of {}", self.reference);
            token.cancel();
        }
    }

    fn cleanup(&self) -> Result<(), SourceError> {
        match self.staged() {
            Some(staged) => staged.cleanup(),
            None => remove_download_dir(&self.ctx.download_dir),
        }
    }
}
