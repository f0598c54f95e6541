use log::{debug, info};
use upkeep_core::{
    DynamicSource, MetadataReader, ReadelfReader, SourceContext, StaticSource, embedded_descriptor,
};
use upkeep_github::{GithubReleaseSource, ReleaseClient};
use upkeep_platform::detect_host_arch;
use upkeep_source::{ArtifactHandle, SourceKind, UpdateSource};

use crate::config::AppUpdateConfig;
use crate::error::ResolverError;
use crate::settings::ResolverSettings;

/// Picks and constructs the update source for an artifact or URL.
///
/// Candidates are tried in [`SourceKind::ALL`] order. A descriptor embedded
/// in the artifact takes precedence over the configured URL.
pub struct UpdateResolver {
    ctx: SourceContext,
    releases: ReleaseClient,
    reader: Box<dyn MetadataReader>,
}

impl UpdateResolver {
    #[must_use]
    pub fn new(ctx: SourceContext, releases: ReleaseClient) -> Self {
        Self {
            ctx,
            releases,
            reader: Box::new(ReadelfReader),
        }
    }

    /// Build a resolver from settings, detecting the host architecture
    /// unless overridden.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub async fn from_settings(settings: &ResolverSettings) -> Result<Self, ResolverError> {
        let client = reqwest::Client::builder()
            .timeout(settings.http_timeout())
            .user_agent(settings.user_agent.clone())
            .build()?;

        let host_arch = match &settings.host_arch {
            Some(arch) => arch.clone(),
            None => detect_host_arch().await,
        };

        let ctx = SourceContext::new(client.clone())
            .with_download_dir(settings.resolved_download_dir())
            .with_host_arch(&host_arch)
            .with_probe_timeout(settings.probe_timeout());
        let releases = ReleaseClient::new(client, settings.release_client_options());

        Ok(Self::new(ctx, releases))
    }

    #[must_use]
    pub fn with_reader(mut self, reader: impl MetadataReader + 'static) -> Self {
        self.reader = Box::new(reader);
        self
    }

    #[must_use]
    pub fn context(&self) -> &SourceContext {
        &self.ctx
    }

    /// Find the first source able to handle the artifact's embedded
    /// descriptor, then the first able to handle `url`.
    ///
    /// `forced` narrows the candidates to a single kind.
    pub async fn dispatch(
        &self,
        url: Option<&str>,
        artifact: Option<&ArtifactHandle>,
        forced: Option<SourceKind>,
    ) -> Option<Box<dyn UpdateSource>> {
        let candidates: Vec<SourceKind> = match forced {
            Some(kind) => vec![kind],
            None => SourceKind::ALL.to_vec(),
        };

        if let Some(artifact) = artifact
            && let Some(descriptor) = embedded_descriptor(self.reader.as_ref(), artifact).await
        {
            if let Some(source) = self.first_match(&candidates, &descriptor, true).await {
                return Some(source);
            }
            debug!("No source accepts embedded descriptor {descriptor}");
        }

        let url = url.map(str::trim).filter(|url| !url.is_empty())?;
        let source = self.first_match(&candidates, url, false).await;
        if source.is_none() {
            info!("No update source can handle {url}");
        }
        source
    }

    /// Dispatch with the artifact's stored URL and source name.
    pub async fn dispatch_for_app(
        &self,
        config: &AppUpdateConfig,
        artifact: &ArtifactHandle,
    ) -> Option<Box<dyn UpdateSource>> {
        self.dispatch(
            config.update_url.as_deref(),
            Some(artifact),
            config.forced_kind(),
        )
        .await
    }

    async fn first_match(
        &self,
        candidates: &[SourceKind],
        input: &str,
        embedded: bool,
    ) -> Option<Box<dyn UpdateSource>> {
        for &kind in candidates {
            if let Some(source) = self.try_kind(kind, input, embedded).await {
                info!("Using {} source for {input}", kind.label());
                return Some(source);
            }
        }
        None
    }

    async fn try_kind(
        &self,
        kind: SourceKind,
        input: &str,
        embedded: bool,
    ) -> Option<Box<dyn UpdateSource>> {
        match kind {
            SourceKind::Static => StaticSource::can_handle(&self.ctx, input)
                .await
                .then(|| StaticSource::new(self.ctx.clone(), input, embedded).into()),
            SourceKind::Dynamic => {
                if !DynamicSource::can_handle(&self.ctx, input).await {
                    return None;
                }
                Some(
                    DynamicSource::connect(self.ctx.clone(), input, embedded)
                        .await
                        .into(),
                )
            }
            SourceKind::Github => {
                if !GithubReleaseSource::can_handle(input) {
                    return None;
                }
                GithubReleaseSource::new(self.ctx.clone(), self.releases.clone(), input, embedded)
                    .map(Into::into)
                    .ok()
            }
        }
    }
}
