use async_trait::async_trait;
use log::{debug, error};
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CONTENT_DISPOSITION, HeaderMap, HeaderValue, LOCATION, REFERER,
    USER_AGENT,
};
use upkeep_source::{
    ArtifactHandle, DownloadOutcome, ProgressFn, SourceError, SourceKind, UpdateDescriptor,
    UpdateSource,
};

use crate::context::SourceContext;
use crate::probe::{content_type, header_text};
use crate::static_source::{StaticSource, is_http_url};

const ACCEPT_ARTIFACT: &str = "application/octet-stream,application/x-appimage,*/*";
const ACCEPT_LANGUAGE_VALUE: &str = "en-US,en;q=0.9";

const ARTIFACT_MARKER: &str = "appimage";

const PROBE_CONTENT_TYPES: [&str; 3] = [
    "application/octet-stream",
    "application/x-appimage",
    "binary/octet-stream",
];

/// URL fragments typical of release and download hosting.
const DOWNLOAD_PAGE_MARKERS: [&str; 8] = [
    "download.",
    ".releases.",
    "releases.",
    "github.com",
    "gitlab.",
    "sourceforge.net",
    "dl.",
    ".io/download",
];

fn browser_user_agent(arch: &str) -> String {
    format!(
        "Mozilla/5.0 (X11; Linux {arch}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36"
    )
}

fn browser_headers(arch: &str, referer: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(agent) = HeaderValue::from_str(&browser_user_agent(arch)) {
        headers.insert(USER_AGENT, agent);
    }
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_ARTIFACT));
    if let Some(referer) = referer {
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE),
        );
        if let Ok(value) = HeaderValue::from_str(referer) {
            headers.insert(REFERER, value);
        }
    }
    headers
}

/// Resolve a download trigger URL to the URL that actually serves the file.
///
/// Tries, in order: an explicit `Location` header, the final URL after
/// redirects, and finally the original URL itself when the response carries a
/// `Content-Disposition` filename.
pub async fn resolve_static_url(ctx: &SourceContext, url: &str) -> Option<String> {
    let Ok(original) = reqwest::Url::parse(url) else {
        error!("Cannot resolve malformed URL: {url}");
        return None;
    };

    debug!("Attempting to resolve dynamic URL: {url}");
    let response = match ctx
        .client()
        .get(url)
        .headers(browser_headers(&ctx.host_arch, Some(url)))
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
    {
        Ok(response) => response,
        Err(err) => {
            error!("Request to resolve {url} failed: {err}");
            return None;
        }
    };

    debug!("Response status: {}", response.status());
    debug!("Response headers: {:?}", response.headers());

    let location = header_text(response.headers(), LOCATION);
    if !location.is_empty()
        && let Ok(resolved) = response.url().join(&location)
    {
        debug!("Resolved {url} through Location header to {resolved}");
        return Some(resolved.to_string());
    }

    if response.url() != &original {
        debug!("Using final URL after redirect: {}", response.url());
        return Some(response.url().to_string());
    }

    let disposition = header_text(response.headers(), CONTENT_DISPOSITION);
    if disposition.contains("filename=") {
        debug!("Using original URL as it has Content-Disposition: {disposition}");
        return Some(url.to_string());
    }

    error!("Could not extract a download URL from {url}");
    None
}

/// A URL that redirects or triggers the real download.
///
/// The resolved URL is cached and handled like a [`StaticSource`]; a change
/// of resolved URL between checks is itself taken as a new release.
#[derive(Debug)]
pub struct DynamicSource {
    original_url: String,
    inner: StaticSource,
}

impl DynamicSource {
    /// Build the source, resolving `url` once up front. When resolution fails
    /// the original URL is used until a later attempt succeeds.
    pub async fn connect(ctx: SourceContext, url: &str, embedded: bool) -> Self {
        let resolved = resolve_static_url(&ctx, url).await;
        let inner = StaticSource::new(ctx, resolved.as_deref().unwrap_or(url), embedded);

        Self {
            original_url: url.to_string(),
            inner,
        }
    }

    /// Permissive check; wrong guesses surface when downloading.
    pub async fn can_handle(ctx: &SourceContext, url: &str) -> bool {
        if !is_http_url(url) {
            return false;
        }

        let lowered = url.to_ascii_lowercase();
        if lowered.contains(ARTIFACT_MARKER) {
            debug!("URL looks like an AppImage link: {url}");
            return true;
        }

        match ctx
            .probe
            .quick_head(url, browser_headers(&ctx.host_arch, None))
            .await
        {
            Ok(headers) => {
                let content_type = content_type(&headers);
                if PROBE_CONTENT_TYPES.contains(&content_type.as_str()) {
                    debug!("Content-Type suggests an AppImage: {content_type}");
                    return true;
                }

                let disposition =
                    header_text(&headers, CONTENT_DISPOSITION).to_ascii_lowercase();
                if disposition.contains(ARTIFACT_MARKER) {
                    debug!("Content-Disposition suggests an AppImage: {disposition}");
                    return true;
                }
            }
            Err(err) => debug!("HEAD {url} failed, using URL heuristics: {err}"),
        }

        if DOWNLOAD_PAGE_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
        {
            debug!("URL looks like a download page: {url}");
            return true;
        }

        debug!("URL does not look like an AppImage download: {url}");
        false
    }

    #[must_use]
    pub fn original_url(&self) -> &str {
        &self.original_url
    }

    #[must_use]
    pub fn resolved_url(&self) -> String {
        self.inner.url()
    }
}

#[async_trait]
impl UpdateSource for DynamicSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Dynamic
    }

    fn descriptor(&self) -> UpdateDescriptor {
        UpdateDescriptor::Dynamic {
            url: self.original_url.clone(),
        }
    }

    fn is_embedded(&self) -> bool {
        self.inner.is_embedded()
    }

    async fn is_update_available(&self, artifact: &ArtifactHandle) -> bool {
        let current = self.inner.url();

        if let Some(fresh) = resolve_static_url(self.inner.context(), &self.original_url).await
            && fresh != current
        {
            debug!("Static URL has changed: {current} -> {fresh}");
            self.inner.set_url(fresh);
            return true;
        }

        self.inner.is_update_available(artifact).await
    }

    async fn download(&self, on_progress: ProgressFn<'_>) -> Result<DownloadOutcome, SourceError> {
        let current = self.inner.url();

        if current.is_empty() || current == self.original_url {
            let Some(resolved) = resolve_static_url(self.inner.context(), &self.original_url).await
            else {
                return Err(SourceError::ResolutionFailure {
                    url: self.original_url.clone(),
                });
            };
            debug!("Resolved URL before download: {resolved}");
            self.inner.set_url(resolved);
        }

        self.inner.download(on_progress).await
    }

    fn cancel_download(&self) {
        self.inner.cancel_download();
    }

    fn cleanup(&self) -> Result<(), SourceError> {
        self.inner.cleanup()
    }
}
