use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use log::{debug, error, warn};
use upkeep_source::{
    ArtifactHandle, DownloadOutcome, ProgressFn, SourceError, SourceKind, UpdateDescriptor,
    UpdateSource,
};

use crate::context::SourceContext;
use crate::probe::{HttpProbe, content_length, content_type};
use crate::transfer::{Transfer, remove_download_dir};

const ZSYNC_SUFFIX: &str = ".zsync";

/// Mime types served for AppImage bundles.
const ARTIFACT_CONTENT_TYPES: [&str; 3] = [
    "application/x-iso9660-appimage",
    "application/vnd.appimage",
    "application/x-appimage",
];

const GENERIC_CONTENT_TYPES: [&str; 2] = ["application/octet-stream", "binary/octet-stream"];

#[must_use]
pub fn is_supported_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    ARTIFACT_CONTENT_TYPES.contains(&essence.as_str())
        || GENERIC_CONTENT_TYPES.contains(&essence.as_str())
}

/// Drop a trailing `.zsync`: the artifact sits next to its zsync file.
#[must_use]
pub fn strip_zsync_suffix(url: &str) -> &str {
    url.strip_suffix(ZSYNC_SUFFIX).unwrap_or(url)
}

pub(crate) fn is_http_url(url: &str) -> bool {
    reqwest::Url::parse(url)
        .is_ok_and(|parsed| matches!(parsed.scheme(), "http" | "https") && parsed.has_host())
}

/// A fixed direct-download URL. Updates are detected by size difference.
#[derive(Debug)]
pub struct StaticSource {
    ctx: SourceContext,
    url: Mutex<String>,
    embedded: bool,
    transfer: Transfer,
}

impl StaticSource {
    #[must_use]
    pub fn new(ctx: SourceContext, url: &str, embedded: bool) -> Self {
        Self {
            ctx,
            url: Mutex::new(strip_zsync_suffix(url).to_string()),
            embedded,
            transfer: Transfer::new(),
        }
    }

    /// Accept `url` if it is a valid HTTP(S) URL serving an artifact.
    pub async fn can_handle(ctx: &SourceContext, url: &str) -> bool {
        if !is_http_url(url) {
            debug!("Not a valid download URL: {url}");
            return false;
        }

        let url = strip_zsync_suffix(url);
        let headers = ctx.probe.fetch_headers(url).await;
        let content_type = content_type(&headers);
        debug!("{url} responded with content-type: {content_type}");

        let supported = is_supported_content_type(&content_type);
        if !supported {
            warn!("{url} does not return a supported content-type header");
        }
        supported
    }

    #[must_use]
    pub fn url(&self) -> String {
        self.url.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub(crate) fn set_url(&self, url: String) {
        *self.url.lock().unwrap_or_else(PoisonError::into_inner) = url;
    }

    pub(crate) fn context(&self) -> &SourceContext {
        &self.ctx
    }
}

/// Compare the advertised size of `url` against the installed artifact.
///
/// A missing or zero `content-length` means the answer is unknown, which is
/// reported as no update.
pub(crate) async fn remote_size_differs(
    probe: &HttpProbe,
    url: &str,
    artifact: &ArtifactHandle,
) -> bool {
    let headers = probe.fetch_headers(url).await;
    let remote_size = content_length(&headers).unwrap_or(0);

    let local_size = match artifact.file_size() {
        Ok(size) => size,
        Err(err) => {
            error!(
                "Cannot read size of {}: {err}",
                artifact.file_path().display()
            );
            return false;
        }
    };

    debug!("{url} has length {remote_size}, installed artifact has {local_size}");

    remote_size != 0 && remote_size != local_size
}

#[async_trait]
impl UpdateSource for StaticSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Static
    }

    fn descriptor(&self) -> UpdateDescriptor {
        UpdateDescriptor::Static { url: self.url() }
    }

    fn is_embedded(&self) -> bool {
        self.embedded
    }

    async fn is_update_available(&self, artifact: &ArtifactHandle) -> bool {
        remote_size_differs(&self.ctx.probe, &self.url(), artifact).await
    }

    async fn download(&self, on_progress: ProgressFn<'_>) -> Result<DownloadOutcome, SourceError> {
        let url = self.url();
        if !is_http_url(&url) {
            return Err(SourceError::InvalidUrl { url });
        }
        self.transfer
            .download(self.ctx.client(), &url, &self.ctx.download_dir, on_progress)
            .await
    }

    fn cancel_download(&self) {
        self.transfer.cancel();
    }

    fn cleanup(&self) -> Result<(), SourceError> {
        remove_download_dir(&self.ctx.download_dir)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::transfer::downloaded_files;

    fn context(dir: &std::path::Path) -> SourceContext {
        SourceContext::new(reqwest::Client::new()).with_download_dir(dir.join("downloads"))
    }

    fn artifact_of_size(dir: &std::path::Path, size: usize) -> ArtifactHandle {
        let path = dir.join("installed.AppImage");
        std::fs::write(&path, vec![0_u8; size]).expect("artifact should be written");
        ArtifactHandle::new(path)
    }

    async fn serve_head(server: &MockServer, route: &str, content_type: &str, length: usize) {
        Mock::given(method("HEAD"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0_u8; length], content_type))
            .mount(server)
            .await;
    }

    #[test]
    fn supported_content_types_ignore_parameters() {
        assert!(is_supported_content_type("application/vnd.appimage"));
        assert!(is_supported_content_type("Application/Octet-Stream; q=1"));
        assert!(is_supported_content_type("binary/octet-stream"));
        assert!(!is_supported_content_type("text/html; charset=utf-8"));
        assert!(!is_supported_content_type(""));
    }

    #[test]
    fn zsync_suffix_is_stripped_once() {
        assert_eq!(
            strip_zsync_suffix("https://x/app.AppImage.zsync"),
            "https://x/app.AppImage"
        );
        assert_eq!(strip_zsync_suffix("https://x/app.AppImage"), "https://x/app.AppImage");
    }

    #[test]
    fn new_strips_zsync_and_keeps_embedded_flag() {
        let dir = tempfile::tempdir().expect("temporary directory should be created");

        let source = StaticSource::new(context(dir.path()), "https://x/app.AppImage.zsync", true);

        assert_eq!(source.url(), "https://x/app.AppImage");
        assert!(source.is_embedded());
        assert_eq!(source.kind(), SourceKind::Static);
        assert_eq!(source.source_url(), "https://x/app.AppImage");
    }

    #[tokio::test]
    async fn can_handle_rejects_invalid_urls_without_network() {
        let dir = tempfile::tempdir().expect("temporary directory should be created");
        let ctx = context(dir.path());

        assert!(!StaticSource::can_handle(&ctx, "not a url").await);
        assert!(!StaticSource::can_handle(&ctx, "ftp://example.com/app").await);
        assert!(!StaticSource::can_handle(&ctx, "gh-releases-zsync|a|b|latest|c").await);
    }

    #[tokio::test]
    async fn can_handle_checks_content_type_of_unzsynced_url() {
        let server = MockServer::start().await;
        serve_head(&server, "/app.AppImage", "application/octet-stream", 10).await;
        serve_head(&server, "/page", "text/html", 10).await;
        let dir = tempfile::tempdir().expect("temporary directory should be created");
        let ctx = context(dir.path());

        assert!(
            StaticSource::can_handle(&ctx, &format!("{}/app.AppImage.zsync", server.uri())).await
        );
        assert!(!StaticSource::can_handle(&ctx, &format!("{}/page", server.uri())).await);
    }

    #[tokio::test]
    async fn update_available_iff_sizes_differ() {
        let server = MockServer::start().await;
        serve_head(&server, "/same.AppImage", "application/octet-stream", 100).await;
        serve_head(&server, "/bigger.AppImage", "application/octet-stream", 150).await;
        let dir = tempfile::tempdir().expect("temporary directory should be created");
        let artifact = artifact_of_size(dir.path(), 100);

        let same = StaticSource::new(
            context(dir.path()),
            &format!("{}/same.AppImage", server.uri()),
            false,
        );
        let bigger = StaticSource::new(
            context(dir.path()),
            &format!("{}/bigger.AppImage", server.uri()),
            false,
        );

        assert!(!same.is_update_available(&artifact).await);
        assert!(bigger.is_update_available(&artifact).await);
    }

    #[tokio::test]
    async fn zero_length_means_no_update() {
        let server = MockServer::start().await;
        serve_head(&server, "/empty", "application/octet-stream", 0).await;
        let dir = tempfile::tempdir().expect("temporary directory should be created");
        let artifact = artifact_of_size(dir.path(), 100);

        let source = StaticSource::new(
            context(dir.path()),
            &format!("{}/empty", server.uri()),
            false,
        );

        assert!(!source.is_update_available(&artifact).await);
    }

    #[tokio::test]
    async fn unreadable_artifact_means_no_update() {
        let server = MockServer::start().await;
        serve_head(&server, "/app", "application/octet-stream", 100).await;
        let dir = tempfile::tempdir().expect("temporary directory should be created");

        let source = StaticSource::new(context(dir.path()), &format!("{}/app", server.uri()), false);

        assert!(
            !source
                .is_update_available(&ArtifactHandle::new(dir.path().join("missing")))
                .await
        );
    }

    #[tokio::test]
    async fn download_then_cleanup_removes_directory() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/app.AppImage"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![3_u8; 4096]))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().expect("temporary directory should be created");
        let ctx = context(dir.path());
        let download_dir = ctx.download_dir.clone();

        let source = StaticSource::new(ctx, &format!("{}/app.AppImage", server.uri()), false);
        let outcome = source
            .download(&|_: f64| {})
            .await
            .expect("download should succeed");

        assert_eq!(outcome.fingerprint, "");
        assert_eq!(downloaded_files(&download_dir), vec![outcome.path.clone()]);

        source.cleanup().expect("cleanup should succeed");
        assert!(!download_dir.exists());
        source.cancel_download();
    }

    #[tokio::test]
    async fn download_of_malformed_url_is_rejected() {
        let dir = tempfile::tempdir().expect("temporary directory should be created");
        let ctx = context(dir.path());
        let download_dir = ctx.download_dir.clone();

        let result = StaticSource::new(ctx, "not a url", false)
            .download(&|_: f64| {})
            .await;

        assert_eq!(
            result,
            Err(SourceError::InvalidUrl {
                url: "not a url".to_string()
            })
        );
        assert!(!download_dir.exists());
    }
}
