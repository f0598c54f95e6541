use std::time::Duration;

use log::{debug, warn};
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;
use upkeep_source::{GithubReleaseRef, ReleaseAsset, SourceError};

const RELEASE_LOOKUP: &str = "GitHub release lookup";
const GITHUB_JSON: &str = "application/vnd.github+json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitHubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseClientOptions {
    pub api_base: String,
    pub token: Option<String>,
    pub user_agent: String,
    pub retry_delays_secs: Vec<u64>,
}

impl Default for ReleaseClientOptions {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            token: None,
            user_agent: format!("upkeep/{}", env!("CARGO_PKG_VERSION")),
            retry_delays_secs: vec![0, 2, 5],
        }
    }
}

enum Attempt {
    Retry(SourceError),
    Fatal(SourceError),
}

/// Thin client for the GitHub Releases REST endpoint.
#[derive(Debug, Clone)]
pub struct ReleaseClient {
    client: reqwest::Client,
    options: ReleaseClientOptions,
}

impl ReleaseClient {
    #[must_use]
    pub fn new(client: reqwest::Client, options: ReleaseClientOptions) -> Self {
        Self { client, options }
    }

    #[must_use]
    pub fn options(&self) -> &ReleaseClientOptions {
        &self.options
    }

    /// `latest` maps to `/releases/latest`, a numeric id to `/releases/{id}`
    /// and anything else to `/releases/tags/{tag}`.
    #[must_use]
    pub fn release_url(&self, reference: &GithubReleaseRef) -> String {
        let selector = reference.release_selector.as_str();
        let endpoint = if selector == "latest" {
            "latest".to_string()
        } else if selector.bytes().all(|b| b.is_ascii_digit()) {
            selector.to_string()
        } else {
            format!("tags/{selector}")
        };

        format!(
            "{}/repos/{}/{}/releases/{endpoint}",
            self.options.api_base.trim_end_matches('/'),
            reference.owner,
            reference.repo,
        )
    }

    /// Fetch release metadata, retrying transport failures and 5xx responses.
    ///
    /// # Errors
    /// Returns the last failure once all attempts are exhausted, or the first
    /// non-retryable one (4xx, malformed JSON).
    pub async fn fetch_release(
        &self,
        reference: &GithubReleaseRef,
    ) -> Result<GitHubRelease, SourceError> {
        let url = self.release_url(reference);
        let delays: &[u64] = if self.options.retry_delays_secs.is_empty() {
            &[0]
        } else {
            &self.options.retry_delays_secs
        };

        let mut last_error = None;
        for (attempt, &delay_secs) in delays.iter().enumerate() {
            if delay_secs > 0 {
                tokio::time::sleep(Duration::from_secs(delay_secs)).await;
            }

            match self.fetch_once(&url).await {
                Ok(release) => return Ok(release),
                Err(Attempt::Fatal(error)) => return Err(error),
                Err(Attempt::Retry(error)) => {
                    warn!("{RELEASE_LOOKUP} attempt {} failed: {error}", attempt + 1);
                    last_error = Some(error);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| SourceError::network_request(RELEASE_LOOKUP, "no attempt made")))
    }

    async fn fetch_once(&self, url: &str) -> Result<GitHubRelease, Attempt> {
        debug!("Fetching {url}");

        let mut request = self
            .client
            .get(url)
            .header(USER_AGENT, &self.options.user_agent)
            .header(ACCEPT, GITHUB_JSON);
        if let Some(token) = &self.options.token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|error| Attempt::Retry(SourceError::network_request_from(RELEASE_LOOKUP, &error)))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(Attempt::Retry(SourceError::network_status(
                RELEASE_LOOKUP,
                status.as_u16(),
            )));
        }
        if !status.is_success() {
            return Err(Attempt::Fatal(SourceError::network_status(
                RELEASE_LOOKUP,
                status.as_u16(),
            )));
        }

        response
            .json::<GitHubRelease>()
            .await
            .map_err(|error| Attempt::Fatal(SourceError::network_parse_from(RELEASE_LOOKUP, &error)))
    }
}
