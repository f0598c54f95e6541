use std::time::Duration;

use log::{debug, error, warn};
use reqwest::header::{AsHeaderName, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap};

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Best-effort header lookups against arbitrary download hosts.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    probe_timeout: Duration,
}

impl HttpProbe {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    #[must_use]
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Fetch response headers for `url`, following redirects.
    ///
    /// Tries `HEAD` first and falls back to a `GET` whose body is dropped
    /// unread, since some hosts reject `HEAD`. Returns an empty map when both
    /// fail.
    pub async fn fetch_headers(&self, url: &str) -> HeaderMap {
        match self.head(url).await {
            Ok(headers) => return headers,
            Err(error) => {
                error!("HEAD {url} failed: {error}");
                warn!("Retrying {url} with a streamed GET");
            }
        }

        match self.get_headers(url).await {
            Ok(headers) => headers,
            Err(error) => {
                error!("GET {url} failed: {error}");
                HeaderMap::new()
            }
        }
    }

    /// Single `HEAD` request bounded by the short probe timeout. The status
    /// code is not checked.
    ///
    /// # Errors
    /// Returns an error if the request cannot be completed in time.
    pub async fn quick_head(
        &self,
        url: &str,
        headers: HeaderMap,
    ) -> Result<HeaderMap, reqwest::Error> {
        let response = self
            .client
            .head(url)
            .headers(headers)
            .timeout(self.probe_timeout)
            .send()
            .await?;
        debug!("HEAD {url} answered {}", response.status());
        Ok(response.headers().clone())
    }

    async fn head(&self, url: &str) -> Result<HeaderMap, reqwest::Error> {
        let response = self.client.head(url).send().await?.error_for_status()?;
        Ok(response.headers().clone())
    }

    async fn get_headers(&self, url: &str) -> Result<HeaderMap, reqwest::Error> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let headers = response.headers().clone();
        drop(response);
        Ok(headers)
    }
}

/// Header value as text, or an empty string when absent or not visible ASCII.
#[must_use]
pub fn header_text<K: AsHeaderName>(headers: &HeaderMap, name: K) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Lower-cased mime essence of `content-type`, without parameters.
#[must_use]
pub fn content_type(headers: &HeaderMap) -> String {
    header_text(headers, CONTENT_TYPE)
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[must_use]
pub fn content_length(headers: &HeaderMap) -> Option<u64> {
    header_text(headers, CONTENT_LENGTH).trim().parse().ok()
}
