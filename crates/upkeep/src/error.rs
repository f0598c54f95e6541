use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolverError {
    #[error("Failed to build HTTP client: {details}")]
    HttpClient { details: String },
}

impl From<reqwest::Error> for ResolverError {
    fn from(error: reqwest::Error) -> Self {
        Self::HttpClient {
            details: error.to_string(),
        }
    }
}
