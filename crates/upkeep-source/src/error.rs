use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },

    #[error("Unsupported content type {content_type:?} for {url}")]
    UnsupportedContentType { url: String, content_type: String },

    #[error("Network error during {operation} ({stage}): {details}")]
    NetworkFailure {
        operation: &'static str,
        stage: NetworkStage,
        details: String,
    },

    #[error("Download interrupted: received {actual} of {expected} bytes")]
    DownloadInterrupted { expected: u64, actual: u64 },

    #[error("No matching release asset for {reference}")]
    NoMatchingAsset { reference: String },

    #[error("Could not resolve a direct download URL from {url}")]
    ResolutionFailure { url: String },

    #[error("Download cancelled")]
    Cancelled,

    #[error("IO error ({kind}): {message}")]
    Io {
        kind: std::io::ErrorKind,
        message: String,
    },

    #[error("Unknown update source: {name}")]
    UnknownSourceKind { name: String },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStage {
    #[error("request")]
    Request,
    #[error("status")]
    Status,
    #[error("response parse")]
    ResponseParse,
}

impl SourceError {
    pub fn network_request(operation: &'static str, details: impl Into<String>) -> Self {
        Self::NetworkFailure {
            operation,
            stage: NetworkStage::Request,
            details: details.into(),
        }
    }

    pub fn network_request_from<E>(operation: &'static str, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::network_request(operation, error.to_string())
    }

    pub fn network_status(operation: &'static str, status: impl std::fmt::Display) -> Self {
        Self::NetworkFailure {
            operation,
            stage: NetworkStage::Status,
            details: format!("HTTP {status}"),
        }
    }

    pub fn network_parse_from<E>(operation: &'static str, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::NetworkFailure {
            operation,
            stage: NetworkStage::ResponseParse,
            details: error.to_string(),
        }
    }

    /// Whether this failure is the caller asking the transfer to stop.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        SourceError::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
