use regex::Regex;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("invalid glob pattern {pattern:?}: {source}")]
pub struct GlobError {
    pattern: String,
    #[source]
    source: regex::Error,
}

/// Full-string matcher where `*` is the only wildcard.
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    pattern: String,
    regex: Regex,
}

impl GlobMatcher {
    /// Compile `pattern`, escaping everything except `*`.
    ///
    /// # Errors
    /// Returns an error if the generated expression exceeds the regex size
    /// limits.
    pub fn new(pattern: &str) -> Result<Self, GlobError> {
        let body = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let regex = Regex::new(&format!("(?s)^{body}$")).map_err(|source| GlobError {
            pattern: pattern.to_string(),
            source,
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    #[must_use]
    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}
