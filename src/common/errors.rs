//! Error types for the repricing engine

use thiserror::Error;

/// Result type alias using our RepricerError
pub type Result<T> = std::result::Result<T, RepricerError>;

/// Main error type for engine and collaborator operations
#[derive(Error, Debug)]
pub enum RepricerError {
    /// Bad or missing strategy/rule fields
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown strategy, rule, listing or competitor
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate name, delete-while-applied, duplicate competitor
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A collaborator fetch or push failed
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A collaborator call exceeded its time budget
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// HTTP request errors
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Filesystem errors (catalog snapshots)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RepricerError {
    /// True for failures of an external collaborator (network, timeout, bad reply)
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            RepricerError::UpstreamUnavailable(_)
                | RepricerError::Timeout(_)
                | RepricerError::HttpRequest(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_classification() {
        assert!(RepricerError::Timeout("push".into()).is_upstream());
        assert!(RepricerError::UpstreamUnavailable("down".into()).is_upstream());
        assert!(!RepricerError::Conflict("name".into()).is_upstream());
        assert!(!RepricerError::Validation("value".into()).is_upstream());
    }
}
