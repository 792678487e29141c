//! Error handling for prismeter
//!
//! Provides a unified error type and result type shared by all prismeter
//! crates.

/// Result type alias for prismeter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for prismeter
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential provider errors
    #[error("Credential error: {0}")]
    Credentials(String),

    /// HTTP transport errors (connect, timeout, body read)
    #[error("HTTP transport error: {0}")]
    Http(String),

    /// Upstream API returned a non-2xx status other than 401/403
    #[error("API request failed: {0}")]
    Api(String),

    /// Upstream API rejected the current credentials (401/403)
    #[error("authentication failed for cluster {0}")]
    Unauthorized(String),

    /// Credentials are known stale; the fetch was not attempted
    #[error("skipping {0} due to known stale creds")]
    StaleCredentials(String),

    /// Cluster discovery errors (undecodable top-level response shape)
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Metric definition catalog errors
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Metric registry errors (invalid definition, double registration)
    #[error("Registry error: {0}")]
    Registry(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error with context
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a credential error
    pub fn credentials(msg: impl Into<String>) -> Self {
        Self::Credentials(msg.into())
    }

    /// Create an HTTP transport error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an API status error
    pub fn api(msg: impl Into<String>) -> Self {
        Self::Api(msg.into())
    }

    /// Create an authentication-rejected error for the given cluster
    pub fn unauthorized(cluster: impl Into<String>) -> Self {
        Self::Unauthorized(cluster.into())
    }

    /// Create a known-stale fast-fail error for the given cluster
    pub fn stale_credentials(cluster: impl Into<String>) -> Self {
        Self::StaleCredentials(cluster.into())
    }

    /// Create a discovery error
    pub fn discovery(msg: impl Into<String>) -> Self {
        Self::Discovery(msg.into())
    }

    /// Create a catalog error
    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    /// Create a registry error
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    /// True when the upstream rejected the current credentials
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Unauthorized(_))
    }

    /// True when the fetch was skipped because credentials are known stale
    pub fn is_stale(&self) -> bool {
        matches!(self, Error::StaleCredentials(_))
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Credentials(_) => "credentials",
            Error::Http(_) => "http",
            Error::Api(_) => "api",
            Error::Unauthorized(_) => "unauthorized",
            Error::StaleCredentials(_) => "stale_credentials",
            Error::Discovery(_) => "discovery",
            Error::Catalog(_) => "catalog",
            Error::Registry(_) => "registry",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Yaml(_) => "yaml",
            Error::Other(_) => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::config("missing PRISM_CENTRAL_URL");
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(
            err.to_string(),
            "Configuration error: missing PRISM_CENTRAL_URL"
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::unauthorized("pe-01").is_unauthorized());
        assert!(!Error::unauthorized("pe-01").is_stale());
        assert!(Error::stale_credentials("pe-01").is_stale());
        assert!(!Error::http("connection refused").is_unauthorized());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(Error::config("x").category(), "config");
        assert_eq!(Error::unauthorized("x").category(), "unauthorized");
        assert_eq!(Error::stale_credentials("x").category(), "stale_credentials");
    }
}
