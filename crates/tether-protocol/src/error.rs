//! Protocol-level error types.

use thiserror::Error;

/// A proxy entry that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyParseError {
    #[error("proxy entry `{0}` has no scheme (expected e.g. http://host:port or `direct`)")]
    MissingScheme(String),
    #[error("proxy entry `{0}` has no host")]
    MissingHost(String),
    #[error("invalid proxy port `{0}`")]
    InvalidPort(String),
}
