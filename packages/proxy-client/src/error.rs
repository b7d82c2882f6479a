use thiserror::Error;

/// Errors raised while constructing a [`crate::ProxyClient`].
///
/// Request-time failures are never errors: they are classified into
/// [`crate::Outcome::SoftFail`] so callers decide how to escalate.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The session credential cannot be carried in a cookie header
    #[error("session credential is not a valid header value")]
    InvalidCredential,

    /// The underlying HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ProxyError>;
