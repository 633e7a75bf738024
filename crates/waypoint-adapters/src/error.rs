//! Adapter error types.

/// Errors raised inside provider adapters, before they are wrapped into tool
/// execution failures at the handler boundary.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// A required credential is not configured.
    #[error("missing credential: {name}")]
    MissingCredential { name: String },

    /// The upstream HTTP call failed (transport or non-2xx status).
    #[error("upstream request failed: {reason}")]
    Upstream { reason: String },

    /// The upstream provider answered with an error payload.
    #[error("provider rejected request: {info}")]
    Provider { info: String },

    /// The upstream response body did not have the expected shape.
    #[error("response decode failed: {reason}")]
    Decode { reason: String },
}

/// Convenience alias used throughout the adapters crate.
pub type Result<T> = std::result::Result<T, AdapterError>;

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        Self::Upstream {
            reason: err.to_string(),
        }
    }
}
