use thiserror::Error;

/// Failure taxonomy for the notification subsystem.
///
/// Auth failures (`MissingToken`, HTTP 401) are distinct from other REST
/// failures so callers can route them to a re-login flow instead of
/// retrying. Decode failures on push frames never become an `Error`: the
/// frame is dropped and the connection stays open.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no token available")]
    MissingToken,

    #[error("authentication rejected (HTTP 401)")]
    Unauthorized,

    #[error("request failed (HTTP {status}): {body}")]
    Http { status: u16, body: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for failures that should force a re-login rather than a retry.
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::MissingToken | Error::Unauthorized)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
