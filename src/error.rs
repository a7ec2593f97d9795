//! Error taxonomy shared by the remote client, the background tasks and the UI

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Network or HTTP-level failure before a response was understood
    #[error("transport error: {0}")]
    Transport(String),

    /// A bounded polling loop gave up
    #[error("{0} timed out")]
    Timeout(String),

    /// Bad local input; resolved where it happens and never shown as a banner
    #[error("invalid input: {0}")]
    Validation(String),

    /// Non-2xx status or a payload we could not make sense of
    #[error("service error: {0}")]
    Service(String),

    /// Local filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_status() || e.is_decode() {
            Error::Service(e.to_string())
        } else {
            Error::Transport(e.to_string())
        }
    }
}

impl Error {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}
