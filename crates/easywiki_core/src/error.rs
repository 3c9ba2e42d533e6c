use thiserror::Error;

use crate::transport::TransportError;

/// Errors surfaced by the client. API-level failures (permission denied,
/// bad token, missing page) are not errors here: they come back as data in
/// the decoded response and the caller inspects them.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("MediaWiki login failed: {reason}")]
    Authentication { reason: String },

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
