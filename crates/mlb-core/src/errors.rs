/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so command handlers
/// can turn any failure into a user-facing reply in one place.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP Error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{address} is not a member of {list_id}")]
    NotMember { list_id: String, address: String },

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// True when a list lookup failed on the remote side (unknown or malformed id).
    pub fn is_invalid_id(&self) -> bool {
        matches!(self, Error::Http { .. } | Error::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
