//! Error types shared by every stage of a send.

use std::io;
use std::path::PathBuf;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Process exit status for any failure before the message reaches Gmail.
pub const EXIT_FAILURE: i32 = 1;

/// Process exit status when Gmail rejected or never received the message.
pub const EXIT_SEND_FAILURE: i32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// None of APPDATA, XDG_CONFIG_HOME or HOME is set.
    #[error("could not determine a configuration directory (set HOME or XDG_CONFIG_HOME)")]
    ConfigDirUnavailable,

    /// The config file exists but is not valid JSON or lacks a key.
    #[error("could not load config file '{}': {reason}", .path.display())]
    ConfigCorrupt { path: PathBuf, reason: String },

    #[error("could not find credentials file '{}'", .0.display())]
    CredentialFileNotFound(PathBuf),

    #[error("could not open attachment '{}': {source}", .path.display())]
    AttachmentNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not read message body from '{}': {source}", .path.display())]
    BodyUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid email address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("a message needs at least one recipient")]
    NoRecipients,

    #[error("could not build MIME message: {0}")]
    Message(String),

    /// Token refresh or authorization-code exchange failed.
    #[error("authorization failed: {0}")]
    Auth(String),

    /// The send call itself failed.
    #[error("failed to send email: {0}")]
    Send(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn send(message: impl Into<String>) -> Self {
        Self::Send(message.into())
    }

    /// Exit status the process should terminate with for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Send(_) => EXIT_SEND_FAILURE,
            _ => EXIT_FAILURE,
        }
    }
}
