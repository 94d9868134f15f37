use thiserror::Error;

/// Errors produced by the client library.
#[derive(Error, Debug)]
pub enum Error {
    /// The host reported no connectivity; the request was never sent.
    #[error("Offline: request aborted before sending")]
    Offline,

    /// The server answered with a non-success status. `message` is already
    /// normalized from the backend's nested error shapes.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Transport-level failure (DNS, TLS, connection reset, timeout).
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A response or event payload did not match any recognized shape.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Websocket-level failure.
    #[error("Socket error: {0}")]
    Socket(String),

    /// An operation required an authenticated session but no token is set.
    #[error("No bearer token in session state")]
    MissingToken,

    /// Local session store failure.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Encryption or decryption of the persisted session blob failed.
    #[error("Session blob crypto failure")]
    Crypto,

    /// Generic I/O error (e.g. creating the data directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to determine a platform config/data directory.
    #[error("Could not determine application directory")]
    NoAppDir,

    /// Config file parse failure.
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
