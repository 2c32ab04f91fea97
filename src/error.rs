//! Crate-wide error type

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while establishing or using a connection
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from the underlying transport
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration (connection string, TLS setup, charset name)
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed or unexpected wire traffic
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Authentication rejected or impossible with the available plugins
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// ERR packet from the server outside of authentication
    #[error("server error {code} ({sql_state}): {message}")]
    Server {
        /// MySQL error code (e.g. 1045)
        code: u16,
        /// Five-character SQLSTATE (e.g. "28000")
        sql_state: String,
        /// Human-readable message
        message: String,
    },

    /// Server closed the connection
    #[error("connection closed by server")]
    ConnectionClosed,

    /// Operation attempted while the connection is mid-command
    #[error("connection busy: {0}")]
    ConnectionBusy(String),

    /// Invalid connection state transition
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// What the state machine would have accepted
        expected: String,
        /// The transition that was attempted
        actual: String,
    },

    /// Protocol feature the crate does not implement
    #[error("unsupported: {0}")]
    Unsupported(String),
}
