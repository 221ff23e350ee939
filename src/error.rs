use thiserror::Error;

/// Custom error types for `dbtrack`
#[derive(Error, Debug)]
pub enum DbTrackError {
    /// Error reported by the underlying driver
    #[error("Database error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Configuration loading or parsing error
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// A statement exceeded the fixed query timeout.
    ///
    /// The SQL text is deliberately not carried here; it may contain data.
    #[error("Query timed out after {seconds}s")]
    QueryTimeout {
        /// The timeout that was exceeded
        seconds: u64,
    },

    /// The connect attempt exceeded the connect timeout
    #[error("Connect timed out after {seconds}s")]
    ConnectTimeout {
        /// The timeout that was exceeded
        seconds: u64,
    },

    /// Operation attempted on a closed connection
    #[error("Connection is closed")]
    ConnectionClosed,

    /// An identifier failed validation before SQL interpolation
    #[error("Invalid SQL identifier: {name}")]
    InvalidIdentifier {
        /// The rejected identifier
        name: String,
    },
}

/// Result type alias for `dbtrack` operations
pub type Result<T> = std::result::Result<T, DbTrackError>;
