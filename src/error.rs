//! Error types for SparshaIO

use crate::transport::LinkError;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// SparshaIO error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration parsed but holds unusable values
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Link failure that escaped the supervisor
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// Every port in the configured range is taken
    #[error("No free port in range {first}..={last}")]
    NoFreePort {
        /// First port tried
        first: u16,
        /// Last port tried
        last: u16,
    },

    /// A channel could not be read (hardware absent or misconfigured)
    #[error("Channel {index} read failed: {reason}")]
    ChannelRead {
        /// Position of the channel in the sample vector
        index: usize,
        /// Underlying cause
        reason: String,
    },

    /// Frame text that does not decode to a sample vector
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Shutdown was requested before the operation completed
    #[error("Shutdown requested")]
    Shutdown,

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
