use thiserror::Error;

/// Main error type for PRIME attack operations
#[derive(Error, Debug)]
pub enum PrimeError {
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Frame invalid: {0}")]
    FrameInvalid(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Channel closed")]
    Closed,
}

/// Result type alias for PRIME operations
pub type PrimeResult<T> = Result<T, PrimeError>;
