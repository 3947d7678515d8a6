use thiserror::Error;

#[derive(Debug, Error)]
pub enum LineError {
    #[error("failed to open line {port}: {reason}")]
    Open { port: String, reason: String },
    #[error("line read timeout")]
    Timeout,
    #[error("line not initialized")]
    NotInitialized,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LineError>;
