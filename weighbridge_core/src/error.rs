use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum CoreError {
    /// The one matching condition surfaced as an error: an explicit match
    /// request named an identity the store does not know.
    #[error("weighing record not found: {0}")]
    RecordNotFound(Uuid),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("telemetry timeout")]
    Timeout,
    #[error("telemetry fault: {0}")]
    Telemetry(String),
    #[error("capture failed: {0}")]
    Capture(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
