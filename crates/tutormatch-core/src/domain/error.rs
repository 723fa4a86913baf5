//! Error taxonomy for the allocation engine.

use tutormatch_state::StorageError;

/// tutormatch engine errors.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Another recompute or clear holds the ledger.
    #[error("allocation busy: {0} already in progress")]
    Busy(&'static str),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl MatchError {
    /// True when repeating the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MatchError::Busy(_) | MatchError::Storage(_))
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, MatchError>;
