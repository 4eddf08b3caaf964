//! Error types shared by the session, generator and score store.

use thiserror::Error;

use crate::session::{Operation, Phase};

/// Result type for game operations.
pub type GameResult<T> = Result<T, GameError>;

/// Errors raised synchronously by the game core. None are retried internally.
#[derive(Debug, Error)]
pub enum GameError {
    /// An operation was invoked in a phase that does not allow it.
    #[error("cannot {operation} while the session is {phase}")]
    InvalidState { phase: Phase, operation: Operation },

    /// The round configuration was rejected.
    #[error("invalid round configuration: {0}")]
    InvalidConfig(String),

    /// A time value was negative or not finite.
    #[error("invalid time value: {0}")]
    InvalidTime(f64),

    /// The persisted best-scores record could not be parsed.
    #[error("best scores record is corrupt: {0}")]
    StorageCorrupt(String),

    /// The storage backend failed.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}
