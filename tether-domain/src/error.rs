use std::time::Duration;

use thiserror::Error;

// ---

#[derive(Debug, Error)]
pub enum TetherError {
    // ---
    /// The provider rejected a call. Carries the provider's free-text message
    /// verbatim; classification only ever looks at this text.
    #[error("{0}")]
    Provider(String),

    #[error("connection provider closed")]
    ProviderClosed,

    #[error("session store error: {0}")]
    Store(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("engine stopped")]
    EngineStopped,
}

// ---

impl TetherError {
    // ---
    /// Free-text description used for substring classification.
    pub fn message(&self) -> String {
        match self {
            TetherError::Provider(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

// ---

pub type Result<T> = std::result::Result<T, TetherError>;
