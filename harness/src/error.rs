//! Harness-specific error types

use shared::SharedError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Invalid scenario '{scenario}': {reason}")]
    Configuration { scenario: String, reason: String },

    #[error("Transport failure at {address}: {message}")]
    Transport { address: String, message: String },

    #[error("Verdict already recorded for scenario '{scenario}'")]
    DuplicateVerdict { scenario: String },

    #[error("Shared component error: {0}")]
    Shared(#[from] SharedError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HarnessError {
    pub fn configuration<S: Into<String>, R: Into<String>>(scenario: S, reason: R) -> Self {
        HarnessError::Configuration {
            scenario: scenario.into(),
            reason: reason.into(),
        }
    }

    pub fn transport<A: ToString, M: Into<String>>(address: A, message: M) -> Self {
        HarnessError::Transport {
            address: address.to_string(),
            message: message.into(),
        }
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;
