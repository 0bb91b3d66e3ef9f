//! Error types raised while resolving combatants and running battles.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DuelError {
    #[error("pokemon not found: {identifier}")]
    ProfileNotFound { identifier: String },

    #[error("profile provider unavailable for {identifier}: {reason}")]
    ProviderUnavailable { identifier: String, reason: String },

    #[error("malformed profile for {identifier}: {reason}")]
    MalformedProfile { identifier: String, reason: String },

    #[error("battle cancelled before turn {turn}")]
    Cancelled { turn: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DuelError>;
