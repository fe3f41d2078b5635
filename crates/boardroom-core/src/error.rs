//! Error taxonomy for the boardroom core.
//!
//! Validation errors (`EmptyMessage`, `UnknownPersona`) are rejected before any
//! routing happens; `Provider`/`Transport` cover the completion backend;
//! `Store` covers the thread store. The gateway maps these onto HTTP statuses.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Message body was empty or whitespace-only. Rejected before routing.
    #[error("message cannot be empty")]
    EmptyMessage,

    /// Explicit persona hint did not name a known persona.
    #[error("unknown persona: {0}")]
    UnknownPersona(String),

    /// The completion provider returned a non-success status.
    #[error("completion provider error {status}: {body}")]
    Provider { status: u16, body: String },

    /// The completion request could not be sent or the response body read.
    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Thread store backing medium unavailable or corrupt. Fatal for the request.
    #[error("thread store error: {0}")]
    Store(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The provider stream ended abnormally (malformed SSE frame, broken pipe).
    #[error("completion stream interrupted: {0}")]
    Stream(String),

    /// Startup configuration problem (missing key, unreadable prompts file).
    #[error("configuration error: {0}")]
    Config(String),
}

impl CoreError {
    /// True for errors the caller can fix by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(self, CoreError::EmptyMessage | CoreError::UnknownPersona(_))
    }
}
