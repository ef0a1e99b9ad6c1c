//! Crate-wide error type.
//!
//! Scoped narrowly: internal state mutation is self-healing and never
//! raises (a malformed message is logged and dropped, a subscriber failure
//! is rebroadcast on `signal_error`, a negative trade decrement clamps).
//! `MarketCoreError` exists only for the genuinely fallible boundary
//! operations, decoding an inbound message and validating configuration,
//! rather than threading a crate-wide `Result` through the engine's
//! internal mutation paths.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketCoreError {
    #[error("malformed inbound message: {0}")]
    MalformedMessage(String),

    #[error("failed to decode message JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, MarketCoreError>;
