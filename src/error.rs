//! Typed error taxonomy for the bot and the crate-wide `Result` alias.

use thiserror::Error;

/// Errors surfaced by the engine, classified so the coordinator can decide
/// whether a failure is transient, fatal, or merely a no-decision tick.
#[derive(Debug, Error)]
pub enum BotError {
    /// Network/transport failures talking to the exchange.
    #[error("transport error: {0}")]
    Transport(String),

    /// Authentication / signing failures (bad key, nonce, signature).
    #[error("auth error: {0}")]
    Auth(String),

    /// Malformed or unexpected data shapes from the exchange.
    #[error("data error: {0}")]
    Data(String),

    /// Not enough candles/values to compute an indicator or decision.
    #[error("insufficient data: have {have}, need {need}")]
    InsufficientData { have: usize, need: usize },

    /// The exchange rejected an order.
    #[error("order rejected: {0}")]
    OrderRejected(String),

    /// Invalid or missing configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for BotError {
    fn from(e: reqwest::Error) -> Self {
        BotError::Transport(e.to_string())
    }
}

/// Crate-wide result type defaulting to [`BotError`].
pub type Result<T> = std::result::Result<T, BotError>;
