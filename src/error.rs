use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors surfaced by the signal and protection engine.
///
/// Insufficient warm-up data and protection lockouts are not errors; they
/// show up as `None` indicator values and suppressed entries respectively.
#[derive(Error, Debug)]
pub enum EngineError {
    // -- Candle feed --------------------------------------------------------
    #[error("malformed candle for {pair} at {open_time}: {reason}")]
    MalformedCandle {
        pair: String,
        open_time: DateTime<Utc>,
        reason: String,
    },

    #[error("out-of-order candle for {pair}: {open_time} is not after {last_open_time}")]
    OutOfOrderCandle {
        pair: String,
        open_time: DateTime<Utc>,
        last_open_time: DateTime<Utc>,
    },

    #[error("candle for {got} routed to evaluator for {expected}")]
    PairMismatch { expected: String, got: String },

    // -- Configuration ------------------------------------------------------
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    ConfigLoad(#[from] config::ConfigError),

    // -- Engine -------------------------------------------------------------
    #[error("engine is shut down")]
    EngineClosed,
}

pub type Result<T> = std::result::Result<T, EngineError>;
