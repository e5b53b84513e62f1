//! Error types for the snapshot engine.
//!
//! Clean error handling using `thiserror` for ergonomic error definitions.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for engine operations.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// Invalid price (zero or negative fixed-point value)
    #[error("Invalid price: {0}")]
    InvalidPrice(i64),

    /// Invalid quantity (negative or non-finite)
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(f64),

    /// Unknown side string from the decoder
    #[error("Invalid side: {0:?}")]
    InvalidSide(String),

    /// Unknown event kind string from the decoder
    #[error("Invalid event kind: {0:?}")]
    InvalidEventKind(String),

    /// Instrument not tracked by the engine
    #[error("Instrument not found: {0}")]
    InstrumentNotFound(String),

    /// Events for one instrument arrived out of timestamp order.
    ///
    /// The engine requires non-decreasing per-instrument timestamps; this is
    /// a contract violation by the upstream decoder, not a data-quality
    /// anomaly, so it surfaces as a typed error instead of a counter.
    #[error("Out-of-order event for {instrument}: ts {got} after {prev}")]
    OutOfOrderEvent {
        instrument: String,
        prev: i64,
        got: i64,
    },

    /// Sink rejected a record
    #[error("Sink error: {0}")]
    Sink(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Generic(String),
}

impl EngineError {
    /// Create a generic error from any string-like type.
    pub fn generic(msg: impl Into<String>) -> Self {
        EngineError::Generic(msg.into())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Sink(format!("IO error: {err}"))
    }
}

impl From<String> for EngineError {
    fn from(err: String) -> Self {
        EngineError::Generic(err)
    }
}

impl From<&str> for EngineError {
    fn from(err: &str) -> Self {
        EngineError::Generic(err.to_string())
    }
}
