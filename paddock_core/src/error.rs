//! Protocol and configuration errors.

use paddock_env::MessageKind;
use std::time::Duration;
use thiserror::Error;

/// Errors decoding an inbound envelope.
///
/// Agents never propagate these: they log them and substitute a default.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed {kind} payload: {source}")]
    Malformed {
        kind: MessageKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("Expected {expected} envelope, got {found}")]
    UnexpectedKind {
        expected: MessageKind,
        found: MessageKind,
    },
}

/// Invalid race configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfBounds {
        field: &'static str,
        min: u64,
        max: u64,
        value: u64,
    },

    #[error("{field} range [{lo}, {hi}] must be non-empty and within [0, 1]")]
    InvalidRange {
        field: &'static str,
        lo: f64,
        hi: f64,
    },

    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} must be at most {max:?}, got {value:?}")]
    TooLong {
        field: &'static str,
        value: Duration,
        max: Duration,
    },

    #[error("Wear alert threshold must be in (0, 1], got {0}")]
    InvalidThreshold(f64),
}
