//! Robot layer error types

use cwc_transport::TransportError;
use thiserror::Error;

/// Rejected command parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodingError {
    #[error("Missing parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Parameter {name} must be {expected}")]
    InvalidType {
        name: &'static str,
        expected: &'static str,
    },

    #[error("Parameter {name}={value} out of range {min}..={max}")]
    OutOfRange {
        name: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Payload too long: {len} bytes (max {max})")]
    PayloadTooLong { len: usize, max: usize },
}

/// Errors returned by the connection API
#[derive(Error, Debug)]
pub enum RobotError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error("Unsupported command for {family}: {command}")]
    UnsupportedCommand { family: String, command: String },

    #[error("Robot is not connected")]
    NotConnected,

    #[error("Connect canceled by disconnect")]
    Canceled,
}
