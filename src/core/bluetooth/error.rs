//! Error types of the BLE layer

use thiserror::Error;

use crate::core::bluetooth::codec::WireKind;
use crate::core::bluetooth::parameters::Parameter;

/// A payload that does not fit its declared wire kind
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("{kind:?} payload needs {expected} bytes, got {actual}")]
    TooShort {
        kind: WireKind,
        expected: usize,
        actual: usize,
    },
    #[error("{value} is not a valid {what}")]
    InvalidValue { what: &'static str, value: u32 },
    #[error("{0} value has the wrong wire kind")]
    WrongKind(&'static str),
}

#[derive(Error, Debug)]
pub enum BleError {
    #[error("Characteristic for {0} not found")]
    NotFound(Parameter),
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Malformed payload: {0}")]
    Format(#[from] FormatError),
    #[error("No device connected")]
    NotConnected,
    #[error("A device is already connected")]
    AlreadyConnected,
    #[error("{parameter} value {value} is outside {min}..={max}")]
    OutOfRange {
        parameter: Parameter,
        value: u32,
        min: u32,
        max: u32,
    },
    #[error("{parameter} expects a {expected:?} value, got {actual:?}")]
    KindMismatch {
        parameter: Parameter,
        expected: WireKind,
        actual: WireKind,
    },
    #[error("{0} is read-only")]
    ReadOnly(Parameter),
    #[error("Disconnect step failed: {0}")]
    Disconnect(String),
}

impl From<bluest::Error> for BleError {
    fn from(e: bluest::Error) -> Self {
        BleError::Transport(e.to_string())
    }
}

impl BleError {
    /// Rewraps a lower-level failure as a connection failure, keeping its message.
    pub fn into_connection(self) -> Self {
        match self {
            BleError::Connection(_) => self,
            other => BleError::Connection(other.to_string()),
        }
    }
}
