use crate::domain::models::BridgeState;
use thiserror::Error;

/// Failures surfaced by the serial bridge.
///
/// None of these are fatal to the process: `connect`/`disconnect` turn them
/// into a logged message plus a boolean, the read loop into a [`LoopExit`].
///
/// [`LoopExit`]: crate::infrastructure::serial::listener::LoopExit
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("no serial ports found")]
    NoPortsFound,

    #[error("failed to open serial port {port}: {source}")]
    Connection {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("failed to enumerate serial ports: {0}")]
    Enumeration(#[source] serialport::Error),

    #[error("serial port is not connected")]
    NotConnected,

    #[error("operation not allowed while bridge is {0:?}")]
    InvalidState(BridgeState),
}

/// Malformed payload on a recognised command prefix.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid mode command: {raw}")]
    InvalidMode { raw: String },

    #[error("invalid color command: {raw}")]
    InvalidColor { raw: String },

    #[error("invalid color command: {raw} (expected {expected} fields, found {found})")]
    WrongFieldCount {
        raw: String,
        expected: usize,
        found: usize,
    },
}
