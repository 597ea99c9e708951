//! Serial Module
//!
//! Bridges text commands from an Arduino on a serial port to the LED
//! controller.
//!
//! ## Modules
//!
//! - [`port`] - Port enumeration and the line-oriented serial link
//! - [`dispatcher`] - Maps a decoded line to an LED client call
//! - [`listener`] - The polling read loop and its handle
//! - [`bridge`] - Connection lifecycle and listening state machine

pub mod bridge;
pub mod dispatcher;
pub mod listener;
pub mod port;

pub use bridge::SerialBridge;
