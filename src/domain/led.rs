//! LED client capability
//!
//! The bridge only ever talks to the LED strip through [`LedClient`]. The
//! BLE service implements it for real hardware; [`LoggingLedClient`] stands
//! in when the Arduino link is exercised without a BLE connection.

use async_trait::async_trait;
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::On => "On",
            Self::Off => "Off",
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Write operations exposed by an LED controller.
///
/// Values are passed through exactly as decoded from the serial line;
/// implementations decide how to fit them onto the wire.
#[async_trait]
pub trait LedClient: Send + Sync {
    async fn write_power(&self, state: PowerState) -> anyhow::Result<()>;
    async fn write_color(&self, r: i32, g: i32, b: i32) -> anyhow::Result<()>;
    async fn write_mode(&self, mode: i32) -> anyhow::Result<()>;
}

/// Sink used in test mode: every action is logged, nothing is sent.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingLedClient;

#[async_trait]
impl LedClient for LoggingLedClient {
    async fn write_power(&self, state: PowerState) -> anyhow::Result<()> {
        info!("[test mode] would set power {}", state);
        Ok(())
    }

    async fn write_color(&self, r: i32, g: i32, b: i32) -> anyhow::Result<()> {
        info!("[test mode] would set color RGB({},{},{})", r, g, b);
        Ok(())
    }

    async fn write_mode(&self, mode: i32) -> anyhow::Result<()> {
        info!("[test mode] would set mode {}", mode);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    /// One recorded call against [`RecordingLedClient`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum LedCall {
        Power(PowerState),
        Color(i32, i32, i32),
        Mode(i32),
    }

    #[derive(Default)]
    pub struct RecordingLedClient {
        calls: Mutex<Vec<LedCall>>,
        fail: bool,
        delay: Duration,
    }

    impl RecordingLedClient {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        /// Each write takes `delay` before it is recorded.
        pub fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<LedCall> {
            self.calls.lock().unwrap().clone()
        }

        async fn record(&self, call: LedCall) -> anyhow::Result<()> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.calls.lock().unwrap().push(call);
            if self.fail {
                anyhow::bail!("simulated BLE write failure");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl LedClient for RecordingLedClient {
        async fn write_power(&self, state: PowerState) -> anyhow::Result<()> {
            self.record(LedCall::Power(state)).await
        }

        async fn write_color(&self, r: i32, g: i32, b: i32) -> anyhow::Result<()> {
            self.record(LedCall::Color(r, g, b)).await
        }

        async fn write_mode(&self, mode: i32) -> anyhow::Result<()> {
            self.record(LedCall::Mode(mode)).await
        }
    }
}
