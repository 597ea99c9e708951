//! BLE Connection Module
//!
//! Connects to an LED controller, locates its write characteristic, and
//! exposes the result as an [`LedClient`].

use crate::domain::led::{LedClient, PowerState};
use crate::infrastructure::bluetooth::protocol::{self, SETTLE_DELAY_MS};
use anyhow::Result;
use async_trait::async_trait;
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for connection behavior
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Write characteristic UUID
    pub write_char_uuid: String,
    /// Speed byte sent with mode changes
    pub mode_speed: u8,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            write_char_uuid: protocol::WRITE_CHAR_UUID.to_string(),
            mode_speed: 0x10,
        }
    }
}

/// A connected LED controller
pub struct LedDevice {
    peripheral: Peripheral,
    write_characteristic: Characteristic,
    mode_speed: u8,
}

impl LedDevice {
    /// Connect to `peripheral` and discover its write characteristic
    pub async fn connect(peripheral: Peripheral, config: &ConnectionConfig) -> Result<Self> {
        let write_uuid = protocol::parse_uuid(&config.write_char_uuid)?;

        info!("Connecting to {}", peripheral.address());
        if !peripheral.is_connected().await? {
            peripheral.connect().await?;
        }
        peripheral.discover_services().await?;

        let service_uuid = protocol::parse_uuid(protocol::SERVICE_UUID)?;
        if !peripheral.services().iter().any(|s| s.uuid == service_uuid) {
            warn!("LED control service {} not advertised", service_uuid);
        }

        let write_characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == write_uuid)
            .ok_or_else(|| anyhow::anyhow!("Write characteristic {} not found", write_uuid))?;
        info!("Found write characteristic {}", write_uuid);

        tokio::time::sleep(Duration::from_millis(SETTLE_DELAY_MS)).await;

        Ok(Self {
            peripheral,
            write_characteristic,
            mode_speed: config.mode_speed,
        })
    }

    pub fn address(&self) -> String {
        self.peripheral.address().to_string()
    }

    pub async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    pub async fn disconnect(&self) -> Result<()> {
        if self.is_connected().await {
            self.peripheral.disconnect().await?;
            info!("Disconnected from {}", self.address());
        }
        Ok(())
    }

    async fn write(&self, packet: &[u8]) -> Result<()> {
        debug!("BLE write {:02X?}", packet);
        self.peripheral
            .write(&self.write_characteristic, packet, WriteType::WithoutResponse)
            .await
            .map_err(|e| {
                warn!("BLE write failed: {}", e);
                anyhow::anyhow!("BLE write failed: {}", e)
            })
    }
}

#[async_trait]
impl LedClient for LedDevice {
    async fn write_power(&self, state: PowerState) -> Result<()> {
        self.write(&protocol::power_packet(state)).await
    }

    async fn write_color(&self, r: i32, g: i32, b: i32) -> Result<()> {
        self.write(&protocol::color_packet(r, g, b)).await
    }

    async fn write_mode(&self, mode: i32) -> Result<()> {
        self.write(&protocol::mode_packet(mode, self.mode_speed)).await
    }
}
