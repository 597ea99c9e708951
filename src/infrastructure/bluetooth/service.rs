//! Bluetooth Service Module
//!
//! Main service that coordinates scanning and the connection to the LED
//! controller.

use crate::domain::led::{LedClient, PowerState};
use crate::domain::models::{AppEvent, ConnectionStatus, MessageSeverity, StatusMessage};
use crate::domain::settings::{BleSettings, SettingsService};
use crate::infrastructure::bluetooth::{
    connection::{ConnectionConfig, LedDevice},
    scanner::BleScanner,
};
use anyhow::Result;
use btleplug::api::Manager as _;
use btleplug::platform::{Adapter, Manager};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Main Bluetooth service coordinating all BLE operations
pub struct BluetoothService {
    adapter: Option<Adapter>,
    device: Option<Arc<LedDevice>>,
    scanner: BleScanner,
    event_sender: mpsc::UnboundedSender<AppEvent>,
    settings: Arc<Mutex<SettingsService>>,
}

impl BluetoothService {
    /// Create a new Bluetooth service
    pub fn new(
        event_sender: mpsc::UnboundedSender<AppEvent>,
        settings: Arc<Mutex<SettingsService>>,
    ) -> Self {
        Self {
            adapter: None,
            device: None,
            scanner: BleScanner::new(event_sender.clone()),
            event_sender,
            settings,
        }
    }

    /// First Bluetooth adapter, opened on first use
    async fn adapter(&mut self) -> Result<Adapter> {
        if let Some(adapter) = &self.adapter {
            return Ok(adapter.clone());
        }

        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No Bluetooth adapter found"))?;
        self.adapter = Some(adapter.clone());
        Ok(adapter)
    }

    fn ble_settings(&self) -> Result<BleSettings> {
        let settings = self
            .settings
            .lock()
            .map_err(|_| anyhow::anyhow!("Lock error"))?;
        Ok(settings.get().ble.clone())
    }

    /// Scan for LED controllers; results arrive as `DeviceFound` events
    pub async fn scan(&mut self) -> Result<()> {
        let ble = self.ble_settings()?;
        let adapter = self.adapter().await?;
        let result = self
            .scanner
            .scan(
                &adapter,
                &ble.name_prefix,
                Duration::from_secs(ble.scan_timeout_secs),
            )
            .await;
        let _ = self.event_sender.send(AppEvent::ScanFinished);
        result.map(|_| ())
    }

    /// Connect to a device by address, dropping any current connection
    pub async fn connect(&mut self, address: &str) -> Result<()> {
        let ble = self.ble_settings()?;
        let config = ConnectionConfig {
            write_char_uuid: ble.write_char_uuid.clone(),
            mode_speed: ble.mode_speed,
        };

        self.disconnect().await;
        let _ = self
            .event_sender
            .send(AppEvent::LedStatus(ConnectionStatus::Connecting));

        let adapter = self.adapter().await?;
        let peripheral = self
            .scanner
            .find_by_address(&adapter, address, Duration::from_secs(ble.scan_timeout_secs))
            .await?;
        let device = LedDevice::connect(peripheral, &config).await?;

        info!("Connected to LED controller {}", device.address());
        self.device = Some(Arc::new(device));
        self.send_log("Connected to LED controller", MessageSeverity::Success);
        let _ = self
            .event_sender
            .send(AppEvent::LedStatus(ConnectionStatus::Connected));
        Ok(())
    }

    /// Disconnect from the current device
    pub async fn disconnect(&mut self) {
        let Some(device) = self.device.take() else {
            return;
        };

        if let Err(e) = device.disconnect().await {
            warn!("Error while disconnecting: {}", e);
        }
        self.send_log("Disconnected from LED controller", MessageSeverity::Info);
        let _ = self
            .event_sender
            .send(AppEvent::LedStatus(ConnectionStatus::Disconnected));
    }

    /// Current LED client, if connected
    pub fn client(&self) -> Option<Arc<dyn LedClient>> {
        self.device
            .as_ref()
            .map(|device| device.clone() as Arc<dyn LedClient>)
    }

    /// Power button on the main window
    pub async fn write_power(&self, state: PowerState) -> Result<()> {
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("LED controller not connected"))?;
        device.write_power(state).await?;
        info!("LED power turned {}", state);
        Ok(())
    }

    /// Send a log message
    fn send_log(&self, message: &str, severity: MessageSeverity) {
        let _ = self.event_sender.send(AppEvent::LogMessage(StatusMessage {
            message: message.to_string(),
            severity,
        }));
    }
}
