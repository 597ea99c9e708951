//! BLE Scanner Module
//!
//! Handles Bluetooth LE discovery of LED controllers.

use crate::domain::models::{AppEvent, MessageSeverity, ScannedDevice, StatusMessage};
use anyhow::Result;
use btleplug::api::{Central, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Peripheral};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// BLE Scanner for discovering LED controllers
pub struct BleScanner {
    event_sender: mpsc::UnboundedSender<AppEvent>,
}

impl BleScanner {
    /// Create a new scanner
    pub fn new(event_sender: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self { event_sender }
    }

    /// Scan for `timeout` and report every device whose name starts with
    /// `name_prefix` (all devices when the prefix is empty).
    pub async fn scan(
        &self,
        adapter: &Adapter,
        name_prefix: &str,
        timeout: Duration,
    ) -> Result<Vec<ScannedDevice>> {
        info!(
            "Starting BLE scan for {:?} devices ({}s)",
            name_prefix,
            timeout.as_secs()
        );
        self.send_log("Scanning for LED controllers...", MessageSeverity::Info);

        adapter.start_scan(ScanFilter::default()).await?;
        tokio::time::sleep(timeout).await;
        adapter.stop_scan().await?;

        let mut devices = Vec::new();
        for peripheral in adapter.peripherals().await? {
            let Some(device) = describe(&peripheral).await? else {
                continue;
            };
            if !matches_prefix(&device.name, name_prefix) {
                debug!("Skipping {} ({})", device.name, device.address);
                continue;
            }

            info!("Found device {} ({})", device.name, device.address);
            let _ = self.event_sender.send(AppEvent::DeviceFound(device.clone()));
            devices.push(device);
        }

        self.send_log(
            &format!("Scan finished, {} device(s) found", devices.len()),
            MessageSeverity::Info,
        );
        Ok(devices)
    }

    /// Look up a peripheral by address, scanning briefly if the adapter has
    /// not seen it yet.
    pub async fn find_by_address(
        &self,
        adapter: &Adapter,
        address: &str,
        timeout: Duration,
    ) -> Result<Peripheral> {
        if let Some(peripheral) = lookup(adapter, address).await? {
            return Ok(peripheral);
        }

        info!("{} not cached, scanning for it", address);
        adapter.start_scan(ScanFilter::default()).await?;
        tokio::time::sleep(timeout).await;
        adapter.stop_scan().await?;

        lookup(adapter, address)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Device {} not found", address))
    }

    /// Send a log message
    fn send_log(&self, message: &str, severity: MessageSeverity) {
        let _ = self.event_sender.send(AppEvent::LogMessage(StatusMessage {
            message: message.to_string(),
            severity,
        }));
    }
}

async fn lookup(adapter: &Adapter, address: &str) -> Result<Option<Peripheral>> {
    let address = address.trim();
    Ok(adapter
        .peripherals()
        .await?
        .into_iter()
        .find(|p| p.address().to_string().eq_ignore_ascii_case(address)))
}

async fn describe(peripheral: &Peripheral) -> Result<Option<ScannedDevice>> {
    let Some(properties) = peripheral.properties().await? else {
        return Ok(None);
    };

    Ok(Some(ScannedDevice {
        name: properties
            .local_name
            .unwrap_or_else(|| "Unknown".to_string()),
        address: peripheral.address().to_string(),
        signal_strength: properties.rssi.unwrap_or(0),
    }))
}

pub(crate) fn matches_prefix(name: &str, prefix: &str) -> bool {
    prefix.is_empty() || name.starts_with(prefix)
}
