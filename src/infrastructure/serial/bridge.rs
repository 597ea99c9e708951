//! Serial Bridge
//!
//! Owns the Arduino connection and at most one listening session.
//! All transitions go through the state lock, so a UI firing start/stop
//! requests back to back cannot end up with two read loops.

use crate::domain::error::BridgeError;
use crate::domain::led::{LedClient, LoggingLedClient};
use crate::domain::models::{BridgeState, PortEntry};
use crate::domain::settings::SerialSettings;
use crate::infrastructure::serial::dispatcher::Dispatcher;
use crate::infrastructure::serial::listener::{
    self, Lifecycle, ListenerConfig, ListenerHandle, SessionParts, SharedLink, SharedState,
};
use crate::infrastructure::serial::port::{PortProvider, SerialLink, SystemPorts};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

pub struct SerialBridge {
    provider: Arc<dyn PortProvider>,
    settings: SerialSettings,
    dispatcher: Dispatcher,
    port: Option<String>,
    link: Option<SharedLink>,
    state: SharedState,
    stop: Arc<AtomicBool>,
}

impl SerialBridge {
    pub fn new(
        provider: Arc<dyn PortProvider>,
        settings: SerialSettings,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            provider,
            settings,
            dispatcher,
            port: None,
            link: None,
            state: Arc::new(Mutex::new(Lifecycle::default())),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Bridge backed by the operating system's serial ports.
    pub fn with_system_ports(settings: SerialSettings, dispatcher: Dispatcher) -> Self {
        Self::new(Arc::new(SystemPorts), settings, dispatcher)
    }

    /// Replace link and protocol settings. Takes effect on the next
    /// `connect` / `start_listening`.
    pub fn configure(&mut self, settings: SerialSettings, dispatcher: Dispatcher) {
        self.settings = settings;
        self.dispatcher = dispatcher;
    }

    pub fn available_ports(&self) -> Result<Vec<PortEntry>, BridgeError> {
        self.provider.available_ports()
    }

    /// Open `port`, or the first available port when `None`.
    pub fn connect(&mut self, port: Option<&str>) -> bool {
        {
            let mut lifecycle = self.lock_state();
            match lifecycle.state {
                BridgeState::Idle => lifecycle.state = BridgeState::Connecting,
                BridgeState::Connected if port.is_none() || port == self.port.as_deref() => {
                    debug!("Already connected to {:?}", self.port);
                    return true;
                }
                other => {
                    warn!("Cannot connect while bridge is {:?}", other);
                    return false;
                }
            }
        }

        match self.open(port) {
            Ok((name, link)) => {
                info!(
                    "Connected to Arduino on {} at {} baud",
                    name, self.settings.baud_rate
                );
                self.port = Some(name);
                self.link = Some(Arc::new(Mutex::new(link)));
                self.lock_state().state = BridgeState::Connected;
                true
            }
            Err(e) => {
                error!("Failed to connect to Arduino: {}", e);
                self.lock_state().state = BridgeState::Idle;
                false
            }
        }
    }

    fn open(&self, port: Option<&str>) -> Result<(String, Box<dyn SerialLink>), BridgeError> {
        let name = match port {
            Some(name) => name.to_string(),
            None => {
                let ports = self.provider.available_ports()?;
                let first = ports.into_iter().next().ok_or(BridgeError::NoPortsFound)?;
                info!("Auto-detected serial port {}", first.label());
                first.name
            }
        };

        let link = self.provider.open(
            &name,
            self.settings.baud_rate,
            self.settings.read_timeout(),
        )?;
        Ok((name, link))
    }

    /// Close the link. Any running session is asked to stop; the port is
    /// released once its loop has exited.
    pub fn disconnect(&mut self) -> bool {
        let previous = {
            let mut lifecycle = self.lock_state();
            std::mem::replace(&mut lifecycle.state, BridgeState::Idle)
        };

        if matches!(previous, BridgeState::Listening | BridgeState::Stopping) {
            info!("Stopping Arduino listener before disconnect");
            self.stop.store(true, Ordering::Release);
        }

        match self.link.take() {
            Some(link) => {
                drop(link);
                info!(
                    "Disconnected from Arduino on {}",
                    self.port.as_deref().unwrap_or("unknown port")
                );
            }
            None => debug!("Disconnect requested but no port was open"),
        }
        true
    }

    /// Start forwarding Arduino commands to `client`.
    ///
    /// Only valid in `Connected`; the bridge keeps `client` for this
    /// session only.
    pub fn start_listening(
        &mut self,
        client: Arc<dyn LedClient>,
    ) -> Result<ListenerHandle, BridgeError> {
        let link = self.link.clone().ok_or(BridgeError::NotConnected)?;

        let id = {
            // Locked through the field so the stop flag can be replaced
            // under the same lock.
            let mut lifecycle = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if lifecycle.state != BridgeState::Connected {
                warn!("Cannot start listening while bridge is {:?}", lifecycle.state);
                return Err(BridgeError::InvalidState(lifecycle.state));
            }
            lifecycle.state = BridgeState::Listening;
            lifecycle.session += 1;
            self.stop = Arc::new(AtomicBool::new(false));
            lifecycle.session
        };

        info!(
            "Listening for Arduino commands on {} (session {})",
            self.port.as_deref().unwrap_or("unknown port"),
            id
        );

        Ok(listener::spawn(SessionParts {
            id,
            link,
            state: self.state.clone(),
            stop: self.stop.clone(),
            client,
            dispatcher: self.dispatcher.clone(),
            config: ListenerConfig::from_settings(&self.settings),
        }))
    }

    /// Run the loop with commands only logged, to check the serial link
    /// without a BLE device.
    pub fn start_listening_test_mode(&mut self) -> Result<ListenerHandle, BridgeError> {
        info!("Starting Arduino listener in test mode");
        self.start_listening(Arc::new(LoggingLedClient))
    }

    /// Request the loop to exit and return immediately.
    pub fn stop_listening(&self) {
        let mut lifecycle = self.lock_state();
        if lifecycle.state == BridgeState::Listening {
            lifecycle.state = BridgeState::Stopping;
            self.stop.store(true, Ordering::Release);
            info!("Stop requested for Arduino listener");
        } else {
            debug!("Stop requested while bridge is {:?}", lifecycle.state);
        }
    }

    pub fn state(&self) -> BridgeState {
        self.lock_state().state
    }

    pub fn is_connected(&self) -> bool {
        !matches!(self.state(), BridgeState::Idle | BridgeState::Connecting)
    }

    pub fn is_listening(&self) -> bool {
        matches!(
            self.state(),
            BridgeState::Listening | BridgeState::Stopping
        )
    }

    /// Last port connected to.
    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    fn lock_state(&self) -> MutexGuard<'_, Lifecycle> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::command::{AckFormat, CommandTable};
    use crate::domain::led::testing::{LedCall, RecordingLedClient};
    use crate::domain::led::PowerState;
    use crate::infrastructure::serial::listener::LoopExit;
    use crate::infrastructure::serial::port::testing::{MemoryLink, MemoryPorts};
    use std::time::Duration;

    fn fast_settings() -> SerialSettings {
        SerialSettings {
            poll_interval_ms: 5,
            ..SerialSettings::default()
        }
    }

    fn bridge_with(ports: MemoryPorts, settings: SerialSettings) -> SerialBridge {
        SerialBridge::new(Arc::new(ports), settings, Dispatcher::default())
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[test]
    fn test_connect_auto_detects_first_port() {
        let (ports, _link) = MemoryPorts::with_port("/dev/ttyACM0");
        let mut bridge = bridge_with(ports, fast_settings());

        assert!(bridge.connect(None));
        assert_eq!(bridge.port(), Some("/dev/ttyACM0"));
        assert_eq!(bridge.state(), BridgeState::Connected);
        assert!(bridge.connect(None));
    }

    #[test]
    fn test_connect_failures_leave_bridge_idle() {
        let mut bridge = bridge_with(MemoryPorts::default(), fast_settings());
        assert!(!bridge.connect(None));
        assert_eq!(bridge.state(), BridgeState::Idle);

        let (mut ports, _link) = MemoryPorts::with_port("COM3");
        ports.busy.push("COM3".to_string());
        let mut bridge = bridge_with(ports, fast_settings());
        assert!(!bridge.connect(Some("COM3")));
        assert!(!bridge.connect(Some("COM9")));
        assert!(!bridge.is_connected());
    }

    #[test]
    fn test_connect_then_disconnect_releases_port() {
        let (ports, link) = MemoryPorts::with_port("COM3");
        let mut bridge = bridge_with(ports, fast_settings());
        let baseline = Arc::strong_count(&link.state);

        assert!(bridge.connect(Some("COM3")));
        assert_eq!(Arc::strong_count(&link.state), baseline + 1);

        assert!(bridge.disconnect());
        assert!(bridge.disconnect());
        assert_eq!(bridge.state(), BridgeState::Idle);
        assert!(!bridge.is_connected());
        assert_eq!(Arc::strong_count(&link.state), baseline);
    }

    #[tokio::test]
    async fn test_start_listening_requires_connection() {
        let (ports, _link) = MemoryPorts::with_port("COM3");
        let mut bridge = bridge_with(ports, fast_settings());
        let client = Arc::new(RecordingLedClient::default());

        assert!(matches!(
            bridge.start_listening(client),
            Err(BridgeError::NotConnected)
        ));
        assert!(!bridge.is_listening());
    }

    #[tokio::test]
    async fn test_commands_forwarded_and_acknowledged() {
        let (ports, link) = MemoryPorts::with_port("COM3");
        let mut bridge = bridge_with(ports, fast_settings());
        let client = Arc::new(RecordingLedClient::default());

        assert!(bridge.connect(Some("COM3")));
        let handle = bridge.start_listening(client.clone()).unwrap();
        assert!(bridge.is_listening());

        link.push_input("COLOR:10,20,30\r\nMODE:3\ngarbage\npower:on\n");
        wait_until(|| client.calls().len() == 3).await;

        bridge.stop_listening();
        assert_eq!(handle.join().await, LoopExit::Stopped);
        assert!(!bridge.is_listening());
        assert_eq!(bridge.state(), BridgeState::Connected);

        assert_eq!(
            client.calls(),
            vec![
                LedCall::Color(10, 20, 30),
                LedCall::Mode(3),
                LedCall::Power(PowerState::On),
            ]
        );
        assert_eq!(
            link.written(),
            vec!["ACK:COLOR:10,20,30", "ACK:MODE:3", "ACK:POWER:ON"]
        );
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let (ports, _link) = MemoryPorts::with_port("COM3");
        let mut bridge = bridge_with(ports, fast_settings());
        assert!(bridge.connect(None));

        let handle = bridge.start_listening_test_mode().unwrap();
        assert!(matches!(
            bridge.start_listening_test_mode(),
            Err(BridgeError::InvalidState(BridgeState::Listening))
        ));

        bridge.stop_listening();
        assert!(matches!(
            bridge.start_listening_test_mode(),
            Err(BridgeError::InvalidState(BridgeState::Stopping))
        ));
        assert_eq!(handle.join().await, LoopExit::Stopped);
    }

    #[tokio::test]
    async fn test_stop_leaves_unread_input_alone() {
        let (ports, link) = MemoryPorts::with_port("COM3");
        let mut bridge = bridge_with(ports, fast_settings());
        let client = Arc::new(RecordingLedClient::default());
        assert!(bridge.connect(None));

        link.push_input("ON\nOFF\n");
        let handle = bridge.start_listening(client.clone()).unwrap();
        bridge.stop_listening();

        assert_eq!(handle.join().await, LoopExit::Stopped);
        assert!(!bridge.is_listening());
        assert!(client.calls().is_empty());
        assert!(link.unread() > 0);
    }

    #[tokio::test]
    async fn test_read_errors_end_session_after_limit() {
        let (ports, link) = MemoryPorts::with_port("COM3");
        let settings = SerialSettings {
            max_consecutive_errors: Some(3),
            ..fast_settings()
        };
        let mut bridge = bridge_with(ports, settings);
        assert!(bridge.connect(None));

        link.push_input("ON\n");
        link.fail_next_reads(3);
        let handle = bridge.start_listening_test_mode().unwrap();

        assert!(matches!(handle.join().await, LoopExit::Failed(_)));
        assert_eq!(bridge.state(), BridgeState::Connected);
    }

    #[tokio::test]
    async fn test_read_errors_retried_without_limit() {
        let (ports, link) = MemoryPorts::with_port("COM3");
        let settings = SerialSettings {
            max_consecutive_errors: None,
            ..fast_settings()
        };
        let mut bridge = bridge_with(ports, settings);
        let client = Arc::new(RecordingLedClient::default());
        assert!(bridge.connect(None));

        link.push_input("OFF\n");
        link.fail_next_reads(5);
        let handle = bridge.start_listening(client.clone()).unwrap();

        wait_until(|| !client.calls().is_empty()).await;
        bridge.stop_listening();
        assert_eq!(handle.join().await, LoopExit::Stopped);
        assert_eq!(client.calls(), vec![LedCall::Power(PowerState::Off)]);
    }

    #[tokio::test]
    async fn test_queued_dispatch_preserves_order() {
        let (ports, link) = MemoryPorts::with_port("COM3");
        let settings = SerialSettings {
            dispatch_queue: true,
            ..fast_settings()
        };
        let mut bridge = SerialBridge::new(
            Arc::new(ports),
            settings,
            Dispatcher::new(CommandTable::standard(), AckFormat::Short),
        );
        let client = Arc::new(RecordingLedClient::default());
        assert!(bridge.connect(None));

        let handle = bridge.start_listening(client.clone()).unwrap();
        link.push_input("ON\nMODE_1\nCOLOR_1,2,3\nMODE_2\nOFF\n");
        wait_until(|| client.calls().len() == 5).await;

        bridge.stop_listening();
        assert_eq!(handle.join().await, LoopExit::Stopped);
        assert_eq!(
            client.calls(),
            vec![
                LedCall::Power(PowerState::On),
                LedCall::Mode(1),
                LedCall::Color(1, 2, 3),
                LedCall::Mode(2),
                LedCall::Power(PowerState::Off),
            ]
        );
        assert_eq!(link.written().first().map(String::as_str), Some("ACK:ON"));
    }

    #[tokio::test]
    async fn test_test_mode_acknowledges_without_client() {
        let (ports, link) = MemoryPorts::with_port("COM3");
        let mut bridge = bridge_with(ports, fast_settings());
        assert!(bridge.connect(None));

        let handle = bridge.start_listening_test_mode().unwrap();
        link.push_input("TURN_ON\n");
        wait_until(|| !link.written().is_empty()).await;

        bridge.stop_listening();
        handle.join().await;
        assert_eq!(link.written(), vec!["ACK:POWER:ON"]);
    }

    #[tokio::test]
    async fn test_disconnect_while_listening() {
        let (ports, link) = MemoryPorts::with_port("COM3");
        let mut bridge = bridge_with(ports, fast_settings());
        let baseline = Arc::strong_count(&link.state);
        assert!(bridge.connect(None));

        let handle = bridge.start_listening_test_mode().unwrap();
        assert!(bridge.disconnect());
        assert_eq!(handle.join().await, LoopExit::Stopped);

        assert_eq!(bridge.state(), BridgeState::Idle);
        assert_eq!(Arc::strong_count(&link.state), baseline);
    }

    #[tokio::test]
    async fn test_abort_is_reported_as_cancelled() {
        let (ports, _link) = MemoryPorts::with_port("COM3");
        let mut bridge = bridge_with(ports, fast_settings());
        assert!(bridge.connect(None));

        let handle = bridge.start_listening_test_mode().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.abort();

        assert_eq!(handle.join().await, LoopExit::Cancelled);
        assert_eq!(bridge.state(), BridgeState::Connected);
        assert!(bridge.start_listening_test_mode().is_ok());
    }

    #[tokio::test]
    async fn test_stale_session_leaves_newer_session_alone() {
        let (ports, _link) = MemoryPorts::with_port("COM3");
        let mut bridge = bridge_with(ports, fast_settings());
        assert!(bridge.connect(None));

        let first = bridge.start_listening_test_mode().unwrap();
        assert!(bridge.disconnect());
        assert!(bridge.connect(None));
        let second = bridge.start_listening_test_mode().unwrap();

        assert_eq!(first.join().await, LoopExit::Stopped);
        assert_eq!(bridge.state(), BridgeState::Listening);
        assert!(matches!(
            bridge.start_listening_test_mode(),
            Err(BridgeError::InvalidState(BridgeState::Listening))
        ));

        bridge.stop_listening();
        assert_eq!(second.join().await, LoopExit::Stopped);
        assert_eq!(bridge.state(), BridgeState::Connected);
    }

    #[tokio::test]
    async fn test_abort_cancels_queued_dispatch() {
        let (ports, link) = MemoryPorts::with_port("COM3");
        let settings = SerialSettings {
            dispatch_queue: true,
            ..fast_settings()
        };
        let mut bridge = bridge_with(ports, settings);
        let client = Arc::new(RecordingLedClient::with_delay(Duration::from_millis(300)));
        assert!(bridge.connect(None));

        let handle = bridge.start_listening(client.clone()).unwrap();
        link.push_input("ON\n");
        wait_until(|| link.unread() == 0).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.abort();

        assert_eq!(handle.join().await, LoopExit::Cancelled);
        assert_eq!(bridge.state(), BridgeState::Connected);

        // A write still in flight at abort time never completes.
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(client.calls().is_empty());
        assert!(link.written().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced_not_fatal() {
        let (ports, link) = MemoryPorts::with_port("COM3");
        let mut bridge = bridge_with(ports, fast_settings());
        let client = Arc::new(RecordingLedClient::default());
        assert!(bridge.connect(None));

        let handle = bridge.start_listening(client.clone()).unwrap();
        link.push_bytes(b"\xffgarbage\n");
        link.push_bytes(b"ON\n");
        wait_until(|| !client.calls().is_empty()).await;
        assert!(bridge.is_listening());

        bridge.stop_listening();
        assert_eq!(handle.join().await, LoopExit::Stopped);
        assert_eq!(client.calls(), vec![LedCall::Power(PowerState::On)]);
        assert_eq!(link.written(), vec!["ACK:POWER:ON"]);
    }
}
