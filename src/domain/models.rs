use crate::domain::led::PowerState;

/// Lifecycle of the serial bridge.
///
/// `Idle -> Connecting -> Connected -> Listening -> Stopping -> Connected`,
/// and `disconnect` returns to `Idle` from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Idle,
    Connecting,
    Connected,
    Listening,
    Stopping,
}

/// A serial port as offered in the port picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortEntry {
    pub name: String,
    pub description: String,
}

impl PortEntry {
    pub fn label(&self) -> String {
        format!("{} - {}", self.name, self.description)
    }
}

#[derive(Debug, Clone)]
pub struct ScannedDevice {
    pub name: String,
    pub address: String,
    pub signal_strength: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// What the Arduino side of the app is currently doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArduinoStatus {
    Disconnected,
    Listening { port: String, test_mode: bool },
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}

/// Events flowing from the worker thread to the UI.
#[derive(Debug, Clone)]
pub enum AppEvent {
    DeviceFound(ScannedDevice),
    ScanFinished,
    LedStatus(ConnectionStatus),
    ArduinoStatus(ArduinoStatus),
    PortsListed(Vec<PortEntry>),
    LogMessage(StatusMessage),
}

/// Requests from the UI to the worker thread.
#[derive(Debug, Clone)]
pub enum WorkerCommand {
    StartScan,
    ConnectLed(String),
    DisconnectLed,
    ManualPower(PowerState),
    RefreshPorts,
    EnableArduino { port: Option<String> },
    DisableArduino,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Home,
    Settings,
}
