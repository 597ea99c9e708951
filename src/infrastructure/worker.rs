//! Background Worker
//!
//! Owns the BLE service and the serial bridge on a dedicated thread with its
//! own tokio runtime, so the UI thread never blocks on either. The UI talks
//! to it with [`WorkerCommand`]s and hears back through [`AppEvent`]s.

use crate::domain::models::{
    AppEvent, ArduinoStatus, ConnectionStatus, MessageSeverity, StatusMessage, WorkerCommand,
};
use crate::domain::settings::SettingsService;
use crate::infrastructure::bluetooth::BluetoothService;
use crate::infrastructure::serial::dispatcher::Dispatcher;
use crate::infrastructure::serial::listener::LoopExit;
use crate::infrastructure::serial::SerialBridge;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Command channel into the worker thread, plus the thread itself.
pub struct WorkerHandle {
    commands: mpsc::UnboundedSender<WorkerCommand>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Returns false if the worker is gone.
    pub fn send(&self, command: WorkerCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Ask the worker to stop listening and disconnect, then wait up to
    /// `timeout` for its thread to exit.
    pub fn shutdown(&mut self, timeout: Duration) -> bool {
        let Some(thread) = self.thread.take() else {
            return true;
        };
        let _ = self.commands.send(WorkerCommand::Shutdown);

        let deadline = Instant::now() + timeout;
        while !thread.is_finished() {
            if Instant::now() >= deadline {
                warn!("Worker did not shut down within {:?}", timeout);
                return false;
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        if thread.join().is_err() {
            error!("Worker thread panicked");
            return false;
        }
        true
    }
}

/// Start the worker thread.
pub fn spawn(
    settings: Arc<Mutex<SettingsService>>,
    events: mpsc::UnboundedSender<AppEvent>,
) -> WorkerHandle {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

    let thread = std::thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                error!("Failed to create tokio runtime for worker: {}", e);
                return;
            }
        };

        rt.block_on(async move {
            let bridge = {
                let settings = settings.lock().unwrap_or_else(|e| e.into_inner());
                let s = settings.get();
                SerialBridge::with_system_ports(
                    s.serial.clone(),
                    Dispatcher::from_settings(&s.protocol),
                )
            };
            let bluetooth = BluetoothService::new(events.clone(), settings.clone());
            Worker::new(settings, events, bluetooth, bridge)
                .run(cmd_rx)
                .await;
        });
        info!("Worker thread exited");
    });

    WorkerHandle {
        commands: cmd_tx,
        thread: Some(thread),
    }
}

struct ActiveSession {
    watcher: JoinHandle<LoopExit>,
    test_mode: bool,
}

pub(crate) struct Worker {
    settings: Arc<Mutex<SettingsService>>,
    events: mpsc::UnboundedSender<AppEvent>,
    bluetooth: BluetoothService,
    bridge: SerialBridge,
    session: Option<ActiveSession>,
}

impl Worker {
    pub(crate) fn new(
        settings: Arc<Mutex<SettingsService>>,
        events: mpsc::UnboundedSender<AppEvent>,
        bluetooth: BluetoothService,
        bridge: SerialBridge,
    ) -> Self {
        Self {
            settings,
            events,
            bluetooth,
            bridge,
            session: None,
        }
    }

    pub(crate) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<WorkerCommand>) {
        self.refresh_ports();

        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    if !self.handle(command).await {
                        break;
                    }
                }
                exit = session_end(&mut self.session) => {
                    self.session = None;
                    self.on_session_end(exit);
                }
            }
        }

        self.shutdown().await;
    }

    /// Returns false once the worker should exit.
    async fn handle(&mut self, command: WorkerCommand) -> bool {
        match command {
            WorkerCommand::StartScan => {
                if let Err(e) = self.bluetooth.scan().await {
                    error!("Failed to scan: {}", e);
                    self.send_log(&format!("Scan failed: {}", e), MessageSeverity::Error);
                }
            }
            WorkerCommand::ConnectLed(address) => {
                // Connecting drops the current device; a session forwarding
                // to it is restarted against whatever client comes out.
                let resume_port = self.stop_forwarding_session().await;
                if let Err(e) = self.bluetooth.connect(&address).await {
                    error!("Connection failed: {}", e);
                    self.send_log(&format!("Connection failed: {}", e), MessageSeverity::Error);
                    let _ = self
                        .events
                        .send(AppEvent::LedStatus(ConnectionStatus::Error));
                }
                if let Some(port) = resume_port {
                    self.enable_arduino(Some(&port));
                }
            }
            WorkerCommand::DisconnectLed => {
                self.stop_forwarding_session().await;
                self.bluetooth.disconnect().await;
            }
            WorkerCommand::ManualPower(state) => {
                if let Err(e) = self.bluetooth.write_power(state).await {
                    warn!("Manual power command failed: {}", e);
                    self.send_log(&format!("Power {} failed: {}", state, e), MessageSeverity::Warning);
                }
            }
            WorkerCommand::RefreshPorts => self.refresh_ports(),
            WorkerCommand::EnableArduino { port } => self.enable_arduino(port.as_deref()),
            WorkerCommand::DisableArduino => self.disable_arduino().await,
            WorkerCommand::Shutdown => return false,
        }
        true
    }

    fn refresh_ports(&mut self) {
        match self.bridge.available_ports() {
            Ok(ports) => {
                let _ = self.events.send(AppEvent::PortsListed(ports));
            }
            Err(e) => {
                warn!("{}", e);
                self.send_log(&e.to_string(), MessageSeverity::Warning);
            }
        }
    }

    fn enable_arduino(&mut self, port: Option<&str>) {
        if self.session.is_some() || self.bridge.is_listening() {
            warn!("Arduino listener already running");
            return;
        }

        {
            let settings = self.settings.lock().unwrap_or_else(|e| e.into_inner());
            let s = settings.get();
            self.bridge
                .configure(s.serial.clone(), Dispatcher::from_settings(&s.protocol));
        }

        if !self.bridge.connect(port) {
            let target = port.unwrap_or("auto-detected port");
            self.send_log(
                &format!("Failed to connect to Arduino on {}", target),
                MessageSeverity::Error,
            );
            self.send_arduino_status(ArduinoStatus::Disconnected);
            return;
        }

        let port_name = self.bridge.port().unwrap_or_default().to_string();
        if let Ok(mut settings) = self.settings.lock() {
            if let Err(e) = settings.remember_port(&port_name) {
                warn!("Could not save last port: {}", e);
            }
        }

        let client = self.bluetooth.client();
        let test_mode = client.is_none();
        let started = match client {
            Some(client) => {
                info!("Starting Arduino listener with BLE connection");
                self.bridge.start_listening(client)
            }
            None => self.bridge.start_listening_test_mode(),
        };

        match started {
            Ok(handle) => {
                self.session = Some(ActiveSession {
                    watcher: tokio::spawn(handle.join()),
                    test_mode,
                });
                self.send_arduino_status(ArduinoStatus::Listening {
                    port: port_name,
                    test_mode,
                });
            }
            Err(e) => {
                error!("Could not start Arduino listener: {}", e);
                self.bridge.disconnect();
                self.send_log(&e.to_string(), MessageSeverity::Error);
                self.send_arduino_status(ArduinoStatus::Disconnected);
            }
        }
    }

    /// Stop a session that forwards to the LED client, since it holds its
    /// own reference to the device. Returns the port it was listening on.
    async fn stop_forwarding_session(&mut self) -> Option<String> {
        if !self.session.as_ref().is_some_and(|s| !s.test_mode) {
            return None;
        }
        let port = self.bridge.port().map(str::to_string);
        info!("Stopping Arduino listener before the LED client changes");
        self.disable_arduino().await;
        port
    }

    async fn disable_arduino(&mut self) {
        self.bridge.stop_listening();
        if let Some(session) = self.session.take() {
            let exit = session.watcher.await.unwrap_or(LoopExit::Cancelled);
            self.on_session_end(exit);
        } else {
            self.bridge.disconnect();
            self.send_arduino_status(ArduinoStatus::Disconnected);
        }
    }

    fn on_session_end(&mut self, exit: LoopExit) {
        match &exit {
            LoopExit::Stopped => {
                self.send_log("Arduino listener stopped", MessageSeverity::Info)
            }
            LoopExit::Cancelled => {
                self.send_log("Arduino listener was cancelled", MessageSeverity::Warning)
            }
            LoopExit::Failed(reason) => self.send_log(
                &format!("Arduino listener failed: {}", reason),
                MessageSeverity::Error,
            ),
        }
        self.bridge.disconnect();
        self.send_arduino_status(ArduinoStatus::Disconnected);
    }

    async fn shutdown(&mut self) {
        if self.session.is_some() {
            self.disable_arduino().await;
        }
        self.bridge.disconnect();
        self.bluetooth.disconnect().await;
        info!("Worker shut down");
    }

    fn send_arduino_status(&self, status: ArduinoStatus) {
        let _ = self.events.send(AppEvent::ArduinoStatus(status));
    }

    /// Send a log message
    fn send_log(&self, message: &str, severity: MessageSeverity) {
        let _ = self.events.send(AppEvent::LogMessage(StatusMessage {
            message: message.to_string(),
            severity,
        }));
    }
}

/// Resolves when the active session ends; never resolves without one.
async fn session_end(session: &mut Option<ActiveSession>) -> LoopExit {
    match session {
        Some(active) => (&mut active.watcher).await.unwrap_or(LoopExit::Cancelled),
        None => std::future::pending().await,
    }
}
