use crate::domain::led::PowerState;
use crate::domain::models::{
    AppEvent, ArduinoStatus, ConnectionStatus, MessageSeverity, PortEntry, ScannedDevice,
    StatusMessage, Tab, WorkerCommand,
};
use crate::domain::settings::SettingsService;
use crate::infrastructure::logging::LoggingGuard;
use crate::infrastructure::worker::{self, WorkerHandle};
use eframe::egui;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub struct BridgeApp {
    // Services
    pub(crate) settings: Arc<Mutex<SettingsService>>,

    // Worker
    pub(crate) worker: WorkerHandle,
    pub(crate) event_rx: mpsc::UnboundedReceiver<AppEvent>,

    // State
    pub(crate) led_status: ConnectionStatus,
    pub(crate) arduino_status: ArduinoStatus,
    pub(crate) status_message: Option<StatusMessage>,

    // UI State
    pub(crate) selected_tab: Tab,
    pub(crate) device_address_input: String,
    pub(crate) arduino_enabled: bool,

    // Scanning
    pub(crate) is_scanning: bool,
    pub(crate) scanned_devices: Vec<ScannedDevice>,

    // Serial ports
    pub(crate) ports: Vec<PortEntry>,
    pub(crate) selected_port: Option<String>,

    // UI Options
    pub(crate) is_dark_mode: bool,

    // Logging guard
    pub(crate) _logging_guard: Option<LoggingGuard>,
}

impl BridgeApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        settings_service: SettingsService,
        logging_guard: Option<LoggingGuard>,
    ) -> Self {
        crate::presentation::theme::configure_theme(&cc.egui_ctx, false);

        let selected_port = settings_service.get().serial.last_port.clone();
        let settings = Arc::new(Mutex::new(settings_service));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let worker = worker::spawn(settings.clone(), event_tx);

        Self {
            settings,
            worker,
            event_rx,
            led_status: ConnectionStatus::Disconnected,
            arduino_status: ArduinoStatus::Disconnected,
            status_message: None,
            selected_tab: Tab::Home,
            device_address_input: String::new(),
            arduino_enabled: false,
            is_scanning: false,
            scanned_devices: Vec::new(),
            ports: Vec::new(),
            selected_port,
            is_dark_mode: false,
            _logging_guard: logging_guard,
        }
    }

    pub(crate) fn send(&self, command: WorkerCommand) {
        if !self.worker.send(command) {
            warn!("Worker thread is gone, command dropped");
        }
    }

    pub(crate) fn power(&self, state: PowerState) {
        self.send(WorkerCommand::ManualPower(state));
    }

    fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::DeviceFound(device) => {
                if let Some(existing) = self
                    .scanned_devices
                    .iter_mut()
                    .find(|d| d.address == device.address)
                {
                    existing.signal_strength = device.signal_strength;
                } else {
                    self.scanned_devices.push(device);
                }
            }
            AppEvent::ScanFinished => self.is_scanning = false,
            AppEvent::LedStatus(status) => self.led_status = status,
            AppEvent::ArduinoStatus(status) => {
                self.arduino_enabled = matches!(status, ArduinoStatus::Listening { .. });
                self.arduino_status = status;
            }
            AppEvent::PortsListed(ports) => {
                let still_present = self
                    .selected_port
                    .as_ref()
                    .is_some_and(|selected| ports.iter().any(|p| &p.name == selected));
                if !still_present {
                    self.selected_port = ports.first().map(|p| p.name.clone());
                }
                self.ports = ports;
            }
            AppEvent::LogMessage(msg) => self.status_message = Some(msg),
        }
    }
}

impl eframe::App for BridgeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        while let Ok(event) = self.event_rx.try_recv() {
            self.handle_event(event);
        }

        // The worker has no handle on the UI; poll for its events.
        ctx.request_repaint_after(Duration::from_millis(100));

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.selectable_value(&mut self.selected_tab, Tab::Home, "Home");
                ui.selectable_value(&mut self.selected_tab, Tab::Settings, "Settings");

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let switch_icon = if self.is_dark_mode {
                        "☀ Light"
                    } else {
                        "🌙 Dark"
                    };
                    if ui.button(switch_icon).clicked() {
                        self.is_dark_mode = !self.is_dark_mode;
                        crate::presentation::theme::configure_theme(ctx, self.is_dark_mode);
                    }
                });
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.vertical_centered(|ui| {
                    ui.set_max_width(560.0);
                    ui.add_space(12.0);

                    use crate::presentation::tabs;
                    match self.selected_tab {
                        Tab::Home => tabs::home::render(self, ui),
                        Tab::Settings => tabs::settings::render(self, ui),
                    }

                    ui.add_space(30.0);
                });
            });
        });
    }
}

impl Drop for BridgeApp {
    fn drop(&mut self) {
        info!("Window closing, shutting down worker");
        if self.worker.shutdown(Duration::from_secs(3)) {
            info!("Worker stopped");
        }
        if let Ok(settings) = self.settings.lock() {
            if let Err(e) = settings.save() {
                warn!("Failed to save settings: {}", e);
            }
        }
    }
}

impl MessageSeverity {
    pub fn color(&self) -> egui::Color32 {
        match self {
            MessageSeverity::Info => egui::Color32::from_rgb(40, 90, 220),
            MessageSeverity::Success => egui::Color32::from_rgb(0, 150, 0),
            MessageSeverity::Warning => egui::Color32::from_rgb(200, 150, 0),
            MessageSeverity::Error => egui::Color32::RED,
        }
    }
}
