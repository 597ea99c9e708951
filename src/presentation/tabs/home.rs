use crate::domain::led::PowerState;
use crate::domain::models::{ArduinoStatus, ConnectionStatus, WorkerCommand};
use crate::presentation::app::BridgeApp;
use crate::presentation::components::Components;
use eframe::egui;

pub fn render(app: &mut BridgeApp, ui: &mut egui::Ui) {
    Components::heading(ui, "LED Arduino Control");
    ui.add_space(15.0);

    ui_led_panel(app, ui);
    ui.add_space(10.0);

    ui_power_panel(app, ui);
    ui.add_space(10.0);

    ui_arduino_panel(app, ui);
    ui.add_space(10.0);

    ui_status_panel(app, ui);
}

fn ui_led_panel(app: &mut BridgeApp, ui: &mut egui::Ui) {
    Components::section(ui, "LED Controller", |ui| {
        Components::connection_banner(ui, app.led_status);

        ui.add_space(8.0);

        ui.horizontal(|ui| {
            if app.is_scanning {
                ui.add_enabled(false, egui::Button::new("Scanning..."));
                ui.spinner();
            } else if ui.button("Scan").clicked() {
                app.is_scanning = true;
                app.scanned_devices.clear();
                app.send(WorkerCommand::StartScan);
            }

            let selected = app
                .scanned_devices
                .iter()
                .find(|d| d.address == app.device_address_input)
                .map(|d| d.name.clone())
                .unwrap_or_else(|| "Select device".to_string());
            egui::ComboBox::from_id_salt("ble_devices")
                .selected_text(selected)
                .show_ui(ui, |ui| {
                    for device in &app.scanned_devices {
                        ui.selectable_value(
                            &mut app.device_address_input,
                            device.address.clone(),
                            format!("{} ({} dBm)", device.name, device.signal_strength),
                        );
                    }
                });
        });

        ui.horizontal(|ui| {
            ui.label("Address:");
            ui.text_edit_singleline(&mut app.device_address_input);
        });

        match app.led_status {
            ConnectionStatus::Connected => {
                if ui.button("Disconnect").clicked() {
                    app.send(WorkerCommand::DisconnectLed);
                }
            }
            ConnectionStatus::Connecting => {
                ui.add_enabled(false, egui::Button::new("Connecting..."));
            }
            _ => {
                let address = app.device_address_input.trim().to_string();
                if ui
                    .add_enabled(!address.is_empty(), egui::Button::new("Connect"))
                    .clicked()
                {
                    app.led_status = ConnectionStatus::Connecting;
                    app.send(WorkerCommand::ConnectLed(address));
                }
            }
        }
    });
}

fn ui_power_panel(app: &mut BridgeApp, ui: &mut egui::Ui) {
    Components::section(ui, "LED Control", |ui| {
        let enabled = app.led_status == ConnectionStatus::Connected;
        ui.horizontal(|ui| {
            if ui
                .add_enabled(enabled, egui::Button::new("Power On"))
                .clicked()
            {
                app.power(PowerState::On);
            }
            if ui
                .add_enabled(enabled, egui::Button::new("Power Off"))
                .clicked()
            {
                app.power(PowerState::Off);
            }
        });
    });
}

fn ui_arduino_panel(app: &mut BridgeApp, ui: &mut egui::Ui) {
    Components::section(ui, "Arduino Serial Control", |ui| {
        if ui
            .checkbox(&mut app.arduino_enabled, "Enable Arduino Control")
            .changed()
        {
            if app.arduino_enabled {
                app.send(WorkerCommand::EnableArduino {
                    port: app.selected_port.clone(),
                });
            } else {
                app.send(WorkerCommand::DisableArduino);
            }
        }

        ui.horizontal(|ui| {
            ui.label("Port:");
            let selected = app
                .ports
                .iter()
                .find(|p| Some(&p.name) == app.selected_port.as_ref())
                .map(|p| p.label())
                .unwrap_or_else(|| "Auto-detect".to_string());

            ui.add_enabled_ui(!app.arduino_enabled, |ui| {
                egui::ComboBox::from_id_salt("serial_ports")
                    .selected_text(selected)
                    .width(260.0)
                    .show_ui(ui, |ui| {
                        ui.selectable_value(&mut app.selected_port, None, "Auto-detect");
                        for port in &app.ports {
                            ui.selectable_value(
                                &mut app.selected_port,
                                Some(port.name.clone()),
                                port.label(),
                            );
                        }
                    });
            });

            if ui
                .button("⟳")
                .on_hover_text("Refresh port list")
                .clicked()
            {
                app.send(WorkerCommand::RefreshPorts);
            }
        });

        let (text, color) = match &app.arduino_status {
            ArduinoStatus::Listening { port, test_mode } => (
                if *test_mode {
                    format!("Status: Connected ({}) - test mode, commands are only logged", port)
                } else {
                    format!("Status: Connected ({}) - forwarding commands to LED", port)
                },
                egui::Color32::from_rgb(0, 150, 0),
            ),
            ArduinoStatus::Disconnected => (
                "Status: Disconnected".to_string(),
                egui::Color32::RED,
            ),
        };
        Components::status_line(ui, text, color);
    });
}

fn ui_status_panel(app: &mut BridgeApp, ui: &mut egui::Ui) {
    if let Some(msg) = &app.status_message {
        Components::section(ui, "System Status", |ui| {
            ui.label(
                egui::RichText::new(&msg.message)
                    .color(msg.severity.color())
                    .strong(),
            );
        });
    }
}
