use crate::domain::command::AckFormat;
use crate::presentation::app::BridgeApp;
use crate::presentation::components::Components;
use eframe::egui;
use tracing::{info, warn};

pub fn render(app: &mut BridgeApp, ui: &mut egui::Ui) {
    Components::heading(ui, "Settings");
    ui.add_space(15.0);

    let Ok(mut settings) = app.settings.lock() else {
        return;
    };
    let settings_mut = settings.get_mut();

    Components::section(ui, "Serial Link", |ui| {
        egui::Grid::new("serial_grid")
            .spacing([10.0, 8.0])
            .show(ui, |ui| {
                ui.label("Baud Rate:");
                egui::ComboBox::from_id_salt("baud_rate")
                    .selected_text(settings_mut.serial.baud_rate.to_string())
                    .show_ui(ui, |ui| {
                        for baud in [9600, 19200, 38400, 57600, 115200] {
                            ui.selectable_value(
                                &mut settings_mut.serial.baud_rate,
                                baud,
                                baud.to_string(),
                            );
                        }
                    });
                ui.end_row();

                ui.label("Poll Interval (ms):");
                ui.add(egui::Slider::new(
                    &mut settings_mut.serial.poll_interval_ms,
                    10..=1000,
                ));
                ui.end_row();

                ui.label("Read Timeout (ms):");
                ui.add(egui::Slider::new(
                    &mut settings_mut.serial.read_timeout_ms,
                    10..=2000,
                ));
                ui.end_row();
            });

        let mut retry_forever = settings_mut.serial.max_consecutive_errors.is_none();
        if ui
            .checkbox(&mut retry_forever, "Keep retrying after read errors")
            .changed()
        {
            settings_mut.serial.max_consecutive_errors =
                if retry_forever { None } else { Some(10) };
        }
        if let Some(max) = settings_mut.serial.max_consecutive_errors.as_mut() {
            ui.indent("max_errors", |ui| {
                ui.horizontal(|ui| {
                    ui.label("Stop after consecutive errors:");
                    ui.add(egui::Slider::new(max, 1..=100));
                });
            });
        }

        ui.checkbox(
            &mut settings_mut.serial.dispatch_queue,
            "Queue commands (decouple serial reads from BLE writes)",
        );
    });

    ui.add_space(10.0);

    Components::section(ui, "Arduino Protocol", |ui| {
        ui.checkbox(
            &mut settings_mut.protocol.case_insensitive,
            "Case-insensitive commands",
        );

        ui.horizontal(|ui| {
            ui.label("Acknowledgment:");
            egui::ComboBox::from_id_salt("ack_format")
                .selected_text(ack_label(settings_mut.protocol.ack_format))
                .show_ui(ui, |ui| {
                    for format in [AckFormat::Long, AckFormat::Short, AckFormat::Disabled] {
                        ui.selectable_value(
                            &mut settings_mut.protocol.ack_format,
                            format,
                            ack_label(format),
                        );
                    }
                });
        });

        if !settings_mut.protocol.aliases.is_empty() {
            ui.label(format!(
                "{} custom alias(es) loaded from settings file",
                settings_mut.protocol.aliases.len()
            ));
        }

        ui.label(
            egui::RichText::new("Applies the next time Arduino control is enabled.")
                .italics()
                .size(12.0),
        );
    });

    ui.add_space(10.0);

    Components::section(ui, "Bluetooth", |ui| {
        egui::Grid::new("ble_grid")
            .spacing([10.0, 8.0])
            .show(ui, |ui| {
                ui.label("Device Name Prefix:");
                ui.text_edit_singleline(&mut settings_mut.ble.name_prefix);
                ui.end_row();

                ui.label("Scan Duration (s):");
                ui.add(egui::Slider::new(
                    &mut settings_mut.ble.scan_timeout_secs,
                    1..=30,
                ));
                ui.end_row();

                ui.label("Mode Speed:");
                ui.add(egui::Slider::new(&mut settings_mut.ble.mode_speed, 1..=255));
                ui.end_row();
            });

        ui.collapsing("Override Write Characteristic", |ui| {
            ui.label(
                egui::RichText::new("⚠️ Warning: A wrong UUID makes every LED write fail.")
                    .color(egui::Color32::from_rgb(255, 200, 0)),
            );
            ui.text_edit_singleline(&mut settings_mut.ble.write_char_uuid);
        });
    });

    ui.add_space(10.0);

    Components::section(ui, "Logging", |ui| {
        ui.horizontal(|ui| {
            ui.label("Verbosity Level:");
            egui::ComboBox::from_id_salt("log_level")
                .selected_text(&settings_mut.log_settings.level)
                .show_ui(ui, |ui| {
                    for level in &["trace", "debug", "info", "warn", "error"] {
                        ui.selectable_value(
                            &mut settings_mut.log_settings.level,
                            level.to_string(),
                            *level,
                        );
                    }
                });
        });

        ui.checkbox(
            &mut settings_mut.log_settings.console_logging_enabled,
            "Console Logs",
        );
        ui.checkbox(
            &mut settings_mut.log_settings.file_logging_enabled,
            "File Logs",
        );

        if settings_mut.log_settings.file_logging_enabled {
            ui.indent("file_logs", |ui| {
                ui.horizontal(|ui| {
                    ui.label("Save Path:");
                    ui.text_edit_singleline(&mut settings_mut.log_settings.log_dir);
                });
                ui.horizontal(|ui| {
                    ui.label("Rotation:");
                    egui::ComboBox::from_id_salt("log_rot")
                        .selected_text(&settings_mut.log_settings.rotation)
                        .show_ui(ui, |ui| {
                            for rot in &["daily", "hourly", "never"] {
                                ui.selectable_value(
                                    &mut settings_mut.log_settings.rotation,
                                    rot.to_string(),
                                    *rot,
                                );
                            }
                        });
                });
            });
        }
        ui.label(
            egui::RichText::new("Restart required for log changes.")
                .italics()
                .size(12.0),
        );
    });

    ui.add_space(10.0);

    if ui.button("Save Settings").clicked() {
        match settings.save() {
            Ok(()) => info!("Settings saved"),
            Err(e) => warn!("Failed to save settings: {}", e),
        }
    }
}

fn ack_label(format: AckFormat) -> &'static str {
    match format {
        AckFormat::Long => "ACK:POWER:ON",
        AckFormat::Short => "ACK:ON",
        AckFormat::Disabled => "Off",
    }
}
