use crate::domain::models::ConnectionStatus;
use eframe::egui;

pub struct Components;

impl Components {
    pub fn heading(ui: &mut egui::Ui, text: &str) {
        ui.label(egui::RichText::new(text).heading().strong());
    }

    /// Bordered section of a tab with an upper-case title bar.
    pub fn section<R>(
        ui: &mut egui::Ui,
        title: &str,
        add_contents: impl FnOnce(&mut egui::Ui) -> R,
    ) -> R {
        let visuals = &ui.style().visuals.widgets.noninteractive;
        let (stroke, fill) = (visuals.bg_stroke, visuals.bg_fill);

        egui::Frame::none()
            .inner_margin(egui::Margin::symmetric(14.0, 12.0))
            .stroke(stroke)
            .fill(fill)
            .show(ui, |ui| {
                ui.set_width(ui.available_width());
                ui.label(egui::RichText::new(title.to_uppercase()).strong().size(16.0));
                ui.separator();
                add_contents(ui)
            })
            .inner
    }

    /// Full-width banner for the LED controller link.
    pub fn connection_banner(ui: &mut egui::Ui, status: ConnectionStatus) {
        let (text, fill, text_color) = match status {
            ConnectionStatus::Connected => (
                "LED CONNECTED",
                egui::Color32::from_rgb(0, 200, 0),
                egui::Color32::BLACK,
            ),
            ConnectionStatus::Connecting => (
                "CONNECTING...",
                egui::Color32::from_rgb(255, 200, 0),
                egui::Color32::BLACK,
            ),
            ConnectionStatus::Disconnected => (
                "LED DISCONNECTED",
                egui::Color32::from_gray(100),
                egui::Color32::WHITE,
            ),
            ConnectionStatus::Error => (
                "CONNECTION FAILED",
                egui::Color32::from_rgb(255, 50, 50),
                egui::Color32::WHITE,
            ),
        };

        egui::Frame::none()
            .fill(fill)
            .inner_margin(egui::Margin::symmetric(10.0, 8.0))
            .show(ui, |ui| {
                ui.set_width(ui.available_width());
                ui.vertical_centered(|ui| {
                    ui.label(
                        egui::RichText::new(text)
                            .color(text_color)
                            .size(16.0)
                            .strong(),
                    );
                });
            });
    }

    pub fn status_line(ui: &mut egui::Ui, text: impl Into<String>, color: egui::Color32) {
        ui.horizontal(|ui| {
            ui.label(egui::RichText::new("■").color(color));
            ui.label(text.into());
        });
    }
}
