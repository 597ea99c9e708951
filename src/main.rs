mod domain;
mod infrastructure;
mod presentation;

use domain::settings::SettingsService;
use eframe::egui;
use infrastructure::logging::init_logger;
use presentation::app::BridgeApp;
use tracing::info;

fn main() -> anyhow::Result<()> {
    let settings = SettingsService::new()?;

    let logging_guard = match init_logger(&settings.get().log_settings) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            None
        }
    };
    info!("Starting LED Arduino Control");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([480.0, 640.0])
            .with_title("LED Arduino Control"),
        ..Default::default()
    };

    eframe::run_native(
        "LED Arduino Control",
        options,
        Box::new(move |cc| Ok(Box::new(BridgeApp::new(cc, settings, logging_guard)))),
    )
    .map_err(|e| anyhow::anyhow!(e.to_string()))
}
