//! Converse Copilot Desktop — application entry.

mod app;
mod widgets;

use eframe::egui;

fn main() -> eframe::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([900.0, 700.0])
            .with_min_inner_size([480.0, 400.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Converse Copilot",
        options,
        Box::new(|cc| Box::new(app::ConverseApp::new(cc))),
    )
}
