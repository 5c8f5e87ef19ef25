// src/main.rs
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]
mod config;
mod drivers;
mod engine;
mod gui;
mod recorder;
mod types;
mod viewport;
use config::AppConfig;
use eframe::egui;

fn main() -> eframe::Result<()> {
    env_logger::init();
    let config_path = AppConfig::default_path();
    let config = AppConfig::load_or_default(&config_path);
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1280.0, 860.0])
        .with_min_inner_size([960.0, 640.0])
        .with_title("StrutScope");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native(
        "StrutScope",
        options,
        Box::new(move |_cc| Box::new(gui::StrutScopeApp::new(config, config_path))),
    )
}
