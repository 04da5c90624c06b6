mod app;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use eframe::egui;
use std::path::PathBuf;

use edgeconfig_core::{dispatch, Config, SchemaPool};

use crate::app::ConsoleApp;

/// Arguments left after the console selector has been taken out
#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about = "EDGE/CWB configuration consoles",
    after_help = "Console selectors: -cd, -anss, -md, -dbsetup, -neicfetchconfig"
)]
struct Args {
    /// Path to the configuration file
    #[clap(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let (console, rest) = dispatch(std::env::args().skip(1));
    let args = Args::parse_from(std::iter::once("edgeconfig-gui".to_string()).chain(rest));
    log::info!("Starting {} console", console);

    let config = Config::resolve(args.config.as_deref()).context("Failed to load configuration")?;
    let pool = SchemaPool::from_config(&config);
    let app = ConsoleApp::new(console, pool)?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(console.title())
            .with_inner_size([1100.0, 700.0]),
        ..Default::default()
    };

    eframe::run_native(
        console.title(),
        options,
        Box::new(|_cc| Ok(Box::new(app))),
    )
    .map_err(|e| anyhow!("GUI error: {}", e))
}
