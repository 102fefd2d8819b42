#![warn(clippy::all)]
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

use backlog_view::{Arguments, BacklogViewApp, DataSources};
use tracing::error;

/*
cargo fmt
cargo test -- --nocapture
cargo test -- --show-output tests_filter
cargo run -- --help
cargo run --features quarter-strict -- -b ASI_Daily_Backlog.xlsx
cargo doc --open
cargo b -r && cargo install --path=.
cargo b -r && cargo install --path=. --features quarter-strict
*/

#[cfg(not(target_arch = "wasm32"))]
fn main() -> eframe::Result<()> {
    // Initialize the tracing subscriber for logging.
    // Use RUST_LOG environment variable to set logging level. eg `export RUST_LOG=info`
    tracing_subscriber::fmt::init();

    // Parse command-line arguments.
    let args = Arguments::build();
    let sources = DataSources::new(&args);

    // Configure the native options for the eframe application.
    let native_options = eframe::NativeOptions {
        centered: true,
        persist_window: true,
        vsync: true,
        viewport: egui::ViewportBuilder::default(),
        ..Default::default()
    };

    // Run the eframe application.
    eframe::run_native(
        "BacklogView",
        native_options,
        Box::new(move |creation_context| {
            // RUST_LOG=debug cargo run
            tracing::debug!("main()\nDataSources: {sources:#?}");

            // The initial load is scheduled inside new_with_sources; missing
            // workbooks surface as in-app messages, never as startup failures.
            match BacklogViewApp::new_with_sources(creation_context, sources) {
                Ok(app) => Ok(Box::new(app)),
                Err(err) => {
                    error!("Failed to initialize BacklogViewApp: {}", err); //Log
                    panic!("Failed to initialize BacklogViewApp: {err}"); //Panic
                }
            }
        }),
    )
}
