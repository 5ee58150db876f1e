pub mod bridge;
pub mod coordinator;
pub mod hid;
pub mod input;
pub mod media;
pub mod settings;
pub mod state;
pub mod state_machine;
pub mod utils;

#[cfg(test)]
mod tests;

use settings::{settings_path, Settings};
use utils::logger::init_logging;

/// Entry point for the native host: speak native messaging on stdin/stdout
/// until the browser closes the pipe.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    log::info!("swallow {} starting", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load();
    let path = settings_path().ok();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(bridge::serve(
        tokio::io::stdin(),
        tokio::io::stdout(),
        settings,
        path,
    ))?;

    log::info!("swallow exiting");
    Ok(())
}
