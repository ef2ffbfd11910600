//! CLI smoke entry point.
//!
//! # Responsibility
//! - Start file logging when `WAVESTORE_LOG_DIR` names a directory.
//! - Open a store (in memory, or the file given as the first argument).
//! - Seed first-run data and print the resulting client state.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use wavestore_core::{default_log_level, init_logging, StoreConfig, WaveService, WaveStore};

const LOG_DIR_ENV: &str = "WAVESTORE_LOG_DIR";

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("wavestore error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(dir) = log_dir(std::env::var_os(LOG_DIR_ENV))? {
        init_logging(default_log_level(), &dir.to_string_lossy())?;
    }

    let config = match std::env::args_os().nth(1) {
        Some(path) => StoreConfig::with_db_path(std::path::absolute(path)?),
        None => StoreConfig::default(),
    };
    let service = WaveService::new(Arc::new(WaveStore::open(config)?));
    let seeded = service.ensure_initial_data()?;
    let client = service.get_client()?;
    let ui = service.get_ui_context()?;

    println!("wavestore_core version={}", wavestore_core::core_version());
    println!("seeded={seeded}");
    println!("client={}", client.oid);
    println!("window={}", ui.window_id);
    println!("active_tab={}", ui.active_tab_id);
    Ok(())
}

/// Absolute log directory from the environment value, if one is set.
fn log_dir(value: Option<OsString>) -> std::io::Result<Option<PathBuf>> {
    match value {
        Some(value) if !value.is_empty() => std::path::absolute(value).map(Some),
        _ => Ok(None),
    }
}
