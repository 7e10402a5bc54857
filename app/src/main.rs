use std::error::Error;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use ojol_core::config::{default_config_dir, AppConfig};
use tracing_subscriber::EnvFilter;

fn run_app(
    config: AppConfig,
    run_tui: impl FnOnce(Arc<AppConfig>) -> Result<(), ojol_tui::TuiError>,
) -> Result<(), Box<dyn Error>> {
    run_tui(Arc::new(config))?;
    Ok(())
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

// The terminal belongs to the UI.
fn init_logging(config: &AppConfig) -> Result<(), Box<dyn Error>> {
    let path = config.log_file(&default_config_dir()?);
    let file = open_log_file(&path)?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log.level.as_str()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|error| io::Error::other(error.to_string()))?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::load_default()?;
    if let Err(error) = init_logging(&config) {
        eprintln!("logging disabled: {error}");
    }
    run_app(config, ojol_tui::run)
}
