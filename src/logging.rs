//! Logger initialisation

use log::{info, warn};
use std::path::Path;

use crate::config::LoggingConfig;

/// Initialise log4rs from the configured file, falling back to env_logger.
pub fn init_logging(config: &LoggingConfig) {
    let path = Path::new(&config.config_file);
    if path.exists() {
        match log4rs::init_file(path, Default::default()) {
            Ok(()) => {
                info!("Logging configured from {}", path.display());
                return;
            }
            Err(e) => {
                init_env_logger();
                warn!("Invalid log configuration {}: {}", path.display(), e);
                return;
            }
        }
    }
    init_env_logger();
    info!("Log configuration {} not found, logging to stderr", path.display());
}

fn init_env_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();
}
