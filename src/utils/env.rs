// src/utils/env.rs

use log::{info, warn};
use std::path::Path;

/// Loads variables from `.env` in the working directory (or its parents).
/// Variables already present in the process environment are not overridden.
pub fn load_env() {
    match dotenv::dotenv() {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(e) => warn!(
            "No .env file loaded ({}). Proceeding with system environment variables.",
            e
        ),
    }
}

/// Loads variables from an explicit env file, e.g. one passed on the command line.
pub fn load_env_from_file(file_path: &Path) {
    info!(
        "Attempting to load environment variables from: {}",
        file_path.display()
    );
    match dotenv::from_path(file_path) {
        Ok(()) => info!("Successfully processed env file: {}", file_path.display()),
        Err(e) => warn!(
            "Could not load env file '{}': {}. Proceeding with system environment variables.",
            file_path.display(),
            e
        ),
    }
}
