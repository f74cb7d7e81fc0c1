//! Centralized path configuration for flotilla.
//!
//! All data paths should go through this module to ensure consistency
//! whether the coordinator runs as a user process or a system service.

use std::path::PathBuf;

/// Get the flotilla data directory.
///
/// Resolution order:
/// 1. `FLOTILLA_DATA_DIR` environment variable
/// 2. `/var/lib/flotilla` if it exists (system install)
/// 3. `~/.flotilla` for user-only installs
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("FLOTILLA_DATA_DIR") {
        return PathBuf::from(dir);
    }

    let system_dir = PathBuf::from("/var/lib/flotilla");
    if system_dir.exists() {
        return system_dir;
    }

    dirs::home_dir().map(|h| h.join(".flotilla")).unwrap_or(system_dir)
}

/// Get the database path.
pub fn db_path() -> PathBuf {
    data_dir().join("flotilla.db")
}

/// Get the directory holding per-stack project folders.
pub fn stacks_dir() -> PathBuf {
    data_dir().join("stacks")
}

/// Get the config directory.
pub fn config_dir() -> PathBuf {
    data_dir()
}

/// Get the logs directory.
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}
