mod config;
pub mod sqlite;

pub use config::{Config, RequestConfig};
pub use sqlite::SqliteCounterStore;

use std::path::PathBuf;

/// Returns `~/.config/rateprompt[-dev]/` based on RATEPROMPT_ENV.
///
/// Set RATEPROMPT_ENV=dev to use the development data directory, or
/// RATEPROMPT_HOME to use an explicit directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("RATEPROMPT_HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("RATEPROMPT_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("rateprompt-dev")
            } else {
                base_dir.join("rateprompt")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
