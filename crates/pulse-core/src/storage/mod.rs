mod catalog;
mod config;
pub mod database;
pub mod migrations;
mod sessions;

pub use catalog::{Project, ProjectInput, Tag, TagInput};
pub use config::{AppSettings, AppSettingsPatch};
pub use database::{Database, ResetCounts};
pub use sessions::{NewSession, SessionQuery, SessionRecord};

pub(crate) use catalog::{select_projects, select_tags};
pub(crate) use sessions::select_sessions;

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `PULSE_DATA_DIR` overrides the location outright. Otherwise the directory is
/// `~/.config/pulse[-dev]/`, with `PULSE_ENV=dev` selecting the development one.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("PULSE_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("PULSE_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("pulse-dev")
            } else {
                base_dir.join("pulse")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
