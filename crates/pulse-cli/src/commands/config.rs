use clap::Subcommand;
use pulse_core::{ConfigError, PulseApp};

use super::print_json;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g. "focus_min", "auto_advance")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
    /// List all config values
    List,
    /// Reset config to defaults
    Reset,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    let app = PulseApp::open()?;

    match action {
        ConfigAction::Get { key } => {
            let value = app
                .settings_get()
                .get(&key)
                .ok_or(ConfigError::UnknownKey(key))?;
            println!("{value}");
            Ok(())
        }
        ConfigAction::Set { key, value } => print_json(&app.settings_set(&key, &value)?),
        ConfigAction::List => print_json(&app.settings_get()),
        ConfigAction::Reset => print_json(&app.settings_reset()?),
    }
}
