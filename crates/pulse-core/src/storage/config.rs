//! TOML-based application settings.
//!
//! Stores user preferences including:
//! - Phase durations and the long-break cycle length
//! - Auto-advance policy applied when an interval closes
//! - Presentation preferences (theme, sound, notifications)
//!
//! Settings are stored at `<data dir>/config.toml`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::timer::TimerPhase;

/// Application settings singleton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default = "default_focus_min")]
    pub focus_min: u32,
    #[serde(default = "default_short_break_min")]
    pub short_break_min: u32,
    #[serde(default = "default_long_break_min")]
    pub long_break_min: u32,
    /// Focus intervals per long-break cycle.
    #[serde(default = "default_long_break_every")]
    pub long_break_every: u32,
    /// Start the next phase immediately when an interval closes.
    #[serde(default = "default_true")]
    pub auto_advance: bool,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_true")]
    pub sound_enabled: bool,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
}

/// Partial update for [`AppSettings`]; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettingsPatch {
    pub focus_min: Option<u32>,
    pub short_break_min: Option<u32>,
    pub long_break_min: Option<u32>,
    pub long_break_every: Option<u32>,
    pub auto_advance: Option<bool>,
    pub theme: Option<String>,
    pub sound_enabled: Option<bool>,
    pub notifications_enabled: Option<bool>,
}

// Default functions
fn default_focus_min() -> u32 {
    25
}
fn default_short_break_min() -> u32 {
    5
}
fn default_long_break_min() -> u32 {
    15
}
fn default_long_break_every() -> u32 {
    4
}
fn default_true() -> bool {
    true
}
fn default_theme() -> String {
    "light".into()
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            focus_min: default_focus_min(),
            short_break_min: default_short_break_min(),
            long_break_min: default_long_break_min(),
            long_break_every: default_long_break_every(),
            auto_advance: true,
            theme: default_theme(),
            sound_enabled: true,
            notifications_enabled: true,
        }
    }
}

impl AppSettings {
    pub fn duration_for_phase_seconds(&self, phase: TimerPhase) -> i64 {
        let minutes = match phase {
            TimerPhase::Focus => self.focus_min,
            TimerPhase::ShortBreak => self.short_break_min,
            TimerPhase::LongBreak => self.long_break_min,
        };
        i64::from(minutes) * 60
    }

    /// Clamp every field into its supported range.
    pub fn normalized(mut self) -> Self {
        let before = self.clone();
        self.focus_min = self.focus_min.clamp(1, 180);
        self.short_break_min = self.short_break_min.clamp(1, 60);
        self.long_break_min = self.long_break_min.clamp(1, 90);
        self.long_break_every = self.long_break_every.clamp(2, 10);
        self.theme = match self.theme.trim().to_lowercase().as_str() {
            "dark" => "dark".to_string(),
            _ => "light".to_string(),
        };
        if self != before {
            tracing::warn!(?before, after = ?self, "settings normalized");
        }
        self
    }

    pub fn apply_patch(&mut self, patch: AppSettingsPatch) {
        if let Some(v) = patch.focus_min {
            self.focus_min = v;
        }
        if let Some(v) = patch.short_break_min {
            self.short_break_min = v;
        }
        if let Some(v) = patch.long_break_min {
            self.long_break_min = v;
        }
        if let Some(v) = patch.long_break_every {
            self.long_break_every = v;
        }
        if let Some(v) = patch.auto_advance {
            self.auto_advance = v;
        }
        if let Some(v) = patch.theme {
            self.theme = v;
        }
        if let Some(v) = patch.sound_enabled {
            self.sound_enabled = v;
        }
        if let Some(v) = patch.notifications_enabled {
            self.notifications_enabled = v;
        }
        *self = std::mem::take(self).normalized();
    }

    /// Load from `path`, writing defaults there when the file does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or if the
    /// defaults cannot be written.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let settings: AppSettings =
                    toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    })?;
                Ok(settings.normalized())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let settings = Self::default();
                settings.save_to(path)?;
                Ok(settings)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be serialized or written.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| save_failed(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a setting as a string by key (`focus_min` or `focusMin`).
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = json.get(wire_key(key).as_str())?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a single setting by key, parsing `value` according to the existing type.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not parse.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        set_json_value(&mut json, key, value)?;
        let updated: AppSettings =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        *self = updated.normalized();
        Ok(())
    }
}

/// Accept both the snake_case spelling used on the command line and the wire name.
fn wire_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.trim().chars() {
        if c == '_' || c == '-' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn set_json_value(root: &mut serde_json::Value, key: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = |message: String| ConfigError::InvalidValue {
        key: key.to_string(),
        message,
    };
    let obj = root
        .as_object_mut()
        .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
    let field = wire_key(key);
    let existing = obj
        .get(field.as_str())
        .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

    let new_value = match existing {
        serde_json::Value::Bool(_) => serde_json::Value::Bool(
            value
                .parse::<bool>()
                .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
        ),
        serde_json::Value::Number(_) => {
            let n = value
                .parse::<u32>()
                .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?;
            serde_json::Value::Number(n.into())
        }
        _ => serde_json::Value::String(value.into()),
    };

    obj.insert(field, new_value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_roundtrip_through_toml() {
        let settings = AppSettings::default();
        let toml_str = toml::to_string_pretty(&settings).unwrap();
        let parsed: AppSettings = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let parsed: AppSettings = toml::from_str("focusMin = 50").unwrap();
        assert_eq!(parsed.focus_min, 50);
        assert_eq!(parsed.long_break_every, 4);
        assert!(parsed.auto_advance);
    }

    #[test]
    fn durations_are_in_seconds() {
        let settings = AppSettings::default();
        assert_eq!(settings.duration_for_phase_seconds(TimerPhase::Focus), 1500);
        assert_eq!(settings.duration_for_phase_seconds(TimerPhase::ShortBreak), 300);
        assert_eq!(settings.duration_for_phase_seconds(TimerPhase::LongBreak), 900);
    }

    #[test]
    fn patch_is_clamped() {
        let mut settings = AppSettings::default();
        settings.apply_patch(AppSettingsPatch {
            focus_min: Some(0),
            long_break_every: Some(99),
            theme: Some(" DARK ".into()),
            ..AppSettingsPatch::default()
        });
        assert_eq!(settings.focus_min, 1);
        assert_eq!(settings.long_break_every, 10);
        assert_eq!(settings.theme, "dark");
        assert_eq!(settings.short_break_min, 5);
    }

    #[test]
    fn get_accepts_both_spellings() {
        let settings = AppSettings::default();
        assert_eq!(settings.get("focus_min").as_deref(), Some("25"));
        assert_eq!(settings.get("autoAdvance").as_deref(), Some("true"));
        assert_eq!(settings.get("theme").as_deref(), Some("light"));
        assert!(settings.get("missing_key").is_none());
    }

    #[test]
    fn set_parses_by_existing_type() {
        let mut settings = AppSettings::default();
        settings.set("auto_advance", "false").unwrap();
        settings.set("short_break_min", "7").unwrap();
        assert!(!settings.auto_advance);
        assert_eq!(settings.short_break_min, 7);

        assert!(matches!(
            settings.set("nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            settings.set("auto_advance", "maybe"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn load_from_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let settings = AppSettings::load_from(&path).unwrap();
        assert_eq!(settings, AppSettings::default());
        assert!(path.exists());

        let mut changed = settings.clone();
        changed.focus_min = 45;
        changed.save_to(&path).unwrap();
        assert_eq!(AppSettings::load_from(&path).unwrap().focus_min, 45);
    }

    #[test]
    fn load_from_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "focusMin = \"soon\"").unwrap();
        assert!(matches!(
            AppSettings::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }
}
