use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading monitor settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path} is not a valid settings file: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Which message classes the driver should drop before they reach the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreFilter {
    #[default]
    None,
    Sysex,
    Time,
    ActiveSense,
    All,
}

/// Persisted monitor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Idle wait between loop iterations, in milliseconds.
    pub poll_interval_ms: u64,
    /// Client name registered with the MIDI driver.
    pub client_name: String,
    /// Message classes filtered out by the driver.
    pub ignore: IgnoreFilter,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            client_name: "midimon".into(),
            ignore: IgnoreFilter::None,
        }
    }
}

impl MonitorSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Reads settings from an explicit file. Missing fields take defaults.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the per-user settings file, falling back to defaults when it
    /// does not exist. A file that exists but cannot be parsed is an error.
    pub fn load_default() -> Result<Self, SettingsError> {
        match settings_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// Location of the per-user settings file.
pub fn settings_path() -> Option<PathBuf> {
    let mut base = dirs::config_dir()?;
    base.push("midimon");
    base.push("settings.json");
    Some(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let settings: MonitorSettings =
            serde_json::from_str(r#"{ "poll_interval_ms": 250, "ignore": "active_sense" }"#)
                .unwrap();
        assert_eq!(settings.poll_interval(), Duration::from_millis(250));
        assert_eq!(settings.ignore, IgnoreFilter::ActiveSense);
        assert_eq!(settings.client_name, "midimon");
    }

    #[test]
    fn zero_interval_is_clamped() {
        let settings = MonitorSettings {
            poll_interval_ms: 0,
            ..MonitorSettings::default()
        };
        assert_eq!(settings.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn reports_bad_files() {
        let dir = std::env::temp_dir().join(format!("midimon-settings-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            MonitorSettings::load_from(&path),
            Err(SettingsError::Parse { .. })
        ));
        fs::remove_dir_all(&dir).unwrap();

        assert!(matches!(
            MonitorSettings::load_from(&dir.join("missing.json")),
            Err(SettingsError::Read { .. })
        ));
    }
}
