use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::audio::{CaptureFormat, DEFAULT_DEVICE_ID};
use crate::timebase::{TimeBase, DEFAULT_TICKS_PER_SECOND, MICROPHONE_SAMPLE_RATE};

/// Returns the path to the settings file: `~/.config/audio-recorder/settings.json`
pub fn settings_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("audio-recorder");
    path.push("settings.json");
    path
}

/// Persisted application settings.
///
/// Loaded once at startup and turned into the immutable `TimeBase` and
/// `CaptureFormat` handed to each engine. Fields use `#[serde(default)]`
/// so that adding new settings won't break existing config files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Time base
    pub ticks_per_second: u64,

    // Capture
    pub capture_sample_rate: u32,
    /// Input device index, or -1 for the system default.
    pub device_id: i32,
    /// Samples kept for the live display between two repaints.
    pub display_capacity: usize,

    // File conversion
    pub write_container: bool,
    pub output_directory: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,

            capture_sample_rate: MICROPHONE_SAMPLE_RATE,
            device_id: 0,
            display_capacity: 2 * MICROPHONE_SAMPLE_RATE as usize,

            write_container: true,
            output_directory: None,
        }
    }
}

impl Settings {
    /// Load settings from disk, falling back to defaults on any error.
    pub fn load() -> Self {
        Self::load_from(&settings_path())
    }

    pub fn load_from(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.display());
                    settings.sanitized()
                }
                Err(e) => {
                    log::warn!("Failed to parse settings ({}), using defaults", e);
                    Self::default()
                }
            },
            Err(e) => {
                log::info!("No settings file found ({}), using defaults", e);
                Self::default()
            }
        }
    }

    /// Save settings to disk as pretty JSON.
    pub fn save(&self) {
        self.save_to(&settings_path());
    }

    pub fn save_to(&self, path: &std::path::Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::warn!("Failed to create config directory: {}", e);
                return;
            }
        }
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    log::warn!("Failed to write settings: {}", e);
                }
            }
            Err(e) => {
                log::warn!("Failed to serialize settings: {}", e);
            }
        }
    }

    /// Replace values that would break the time base with their defaults.
    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.ticks_per_second == 0 {
            log::warn!("ticks_per_second must be positive, using default");
            self.ticks_per_second = defaults.ticks_per_second;
        }
        if self.capture_sample_rate == 0 || u64::from(self.capture_sample_rate) > self.ticks_per_second {
            log::warn!("Invalid capture sample rate {}, using default", self.capture_sample_rate);
            self.capture_sample_rate = defaults.capture_sample_rate;
        }
        if self.device_id < DEFAULT_DEVICE_ID {
            self.device_id = defaults.device_id;
        }
        self
    }

    pub fn time_base(&self) -> TimeBase {
        TimeBase::new(self.ticks_per_second)
    }

    /// Always 16-bit mono; only the rate is configurable.
    pub fn capture_format(&self) -> CaptureFormat {
        CaptureFormat {
            sample_rate: self.capture_sample_rate,
            ..CaptureFormat::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_microphone_format() {
        let settings = Settings::default();
        assert_eq!(settings.time_base().microphone_sample_period(), 625);
        assert_eq!(settings.capture_format(), CaptureFormat::default());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = Settings {
            device_id: -1,
            write_container: false,
            ..Settings::default()
        };
        settings.save_to(&path);

        assert_eq!(Settings::load_from(&path), settings);
    }

    #[test]
    fn partial_file_uses_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "device_id": 2 }"#).unwrap();

        let settings = Settings::load_from(&path);
        assert_eq!(settings.device_id, 2);
        assert_eq!(settings.ticks_per_second, DEFAULT_TICKS_PER_SECOND);
    }

    #[test]
    fn invalid_values_are_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "ticks_per_second": 0, "capture_sample_rate": 0 }"#).unwrap();

        let settings = Settings::load_from(&path);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }
}
