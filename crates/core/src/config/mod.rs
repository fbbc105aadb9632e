use std::{fs, path::Path, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{LooperError, Result};

/// Longest poll interval that still keeps loop triggers under 10 ms late.
pub const MAX_POLL_INTERVAL_MS: u64 = 10;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub looper: LooperConfig,
    pub live: LiveConfig,
    pub paths: PathsConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the settings the core depends on.
    pub fn validate(&self) -> Result<()> {
        self.looper.validate()
    }
}

/// Recording and loop playback settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LooperConfig {
    pub bpm: f64,
    pub poll_interval_ms: u64,
}

impl Default for LooperConfig {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            poll_interval_ms: 1,
        }
    }
}

impl LooperConfig {
    /// Returns the length of one beat at the configured tempo.
    pub fn beat_length(&self) -> Duration {
        Duration::from_secs_f64(60.0 / self.bpm)
    }

    /// Returns the loop player's poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Rejects a non-positive tempo and a poll interval outside 1..=10 ms.
    pub fn validate(&self) -> Result<()> {
        if !self.bpm.is_finite() || self.bpm <= 0.0 {
            return Err(LooperError::Config(format!(
                "bpm must be a positive number, got {}",
                self.bpm
            )));
        }
        if !(1..=MAX_POLL_INTERVAL_MS).contains(&self.poll_interval_ms) {
            return Err(LooperError::Config(format!(
                "poll_interval_ms must be between 1 and {MAX_POLL_INTERVAL_MS}, got {}",
                self.poll_interval_ms
            )));
        }
        Ok(())
    }
}

/// Pacing of the foreground frame loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    pub frame_interval_ms: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 10,
        }
    }
}

impl LiveConfig {
    /// Returns the sleep between foreground frames.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub mapping_file: PathBuf,
    pub sounds_dir: PathBuf,
    pub loop_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            mapping_file: PathBuf::from("mapping.json"),
            sounds_dir: PathBuf::from("sounds"),
            loop_file: PathBuf::from("loop.txt"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.looper.beat_length(), Duration::from_millis(500));
        assert_eq!(config.live.frame_interval(), Duration::from_millis(10));
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"looper": {"bpm": 90}, "paths": {"loop_file": "take.txt"}}"#)
                .unwrap();

        assert_eq!(config.looper.bpm, 90.0);
        assert_eq!(config.looper.poll_interval_ms, 1);
        assert_eq!(config.paths.loop_file, PathBuf::from("take.txt"));
        assert_eq!(config.paths.sounds_dir, PathBuf::from("sounds"));
    }

    #[test]
    fn rejects_bad_tempo_and_poll_interval() {
        let mut config = AppConfig::default();
        config.looper.bpm = -1.0;
        assert!(matches!(config.validate(), Err(LooperError::Config(_))));

        let mut config = AppConfig::default();
        config.looper.poll_interval_ms = 0;
        assert!(config.validate().is_err());
        config.looper.poll_interval_ms = 50;
        assert!(config.validate().is_err());
    }
}
