//! Configuration management for the tone engine
//!
//! This module provides runtime configuration loading from JSON files.
//! Every field has a default, so a missing or malformed file simply yields
//! the stock 440 Hz tone with double-buffered low-latency output.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::AudioError;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tone: ToneConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// Sine tone parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneConfig {
    /// Tone frequency in Hz
    pub frequency_hz: f64,
    /// Peak sample amplitude, 0.0 < amplitude <= 1.0
    pub amplitude: f64,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 440.0,
            amplitude: 0.3,
        }
    }
}

/// Output stream parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Stream buffer size expressed in device bursts.
    ///
    /// Two bursts (double buffering) tolerates scheduling jitter while
    /// adding only one burst of latency.
    pub buffer_size_in_bursts: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            buffer_size_in_bursts: 2,
        }
    }
}

/// Logging parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Maximum level: "error", "warn", "info", "debug" or "trace"
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Parsed level, falling back to INFO for unknown names
    pub fn max_level(&self) -> tracing::Level {
        self.level.parse().unwrap_or(tracing::Level::INFO)
    }
}

impl AppConfig {
    /// Check value ranges the engine relies on
    pub fn validate(&self) -> Result<(), AudioError> {
        let frequency = self.tone.frequency_hz;
        if !frequency.is_finite() || frequency <= 0.0 {
            return Err(AudioError::InvalidConfig {
                reason: format!("tone.frequency_hz must be > 0 (got {})", frequency),
            });
        }

        let amplitude = self.tone.amplitude;
        if !amplitude.is_finite() || amplitude <= 0.0 || amplitude > 1.0 {
            return Err(AudioError::InvalidConfig {
                reason: format!("tone.amplitude must be in (0, 1] (got {})", amplitude),
            });
        }

        if self.output.buffer_size_in_bursts == 0 {
            return Err(AudioError::InvalidConfig {
                reason: "output.buffer_size_in_bursts must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration. If the file doesn't exist, the JSON is
    /// invalid, or the values fail validation, the default config is returned.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                return Self::default();
            }
        };

        let config: AppConfig = match serde_json::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                log::warn!(
                    "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                return Self::default();
            }
        };

        match config.validate() {
            Ok(()) => {
                log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                config
            }
            Err(err) => {
                log::warn!("[Config] {}. Using defaults.", err);
                Self::default()
            }
        }
    }

    /// Load configuration on Android
    ///
    /// The native library has no asset access of its own, so the defaults
    /// are used.
    #[cfg(target_os = "android")]
    pub fn load_android() -> Self {
        log::info!("[Config] Using default configuration on Android");
        Self::default()
    }

    /// Load configuration from the working directory's assets folder
    pub fn load() -> Self {
        Self::load_from_file("assets/wavemaker.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_config_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("wavemaker-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.tone.frequency_hz, 440.0);
        assert_eq!(config.tone.amplitude, 0.3);
        assert_eq!(config.output.buffer_size_in_bursts, 2);
        assert_eq!(config.logging.max_level(), tracing::Level::INFO);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"tone": {"frequency_hz": 880.0}}"#).unwrap();
        assert_eq!(parsed.tone.frequency_hz, 880.0);
        assert_eq!(parsed.tone.amplitude, 0.3);
        assert_eq!(parsed.output.buffer_size_in_bursts, 2);
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        let mut config = AppConfig::default();
        config.tone.frequency_hz = 0.0;
        assert!(matches!(
            config.validate(),
            Err(AudioError::InvalidConfig { .. })
        ));

        let mut config = AppConfig::default();
        config.tone.amplitude = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.output.buffer_size_in_bursts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = AppConfig::load_from_file("/nonexistent/wavemaker.json");
        assert_eq!(config.tone.frequency_hz, 440.0);
    }

    #[test]
    fn test_load_from_file() {
        let path = temp_config_path("load");
        {
            let mut file = fs::File::create(&path).unwrap();
            write!(
                file,
                concat!(
                    r#"{{"tone": {{"frequency_hz": 523.25, "amplitude": 0.5}}, "#,
                    r#""logging": {{"level": "debug"}}}}"#
                )
            )
            .unwrap();
        }

        let config = AppConfig::load_from_file(&path);
        assert_eq!(config.tone.frequency_hz, 523.25);
        assert_eq!(config.tone.amplitude, 0.5);
        assert_eq!(config.logging.max_level(), tracing::Level::DEBUG);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_invalid_values_falls_back_to_defaults() {
        let path = temp_config_path("invalid");
        fs::write(&path, r#"{"tone": {"amplitude": -1.0}}"#).unwrap();

        let config = AppConfig::load_from_file(&path);
        assert_eq!(config.tone.amplitude, 0.3);

        fs::remove_file(&path).unwrap();
    }
}
