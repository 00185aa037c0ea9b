//! Configuration for the vizor host service.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use vizor_core::desktop::encoder::VideoEncoding;
use vizor_core::desktop::updater::{UpdaterConfig, UpdaterFeatures};
use vizor_core::error::VizorError;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Screen capture settings.
    pub screen: ScreenConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Screen capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    /// Target interval between updates, in milliseconds.
    pub update_interval_ms: u64,
    /// Video encoding: "zstd", "vp8", "vp9".
    pub video_encoding: String,
    /// Compression level for the selected encoding (1..=19 for zstd).
    pub compression_level: i32,
    /// Capture and publish the pointer shape.
    pub cursor_shape: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            screen: ScreenConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 30,
            video_encoding: "zstd".into(),
            compression_level: 1,
            cursor_shape: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl HostConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Convert capture settings into an `UpdaterConfig`.
    ///
    /// An unrecognized encoding identifier is reported here so the caller
    /// fails before the pipeline ever starts.
    pub fn to_updater_config(&self) -> Result<UpdaterConfig, VizorError> {
        let encoding: VideoEncoding = self.screen.video_encoding.parse()?;
        let mut features = UpdaterFeatures::empty();
        if self.screen.cursor_shape {
            features |= UpdaterFeatures::CURSOR_SHAPE;
        }
        Ok(UpdaterConfig {
            update_interval: Duration::from_millis(self.screen.update_interval_ms.max(1)),
            encoding,
            compression_level: self.screen.compression_level.clamp(1, 19),
            features,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let cfg = HostConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("update_interval_ms"));
        assert!(text.contains("video_encoding"));
    }

    #[test]
    fn roundtrip_config() {
        let cfg = HostConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: HostConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.screen.update_interval_ms, 30);
        assert!(parsed.screen.cursor_shape);
    }

    #[test]
    fn to_updater_config_clamps() {
        let mut cfg = HostConfig::default();
        cfg.screen.update_interval_ms = 0;
        cfg.screen.compression_level = 99;
        let updater = cfg.to_updater_config().unwrap();
        assert_eq!(updater.update_interval, Duration::from_millis(1));
        assert_eq!(updater.compression_level, 19);
        assert!(updater.features.contains(UpdaterFeatures::CURSOR_SHAPE));
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        let mut cfg = HostConfig::default();
        cfg.screen.video_encoding = "mpeg1".into();
        assert!(cfg.to_updater_config().is_err());
    }
}
