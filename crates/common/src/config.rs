//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Recording and muxing parameters.
    pub recording: RecordingDefaults,

    /// Capture session presets.
    pub capture: CaptureDefaults,

    /// Orientation sampling.
    pub orientation: OrientationConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Recording parameters used when a writer is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingDefaults {
    /// File name of the movie written into the temporary directory.
    /// Each recording overwrites the previous one.
    pub output_file_name: String,

    /// Capture frame rate; also sets the compositor's per-frame budget.
    pub frame_rate: u32,

    /// Video codec name.
    pub video_codec: String,

    /// Audio sample rate in Hz.
    pub audio_sample_rate: u32,

    /// Audio channel count.
    pub audio_channels: u32,

    /// Audio encoder bitrate in bits per second.
    pub audio_bitrate: u32,

    /// Bytes the video track may buffer before it reports not-ready.
    pub video_queue_bytes: u64,

    /// Bytes the audio track may buffer before it reports not-ready.
    pub audio_queue_bytes: u64,
}

/// Session presets for each capture mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureDefaults {
    /// Preset width for video mode.
    pub video_width: u32,

    /// Preset height for video mode.
    pub video_height: u32,
}

/// Orientation sampling parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrientationConfig {
    /// Gravity sampling interval in milliseconds.
    pub sample_interval_ms: u64,

    /// Classification strategy.
    pub strategy: OrientationStrategyName,
}

/// Serialized name of an orientation classification strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrientationStrategyName {
    #[default]
    SystemLike,
    LargestAxis,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "altimeter_recorder=trace,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for RecordingDefaults {
    fn default() -> Self {
        Self {
            output_file_name: "output.mov".to_string(),
            frame_rate: 30,
            video_codec: "h264".to_string(),
            audio_sample_rate: 44_100,
            audio_channels: 2,
            audio_bitrate: 128_000,
            video_queue_bytes: 64 * 1024 * 1024,
            audio_queue_bytes: 4 * 1024 * 1024,
        }
    }
}

impl RecordingDefaults {
    /// Deterministic output path for the recording movie.
    pub fn output_path(&self) -> PathBuf {
        std::env::temp_dir().join(&self.output_file_name)
    }
}

impl Default for CaptureDefaults {
    fn default() -> Self {
        Self {
            video_width: 1920,
            video_height: 1080,
        }
    }
}

impl Default for OrientationConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 33,
            strategy: OrientationStrategyName::SystemLike,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&config_file_path())
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, config_path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("altimeter").join("config.json")
}
