use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_MIN_AVAILABLE_SPACE_MB, DEFAULT_RETENTION_DAYS, DEFAULT_SAMPLE_RATE,
};

fn default_data_dir() -> PathBuf {
    PathBuf::from("tmp")
}

fn default_database_name() -> String {
    "voice_journal".to_string()
}

fn default_retention_days() -> i64 {
    DEFAULT_RETENTION_DAYS
}

fn default_min_available_space_mb() -> u64 {
    DEFAULT_MIN_AVAILABLE_SPACE_MB
}

/// Top-level configuration file structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Root directory holding the database file and the recordings tree (default: tmp)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Database file name without extension (default: voice_journal)
    #[serde(default = "default_database_name")]
    pub database_name: String,
    /// Days a recording is kept before the expiry sweep removes it (default: 7)
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// Free space watermark in MB (default: 500)
    #[serde(default = "default_min_available_space_mb")]
    pub min_available_space_mb: u64,
    /// Capture session timing (maps to [recorder] section in TOML)
    #[serde(default)]
    pub recorder: RecorderConfig,
    /// Voice activity detection (maps to [vad] section in TOML)
    #[serde(default)]
    pub vad: VadConfig,
}

/// Recording session configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Capture sample rate, mono 16-bit PCM (default: 16000)
    pub sample_rate: u32,
    /// Audio kept from before voice onset, in ms (default: 1000)
    pub pre_buffer_ms: u64,
    /// Silence tolerated inside one recording, in ms (default: 10000)
    pub silence_gap_ms: u64,
    /// Tail recorded once the silence gap has elapsed, in ms (default: 3000)
    pub post_buffer_ms: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            pre_buffer_ms: 1000,
            silence_gap_ms: 10_000,
            post_buffer_ms: 3000,
        }
    }
}

/// Voice activity detector configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    /// Samples per detection frame (default: 512, 32ms at 16kHz)
    pub frame_size: usize,
    /// Speech probability above which a frame counts as voiced (default: 0.5)
    pub voice_threshold: f32,
    /// Consecutive voiced frames needed to start (default: 3)
    pub min_voice_frames: u32,
    /// Consecutive silent frames needed to end (default: 30, about 1s)
    pub min_silence_frames: u32,
    /// Frame energy mapped to probability 0.0 (default: -50 dBFS)
    pub energy_floor_db: f32,
    /// Frame energy mapped to probability 1.0 (default: -20 dBFS)
    pub energy_ceiling_db: f32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            frame_size: 512,
            voice_threshold: 0.5,
            min_voice_frames: 3,
            min_silence_frames: 30,
            energy_floor_db: -50.0,
            energy_ceiling_db: -20.0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_name: default_database_name(),
            retention_days: default_retention_days(),
            min_available_space_mb: default_min_available_space_mb(),
            recorder: RecorderConfig::default(),
            vad: VadConfig::default(),
        }
    }
}

impl Config {
    /// Load and validate a TOML configuration file
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Directory holding the pending/processing/completed/failed tree
    pub fn recordings_dir(&self) -> PathBuf {
        self.data_dir.join("recordings")
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.retention_days <= 0 {
            return Err(format!(
                "retention_days must be positive, got {}",
                self.retention_days
            ));
        }
        if self.database_name.trim().is_empty() {
            return Err("database_name must not be empty".to_string());
        }
        if self.recorder.sample_rate == 0 {
            return Err("recorder.sample_rate must be positive".to_string());
        }
        if self.vad.frame_size == 0 {
            return Err("vad.frame_size must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.vad.voice_threshold) {
            return Err(format!(
                "vad.voice_threshold must be within [0, 1], got {}",
                self.vad.voice_threshold
            ));
        }
        if self.vad.energy_floor_db >= self.vad.energy_ceiling_db {
            return Err(format!(
                "vad.energy_floor_db ({}) must be below vad.energy_ceiling_db ({})",
                self.vad.energy_floor_db, self.vad.energy_ceiling_db
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.data_dir, PathBuf::from("tmp"));
        assert_eq!(config.database_name, "voice_journal");
        assert_eq!(config.retention_days, 7);
        assert_eq!(config.min_available_space_mb, 500);
        assert_eq!(config.recorder.silence_gap_ms, 10_000);
        assert_eq!(config.vad.frame_size, 512);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sections() {
        let config: Config = toml::from_str(
            r#"
            data_dir = "/var/lib/journal"
            retention_days = 3

            [recorder]
            post_buffer_ms = 500

            [vad]
            min_silence_frames = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/journal"));
        assert_eq!(config.recordings_dir(), PathBuf::from("/var/lib/journal/recordings"));
        assert_eq!(config.retention_days, 3);
        assert_eq!(config.recorder.post_buffer_ms, 500);
        assert_eq!(config.recorder.pre_buffer_ms, 1000);
        assert_eq!(config.vad.min_silence_frames, 10);
        assert_eq!(config.vad.min_voice_frames, 3);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.retention_days = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.vad.voice_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.vad.energy_floor_db = -10.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.vad.frame_size = 0;
        assert!(config.validate().is_err());
    }

    fn write_config(dir: &tempfile::TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "database_name = \"journal\"\nretention_days = 14\n");

        let config = Config::load(&path).unwrap();
        assert_eq!(config.database_name, "journal");
        assert_eq!(config.retention_days, 14);
        assert_eq!(config.recorder.sample_rate, 16000);
    }

    #[test]
    fn test_load_validates_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "retention_days = -1\n");

        let err = Config::load(&path).unwrap_err();
        assert!(err.contains("retention_days must be positive"), "{}", err);
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "retention_days = \"a week\"\n");

        let err = Config::load(&path).unwrap_err();
        assert!(err.starts_with("Failed to parse config file"), "{}", err);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.starts_with("Failed to read config file"), "{}", err);
    }
}
