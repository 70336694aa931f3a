//! Configuration file management for voicenote.
//!
//! This module handles loading and saving application configuration from TOML files.
//! Configuration is stored in the user's config directory.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::recorder::{AnalyserSettings, RecorderSettings};

/// Audio capture and output configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Input device to use. Options:
    /// - "default" for system default device
    /// - numeric index (0, 1, 2, etc.) from `voicenote list-devices`
    /// - device name from `voicenote list-devices`
    pub device: String,
    /// Spectrum refresh rate while recording
    pub spectrum_fps: u32,
    /// Audio per encoded chunk in milliseconds (0 encodes everything at stop)
    pub timeslice_ms: u64,
    /// Output format string: "codec [ffmpeg_options]" (e.g., "libopus -b:a 24k"), or "wav"
    pub output_format: String,
    /// Directory for saved voice notes; defaults to the current directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: "default".to_string(),
            spectrum_fps: 60,
            timeslice_ms: 1000,
            output_format: "wav".to_string(),
            output_dir: None,
        }
    }
}

/// Spectrum analysis configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyserConfig {
    /// FFT window size, a power of two; the spectrum has half as many bins
    pub fft_size: usize,
    /// How much of the previous frame carries into the next (0.0-1.0)
    pub smoothing_time_constant: f32,
    /// Level shown as an empty bar, in dB
    pub min_decibels: f32,
    /// Level shown as a full bar, in dB
    pub max_decibels: f32,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        let defaults = AnalyserSettings::default();
        Self {
            fft_size: defaults.fft_size,
            smoothing_time_constant: defaults.smoothing_time_constant,
            min_decibels: defaults.min_decibels,
            max_decibels: defaults.max_decibels,
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoicenoteConfig {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub analyser: AnalyserConfig,
}

impl VoicenoteConfig {
    /// Loads configuration from the user's config directory.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    /// - If the config directory cannot be determined
    /// - If the config file cannot be read
    /// - If the TOML is malformed
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path()?)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config: VoicenoteConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Saves configuration to `path`, creating parent directories.
    ///
    /// # Errors
    /// - If the directory cannot be created
    /// - If the file cannot be written
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        tracing::info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Recorder tuning derived from this configuration.
    pub fn recorder_settings(&self) -> RecorderSettings {
        let fps = self.audio.spectrum_fps.max(1);
        RecorderSettings {
            analyser: AnalyserSettings {
                fft_size: self.analyser.fft_size,
                smoothing_time_constant: self.analyser.smoothing_time_constant,
                min_decibels: self.analyser.min_decibels,
                max_decibels: self.analyser.max_decibels,
            },
            sample_every: Duration::from_secs(1) / fps,
            timeslice: Duration::from_millis(self.audio.timeslice_ms),
        }
    }

    /// Directory new voice notes are written to.
    pub fn output_dir(&self) -> PathBuf {
        self.audio
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Path to the config file, `~/.config/voicenote/voicenote.toml`.
///
/// # Errors
/// - If the home directory cannot be determined
pub fn config_path() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
    Ok(home.join(".config").join("voicenote").join("voicenote.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = VoicenoteConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, VoicenoteConfig::default());
        assert_eq!(config.audio.device, "default");
        assert_eq!(config.analyser.fft_size, 256);
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voicenote.toml");
        fs::write(
            &path,
            "[audio]\ndevice = \"2\"\noutput_format = \"libopus -b:a 24k\"\n",
        )
        .unwrap();

        let config = VoicenoteConfig::load_from(&path).unwrap();
        assert_eq!(config.audio.device, "2");
        assert_eq!(config.audio.output_format, "libopus -b:a 24k");
        assert_eq!(config.audio.timeslice_ms, 1000);
        assert_eq!(config.analyser, AnalyserConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("voicenote.toml");
        let mut config = VoicenoteConfig::default();
        config.audio.output_dir = Some(PathBuf::from("/tmp/notes"));
        config.analyser.fft_size = 512;

        config.save_to(&path).unwrap();
        assert_eq!(VoicenoteConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voicenote.toml");
        fs::write(&path, "[audio\ndevice = ").unwrap();
        assert!(VoicenoteConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_recorder_settings_follow_config() {
        let mut config = VoicenoteConfig::default();
        config.audio.spectrum_fps = 50;
        config.audio.timeslice_ms = 250;

        let settings = config.recorder_settings();
        assert_eq!(settings.sample_every, Duration::from_millis(20));
        assert_eq!(settings.timeslice, Duration::from_millis(250));
        assert_eq!(settings.analyser, AnalyserSettings::default());
    }
}
