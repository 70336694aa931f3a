//! Writing finished voice notes to disk.
//!
//! WAV clips are written as recorded. Any other output format goes through
//! ffmpeg via a temporary WAV file.

pub mod ffmpeg;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::recorder::RecordedClip;

/// Parsed `output_format` setting: `"codec [ffmpeg options]"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFormat {
    pub codec: String,
    pub options: Vec<String>,
}

impl OutputFormat {
    /// True when the clip can be written without transcoding.
    pub fn is_wav(&self) -> bool {
        self.options.is_empty() && matches!(self.codec.as_str(), "wav" | "pcm_s16le")
    }

    /// File extension for this format's container.
    pub fn extension(&self) -> &str {
        extension_for(&self.codec)
    }
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let codec = parts
            .next()
            .ok_or_else(|| anyhow!("Invalid output format: empty"))?;
        Ok(Self {
            codec: codec.to_string(),
            options: parts.map(str::to_string).collect(),
        })
    }
}

/// Maps an ffmpeg codec name to the usual file extension.
pub fn extension_for(codec: &str) -> &str {
    match codec {
        "wav" | "pcm_s16le" => "wav",
        "mp3" | "libmp3lame" => "mp3",
        "libopus" | "opus" | "libvorbis" | "vorbis" => "ogg",
        "aac" | "libfdk_aac" => "m4a",
        "flac" => "flac",
        other => other,
    }
}

/// `<dir>/voice-note-YYYYMMDD-HHMMSS.<ext>`
pub fn default_clip_path(dir: &Path, extension: &str, now: DateTime<Local>) -> PathBuf {
    dir.join(format!(
        "voice-note-{}.{}",
        now.format("%Y%m%d-%H%M%S"),
        extension
    ))
}

/// Writes `clip` to `path` in `format`.
///
/// # Errors
/// - If the output directory cannot be created
/// - If the file cannot be written
/// - If transcoding fails
pub fn save_clip(clip: &RecordedClip, path: &Path, format: &OutputFormat) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    if format.is_wav() {
        fs::write(path, &clip.bytes)?;
    } else {
        let temp_wav = std::env::temp_dir().join(format!("voicenote_{}.wav", std::process::id()));
        fs::write(&temp_wav, &clip.bytes)?;
        let result = ffmpeg::transcode(&temp_wav, path, format);
        if let Err(e) = fs::remove_file(&temp_wav) {
            tracing::debug!("Failed to remove temp file: {}", e);
        }
        result?;
    }

    let size = fs::metadata(path)?.len();
    tracing::info!(
        "Voice note saved: {} ({} bytes, {}s, format: {})",
        path.display(),
        size,
        clip.duration_seconds,
        format.codec
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn clip() -> RecordedClip {
        RecordedClip {
            bytes: b"RIFF fake wav".to_vec(),
            mime_type: "audio/wav",
            sample_rate: 16000,
            duration_seconds: 2,
        }
    }

    #[test]
    fn test_parse_output_format() {
        let format: OutputFormat = "mp3 -ab 16k -ar 12000".parse().unwrap();
        assert_eq!(format.codec, "mp3");
        assert_eq!(format.options, ["-ab", "16k", "-ar", "12000"]);
        assert_eq!(format.extension(), "mp3");
        assert!(!format.is_wav());

        assert!("wav".parse::<OutputFormat>().unwrap().is_wav());
        assert!("   ".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_extension_for_codecs() {
        assert_eq!(extension_for("libopus"), "ogg");
        assert_eq!(extension_for("pcm_s16le"), "wav");
        assert_eq!(extension_for("aac"), "m4a");
        assert_eq!(extension_for("alac"), "alac");
    }

    #[test]
    fn test_default_clip_path_is_timestamped() {
        let now = Local.with_ymd_and_hms(2026, 10, 16, 9, 5, 3).unwrap();
        let path = default_clip_path(Path::new("/notes"), "wav", now);
        assert_eq!(path, PathBuf::from("/notes/voice-note-20261016-090503.wav"));
    }

    #[test]
    fn test_wav_clip_written_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("note.wav");
        let format: OutputFormat = "wav".parse().unwrap();

        save_clip(&clip(), &path, &format).unwrap();
        assert_eq!(fs::read(&path).unwrap(), clip().bytes);
    }
}
