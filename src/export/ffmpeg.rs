//! ffmpeg discovery and transcoding.
//!
//! The binary is looked up in the usual install locations before PATH, so it
//! is found even from launchers with a stripped environment.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

use super::OutputFormat;

/// Locates the ffmpeg binary.
///
/// Checks platform install locations (Homebrew, /usr, snap, Program Files),
/// then falls back to `which` / `where`.
pub fn find_ffmpeg() -> Result<PathBuf> {
    let candidates: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/opt/homebrew/bin/ffmpeg",
            "/usr/local/bin/ffmpeg",
            "/usr/bin/ffmpeg",
        ]
    } else if cfg!(target_os = "linux") {
        &[
            "/usr/bin/ffmpeg",
            "/usr/local/bin/ffmpeg",
            "/snap/bin/ffmpeg",
        ]
    } else if cfg!(target_os = "windows") {
        &[
            "C:\\ffmpeg\\bin\\ffmpeg.exe",
            "C:\\Program Files\\ffmpeg\\bin\\ffmpeg.exe",
            "C:\\Program Files (x86)\\ffmpeg\\bin\\ffmpeg.exe",
        ]
    } else {
        &[]
    };

    if let Some(path) = candidates.iter().map(PathBuf::from).find(|p| p.exists()) {
        tracing::debug!("Found ffmpeg at: {}", path.display());
        return Ok(path);
    }

    let path = find_in_path("ffmpeg")?;
    tracing::debug!("Found ffmpeg in PATH at: {}", path.display());
    Ok(path)
}

fn find_in_path(binary_name: &str) -> Result<PathBuf> {
    let search_cmd = if cfg!(target_os = "windows") {
        "where"
    } else {
        "which"
    };

    let output = Command::new(search_cmd)
        .arg(binary_name)
        .output()
        .map_err(|e| anyhow!("Failed to search PATH for {binary_name}: {e}"))?;

    if output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        if let Some(first) = stdout.lines().next().map(str::trim) {
            if !first.is_empty() {
                return Ok(PathBuf::from(first));
            }
        }
    }

    Err(anyhow!(
        "{binary_name} not found. Please install ffmpeg:\n\
         macOS: brew install ffmpeg\n\
         Linux: apt install ffmpeg (Debian/Ubuntu) or dnf install ffmpeg (Fedora)\n\
         Windows: Download from https://ffmpeg.org/download.html"
    ))
}

/// Arguments passed to ffmpeg for one conversion. Output is always mono.
pub(crate) fn transcode_args(input: &Path, output: &Path, format: &OutputFormat) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        input.display().to_string(),
        "-acodec".into(),
        format.codec.clone(),
        "-ac".into(),
        "1".into(),
        "-y".into(),
    ];
    args.extend(format.options.iter().cloned());
    args.push(output.display().to_string());
    args
}

/// Converts `input` (WAV) into `output` using `format`.
///
/// # Errors
/// - If ffmpeg cannot be found or started
/// - If ffmpeg exits unsuccessfully
pub fn transcode(input: &Path, output: &Path, format: &OutputFormat) -> Result<()> {
    let ffmpeg = find_ffmpeg()?;
    let result = Command::new(&ffmpeg)
        .args(transcode_args(input, output, format))
        .output()
        .map_err(|e| anyhow!("Failed to run {}: {e}", ffmpeg.display()))?;

    if result.status.success() {
        tracing::debug!("Audio converted with codec {}", format.codec);
        Ok(())
    } else {
        let error_msg = String::from_utf8_lossy(&result.stderr);
        tracing::error!("ffmpeg conversion failed: {}", error_msg);
        Err(anyhow!("Audio encoding failed: {error_msg}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_reported() {
        let err = find_in_path("voicenote-no-such-binary").unwrap_err();
        assert!(err.to_string().contains("voicenote-no-such-binary"));
    }

    #[test]
    fn test_transcode_args_force_mono_and_append_options() {
        let format: OutputFormat = "libopus -b:a 24k".parse().unwrap();
        let args = transcode_args(Path::new("in.wav"), Path::new("out.ogg"), &format);
        assert_eq!(
            args,
            [
                "-loglevel", "error", "-i", "in.wav", "-acodec", "libopus", "-ac", "1", "-y",
                "-b:a", "24k", "out.ogg"
            ]
        );
    }
}
