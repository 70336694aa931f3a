//! Configuration file editor command.

use std::path::Path;
use std::process::Command;

use crate::config::{config_path, VoicenoteConfig};

/// Opens the config file in the user's editor, writing defaults first if it
/// does not exist.
///
/// Editors are tried in order: `$EDITOR`, nano, vi.
///
/// # Errors
/// - If the config file cannot be created
/// - If no editor can be found or executed
pub fn handle_config() -> anyhow::Result<()> {
    let config_path = config_path()?;
    ensure_config_file(&config_path)?;

    tracing::info!("Opening config file: {}", config_path.display());

    let editor = find_editor()?;
    tracing::debug!("Using editor: {}", editor);

    let status = Command::new(&editor)
        .arg(&config_path)
        .status()
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to open editor '{editor}': {e}. Make sure the editor is installed and accessible."
            )
        })?;

    if !status.success() {
        return Err(anyhow::anyhow!(
            "Editor exited with error code: {}",
            status.code().unwrap_or(-1)
        ));
    }

    // Catch typos now rather than at the next recording.
    if let Err(e) = VoicenoteConfig::load_from(&config_path) {
        eprintln!("Warning: {e}");
    }

    tracing::info!("Config file edited successfully");
    Ok(())
}

fn ensure_config_file(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        return Ok(());
    }
    tracing::info!("Creating default config at {}", path.display());
    VoicenoteConfig::default().save_to(path)
}

fn find_editor() -> anyhow::Result<String> {
    if let Ok(editor) = std::env::var("EDITOR") {
        if !editor.is_empty() {
            return Ok(editor);
        }
    }

    ["nano", "vi"]
        .into_iter()
        .find(|editor| is_editor_available(editor))
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("No editor found. Please set the $EDITOR environment variable."))
}

fn is_editor_available(editor: &str) -> bool {
    Command::new("which")
        .arg(editor)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voicenote").join("voicenote.toml");

        ensure_config_file(&path).unwrap();
        assert_eq!(
            VoicenoteConfig::load_from(&path).unwrap(),
            VoicenoteConfig::default()
        );

        std::fs::write(&path, "[audio]\ndevice = \"3\"\n").unwrap();
        ensure_config_file(&path).unwrap();
        assert_eq!(VoicenoteConfig::load_from(&path).unwrap().audio.device, "3");
    }
}
