//! Voice-note recording.
//!
//! Runs the recorder behind the spectrum screen, then writes the kept clip to
//! disk and prints its path. Supports an external stop trigger via SIGUSR1.

use chrono::Local;
use crossterm::event::KeyCode;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::VoicenoteConfig;
use crate::export::{self, OutputFormat};
use crate::recorder::{CpalMicrophone, RecordedClip, Recorder, RecordingStatus};
use crate::ui::{ErrorScreen, RecordingCommand, RecordingScreen};

/// Key poll timeout, which is also the redraw period.
const FRAME: Duration = Duration::from_millis(16);

/// Records a voice note and saves it to `output` or a timestamped default path.
///
/// # Errors
/// - If the configuration cannot be loaded
/// - If the microphone cannot be opened and the user does not retry
/// - If the terminal cannot be driven
/// - If the clip cannot be written
pub async fn handle_record(output: Option<PathBuf>) -> anyhow::Result<()> {
    tracing::info!("=== voicenote recorder started ===");

    let config = match VoicenoteConfig::load() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Failed to load configuration: {err}");
            show_error(
                &format!(
                    "Configuration Error:\n\n{err}\n\nPlease check your ~/.config/voicenote/voicenote.toml file and try again."
                ),
                None,
            )?;
            return Err(anyhow::anyhow!("Configuration error: {err}"));
        }
    };
    let format: OutputFormat = config.audio.output_format.parse()?;

    tracing::info!(
        "Configuration loaded: device={}, output_format={}, fft_size={}",
        config.audio.device,
        config.audio.output_format,
        config.analyser.fft_size
    );

    let (clips_tx, mut clips_rx) = mpsc::unbounded_channel::<RecordedClip>();
    let recorder = Recorder::spawn(
        CpalMicrophone::new(config.audio.device.clone()),
        config.recorder_settings(),
        move |clip| {
            if clips_tx.send(clip).is_err() {
                tracing::warn!("Recording finished after the recorder screen closed");
            }
        },
    );

    if let Err(e) = start_with_retry(&recorder).await {
        recorder.shutdown().await;
        return Err(e);
    }

    let status = record_until_done(&recorder).await;
    let status = match status {
        Ok(status) => status,
        Err(e) => {
            recorder.cancel_recording();
            recorder.shutdown().await;
            return Err(e);
        }
    };

    let clip = clips_rx.try_recv().ok().filter(|clip| !clip.is_empty());
    recorder.shutdown().await;

    match clip {
        Some(clip) => {
            tracing::info!(
                "Saving {} ({} bytes, {}s)",
                clip.file_name(),
                clip.len(),
                clip.duration_seconds
            );
            let path = output_path(output, &config, &format, Local::now());
            export::save_clip(&clip, &path, &format)?;
            println!("{}", path.display());
        }
        None if status == RecordingStatus::Stopped => {
            eprintln!("Nothing was recorded.");
        }
        None => tracing::info!("Recording discarded"),
    }

    tracing::info!("=== voicenote recorder exited ===");
    Ok(())
}

/// Starts recording, offering a retry on the error screen when it fails.
async fn start_with_retry(recorder: &Recorder) -> anyhow::Result<()> {
    loop {
        let Err(e) = recorder.start_recording().await else {
            return Ok(());
        };
        tracing::error!("Failed to start recording: {}", e);

        let hint = e
            .is_retryable()
            .then_some("Press r to retry, any other key to quit.");
        let key = show_error(
            &format!("Recording Error:\n\n{e}\n\nPlease check your audio configuration."),
            hint,
        )?;
        if !(e.is_retryable() && key == KeyCode::Char('r')) {
            return Err(e.into());
        }
        tracing::info!("Retrying microphone");
    }
}

/// Drives the screen until the user or SIGUSR1 ends the recording.
///
/// Returns the terminal status once the recorder has released everything.
async fn record_until_done(recorder: &Recorder) -> anyhow::Result<RecordingStatus> {
    let stop_requested = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGUSR1, Arc::clone(&stop_requested))
        .map_err(|e| anyhow::anyhow!("Failed to register signal handler: {e}"))?;

    let mut screen = RecordingScreen::new()?;

    tracing::debug!("Entering recording loop");
    loop {
        if stop_requested.load(Ordering::Relaxed) {
            tracing::info!("Received SIGUSR1: stopping via external trigger");
            recorder.stop_recording();
            break;
        }

        if !recorder.is_recording() {
            tracing::warn!("Recording ended unexpectedly ({})", recorder.state().status);
            break;
        }
        screen.render(&recorder.state())?;

        match screen.handle_input(FRAME)? {
            RecordingCommand::Continue => {}
            RecordingCommand::TogglePause => {
                tracing::debug!(
                    "Toggling pause at {}s (paused={})",
                    recorder.elapsed_seconds(),
                    recorder.is_paused()
                );
                recorder.pause_resume();
            }
            RecordingCommand::Stop => {
                tracing::debug!("Stop requested at {}s", recorder.elapsed_seconds());
                recorder.stop_recording();
                break;
            }
            RecordingCommand::Cancel => {
                recorder.cancel_recording();
                break;
            }
        }
    }

    let mut state = recorder.subscribe();
    let finished = state
        .wait_for(|s| !s.is_recording())
        .await
        .map_err(|_| anyhow::anyhow!("Recorder stopped unexpectedly"))?
        .status;
    screen.cleanup()?;
    Ok(finished)
}

fn show_error(message: &str, hint: Option<&str>) -> anyhow::Result<KeyCode> {
    let mut error_screen = ErrorScreen::new()?;
    let key = error_screen.show_error(message, hint)?;
    error_screen.cleanup()?;
    Ok(key)
}

fn output_path(
    output: Option<PathBuf>,
    config: &VoicenoteConfig,
    format: &OutputFormat,
    now: chrono::DateTime<Local>,
) -> PathBuf {
    output.unwrap_or_else(|| export::default_clip_path(&config.output_dir(), format.extension(), now))
}
