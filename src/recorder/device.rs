//! Microphone access.
//!
//! The recorder talks to input hardware through `CaptureDevice`, which opens a
//! `CaptureStream` that pushes mono `f32` frames into a channel. The cpal
//! implementation captures from a named or default input device at its
//! native rate, downmixing multi-channel input by averaging.
//!
//! cpal streams are not `Send`, so each stream lives on its own capture
//! thread; the handle returned to the recorder only holds the means to stop
//! that thread.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use tokio::sync::mpsc;

use super::error::RecorderError;

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

/// Frame batches the device may queue ahead of the recorder.
pub const FRAME_QUEUE_CAPACITY: usize = 256;

/// Sending half of the input frame channel.
pub type FrameSender = mpsc::Sender<Vec<f32>>;
/// Receiving half of the input frame channel.
pub type FrameReceiver = mpsc::Receiver<Vec<f32>>;

/// Source of live input streams.
pub trait CaptureDevice: Send + Sync + 'static {
    /// Opens a stream delivering mono frames to `frames`.
    ///
    /// Blocks until the stream is live or has failed; the recorder calls this
    /// off the async executor.
    fn open(&self, frames: FrameSender) -> Result<Box<dyn CaptureStream>, RecorderError>;
}

/// A live input stream owned by one recording session.
pub trait CaptureStream: Send {
    /// Native sample rate of the delivered frames.
    fn sample_rate(&self) -> u32;

    /// Stops the stream and frees the device.
    fn close(&mut self) -> anyhow::Result<()>;
}

/// Description of an available input device.
#[derive(Debug, Clone)]
pub struct InputDeviceInfo {
    pub index: usize,
    pub name: String,
    pub is_default: bool,
    /// Native `(sample_rate, channels)`, if the device reports one
    pub config: Option<(u32, u16)>,
}

/// cpal-backed microphone.
///
/// `device` is "default", a numeric index from `list_input_devices`, or a
/// device name.
pub struct CpalMicrophone {
    device: String,
}

impl CpalMicrophone {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }
}

impl CaptureDevice for CpalMicrophone {
    fn open(&self, frames: FrameSender) -> Result<Box<dyn CaptureStream>, RecorderError> {
        let device_spec = self.device.clone();
        let (ready_tx, ready_rx) = std_mpsc::channel();
        let (shutdown_tx, shutdown_rx) = std_mpsc::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("voicenote-capture".to_string())
            .spawn(move || {
                let stream = match start_stream(&device_spec, frames) {
                    Ok((stream, sample_rate)) => {
                        if ready_tx.send(Ok(sample_rate)).is_err() {
                            return;
                        }
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Park until closed; a dropped handle also ends the wait.
                let _ = shutdown_rx.recv();
                drop(stream);
                tracing::debug!("Capture thread finished");
            })
            .map_err(|e| RecorderError::Unavailable(format!("failed to spawn capture thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(sample_rate)) => Ok(Box::new(CpalCapture {
                sample_rate,
                shutdown: Some(shutdown_tx),
                thread: Some(thread),
            })),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(RecorderError::Unavailable(
                    "capture thread exited before the stream started".to_string(),
                ))
            }
        }
    }
}

struct CpalCapture {
    sample_rate: u32,
    shutdown: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureStream for CpalCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn close(&mut self) -> anyhow::Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| anyhow::anyhow!("capture thread panicked"))?;
            tracing::debug!("Audio stream closed");
        }
        Ok(())
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Failed to close audio stream: {}", e);
        }
    }
}

/// Resolves the device, builds a stream for its native format and starts it.
fn start_stream(
    device_spec: &str,
    frames: FrameSender,
) -> Result<(cpal::Stream, u32), RecorderError> {
    let device = suppress_alsa_warnings(|| {
        let host = cpal::default_host();
        if device_spec == "default" {
            host.default_input_device()
                .ok_or_else(|| RecorderError::Unavailable("no default input device".to_string()))
        } else {
            find_device(&host, device_spec)
        }
    })?;

    let device_name = device
        .name()
        .unwrap_or_else(|_| "Unknown device".to_string());
    tracing::info!("Recording device: {}", device_name);

    let supported = device.default_input_config().map_err(|e| match e {
        cpal::DefaultStreamConfigError::DeviceNotAvailable => {
            RecorderError::Unavailable(format!("'{device_name}' disappeared"))
        }
        other => RecorderError::Denied(format!("'{device_name}' has no usable input config: {other}")),
    })?;

    let sample_rate = supported.sample_rate().0;
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    tracing::debug!(
        "Device configuration: {}Hz, {} channels, {:?}",
        sample_rate,
        config.channels,
        sample_format
    );

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_input::<f32>(&device, &config, frames),
        cpal::SampleFormat::I16 => build_input::<i16>(&device, &config, frames),
        cpal::SampleFormat::U16 => build_input::<u16>(&device, &config, frames),
        other => {
            return Err(RecorderError::Denied(format!(
                "unsupported sample format {other:?}"
            )))
        }
    }
    .map_err(|e| match e {
        cpal::BuildStreamError::DeviceNotAvailable => {
            RecorderError::Unavailable(format!("'{device_name}' disappeared"))
        }
        other => RecorderError::Denied(other.to_string()),
    })?;

    stream
        .play()
        .map_err(|e| RecorderError::Denied(format!("failed to start stream: {e}")))?;

    tracing::debug!("Audio stream started");
    Ok((stream, sample_rate))
}

fn build_input<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    frames: FrameSender,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + Send + 'static,
    f32: FromSample<T>,
{
    let channels = config.channels as usize;
    let mut dropped = 0u64;
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            forward_frames(&frames, downmix(data, channels), &mut dropped);
        },
        |err| {
            tracing::error!("Audio stream error: {}", err);
        },
        None,
    )
}

/// Queues a batch without blocking the audio callback.
///
/// A full queue drops the batch; drops are counted in `dropped` and logged
/// on the first one and every hundredth after. Returns whether the batch was
/// queued.
pub(crate) fn forward_frames(frames: &FrameSender, batch: Vec<f32>, dropped: &mut u64) -> bool {
    match frames.try_send(batch) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            *dropped += 1;
            if *dropped == 1 || dropped.is_multiple_of(100) {
                tracing::warn!("Recorder is behind; dropped {} input batches", dropped);
            }
            false
        }
        // The receiver is gone once the session is torn down.
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

/// Converts interleaved samples to mono `f32` by averaging channels.
pub(crate) fn downmix<T>(data: &[T], channels: usize) -> Vec<f32>
where
    T: Sample,
    f32: FromSample<T>,
{
    match channels {
        0 | 1 => data.iter().map(|&s| f32::from_sample(s)).collect(),
        n => data
            .chunks_exact(n)
            .map(|frame| frame.iter().map(|&s| f32::from_sample(s)).sum::<f32>() / n as f32)
            .collect(),
    }
}

/// Enumerates input devices with their native configuration.
///
/// # Errors
/// - If the audio host cannot enumerate devices
pub fn list_input_devices() -> anyhow::Result<Vec<InputDeviceInfo>> {
    let (default_name, devices) = suppress_alsa_warnings(|| {
        let host = cpal::default_host();
        let default_name = host.default_input_device().and_then(|d| d.name().ok());
        let devices: Vec<cpal::Device> = host
            .input_devices()
            .map_err(|e| anyhow::anyhow!("Failed to enumerate audio devices: {e}"))?
            .collect();
        Ok::<_, anyhow::Error>((default_name, devices))
    })?;

    Ok(devices
        .iter()
        .enumerate()
        .filter_map(|(index, device)| {
            let name = device.name().ok()?;
            let config = device
                .default_input_config()
                .ok()
                .map(|c| (c.sample_rate().0, c.channels()));
            Some(InputDeviceInfo {
                index,
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
                config,
            })
        })
        .collect())
}

/// Finds an input device by numeric index or exact name.
fn find_device(host: &cpal::Host, device_spec: &str) -> Result<cpal::Device, RecorderError> {
    let devices: Vec<cpal::Device> = host
        .input_devices()
        .map_err(|e| RecorderError::Unavailable(format!("failed to enumerate devices: {e}")))?
        .collect();

    if let Ok(index) = device_spec.parse::<usize>() {
        let count = devices.len();
        return devices.into_iter().nth(index).ok_or_else(|| {
            RecorderError::Unavailable(format!(
                "device index {index} is out of range (found {count} devices)"
            ))
        });
    }

    devices
        .into_iter()
        .find(|d| d.name().map(|n| n == device_spec).unwrap_or(false))
        .ok_or_else(|| {
            RecorderError::Unavailable(format!(
                "input device '{device_spec}' not found. Use 'voicenote list-devices' to see available devices."
            ))
        })
}

/// Runs `f` with stderr pointed at /dev/null so ALSA probing noise does not
/// reach the terminal. Falls back to running `f` unsilenced if redirection
/// fails.
#[cfg(target_os = "linux")]
fn suppress_alsa_warnings<F, T>(f: F) -> T
where
    F: FnOnce() -> T,
{
    let Ok(dev_null) = OpenOptions::new().write(true).open("/dev/null") else {
        return f();
    };

    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved == -1 {
        return f();
    }
    if unsafe { libc::dup2(dev_null.as_raw_fd(), libc::STDERR_FILENO) } == -1 {
        unsafe { libc::close(saved) };
        return f();
    }

    let result = f();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }
    result
}

#[cfg(not(target_os = "linux"))]
fn suppress_alsa_warnings<F, T>(f: F) -> T
where
    F: FnOnce() -> T,
{
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_passes_through() {
        let mono = downmix(&[0.5f32, -0.25, 0.0], 1);
        assert_eq!(mono, vec![0.5, -0.25, 0.0]);
    }

    #[test]
    fn test_stereo_is_averaged() {
        let mono = downmix(&[0.5f32, 0.25, -1.0, 1.0], 2);
        assert_eq!(mono, vec![0.375, 0.0]);
    }

    #[test]
    fn test_integer_samples_are_normalized() {
        let mono = downmix(&[i16::MIN, 0i16], 1);
        assert_eq!(mono[0], -1.0);
        assert_eq!(mono[1], 0.0);
    }

    #[test]
    fn test_full_queue_drops_instead_of_growing() {
        let (tx, mut rx) = mpsc::channel(2);
        let mut dropped = 0;

        assert!(forward_frames(&tx, vec![0.1], &mut dropped));
        assert!(forward_frames(&tx, vec![0.2], &mut dropped));
        assert!(!forward_frames(&tx, vec![0.3], &mut dropped));
        assert_eq!(dropped, 1);

        assert_eq!(rx.try_recv().unwrap(), vec![0.1]);
        assert!(forward_frames(&tx, vec![0.4], &mut dropped));
        assert_eq!(rx.try_recv().unwrap(), vec![0.2]);
        assert_eq!(rx.try_recv().unwrap(), vec![0.4]);

        drop(rx);
        assert!(!forward_frames(&tx, vec![0.5], &mut dropped));
        assert_eq!(dropped, 1);
    }

    #[test]
    fn test_trailing_partial_frame_dropped() {
        let mono = downmix(&[0.1f32, 0.1, 0.1, 0.3, 0.3, 0.3, 0.9], 3);
        assert_eq!(mono.len(), 2);
    }
}
