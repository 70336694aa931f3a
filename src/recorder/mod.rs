//! Voice-note recording.
//!
//! Provides microphone capture, incremental encoding, live spectrum analysis
//! and the pause/resume/stop/cancel lifecycle around them.

pub mod actor;
pub mod analyser;
pub mod clip;
pub mod device;
pub mod encoder;
pub mod error;
pub mod handle;
mod resources;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use actor::RecorderSettings;
pub use analyser::AnalyserSettings;
pub use clip::RecordedClip;
pub use device::{list_input_devices, CpalMicrophone};
pub use handle::Recorder;
pub use session::{RecorderState, RecordingStatus};
