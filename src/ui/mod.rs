//! Terminal screens.

pub mod error;
pub mod recording;

pub use error::ErrorScreen;
pub use recording::{RecordingCommand, RecordingScreen};
