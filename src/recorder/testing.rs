//! Scriptable microphone for recorder tests.

use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};

use super::device::{CaptureDevice, CaptureStream, FrameSender};
use super::error::RecorderError;

#[derive(Default)]
struct FakeState {
    deny: bool,
    opening: usize,
    opened: usize,
    closed: usize,
    current: usize,
    frames: Option<FrameSender>,
    gate: Option<std_mpsc::Receiver<()>>,
    events: Vec<String>,
}

/// Records every open/close and lets the test push frames into the live stream.
#[derive(Clone, Default)]
pub(crate) struct FakeMicrophone {
    state: Arc<Mutex<FakeState>>,
}

impl FakeMicrophone {
    pub const SAMPLE_RATE: u32 = 8000;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn denying() -> Self {
        let mic = Self::default();
        mic.set_deny(true);
        mic
    }

    pub fn set_deny(&self, deny: bool) {
        self.state.lock().unwrap().deny = deny;
    }

    /// Makes the next `open` block until the returned sender fires.
    pub fn hold_next_open(&self) -> std_mpsc::Sender<()> {
        let (tx, rx) = std_mpsc::channel();
        self.state.lock().unwrap().gate = Some(rx);
        tx
    }

    /// Pushes frames into the current stream. False if no stream is open or
    /// its queue is full.
    pub fn push(&self, frames: Vec<f32>) -> bool {
        let state = self.state.lock().unwrap();
        match &state.frames {
            Some(sender) => sender.try_send(frames).is_ok(),
            None => false,
        }
    }

    /// Calls to `open`, including ones still blocked or denied.
    pub fn open_attempts(&self) -> usize {
        self.state.lock().unwrap().opening
    }

    pub fn opened(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    pub fn closed(&self) -> usize {
        self.state.lock().unwrap().closed
    }

    /// Streams opened and not yet closed.
    pub fn live(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.opened - state.closed
    }

    pub fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }
}

impl CaptureDevice for FakeMicrophone {
    fn open(&self, frames: FrameSender) -> Result<Box<dyn CaptureStream>, RecorderError> {
        let gate = {
            let mut state = self.state.lock().unwrap();
            state.opening += 1;
            state.gate.take()
        };
        if let Some(gate) = gate {
            let _ = gate.recv();
        }

        let mut state = self.state.lock().unwrap();
        if state.deny {
            state.events.push("denied".to_string());
            return Err(RecorderError::Denied("permission refused".to_string()));
        }

        state.opened += 1;
        let id = state.opened;
        state.current = id;
        state.frames = Some(frames);
        state.events.push(format!("open {id}"));

        Ok(Box::new(FakeStream {
            id,
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }
}

struct FakeStream {
    id: usize,
    state: Arc<Mutex<FakeState>>,
    closed: bool,
}

impl CaptureStream for FakeStream {
    fn sample_rate(&self) -> u32 {
        FakeMicrophone::SAMPLE_RATE
    }

    fn close(&mut self) -> anyhow::Result<()> {
        if self.closed {
            return Err(anyhow::anyhow!("stream {} closed twice", self.id));
        }
        self.closed = true;

        let mut state = self.state.lock().unwrap();
        state.closed += 1;
        if state.current == self.id {
            state.frames = None;
        }
        state.events.push(format!("close {}", self.id));
        Ok(())
    }
}

/// A sine tone at `freq` Hz sampled at the fake microphone's rate.
pub(crate) fn tone(freq: f32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            0.5 * (2.0 * std::f32::consts::PI * freq * i as f32
                / FakeMicrophone::SAMPLE_RATE as f32)
                .sin()
        })
        .collect()
}
