//! The task that owns a recorder's session and resources.
//!
//! One loop multiplexes four sources: control commands, the elapsed-seconds
//! timer, the spectrum sampler and the input frame stream. Every update is
//! applied to the single `Session` record and then published on the watch
//! channel, so observers never see a half-applied transition.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot, watch};

use super::analyser::{AnalyserSettings, AnalysisGraph};
use super::clip::RecordedClip;
use super::device::{CaptureDevice, CaptureStream, FrameReceiver, FRAME_QUEUE_CAPACITY};
use super::encoder::{self, ChunkEncoder};
use super::error::RecorderError;
use super::resources::{next_frames, next_tick, SessionResources};
use super::session::{Completion, PauseChange, RecorderState, RecordingStatus, Session};

/// Consumer of finished recordings.
pub type CompletionHandler = Box<dyn FnMut(RecordedClip) + Send + 'static>;

/// Recorder tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderSettings {
    pub analyser: AnalyserSettings,
    /// Period of the spectrum sampler (one display refresh)
    pub sample_every: Duration,
    /// Audio duration per encoded chunk; zero means one chunk at stop
    pub timeslice: Duration,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            analyser: AnalyserSettings::default(),
            sample_every: Duration::from_millis(16),
            timeslice: Duration::from_millis(1000),
        }
    }
}

pub(crate) type StartReply = oneshot::Sender<Result<(), RecorderError>>;

pub(crate) enum Command {
    Start { reply: StartReply },
    Stop,
    Cancel,
    PauseResume,
    Shutdown,
}

/// How a microphone acquisition ended.
enum Acquisition {
    Acquired(Box<dyn CaptureStream>, FrameReceiver),
    Failed(RecorderError),
    /// Cancelled or stopped while the device was opening
    Abandoned,
    /// A newer start arrived while the device was opening
    Superseded(StartReply),
    ShutDown,
}

pub(crate) struct RecorderActor {
    device: Arc<dyn CaptureDevice>,
    settings: RecorderSettings,
    on_complete: CompletionHandler,
    commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<RecorderState>,
    session: Option<Session>,
    resources: SessionResources,
    sessions_started: u64,
}

impl RecorderActor {
    pub fn new(
        device: Arc<dyn CaptureDevice>,
        settings: RecorderSettings,
        on_complete: CompletionHandler,
        commands: mpsc::UnboundedReceiver<Command>,
        state: watch::Sender<RecorderState>,
    ) -> Self {
        Self {
            device,
            settings,
            on_complete,
            commands,
            state,
            session: None,
            resources: SessionResources::default(),
            sessions_started: 0,
        }
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else { break };
                    if self.handle(command).await.is_break() {
                        break;
                    }
                }
                _ = next_tick(&mut self.resources.ticker) => self.on_tick(),
                _ = next_tick(&mut self.resources.sampler) => self.on_sample(),
                frames = next_frames(&mut self.resources.frames) => self.on_frames(frames),
            }
        }

        self.teardown("recorder shut down");
        self.session = None;
        self.publish();
        tracing::debug!("Recorder task exited");
    }

    async fn handle(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Start { reply } => return self.start(reply).await,
            Command::Stop => self.stop(),
            Command::Cancel => self.cancel(),
            Command::PauseResume => self.pause_resume(),
            Command::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    async fn start(&mut self, mut reply: StartReply) -> ControlFlow<()> {
        loop {
            if self.session.as_ref().is_some_and(|s| s.state().is_recording()) {
                tracing::info!("Discarding active recording to start a new one");
            }
            self.teardown("superseded by a new recording");
            self.session = None;
            self.publish();

            match self.acquire().await {
                Acquisition::Acquired(stream, frames) => {
                    let result = self.open_session(stream, frames);
                    let _ = reply.send(result);
                    return ControlFlow::Continue(());
                }
                Acquisition::Failed(e) => {
                    tracing::error!("Failed to start recording: {}", e);
                    self.publish();
                    let _ = reply.send(Err(e));
                    return ControlFlow::Continue(());
                }
                Acquisition::Abandoned => {
                    tracing::info!("Recording cancelled while the microphone was opening");
                    let mut session = Session::new(self.settings.analyser.fft_size / 2);
                    session.cancel();
                    self.session = Some(session);
                    self.publish();
                    let _ = reply.send(Ok(()));
                    return ControlFlow::Continue(());
                }
                Acquisition::Superseded(next) => {
                    tracing::debug!("Start superseded while the microphone was opening");
                    let _ = reply.send(Ok(()));
                    reply = next;
                }
                Acquisition::ShutDown => {
                    let _ = reply.send(Err(RecorderError::Shutdown));
                    return ControlFlow::Break(());
                }
            }
        }
    }

    /// Opens the microphone off the executor while still servicing commands.
    async fn acquire(&mut self) -> Acquisition {
        let (frames_tx, frames_rx) = mpsc::channel(FRAME_QUEUE_CAPACITY);
        let device = Arc::clone(&self.device);
        let mut opening = tokio::task::spawn_blocking(move || device.open(frames_tx));

        let mut interrupted: Option<Acquisition> = None;
        let opened = loop {
            tokio::select! {
                joined = &mut opening => break joined,
                command = self.commands.recv(), if interrupted.is_none() => {
                    interrupted = match command {
                        Some(Command::Cancel) | Some(Command::Stop) => Some(Acquisition::Abandoned),
                        Some(Command::Start { reply }) => Some(Acquisition::Superseded(reply)),
                        Some(Command::PauseResume) => {
                            tracing::debug!("Ignoring pause while the microphone is opening");
                            None
                        }
                        Some(Command::Shutdown) | None => Some(Acquisition::ShutDown),
                    };
                }
            }
        };

        let opened = opened.unwrap_or_else(|e| {
            Err(RecorderError::Unavailable(format!(
                "microphone task failed: {e}"
            )))
        });

        match (opened, interrupted) {
            (Ok(mut stream), Some(interruption)) => {
                if let Err(e) = stream.close() {
                    tracing::warn!("Failed to close abandoned input stream: {}", e);
                }
                interruption
            }
            (Err(e), Some(interruption)) => {
                tracing::debug!("Abandoned acquisition also failed: {}", e);
                interruption
            }
            (Ok(stream), None) => Acquisition::Acquired(stream, frames_rx),
            (Err(e), None) => Acquisition::Failed(e),
        }
    }

    /// Builds the rest of the session around an acquired stream.
    fn open_session(
        &mut self,
        stream: Box<dyn CaptureStream>,
        frames: FrameReceiver,
    ) -> Result<(), RecorderError> {
        let sample_rate = stream.sample_rate();
        self.resources.stream = Some(stream);
        self.resources.frames = Some(frames);

        let graph = match AnalysisGraph::new(self.settings.analyser.clone()) {
            Ok(graph) => graph,
            Err(e) => {
                tracing::error!("Failed to start recording: {}", e);
                self.teardown("analysis graph unavailable");
                self.publish();
                return Err(e);
            }
        };
        let bins = graph.frequency_bin_count();

        self.resources.graph = Some(graph);
        self.resources.encoder = Some(ChunkEncoder::new(sample_rate, self.settings.timeslice));
        self.resources.start_timers(self.settings.sample_every);

        self.sessions_started += 1;
        self.session = Some(Session::new(bins));
        self.publish();

        tracing::info!(
            "Recording started (session {}, {}Hz)",
            self.sessions_started,
            sample_rate
        );
        Ok(())
    }

    fn stop(&mut self) {
        // Frames already captured belong to the recording being stopped.
        self.drain_frames();
        if self.session.as_mut().is_some_and(Session::stop) {
            self.finalize();
        } else {
            tracing::debug!("Stop ignored: no active recording");
        }
    }

    fn cancel(&mut self) {
        if self.session.as_mut().is_some_and(Session::cancel) {
            self.finalize();
        } else {
            tracing::debug!("Cancel with no active recording");
            self.teardown("cancel with no active recording");
        }
    }

    fn pause_resume(&mut self) {
        self.drain_frames();
        let Some(session) = self.session.as_mut() else {
            tracing::debug!("Pause ignored: no active recording");
            return;
        };

        match session.toggle_pause() {
            Some(PauseChange::Paused) => {
                self.resources.stop_timers();
                tracing::debug!("Recording paused at {}s", session.elapsed_seconds());
            }
            Some(PauseChange::Resumed) => {
                self.resources.start_timers(self.settings.sample_every);
                tracing::debug!("Recording resumed at {}s", session.elapsed_seconds());
            }
            None => {
                tracing::debug!("Pause ignored: recording is {}", session.status());
                return;
            }
        }
        self.publish();
    }

    /// Flushes the encoder, resolves the session and releases everything.
    fn finalize(&mut self) {
        // No tick or sample may land after the terminal transition.
        self.resources.stop_timers();

        let Some(session) = self.session.as_mut() else {
            return;
        };

        if let Some(encoder) = self.resources.encoder.as_mut() {
            if let Some(chunk) = encoder.finish() {
                session.append_chunk(chunk);
            }
        }

        let duration_seconds = session.elapsed_seconds();
        match session.status() {
            RecordingStatus::Cancelled => tracing::info!("Recording cancelled"),
            _ => tracing::info!("Recording stopped after {}s", duration_seconds),
        }
        let clip = match session.finish() {
            Some(Completion::Deliver(chunks)) => {
                self.resources.encoder.as_ref().and_then(|encoder| {
                    match encoder.assemble(&chunks) {
                        Ok(bytes) => Some(RecordedClip {
                            bytes,
                            mime_type: encoder::MIME_TYPE,
                            sample_rate: encoder.sample_rate(),
                            duration_seconds,
                        }),
                        Err(e) => {
                            tracing::error!("Failed to assemble recording: {}", e);
                            None
                        }
                    }
                })
            }
            Some(Completion::Empty) => {
                tracing::info!("Recording stopped with no audio captured");
                None
            }
            Some(Completion::Discarded) => {
                tracing::debug!("Cancelled recording discarded");
                None
            }
            None => None,
        };

        self.teardown("recording finished");

        if let Some(clip) = clip {
            tracing::info!(
                "Delivering recording: {} bytes, {}s",
                clip.len(),
                clip.duration_seconds
            );
            (self.on_complete)(clip);
        }
        self.publish();
    }

    fn on_tick(&mut self) {
        if self.session.as_mut().is_some_and(Session::tick) {
            self.publish();
        }
    }

    fn on_sample(&mut self) {
        let (Some(session), Some(graph)) = (self.session.as_mut(), self.resources.graph.as_mut())
        else {
            return;
        };
        if !session.is_capturing() {
            return;
        }
        if session.publish_spectrum(graph.byte_frequency_data()) {
            self.publish();
        }
    }

    /// Applies every frame batch already queued by the device.
    fn drain_frames(&mut self) {
        loop {
            let Some(receiver) = self.resources.frames.as_mut() else {
                return;
            };
            match receiver.try_recv() {
                Ok(frames) => self.on_frames(Some(frames)),
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    self.on_frames(None);
                    return;
                }
            }
        }
    }

    fn on_frames(&mut self, frames: Option<Vec<f32>>) {
        let Some(frames) = frames else {
            tracing::warn!("Input stream ended unexpectedly");
            self.resources.frames = None;
            return;
        };

        // The graph stays tapped while paused; only encoding stops.
        if let Some(graph) = self.resources.graph.as_mut() {
            graph.feed(&frames);
        }

        let (Some(session), Some(encoder)) =
            (self.session.as_mut(), self.resources.encoder.as_mut())
        else {
            return;
        };
        if !session.is_capturing() {
            return;
        }
        for chunk in encoder.encode(&frames) {
            session.append_chunk(chunk);
        }
    }

    fn teardown(&mut self, reason: &str) {
        if self.resources.is_empty() {
            return;
        }
        tracing::debug!("Releasing recording resources: {}", reason);
        self.resources.release();
    }

    fn publish(&self) {
        let state = match &self.session {
            Some(session) => session.state(),
            None => RecorderState::idle(self.settings.analyser.fft_size / 2),
        };
        self.state.send_replace(state);
    }
}
