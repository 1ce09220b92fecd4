//! Session controller: owns the state machine, mediates between UI events,
//! the synthesis client, and the audio player.
//!
//! The engine enforces at-most-one in-flight synthesis/playback pair. Each
//! submission runs on a worker thread that reports progress over a channel;
//! the UI thread polls [`Engine::poll_job`] between input events, so the
//! engine stays the only writer of session state.

mod state;

pub use state::{SessionSnapshot, Status};

use state::SessionState;

use crate::config::{AppConfig, ConfigStore};
use crate::logging::log_user_text;
use crate::player::{Playback, StreamVoice};
use crate::styles::{StyleSelection, DEFAULT_STYLES, VOICES};
use crate::synth::{SpeechBackend, SpeechRequest, SynthError, STREAM_SAMPLE_RATE};

use std::env;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

const PROCESSING_PREVIEW_CHARS: usize = 50;

/// Discrete events the UI frontend forwards to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SubmitText(String),
    ToggleStyle(String),
    CycleVoice,
    ToggleStreaming,
    EnterApiKey(String),
    Quit,
}

/// Messages sent from the speech worker back to the controller.
#[derive(Debug, PartialEq, Eq)]
enum SpeechJobMessage {
    PlaybackStarted,
    FallbackEngaged { reason: String },
    Finished { fallback_used: bool },
    Failed { message: String },
}

/// Handle the controller uses to poll the worker thread.
struct SpeechJob {
    receiver: Receiver<SpeechJobMessage>,
    handle: Option<JoinHandle<()>>,
}

pub struct Engine {
    state: SessionState,
    store: ConfigStore,
    api_key: Option<String>,
    backend: Arc<dyn SpeechBackend>,
    player: Arc<dyn Playback>,
    job: Option<SpeechJob>,
    needs_redraw: bool,
}

impl Engine {
    /// Build the session from persisted configuration, merging in any styles
    /// the registry gained since the config was written.
    pub fn new(
        store: ConfigStore,
        backend: Arc<dyn SpeechBackend>,
        player: Arc<dyn Playback>,
    ) -> Self {
        let (mut cfg, warning) = store.load();
        cfg.merge_defaults(DEFAULT_STYLES);

        let voice_index = VOICES.iter().position(|v| *v == cfg.voice).unwrap_or(0);
        let styles = StyleSelection::from_config(&cfg.styles);

        let mut engine = Self {
            state: SessionState::new(voice_index, cfg.streaming, styles),
            store,
            api_key: cfg.api_key.clone(),
            backend,
            player,
            job: None,
            needs_redraw: true,
        };

        if let Some(warning) = warning {
            engine.state.push_activity(&warning);
        }
        if let Some(reason) = engine.player.describe_error() {
            engine
                .state
                .push_activity(&format!("Audio initialization failed: {reason}"));
        }
        // Write the merged document back so newly added styles are on disk.
        engine.persist();
        engine.state.push_activity("Session started");
        engine
    }

    /// React to one UI event. Returns true when the process should exit.
    pub fn handle_event(&mut self, event: SessionEvent) -> bool {
        // Any non-quit event disarms a pending quit confirmation, with no
        // other side effects.
        if event != SessionEvent::Quit && self.state.quit_armed {
            self.state.quit_armed = false;
            self.request_redraw();
        }

        match event {
            SessionEvent::SubmitText(text) => self.submit_text(&text),
            SessionEvent::ToggleStyle(name) => self.toggle_style(&name),
            SessionEvent::CycleVoice => self.cycle_voice(),
            SessionEvent::ToggleStreaming => self.toggle_streaming(),
            SessionEvent::EnterApiKey(key) => self.enter_api_key(&key),
            SessionEvent::Quit => return self.handle_quit(),
        }
        false
    }

    /// Check the worker channel without blocking the UI thread.
    pub fn poll_job(&mut self) {
        let Some(job) = self.job.as_mut() else { return };

        let mut messages = Vec::new();
        let mut disconnected = false;
        loop {
            match job.receiver.try_recv() {
                Ok(message) => messages.push(message),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        let mut finished = false;
        for message in messages {
            if self.apply_job_message(message) {
                finished = true;
            }
        }
        if disconnected && !finished {
            self.state.status = Status::Error;
            self.state.push_activity("Speech worker disconnected unexpectedly");
            finished = true;
        }

        if finished {
            // Join the worker once it signals completion to avoid lingering
            // handles.
            if let Some(mut job) = self.job.take() {
                if let Some(handle) = job.handle.take() {
                    let _ = handle.join();
                }
            }
            self.request_redraw();
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot()
    }

    pub fn has_active_job(&self) -> bool {
        self.job.is_some()
    }

    pub fn request_redraw(&mut self) {
        self.needs_redraw = true;
    }

    pub fn take_redraw_request(&mut self) -> bool {
        let requested = self.needs_redraw;
        self.needs_redraw = false;
        requested
    }

    fn submit_text(&mut self, text: &str) {
        let raw = text.trim();
        if raw.is_empty() {
            return;
        }
        if self.job.is_some() {
            self.state
                .push_activity("A request is already in flight; wait for it to finish");
            self.request_redraw();
            return;
        }
        let Some(api_key) = self.resolve_api_key() else {
            self.state.status = Status::Error;
            self.state.push_activity(
                "Error: no API credential. Set OPENAI_API_KEY or enter one with :key <value>",
            );
            self.request_redraw();
            return;
        };
        if !self.player.available() {
            self.state.status = Status::Error;
            let reason = self
                .player
                .describe_error()
                .unwrap_or_else(|| "no output device".to_string());
            self.state
                .push_activity(&format!("Error: audio playback not available ({reason})"));
            self.request_redraw();
            return;
        }

        log_user_text(raw);
        let preview: String = raw.chars().take(PROCESSING_PREVIEW_CHARS).collect();
        self.state.push_activity(&format!("Processing: {preview}..."));

        let request = SpeechRequest {
            text: format!("{}{raw}", self.state.styles.build_prefix()),
            voice: self.state.voice().to_string(),
            api_key,
        };
        tracing::info!(voice = %request.voice, streaming = self.state.streaming, "submission accepted");
        self.job = Some(start_speech_job(
            Arc::clone(&self.backend),
            Arc::clone(&self.player),
            request,
            self.state.streaming,
        ));
        self.state.status = Status::Sending;
        self.request_redraw();
    }

    fn apply_job_message(&mut self, message: SpeechJobMessage) -> bool {
        match message {
            SpeechJobMessage::PlaybackStarted => {
                self.state.status = Status::Playing;
                self.state.push_activity("Playing audio...");
                self.request_redraw();
                false
            }
            SpeechJobMessage::FallbackEngaged { reason } => {
                self.state
                    .push_activity(&format!("Streaming failed, falling back to buffered: {reason}"));
                self.request_redraw();
                false
            }
            SpeechJobMessage::Finished { fallback_used } => {
                self.state.status = Status::Idle;
                if fallback_used {
                    self.state.push_activity("Playback completed (buffered fallback)");
                } else {
                    self.state.push_activity("Playback completed");
                }
                true
            }
            SpeechJobMessage::Failed { message } => {
                self.state.status = Status::Error;
                self.state.push_activity(&format!("Error: {message}"));
                true
            }
        }
    }

    fn toggle_style(&mut self, name: &str) {
        let active = self.state.styles.toggle(name);
        let label = if active { "ON" } else { "OFF" };
        self.state.push_activity(&format!("{name} style toggled {label}"));
        self.persist();
        self.request_redraw();
    }

    fn cycle_voice(&mut self) {
        if self.job.is_some() {
            // The in-flight request keeps the voice it was issued with.
            self.state
                .push_activity("Voice change ignored while a request is in flight");
            self.request_redraw();
            return;
        }
        let voice = self.state.cycle_voice();
        self.state.push_activity(&format!("Voice changed to {voice}"));
        self.persist();
        self.request_redraw();
    }

    fn toggle_streaming(&mut self) {
        if self.job.is_some() {
            self.state
                .push_activity("Streaming toggle ignored while a request is in flight");
            self.request_redraw();
            return;
        }
        self.state.streaming = !self.state.streaming;
        let label = if self.state.streaming { "ON" } else { "OFF" };
        self.state.push_activity(&format!("Streaming mode toggled {label}"));
        self.persist();
        self.request_redraw();
    }

    fn enter_api_key(&mut self, key: &str) {
        let key = key.trim();
        if key.is_empty() {
            return;
        }
        self.api_key = Some(key.to_string());
        self.state.push_activity("API credential updated");
        self.persist();
        self.request_redraw();
    }

    fn handle_quit(&mut self) -> bool {
        if self.state.quit_armed {
            // Confirmed: silence the device before leaving. The worker, if
            // any, is abandoned; its late result is discarded with the
            // process.
            self.player.stop();
            self.state.push_activity("Session ended");
            return true;
        }
        self.state.quit_armed = true;
        if self.job.is_some() {
            self.state.push_activity(
                "Quit requested while an operation is in progress; quit again to confirm",
            );
        } else {
            self.state.push_activity("Quit again to confirm exit");
        }
        self.request_redraw();
        false
    }

    fn persist(&mut self) {
        let cfg = AppConfig {
            voice: self.state.voice().to_string(),
            streaming: self.state.streaming,
            api_key: self.api_key.clone(),
            styles: self.state.styles.to_config(),
        };
        if let Err(err) = self.store.save(&cfg) {
            self.state
                .push_activity(&format!("Warning: failed to save config: {err:#}"));
        }
    }

    /// Prompt-entered (persisted) credential wins, then the environment.
    fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| env::var("OPENAI_API_KEY").ok().filter(|key| !key.trim().is_empty()))
    }
}

/// Spawn the worker that synthesizes and plays one submission.
fn start_speech_job(
    backend: Arc<dyn SpeechBackend>,
    player: Arc<dyn Playback>,
    request: SpeechRequest,
    streaming: bool,
) -> SpeechJob {
    let (tx, rx) = mpsc::channel();
    let handle = thread::Builder::new()
        .name("speech-worker".into())
        .spawn(move || perform_speech(&*backend, &*player, &request, streaming, &tx))
        .expect("failed to spawn speech worker");
    SpeechJob {
        receiver: rx,
        handle: Some(handle),
    }
}

fn perform_speech(
    backend: &dyn SpeechBackend,
    player: &dyn Playback,
    request: &SpeechRequest,
    streaming: bool,
    tx: &Sender<SpeechJobMessage>,
) {
    if streaming {
        match run_streaming(backend, player, request, tx) {
            StreamOutcome::Completed => {
                let _ = tx.send(SpeechJobMessage::Finished { fallback_used: false });
            }
            StreamOutcome::FallbackEligible(err) => {
                let _ = tx.send(SpeechJobMessage::FallbackEngaged { reason: err.to_string() });
                // Exactly one buffered retry with identical text and voice.
                let message = match run_buffered(backend, player, request, tx) {
                    Ok(()) => SpeechJobMessage::Finished { fallback_used: true },
                    Err(message) => SpeechJobMessage::Failed { message },
                };
                let _ = tx.send(message);
            }
            StreamOutcome::Fatal(message) => {
                let _ = tx.send(SpeechJobMessage::Failed { message });
            }
        }
        return;
    }

    let message = match run_buffered(backend, player, request, tx) {
        Ok(()) => SpeechJobMessage::Finished { fallback_used: false },
        Err(message) => SpeechJobMessage::Failed { message },
    };
    let _ = tx.send(message);
}

enum StreamOutcome {
    Completed,
    /// Streaming failed before any audio chunk arrived; the buffered retry
    /// cannot duplicate audio.
    FallbackEligible(SynthError),
    /// Failure after partial audio (or a playback failure): report as-is,
    /// a retry would speak the text twice.
    Fatal(String),
}

fn run_streaming(
    backend: &dyn SpeechBackend,
    player: &dyn Playback,
    request: &SpeechRequest,
    tx: &Sender<SpeechJobMessage>,
) -> StreamOutcome {
    let mut stream = match backend.open_stream(request) {
        Ok(stream) => stream,
        Err(err) => return StreamOutcome::FallbackEligible(err),
    };

    let mut voice: Option<Box<dyn StreamVoice>> = None;
    loop {
        match stream.next_chunk() {
            Ok(Some(chunk)) => {
                if voice.is_none() {
                    match player.begin_stream(STREAM_SAMPLE_RATE) {
                        Ok(session) => {
                            let _ = tx.send(SpeechJobMessage::PlaybackStarted);
                            voice = Some(session);
                        }
                        Err(err) => return StreamOutcome::Fatal(err.to_string()),
                    }
                }
                if let Some(session) = voice.as_mut() {
                    if let Err(err) = session.push(&chunk) {
                        return StreamOutcome::Fatal(err.to_string());
                    }
                }
            }
            Ok(None) => break,
            Err(err) => {
                return match voice {
                    None => StreamOutcome::FallbackEligible(err),
                    Some(_) => StreamOutcome::Fatal(format!(
                        "streaming failed after playback began: {err}"
                    )),
                };
            }
        }
    }

    match voice {
        Some(session) => match session.finish() {
            Ok(()) => StreamOutcome::Completed,
            Err(err) => StreamOutcome::Fatal(err.to_string()),
        },
        // The service closed the stream without any audio; nothing to play.
        None => StreamOutcome::Completed,
    }
}

fn run_buffered(
    backend: &dyn SpeechBackend,
    player: &dyn Playback,
    request: &SpeechRequest,
    tx: &Sender<SpeechJobMessage>,
) -> Result<(), String> {
    let bytes = backend.synthesize(request).map_err(describe_synth_failure)?;
    let _ = tx.send(SpeechJobMessage::PlaybackStarted);
    player.play_buffer(bytes).map_err(|err| err.to_string())
}

/// Auth failures carry the in-session remediation; everything else is
/// reported verbatim.
fn describe_synth_failure(err: SynthError) -> String {
    match &err {
        SynthError::Auth(_) => format!("{err}. Enter a new key with :key <value>"),
        SynthError::Service { .. } => err.to_string(),
    }
}
