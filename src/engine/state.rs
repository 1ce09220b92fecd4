//! Mutable session snapshot the engine owns and the UI renders.

use std::collections::VecDeque;

use crate::logging::{clock_stamp, log_event};
use crate::styles::{StyleDef, StyleSelection, VOICES};

/// Entries kept in the UI activity panel. Older entries fall off the front;
/// the durable transcript log keeps everything.
pub(super) const ACTIVITY_LOG_CAPACITY: usize = 20;

/// Exactly one of these holds at any instant; only the engine transitions
/// between them, and only playback produces `Playing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Sending,
    Playing,
    Error,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::Idle => "Idle",
            Status::Sending => "Sending",
            Status::Playing => "Playing",
            Status::Error => "Error",
        }
    }
}

/// Render-ready copy of the session state. The UI never sees the live state.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub status: Status,
    pub voice: String,
    pub voice_count: usize,
    pub streaming: bool,
    pub styles: Vec<(StyleDef, bool)>,
    pub activity: Vec<String>,
    pub quit_armed: bool,
}

/// Single-owner runtime state. Created once at startup from the persisted
/// config; mutated only through the engine.
pub(super) struct SessionState {
    pub(super) status: Status,
    pub(super) voice_index: usize,
    pub(super) streaming: bool,
    pub(super) styles: StyleSelection,
    pub(super) quit_armed: bool,
    activity: VecDeque<String>,
}

impl SessionState {
    pub(super) fn new(voice_index: usize, streaming: bool, styles: StyleSelection) -> Self {
        Self {
            status: Status::Idle,
            voice_index,
            streaming,
            styles,
            quit_armed: false,
            activity: VecDeque::with_capacity(ACTIVITY_LOG_CAPACITY),
        }
    }

    pub(super) fn voice(&self) -> &'static str {
        VOICES[self.voice_index % VOICES.len()]
    }

    pub(super) fn cycle_voice(&mut self) -> &'static str {
        self.voice_index = (self.voice_index + 1) % VOICES.len();
        self.voice()
    }

    /// Append a timestamped entry to the UI panel and mirror it to the
    /// durable transcript log. FIFO eviction past capacity.
    pub(super) fn push_activity(&mut self, message: &str) {
        log_event(message);
        self.activity.push_back(format!("[{}] {message}", clock_stamp()));
        while self.activity.len() > ACTIVITY_LOG_CAPACITY {
            self.activity.pop_front();
        }
    }

    pub(super) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            voice: self.voice().to_string(),
            voice_count: VOICES.len(),
            streaming: self.streaming,
            styles: self.styles.display_items(),
            activity: self.activity.iter().cloned().collect(),
            quit_armed: self.quit_armed,
        }
    }

    #[cfg(test)]
    pub(super) fn activity_entries(&self) -> Vec<String> {
        self.activity.iter().cloned().collect()
    }
}
