//! Shared application state.
//!
//! `SharedState` is an `Arc<Mutex<AppState>>` handed to both the
//! orchestrator and the UI layer.  Lock scope stays small: read or write a
//! few fields, drop the guard.

use std::sync::{Arc, Mutex};

use crate::config::AppConfig;
use crate::playback::PlaybackStatus;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Coarse pipeline phase shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Waiting for a question.
    #[default]
    Idle,
    /// Capturing speech from the microphone.
    Listening,
    /// Waiting for the generated answer.
    Thinking,
    /// The answer is being revealed (and possibly spoken).
    Revealing,
    /// Something went wrong; `error_message` has the details.
    Error,
}

impl Phase {
    /// Busy phases refuse a new question until they finish or are stopped.
    pub fn is_busy(self) -> bool {
        matches!(self, Phase::Listening | Phase::Thinking)
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Idle => "Ready",
            Phase::Listening => "Listening...",
            Phase::Thinking => "Thinking...",
            Phase::Revealing => "Answering",
            Phase::Error => "Error",
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Mutable application state behind the shared mutex.
#[derive(Debug)]
pub struct AppState {
    /// Current configuration (mutated by preference commands, persisted on
    /// change).
    pub config: AppConfig,
    /// Current pipeline phase.
    pub phase: Phase,
    /// Live transcript while listening: confirmed fragments so far.
    pub transcript: String,
    /// Latest interim hypothesis, replaced on every update.
    pub interim: Option<String>,
    /// Response text revealed so far.
    pub response_text: String,
    /// Playback status mirrored from the sequencer.
    pub playback: PlaybackStatus,
    /// Review cursor, 1-based (current, total); `(0, 0)` when empty.
    pub turn_position: (usize, usize),
    /// Set when `phase == Error`.
    pub error_message: Option<String>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            phase: Phase::Idle,
            transcript: String::new(),
            interim: None,
            response_text: String::new(),
            playback: PlaybackStatus::Stopped,
            turn_position: (0, 0),
            error_message: None,
        }
    }
}

/// Thread-safe shared application state.
pub type SharedState = Arc<Mutex<AppState>>;

/// Convenience constructor for `SharedState`.
pub fn new_shared_state(config: AppConfig) -> SharedState {
    Arc::new(Mutex::new(AppState::new(config)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
