//! Recognition engine seam.
//!
//! The capture session is written against [`RecognitionEngine`] so the
//! retry and transcript-assembly logic can be tested with a scripted
//! engine instead of a microphone.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Classified engine failures.  The class decides the retry policy:
/// `NoSpeech` and `Other` are retryable, `Aborted` is a clean stop, the
/// rest end the session immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// No speech detected before the engine's silence timeout.
    NoSpeech,
    /// Recognition was deliberately aborted.
    Aborted,
    /// Microphone permission denied.
    NotAllowed,
    /// Network-backed recognition lost connectivity.
    Network,
    /// The audio device failed or disappeared.
    AudioCapture,
    /// Anything the engine could not classify.
    Other,
}

impl EngineErrorKind {
    /// Whether an automatic restart may recover from this failure.
    pub fn is_retryable(self) -> bool {
        matches!(self, EngineErrorKind::NoSpeech | EngineErrorKind::Other)
    }

    pub fn describe(self) -> &'static str {
        match self {
            EngineErrorKind::NoSpeech => "no speech detected",
            EngineErrorKind::Aborted => "recognition aborted",
            EngineErrorKind::NotAllowed => "microphone permission denied",
            EngineErrorKind::Network => "network error during recognition",
            EngineErrorKind::AudioCapture => "audio capture failed",
            EngineErrorKind::Other => "recognition error",
        }
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("speech recognition is not available on this system")]
    NotSupported,

    #[error("a capture session is already active")]
    AlreadyActive,

    #[error("recognition engine error: {0}")]
    Engine(String),
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Events emitted by a running recognition engine.
///
/// Contract: after `Error`, the engine still emits `Ended` when the
/// underlying session shuts down; `Ended` is always the last event of a
/// session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// The engine is live and listening.
    Started,
    /// A provisional hypothesis; superseded by later events.
    Interim(String),
    /// A finalized transcript fragment.
    Final(String),
    /// A classified failure.
    Error(EngineErrorKind),
    /// The engine session ended.
    Ended,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A speech-recognition backend.
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    /// Start a recognition session; events flow on `events` until `Ended`.
    async fn start(
        &self,
        language: &str,
        events: mpsc::Sender<RecognitionEvent>,
    ) -> Result<(), CaptureError>;

    /// Stop gracefully: pending audio is finalized before `Ended`.
    async fn stop(&self);

    /// Abort immediately, discarding pending audio.
    async fn abort(&self);
}

/// Microphone permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    /// The platform will ask the user on first use.
    Prompt,
    Unknown,
}

/// Checks microphone permission without starting a session.
#[async_trait]
pub trait PermissionProbe: Send + Sync {
    async fn microphone(&self) -> PermissionState;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
