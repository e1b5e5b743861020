//! Speech-capture session state machine.
//!
//! Wraps a [`RecognitionEngine`] session with the retry policy and
//! transcript assembly the rest of the pipeline relies on:
//!
//! - finalized fragments are validated and accumulated; the joined
//!   transcript is delivered exactly once when the session finishes
//! - retryable engine failures restart the engine after a short delay, up
//!   to `max_retries` times per session
//! - permission, network and device failures end the session immediately
//! - an abort discards everything without delivering a transcript

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use crate::config::CaptureConfig;

use super::engine::{
    CaptureError, EngineErrorKind, PermissionProbe, PermissionState, RecognitionEngine,
    RecognitionEvent,
};

// ---------------------------------------------------------------------------
// Session I/O
// ---------------------------------------------------------------------------

/// Commands accepted by a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureCommand {
    /// Finalize pending audio and deliver the transcript.
    Stop,
    /// Tear down immediately; no transcript is delivered.
    Abort,
}

/// Progress reported by a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureUpdate {
    /// The engine is live; speech is being captured.
    Listening,
    /// Provisional text for live display.
    Interim(String),
    /// A validated final fragment, appended to the transcript.
    Fragment(String),
    /// The complete transcript, sent exactly once.  May be empty when the
    /// session ended without usable speech.
    Finished(String),
    /// The session ended on a non-retryable failure.
    Failed(EngineErrorKind),
}

/// Error class reported when the engine refuses to start at all.
fn start_error_kind(e: &CaptureError) -> EngineErrorKind {
    match e {
        CaptureError::PermissionDenied => EngineErrorKind::NotAllowed,
        _ => EngineErrorKind::AudioCapture,
    }
}

/// Drop fragments that carry no usable speech.  Engines occasionally
/// report the literal string "undefined" for an empty result.
fn validate_fragment(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("undefined") {
        return None;
    }
    Some(trimmed)
}

// ---------------------------------------------------------------------------
// CaptureSession
// ---------------------------------------------------------------------------

/// One microphone session from start to final transcript.
pub struct CaptureSession {
    engine: Arc<dyn RecognitionEngine>,
    probe: Option<Arc<dyn PermissionProbe>>,
    config: CaptureConfig,
}

impl CaptureSession {
    pub fn new(engine: Arc<dyn RecognitionEngine>, config: CaptureConfig) -> Self {
        Self {
            engine,
            probe: None,
            config,
        }
    }

    /// Check microphone permission through `probe` before starting the
    /// engine.  Without a probe the engine's own start failure is the only
    /// permission signal.
    pub fn with_probe(mut self, probe: Arc<dyn PermissionProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Run the session to completion.
    ///
    /// Consumes commands from `commands` and reports progress on `updates`.
    /// Returns once the engine has ended and the outcome (`Finished` or
    /// `Failed`) has been delivered; an abort returns silently.
    pub async fn run(
        self,
        mut commands: mpsc::Receiver<CaptureCommand>,
        updates: mpsc::Sender<CaptureUpdate>,
    ) -> Result<(), CaptureError> {
        if let Some(probe) = &self.probe {
            if probe.microphone().await == PermissionState::Denied {
                warn!("microphone permission denied, not starting the engine");
                let _ = updates
                    .send(CaptureUpdate::Failed(EngineErrorKind::NotAllowed))
                    .await;
                return Err(CaptureError::PermissionDenied);
            }
        }

        let (event_tx, mut event_rx) = mpsc::channel(32);

        if let Err(e) = self
            .engine
            .start(&self.config.language, event_tx.clone())
            .await
        {
            let _ = updates.send(CaptureUpdate::Failed(start_error_kind(&e))).await;
            return Err(e);
        }

        let mut fragments: Vec<String> = Vec::new();
        let mut retries = 0u32;
        let mut last_error: Option<EngineErrorKind> = None;
        let mut stop_requested = false;
        let mut aborted = false;
        let mut commands_open = true;

        loop {
            tokio::select! {
                cmd = commands.recv(), if commands_open => match cmd {
                    Some(CaptureCommand::Stop) => {
                        debug!("stop requested, finalizing capture");
                        stop_requested = true;
                        self.engine.stop().await;
                    }
                    Some(CaptureCommand::Abort) => {
                        debug!("abort requested, discarding capture");
                        stop_requested = true;
                        aborted = true;
                        self.engine.abort().await;
                    }
                    None => commands_open = false,
                },
                event = event_rx.recv() => match event {
                    Some(RecognitionEvent::Started) => {
                        let _ = updates.send(CaptureUpdate::Listening).await;
                    }
                    Some(RecognitionEvent::Interim(text)) => {
                        if let Some(text) = validate_fragment(&text) {
                            let _ = updates
                                .send(CaptureUpdate::Interim(text.to_string()))
                                .await;
                        }
                    }
                    Some(RecognitionEvent::Final(text)) => {
                        if let Some(text) = validate_fragment(&text) {
                            fragments.push(text.to_string());
                            let _ = updates
                                .send(CaptureUpdate::Fragment(text.to_string()))
                                .await;
                        }
                    }
                    Some(RecognitionEvent::Error(kind)) => {
                        last_error = Some(kind);
                    }
                    Some(RecognitionEvent::Ended) | None => {
                        // Restart-or-finish decision lives here so an Error
                        // followed by Ended triggers exactly one restart.
                        if stop_requested || last_error == Some(EngineErrorKind::Aborted) {
                            break;
                        }
                        if let Some(kind) = last_error {
                            if !kind.is_retryable() {
                                warn!("capture failed: {}", kind.describe());
                                let _ = updates.send(CaptureUpdate::Failed(kind)).await;
                                return Ok(());
                            }
                        }
                        // No-speech gets the full retry budget; a generic
                        // engine error is retried at most once.
                        let limit = match last_error {
                            Some(EngineErrorKind::Other) => self.config.max_retries.min(1),
                            _ => self.config.max_retries,
                        };
                        if retries >= limit {
                            if let Some(kind) = last_error {
                                if fragments.is_empty() {
                                    warn!(
                                        "giving up after {retries} restart attempts: {}",
                                        kind.describe()
                                    );
                                    let _ = updates.send(CaptureUpdate::Failed(kind)).await;
                                    return Ok(());
                                }
                            }
                            info!("giving up after {retries} restart attempts");
                            break;
                        }
                        retries += 1;
                        last_error = None;
                        debug!("restarting recognition (attempt {retries})");
                        sleep(Duration::from_millis(self.config.restart_delay_ms)).await;
                        if let Err(e) = self
                            .engine
                            .start(&self.config.language, event_tx.clone())
                            .await
                        {
                            let _ = updates
                                .send(CaptureUpdate::Failed(start_error_kind(&e)))
                                .await;
                            return Err(e);
                        }
                    }
                },
            }
        }

        if !aborted {
            let transcript = fragments.join(" ");
            info!("capture finished ({} chars)", transcript.len());
            let _ = updates.send(CaptureUpdate::Finished(transcript)).await;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
