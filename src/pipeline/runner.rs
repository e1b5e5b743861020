//! Pipeline orchestrator — drives the full question → answer → speech loop.
//!
//! [`PipelineOrchestrator`] owns the [`SharedState`] and responds to
//! [`UiCommand`]s received over a `tokio::sync::mpsc` channel.
//!
//! # Pipeline flow
//!
//! ```text
//! UiCommand::MicToggle
//!   └─▶ spawn CaptureSession                         [Listening]
//!         └─▶ Finished(transcript) → generate answer [Thinking]
//!               └─▶ reveal driver streams text       [Revealing]
//!                     ├─▶ display increments
//!                     └─▶ chunker → synthesize → decode → sequencer
//!
//! UiCommand::SendText(question) skips capture and enters at [Thinking].
//! ```
//!
//! A new question pre-empts whatever is still revealing or playing: the
//! reveal is cancelled and the sequencer's generation counter fences off
//! chunks synthesized for the old answer.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::capture::{CaptureCommand, CaptureSession, CaptureUpdate, RecognitionEngine};
use crate::config::VoicePreference;
use crate::llm::{ConversationLog, PromptBuilder, ResponseGenerator};
use crate::playback::{
    decode, AudioOutput, PlaybackEvent, PlaybackSequencer, PlaybackStatus,
};
use crate::reveal::{select_mode, RevealControl, RevealDriver, RevealUpdate};
use crate::tts::{
    chunk_text, clean_for_speech, AudioSource, CloudSynthesizer, FallbackSynthesizer,
    SpeechChunk, SpeechSynthesizer, SynthError,
};

use super::state::{Phase, SharedState};

// ---------------------------------------------------------------------------
// Commands and updates
// ---------------------------------------------------------------------------

/// Commands from the user interface.
#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    /// Start capturing a question, or finalize the capture in progress.
    MicToggle,
    /// Submit a typed question directly.
    SendText(String),
    /// Toggle pause on the current playback.
    PlayPause,
    /// Speak the answer under the review cursor from the beginning.
    Replay,
    /// Stop the reveal and all playback.
    Stop,
    /// Show the rest of the answer at once and fast-forward the chunk that
    /// is speaking.
    SkipToEnd,
    /// Change the speaking rate (clamped to 0.5 – 2.0).
    SetSpeed(f32),
    /// Change the synthesis voice / backend.
    SelectVoice(VoicePreference),
    /// Enable or disable speaking answers while they are revealed.
    SetLiveSpeech(bool),
    /// Move the review cursor to the previous turn.
    PrevTurn,
    /// Move the review cursor to the next turn.
    NextTurn,
    /// Discard the conversation and reset.
    Clear,
}

/// Updates pushed to the user interface.
#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    Phase(Phase),
    /// Live transcript preview while listening.
    Transcript(String),
    /// The question that is being answered.
    Question(String),
    /// Append this piece to the displayed answer.
    ResponseIncrement(String),
    /// The full answer is visible.
    ResponseDone,
    Playback(PlaybackStatus),
    /// The review cursor moved; show this turn.
    TurnShown {
        position: (usize, usize),
        question: String,
        answer: Option<String>,
    },
    Error(String),
}

/// Outcome of one chunk's synthesis task.
struct SynthResult {
    generation: u64,
    seq: u64,
    result: Result<AudioSource, SynthError>,
}

// ---------------------------------------------------------------------------
// PipelineOrchestrator
// ---------------------------------------------------------------------------

/// Drives the complete interview-practice pipeline.
///
/// Create with [`PipelineOrchestrator::new`], then call [`run`](Self::run)
/// inside a tokio task.
pub struct PipelineOrchestrator {
    state: SharedState,
    engine: Arc<dyn RecognitionEngine>,
    generator: Arc<dyn ResponseGenerator>,
    synth: Arc<FallbackSynthesizer>,
    cloud: Option<Arc<CloudSynthesizer>>,
    sequencer: PlaybackSequencer,
    prompt: PromptBuilder,
    conversation: ConversationLog,
    settings_path: PathBuf,
    ui: mpsc::Sender<UiUpdate>,

    capture_tx: mpsc::Sender<CaptureUpdate>,
    capture_rx: Option<mpsc::Receiver<CaptureUpdate>>,
    reveal_tx: mpsc::Sender<RevealUpdate>,
    reveal_rx: Option<mpsc::Receiver<RevealUpdate>>,
    chunk_tx: mpsc::Sender<SpeechChunk>,
    chunk_rx: Option<mpsc::Receiver<SpeechChunk>>,
    synth_tx: mpsc::Sender<SynthResult>,
    synth_rx: Option<mpsc::Receiver<SynthResult>>,
    playback_rx: Option<mpsc::Receiver<PlaybackEvent>>,

    /// Command channel of the capture session in progress.
    capture_cmd: Option<mpsc::Sender<CaptureCommand>>,
    /// Control flags of the reveal in progress.
    reveal_control: Option<Arc<RevealControl>>,
    /// Synthesis tasks spawned but not yet reported back.
    synth_inflight: usize,
}

impl PipelineOrchestrator {
    /// Create a new orchestrator.
    ///
    /// # Arguments
    ///
    /// * `state`         — shared application state (also read by the UI).
    /// * `engine`        — speech-recognition backend.
    /// * `generator`     — answer generator (e.g. `GeminiClient`).
    /// * `synth`         — synthesizer chain (cloud with local fallback).
    /// * `cloud`         — direct handle for runtime voice switching, when
    ///                     cloud synthesis is configured.
    /// * `output`        — audio output device.
    /// * `prompt`        — prompt builder preloaded with resume / job
    ///                     description.
    /// * `settings_path` — where preference changes are persisted.
    /// * `ui`            — update channel for the user interface.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: SharedState,
        engine: Arc<dyn RecognitionEngine>,
        generator: Arc<dyn ResponseGenerator>,
        synth: Arc<FallbackSynthesizer>,
        cloud: Option<Arc<CloudSynthesizer>>,
        output: Arc<dyn AudioOutput>,
        prompt: PromptBuilder,
        settings_path: PathBuf,
        ui: mpsc::Sender<UiUpdate>,
    ) -> Self {
        let (capture_tx, capture_rx) = mpsc::channel(64);
        let (reveal_tx, reveal_rx) = mpsc::channel(256);
        let (chunk_tx, chunk_rx) = mpsc::channel(64);
        let (synth_tx, synth_rx) = mpsc::channel(64);
        let (playback_tx, playback_rx) = mpsc::channel(64);

        Self {
            state,
            engine,
            generator,
            synth,
            cloud,
            sequencer: PlaybackSequencer::new(output, playback_tx),
            prompt,
            conversation: ConversationLog::new(),
            settings_path,
            ui,
            capture_tx,
            capture_rx: Some(capture_rx),
            reveal_tx,
            reveal_rx: Some(reveal_rx),
            chunk_tx,
            chunk_rx: Some(chunk_rx),
            synth_tx,
            synth_rx: Some(synth_rx),
            playback_rx: Some(playback_rx),
            capture_cmd: None,
            reveal_control: None,
            synth_inflight: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run the orchestrator until `commands` is closed and all in-flight
    /// work (capture, reveal, synthesis, playback) has drained.
    pub async fn run(mut self, mut commands: mpsc::Receiver<UiCommand>) {
        let mut capture_rx = self.capture_rx.take().expect("run called once");
        let mut reveal_rx = self.reveal_rx.take().expect("run called once");
        let mut chunk_rx = self.chunk_rx.take().expect("run called once");
        let mut synth_rx = self.synth_rx.take().expect("run called once");
        let mut playback_rx = self.playback_rx.take().expect("run called once");

        let mut commands_open = true;

        loop {
            if !commands_open && self.is_quiescent() {
                break;
            }

            tokio::select! {
                cmd = commands.recv(), if commands_open => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => commands_open = false,
                },
                Some(update) = capture_rx.recv() => {
                    self.handle_capture_update(update).await;
                }
                Some(update) = reveal_rx.recv() => {
                    self.handle_reveal_update(update).await;
                }
                Some(chunk) = chunk_rx.recv() => {
                    self.handle_chunk(chunk);
                }
                Some(result) = synth_rx.recv() => {
                    self.handle_synth_result(result).await;
                }
                Some(event) = playback_rx.recv() => {
                    self.sequencer.handle_event(event).await;
                    self.sync_playback_status().await;
                }
            }
        }

        log::info!("pipeline: command channel closed, orchestrator shutting down");
    }

    fn is_quiescent(&self) -> bool {
        self.capture_cmd.is_none()
            && self.reveal_control.is_none()
            && self.synth_inflight == 0
            && self.sequencer.status() == PlaybackStatus::Stopped
    }

    // -----------------------------------------------------------------------
    // Command handling
    // -----------------------------------------------------------------------

    async fn handle_command(&mut self, cmd: UiCommand) {
        match cmd {
            UiCommand::MicToggle => self.toggle_mic().await,
            UiCommand::SendText(text) => {
                let text = text.trim().to_string();
                if !text.is_empty() {
                    self.answer_question(text).await;
                }
            }
            UiCommand::PlayPause => match self.sequencer.status() {
                PlaybackStatus::Playing => {
                    self.sequencer.pause();
                    self.sync_playback_status().await;
                }
                PlaybackStatus::Paused => {
                    self.sequencer.resume().await;
                    self.sync_playback_status().await;
                }
                PlaybackStatus::Stopped => self.replay_current_turn().await,
            },
            UiCommand::Replay => self.replay_current_turn().await,
            UiCommand::Stop => {
                self.stop_response();
                self.set_phase(Phase::Idle).await;
                self.sync_playback_status().await;
            }
            UiCommand::SkipToEnd => {
                if let Some(control) = &self.reveal_control {
                    control.skip_to_end();
                }
                self.sequencer.skip_to_end();
                self.sync_playback_status().await;
            }
            UiCommand::SetSpeed(rate) => {
                {
                    let mut st = self.state.lock().unwrap();
                    st.config.tts.set_speaking_rate(rate);
                }
                self.save_settings();
            }
            UiCommand::SelectVoice(voice) => self.select_voice(voice),
            UiCommand::SetLiveSpeech(enabled) => {
                {
                    let mut st = self.state.lock().unwrap();
                    st.config.tts.live_speech = enabled;
                }
                self.save_settings();
            }
            UiCommand::PrevTurn => {
                self.conversation.prev();
                self.show_current_turn().await;
            }
            UiCommand::NextTurn => {
                self.conversation.next();
                self.show_current_turn().await;
            }
            UiCommand::Clear => {
                self.stop_response();
                self.conversation.clear();
                {
                    let mut st = self.state.lock().unwrap();
                    st.transcript.clear();
                    st.interim = None;
                    st.response_text.clear();
                    st.turn_position = (0, 0);
                    st.error_message = None;
                }
                self.set_phase(Phase::Idle).await;
            }
        }
    }

    async fn toggle_mic(&mut self) {
        if let Some(cmd) = &self.capture_cmd {
            log::debug!("pipeline: MicToggle → finalizing capture");
            let _ = cmd.send(CaptureCommand::Stop).await;
            return;
        }

        log::debug!("pipeline: MicToggle → starting capture");
        self.stop_response();
        {
            let mut st = self.state.lock().unwrap();
            st.transcript.clear();
            st.interim = None;
            st.error_message = None;
        }

        let capture_config = {
            let st = self.state.lock().unwrap();
            st.config.capture.clone()
        };
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let session = CaptureSession::new(Arc::clone(&self.engine), capture_config);
        let updates = self.capture_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = session.run(cmd_rx, updates).await {
                log::error!("capture session failed to start: {e}");
            }
        });

        self.capture_cmd = Some(cmd_tx);
        self.set_phase(Phase::Listening).await;
    }

    fn select_voice(&mut self, voice: VoicePreference) {
        match &voice {
            VoicePreference::CloudVoice(name) => {
                if let Some(cloud) = &self.cloud {
                    cloud.set_voice(name.clone(), voice.language_code().to_string());
                    self.synth.set_cloud_enabled(true);
                } else {
                    log::warn!("cloud voice selected but cloud synthesis is not configured");
                }
            }
            VoicePreference::LocalEngine => {
                self.synth.set_cloud_enabled(false);
            }
        }
        {
            let mut st = self.state.lock().unwrap();
            st.config.tts.voice = voice;
        }
        self.save_settings();
    }

    // -----------------------------------------------------------------------
    // Capture updates
    // -----------------------------------------------------------------------

    async fn handle_capture_update(&mut self, update: CaptureUpdate) {
        match update {
            CaptureUpdate::Listening => {
                self.set_phase(Phase::Listening).await;
            }
            CaptureUpdate::Interim(text) => {
                let preview = {
                    let mut st = self.state.lock().unwrap();
                    st.interim = Some(text);
                    transcript_preview(&st.transcript, st.interim.as_deref())
                };
                let _ = self.ui.send(UiUpdate::Transcript(preview)).await;
            }
            CaptureUpdate::Fragment(text) => {
                let preview = {
                    let mut st = self.state.lock().unwrap();
                    if !st.transcript.is_empty() {
                        st.transcript.push(' ');
                    }
                    st.transcript.push_str(&text);
                    st.interim = None;
                    transcript_preview(&st.transcript, None)
                };
                let _ = self.ui.send(UiUpdate::Transcript(preview)).await;
            }
            CaptureUpdate::Finished(transcript) => {
                self.capture_cmd = None;
                {
                    let mut st = self.state.lock().unwrap();
                    st.interim = None;
                }
                let question = transcript.trim().to_string();
                if question.is_empty() {
                    log::info!("capture ended without usable speech");
                    self.set_phase(Phase::Idle).await;
                } else {
                    self.answer_question(question).await;
                }
            }
            CaptureUpdate::Failed(kind) => {
                self.capture_cmd = None;
                self.set_error(kind.describe().to_string()).await;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Question → answer → reveal
    // -----------------------------------------------------------------------

    async fn answer_question(&mut self, question: String) {
        // A new question supersedes whatever is still revealing or playing.
        self.stop_response();

        self.conversation.push_question(question.clone());
        self.sync_turn_position();
        let _ = self.ui.send(UiUpdate::Question(question.clone())).await;
        self.set_phase(Phase::Thinking).await;

        // History excludes the turn just pushed (its answer is pending).
        let history = self.conversation.history();
        let prompt = self.prompt.build(&question);
        let roleplay = self.prompt.is_roleplay();

        match self.generator.generate(&prompt, &history, roleplay).await {
            Ok(answer) => {
                log::debug!("pipeline: generated {} chars", answer.len());
                self.conversation.complete_answer(answer.clone());
                self.start_reveal(answer).await;
            }
            Err(e) => {
                // The turn stays unanswered; show an explanatory assistant
                // message in its place, without speaking it.
                self.set_error(e.to_string()).await;
                let fallback = format!("Sorry, I could not generate an answer ({e}).");
                {
                    let mut st = self.state.lock().unwrap();
                    st.response_text = fallback.clone();
                }
                let _ = self.ui.send(UiUpdate::ResponseIncrement(fallback)).await;
                let _ = self.ui.send(UiUpdate::ResponseDone).await;
            }
        }
    }

    async fn start_reveal(&mut self, answer: String) {
        {
            let mut st = self.state.lock().unwrap();
            st.response_text.clear();
        }
        self.set_phase(Phase::Revealing).await;

        let (reveal_config, chunker_config, live_speech) = {
            let st = self.state.lock().unwrap();
            (st.config.reveal, st.config.chunker, st.config.tts.live_speech)
        };

        let control = Arc::new(RevealControl::default());
        self.reveal_control = Some(Arc::clone(&control));

        let driver = RevealDriver::new(reveal_config, chunker_config);
        let ui_tx = self.reveal_tx.clone();
        let chunk_tx = self.chunk_tx.clone();
        tokio::spawn(async move {
            driver
                .run(&answer, live_speech, control, ui_tx, chunk_tx)
                .await;
        });
    }

    async fn handle_reveal_update(&mut self, update: RevealUpdate) {
        match update {
            RevealUpdate::Increment(piece) => {
                {
                    let mut st = self.state.lock().unwrap();
                    st.response_text.push_str(&piece);
                }
                let _ = self.ui.send(UiUpdate::ResponseIncrement(piece)).await;
            }
            RevealUpdate::Done => {
                self.reveal_control = None;
                let _ = self.ui.send(UiUpdate::ResponseDone).await;
                let in_error = {
                    let st = self.state.lock().unwrap();
                    st.phase == Phase::Error
                };
                if !in_error {
                    self.set_phase(Phase::Idle).await;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Synthesis and playback
    // -----------------------------------------------------------------------

    /// Spawn synthesis for one chunk; the result comes back through the
    /// `synth_rx` channel stamped with the current playback generation.
    fn handle_chunk(&mut self, chunk: SpeechChunk) {
        let generation = self.sequencer.generation();
        let speaking_rate = {
            let st = self.state.lock().unwrap();
            st.config.tts.speaking_rate
        };
        let synth = Arc::clone(&self.synth);
        let tx = self.synth_tx.clone();
        self.synth_inflight += 1;

        tokio::spawn(async move {
            let text = clean_for_speech(&chunk.text);
            let result = if text.is_empty() {
                Err(SynthError::Synthesis("nothing speakable after cleanup".into()))
            } else {
                synth.synthesize(&text, speaking_rate).await
            };
            let _ = tx
                .send(SynthResult {
                    generation,
                    seq: chunk.seq,
                    result,
                })
                .await;
        });
    }

    async fn handle_synth_result(&mut self, result: SynthResult) {
        self.synth_inflight = self.synth_inflight.saturating_sub(1);

        match result.result {
            Ok(audio) => match decode(&audio) {
                Ok(decoded) => {
                    self.sequencer
                        .enqueue(result.generation, result.seq, decoded)
                        .await;
                }
                Err(e) => {
                    log::warn!("chunk {} failed to decode: {e}", result.seq);
                    self.sequencer
                        .mark_failed(result.generation, result.seq)
                        .await;
                }
            },
            Err(e) => {
                log::warn!("chunk {} failed to synthesize: {e}", result.seq);
                self.sequencer
                    .mark_failed(result.generation, result.seq)
                    .await;
            }
        }
        self.sync_playback_status().await;
    }

    async fn replay_current_turn(&mut self) {
        let Some(answer) = self
            .conversation
            .current()
            .and_then(|turn| turn.answer.clone())
        else {
            return;
        };

        log::debug!("pipeline: replaying current answer");
        self.stop_response();

        let (reveal_config, chunker_config) = {
            let st = self.state.lock().unwrap();
            (st.config.reveal, st.config.chunker)
        };
        let mode = select_mode(&answer, &reveal_config);
        for chunk in chunk_text(&answer, mode, chunker_config) {
            self.handle_chunk(chunk);
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Cancel the reveal and stop playback; in-flight synthesis for the old
    /// answer is fenced off by the sequencer's generation bump.
    fn stop_response(&mut self) {
        if let Some(control) = self.reveal_control.take() {
            control.cancel();
        }
        self.sequencer.stop();
        let mut st = self.state.lock().unwrap();
        st.playback = PlaybackStatus::Stopped;
    }

    async fn show_current_turn(&mut self) {
        self.sync_turn_position();
        let Some(turn) = self.conversation.current() else {
            return;
        };
        let update = UiUpdate::TurnShown {
            position: self.conversation.position(),
            question: turn.question.clone(),
            answer: turn.answer.clone(),
        };
        let _ = self.ui.send(update).await;
    }

    fn sync_turn_position(&mut self) {
        let mut st = self.state.lock().unwrap();
        st.turn_position = self.conversation.position();
    }

    async fn sync_playback_status(&mut self) {
        let status = self.sequencer.status();
        {
            let mut st = self.state.lock().unwrap();
            st.playback = status;
        }
        let _ = self.ui.send(UiUpdate::Playback(status)).await;
    }

    async fn set_phase(&mut self, phase: Phase) {
        {
            let mut st = self.state.lock().unwrap();
            st.phase = phase;
            if phase != Phase::Error {
                st.error_message = None;
            }
        }
        let _ = self.ui.send(UiUpdate::Phase(phase)).await;
    }

    async fn set_error(&mut self, message: String) {
        log::error!("pipeline error: {message}");
        {
            let mut st = self.state.lock().unwrap();
            st.phase = Phase::Error;
            st.error_message = Some(message.clone());
        }
        let _ = self.ui.send(UiUpdate::Phase(Phase::Error)).await;
        let _ = self.ui.send(UiUpdate::Error(message)).await;
    }

    fn save_settings(&self) {
        let config = {
            let st = self.state.lock().unwrap();
            st.config.clone()
        };
        if let Err(e) = config.save_to(&self.settings_path) {
            log::warn!("failed to persist settings: {e}");
        }
    }
}

fn transcript_preview(transcript: &str, interim: Option<&str>) -> String {
    match interim {
        Some(interim) if transcript.is_empty() => interim.to_string(),
        Some(interim) => format!("{transcript} {interim}"),
        None => transcript.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
