//! Interview Coach — voice-driven interview practice.
//!
//! Capture an interviewer's question from the microphone (or typed input),
//! generate an answer in character as the candidate, then reveal the answer
//! incrementally on screen while speaking it aloud chunk by chunk.
//!
//! # Architecture
//!
//! ```text
//! capture::CaptureSession ──transcript──▶ llm::ResponseGenerator
//!                                             │ answer
//!                                             ▼
//!                                  reveal::RevealDriver
//!                                   │              │
//!                        display increments   tts::TextChunker
//!                                                  │ chunks
//!                                                  ▼
//!                     tts::FallbackSynthesizer (cloud ▸ local)
//!                                                  │ audio
//!                                                  ▼
//!                     playback::PlaybackSequencer ─▶ speakers
//! ```
//!
//! The [`pipeline::PipelineOrchestrator`] wires these together and reacts
//! to [`pipeline::UiCommand`]s; all cross-cutting seams (recognition
//! engine, generator, synthesizer, audio output) are traits so every stage
//! is testable without hardware or network access.

pub mod capture;
pub mod config;
pub mod llm;
pub mod pipeline;
pub mod playback;
pub mod reveal;
pub mod tts;
