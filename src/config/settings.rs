//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//!
//! Several of the numeric values here (chunk flush lengths, the
//! character/word reveal split, the capture restart delay) are product-tuning
//! values, kept configurable rather than hardcoded at their use sites.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// VoicePreference
// ---------------------------------------------------------------------------

/// Selects which synthesis backend speaks responses.
///
/// `LocalEngine` is the sentinel for the on-device engine; any other choice
/// names a cloud voice (e.g. `"en-IN-Neural2-B"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VoicePreference {
    /// Use the local synthesis engine with automatic voice selection.
    LocalEngine,
    /// Use cloud synthesis with the named voice.
    CloudVoice(String),
}

impl VoicePreference {
    /// Returns `true` when cloud synthesis should be attempted.
    pub fn is_cloud(&self) -> bool {
        matches!(self, VoicePreference::CloudVoice(_))
    }

    /// Language code derived from the voice name (`"en-US"` fallback).
    pub fn language_code(&self) -> &str {
        match self {
            VoicePreference::CloudVoice(name) if name.starts_with("en-IN") => "en-IN",
            _ => "en-US",
        }
    }
}

impl Default for VoicePreference {
    fn default() -> Self {
        // High-quality Indian English voice; falls back to the local engine
        // automatically when cloud auth is unavailable.
        VoicePreference::CloudVoice("en-IN-Neural2-B".into())
    }
}

// ---------------------------------------------------------------------------
// TtsConfig
// ---------------------------------------------------------------------------

/// Settings for speech synthesis and playback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    /// Selected voice / backend.
    pub voice: VoicePreference,
    /// Speaking-rate multiplier applied by both backends (0.5 – 2.0).
    pub speaking_rate: f32,
    /// Speak responses live while they are still being revealed.
    pub live_speech: bool,
    /// Cloud synthesis endpoint.
    pub endpoint: String,
}

impl TtsConfig {
    /// Clamp and store a new speaking rate (slider range 0.5 – 2.0).
    pub fn set_speaking_rate(&mut self, rate: f32) {
        self.speaking_rate = rate.clamp(0.5, 2.0);
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            voice: VoicePreference::default(),
            speaking_rate: 0.9,
            live_speech: true,
            endpoint: "https://texttospeech.googleapis.com/v1/text:synthesize".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// CaptureConfig
// ---------------------------------------------------------------------------

/// Settings for the speech-capture state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Maximum automatic restarts after a no-speech timeout.
    pub max_retries: u32,
    /// Delay before an automatic restart attempt, in milliseconds.
    pub restart_delay_ms: u64,
    /// Recognition language passed to the engine.
    pub language: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            restart_delay_ms: 500,
            language: "en-US".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ChunkerConfig
// ---------------------------------------------------------------------------

/// Flush thresholds for the speech chunker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Character-paced mode: flush once this many characters are buffered.
    pub char_flush_len: usize,
    /// Word-paced mode: flush once this many words are buffered.
    pub word_flush_len: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            char_flush_len: 50,
            word_flush_len: 15,
        }
    }
}

// ---------------------------------------------------------------------------
// RevealConfig
// ---------------------------------------------------------------------------

/// Pacing parameters for the incremental reveal driver.
///
/// The delays mimic a natural typing cadence; they are UX policy, not a
/// correctness contract.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RevealConfig {
    /// Responses shorter than this are revealed character by character;
    /// longer ones word by word.
    pub char_mode_max_len: usize,
    /// Per-character delay band, milliseconds (min, max).
    pub char_delay_ms: (u64, u64),
    /// Extra pause after punctuation in character mode, milliseconds.
    pub char_punct_pause_ms: u64,
    /// Word mode: base delay is `min(word_len * 10, word_base_cap_ms)`.
    pub word_base_cap_ms: u64,
    /// Word mode: random jitter band added to the base delay (min, max).
    pub word_jitter_ms: (u64, u64),
    /// Extra pause after a sentence-ending word, milliseconds.
    pub sentence_pause_ms: u64,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            char_mode_max_len: 200,
            char_delay_ms: (15, 35),
            char_punct_pause_ms: 150,
            word_base_cap_ms: 80,
            word_jitter_ms: (20, 60),
            sentence_pause_ms: 200,
        }
    }
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// Settings for the response-generation API call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key — `None` until the user provides one.
    pub api_key: Option<String>,
    /// Base URL of the API endpoint.
    pub base_url: String,
    /// Model identifier appended to the URL path.
    pub model: String,
    /// Sampling temperature for plain Q&A.
    pub temperature: f32,
    /// Sampling temperature when a role-play preamble is active.
    pub roleplay_temperature: f32,
    /// Response token cap.
    pub max_output_tokens: u32,
    /// Maximum seconds to wait for a response before timing out.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com".into(),
            model: "gemini-1.5-flash".into(),
            temperature: 0.7,
            roleplay_temperature: 0.8,
            max_output_tokens: 1024,
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use interview_coach::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Response-generation settings.
    pub llm: LlmConfig,
    /// Synthesis / playback settings.
    pub tts: TtsConfig,
    /// Speech-capture settings.
    pub capture: CaptureConfig,
    /// Chunker flush thresholds.
    pub chunker: ChunkerConfig,
    /// Reveal pacing.
    pub reveal: RevealConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Verify that a default `AppConfig` can be serialised to TOML and
    /// deserialised back without any data loss.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.llm.base_url, loaded.llm.base_url);
        assert_eq!(original.llm.model, loaded.llm.model);
        assert_eq!(original.tts.voice, loaded.tts.voice);
        assert_eq!(original.tts.speaking_rate, loaded.tts.speaking_rate);
        assert_eq!(original.tts.live_speech, loaded.tts.live_speech);
        assert_eq!(original.capture.max_retries, loaded.capture.max_retries);
        assert_eq!(
            original.capture.restart_delay_ms,
            loaded.capture.restart_delay_ms
        );
        assert_eq!(original.chunker.char_flush_len, loaded.chunker.char_flush_len);
        assert_eq!(original.reveal.char_mode_max_len, loaded.reveal.char_mode_max_len);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        let default = AppConfig::default();

        assert_eq!(config.llm.model, default.llm.model);
        assert_eq!(config.tts.voice, default.tts.voice);
        assert_eq!(config.capture.max_retries, default.capture.max_retries);
    }

    /// Verify default values match the design.
    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.llm.model, "gemini-1.5-flash");
        assert!(cfg.llm.api_key.is_none());
        assert!(cfg.tts.voice.is_cloud());
        assert_eq!(cfg.tts.speaking_rate, 0.9);
        assert!(cfg.tts.live_speech);
        assert_eq!(cfg.capture.max_retries, 2);
        assert_eq!(cfg.capture.restart_delay_ms, 500);
        assert_eq!(cfg.chunker.char_flush_len, 50);
        assert_eq!(cfg.chunker.word_flush_len, 15);
        assert_eq!(cfg.reveal.char_mode_max_len, 200);
    }

    /// Verify that modified non-default values survive a round trip.
    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.llm.api_key = Some("key-test".into());
        cfg.llm.model = "gemini-1.5-pro".into();
        cfg.tts.voice = VoicePreference::LocalEngine;
        cfg.tts.set_speaking_rate(1.5);
        cfg.tts.live_speech = false;
        cfg.capture.max_retries = 3;

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.llm.api_key, Some("key-test".into()));
        assert_eq!(loaded.llm.model, "gemini-1.5-pro");
        assert_eq!(loaded.tts.voice, VoicePreference::LocalEngine);
        assert_eq!(loaded.tts.speaking_rate, 1.5);
        assert!(!loaded.tts.live_speech);
        assert_eq!(loaded.capture.max_retries, 3);
    }

    /// Speaking-rate setter clamps to the slider range.
    #[test]
    fn speaking_rate_is_clamped() {
        let mut cfg = TtsConfig::default();
        cfg.set_speaking_rate(5.0);
        assert_eq!(cfg.speaking_rate, 2.0);
        cfg.set_speaking_rate(0.1);
        assert_eq!(cfg.speaking_rate, 0.5);
        cfg.set_speaking_rate(1.25);
        assert_eq!(cfg.speaking_rate, 1.25);
    }

    /// Language code derivation for cloud voices.
    #[test]
    fn voice_language_code() {
        let indian = VoicePreference::CloudVoice("en-IN-Neural2-B".into());
        assert_eq!(indian.language_code(), "en-IN");

        let us = VoicePreference::CloudVoice("en-US-Wavenet-F".into());
        assert_eq!(us.language_code(), "en-US");

        assert_eq!(VoicePreference::LocalEngine.language_code(), "en-US");
    }
}
