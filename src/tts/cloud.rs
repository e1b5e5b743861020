//! Google Cloud Text-to-Speech backend.
//!
//! Posts to `text:synthesize` with a bearer token from [`TokenProvider`]
//! and decodes the base64 `audioContent` field into MP3 bytes.

use async_trait::async_trait;
use base64::Engine;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::TtsConfig;

use super::auth::TokenProvider;
use super::synth::{AudioSource, SpeechSynthesizer, SynthBackend, SynthError};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct SynthesizeRequest<'a> {
    input: TextInput<'a>,
    voice: VoiceSelection<'a>,
    #[serde(rename = "audioConfig")]
    audio_config: AudioConfig,
}

#[derive(Debug, Serialize)]
struct TextInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct VoiceSelection<'a> {
    #[serde(rename = "languageCode")]
    language_code: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct AudioConfig {
    #[serde(rename = "audioEncoding")]
    audio_encoding: &'static str,
    #[serde(rename = "speakingRate")]
    speaking_rate: f32,
}

#[derive(Debug, Deserialize)]
struct SynthesizeResponse {
    #[serde(rename = "audioContent")]
    audio_content: String,
}

// ---------------------------------------------------------------------------
// CloudSynthesizer
// ---------------------------------------------------------------------------

pub struct CloudSynthesizer {
    client: reqwest::Client,
    tokens: std::sync::Arc<TokenProvider>,
    endpoint: String,
    /// (voice name, language code); behind a lock so the user can switch
    /// voices while chunks are in flight.
    voice: std::sync::RwLock<(String, String)>,
}

impl CloudSynthesizer {
    pub fn new(
        client: reqwest::Client,
        tokens: std::sync::Arc<TokenProvider>,
        config: &TtsConfig,
    ) -> Self {
        let voice_name = match &config.voice {
            crate::config::VoicePreference::CloudVoice(name) => name.clone(),
            crate::config::VoicePreference::LocalEngine => String::new(),
        };
        let language_code = config.voice.language_code().to_string();

        Self {
            client,
            tokens,
            endpoint: config.endpoint.clone(),
            voice: std::sync::RwLock::new((voice_name, language_code)),
        }
    }

    /// Swap the active voice without rebuilding the client.
    pub fn set_voice(&self, name: String, language_code: String) {
        *self.voice.write().unwrap() = (name, language_code);
    }
}

#[async_trait]
impl SpeechSynthesizer for CloudSynthesizer {
    async fn synthesize(&self, text: &str, speaking_rate: f32) -> Result<AudioSource, SynthError> {
        let token = self
            .tokens
            .access_token()
            .await
            .map_err(|e| SynthError::Auth(e.to_string()))?;

        let (voice_name, language_code) = self.voice.read().unwrap().clone();
        let request = SynthesizeRequest {
            input: TextInput { text },
            voice: VoiceSelection {
                language_code: &language_code,
                name: &voice_name,
            },
            audio_config: AudioConfig {
                audio_encoding: "MP3",
                speaking_rate,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&token)
            .json(&request)
            .send()
            .await
            .map_err(|e| SynthError::Backend(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(SynthError::Auth(format!("{status}: {body}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SynthError::Synthesis(format!("{status}: {body}")));
        }

        let payload: SynthesizeResponse = response
            .json()
            .await
            .map_err(|e| SynthError::Synthesis(e.to_string()))?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&payload.audio_content)
            .map_err(|e| SynthError::Synthesis(format!("bad audioContent: {e}")))?;

        debug!("cloud synthesis returned {} MP3 bytes", bytes.len());
        Ok(AudioSource::Mp3(bytes))
    }

    fn backend(&self) -> SynthBackend {
        SynthBackend::Cloud
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
