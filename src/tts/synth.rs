//! Synthesizer trait and the cloud-to-local fallback wrapper.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SynthError {
    /// Credentials are missing, expired or rejected.
    #[error("synthesis auth failed: {0}")]
    Auth(String),

    /// The backend accepted the request but could not produce audio.
    #[error("synthesis failed: {0}")]
    Synthesis(String),

    /// The backend itself is unavailable (binary missing, network down).
    #[error("synthesis backend unavailable: {0}")]
    Backend(String),
}

// ---------------------------------------------------------------------------
// AudioSource
// ---------------------------------------------------------------------------

/// Which synthesis backend produced a piece of audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthBackend {
    Cloud,
    Local,
}

/// Encoded audio returned by a synthesizer, tagged with its container
/// format so the decoder knows what to do with it.
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// MP3 bytes (cloud backend).
    Mp3(Vec<u8>),
    /// WAV bytes (local backend).
    Wav(Vec<u8>),
}

impl AudioSource {
    pub fn len(&self) -> usize {
        match self {
            AudioSource::Mp3(b) | AudioSource::Wav(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// SpeechSynthesizer trait
// ---------------------------------------------------------------------------

/// Turns a chunk of text into encoded audio.
///
/// Implementations: [`CloudSynthesizer`](super::CloudSynthesizer) (Google
/// Cloud TTS), [`LocalSynthesizer`](super::LocalSynthesizer) (eSpeak-NG),
/// and [`FallbackSynthesizer`] which chains the two.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` at `speaking_rate` (1.0 = normal speed).
    async fn synthesize(&self, text: &str, speaking_rate: f32) -> Result<AudioSource, SynthError>;

    /// Which backend this synthesizer represents.
    fn backend(&self) -> SynthBackend;
}

// ---------------------------------------------------------------------------
// FallbackSynthesizer
// ---------------------------------------------------------------------------

/// Tries cloud synthesis first and falls back to the local engine.
///
/// An auth or synthesis failure from the cloud disables it for the rest of
/// the session so every subsequent chunk goes straight to the local engine
/// instead of paying a failed round trip per chunk.
pub struct FallbackSynthesizer {
    cloud: Option<Arc<dyn SpeechSynthesizer>>,
    local: Arc<dyn SpeechSynthesizer>,
    cloud_disabled: AtomicBool,
}

impl FallbackSynthesizer {
    pub fn new(
        cloud: Option<Arc<dyn SpeechSynthesizer>>,
        local: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            cloud,
            local,
            cloud_disabled: AtomicBool::new(false),
        }
    }

    /// `true` when cloud synthesis is configured and has not failed yet.
    pub fn cloud_available(&self) -> bool {
        self.cloud.is_some() && !self.cloud_disabled.load(Ordering::Relaxed)
    }

    /// Force cloud on or off, e.g. when the user switches voice preference.
    /// Re-enabling clears the failure latch so cloud gets another try.
    pub fn set_cloud_enabled(&self, enabled: bool) {
        self.cloud_disabled.store(!enabled, Ordering::Relaxed);
    }
}

#[async_trait]
impl SpeechSynthesizer for FallbackSynthesizer {
    async fn synthesize(&self, text: &str, speaking_rate: f32) -> Result<AudioSource, SynthError> {
        if let Some(cloud) = &self.cloud {
            if !self.cloud_disabled.load(Ordering::Relaxed) {
                match cloud.synthesize(text, speaking_rate).await {
                    Ok(audio) => return Ok(audio),
                    Err(e) => {
                        warn!("cloud synthesis failed, switching to local engine: {e}");
                        self.cloud_disabled.store(true, Ordering::Relaxed);
                    }
                }
            }
        }

        let audio = self.local.synthesize(text, speaking_rate).await?;
        Ok(audio)
    }

    fn backend(&self) -> SynthBackend {
        if self.cloud_available() {
            SynthBackend::Cloud
        } else {
            SynthBackend::Local
        }
    }
}

/// Log which backend will speak first, once at startup.
pub fn log_backend_choice(synth: &FallbackSynthesizer) {
    match synth.backend() {
        SynthBackend::Cloud => info!("speech synthesis: cloud backend with local fallback"),
        SynthBackend::Local => info!("speech synthesis: local engine only"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    /// Scripted synthesizer: fails the first `fail_first` calls, then
    /// succeeds; counts every call it receives.
    struct MockSynth {
        backend: SynthBackend,
        fail_first: u32,
        calls: AtomicU32,
    }

    impl MockSynth {
        fn new(backend: SynthBackend, fail_first: u32) -> Arc<Self> {
            Arc::new(Self {
                backend,
                fail_first,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for MockSynth {
        async fn synthesize(
            &self,
            text: &str,
            _speaking_rate: f32,
        ) -> Result<AudioSource, SynthError> {
            let call = self.calls.fetch_add(1, Ordering::Relaxed);
            if call < self.fail_first {
                return Err(SynthError::Auth("401 unauthorized".into()));
            }
            Ok(AudioSource::Wav(text.as_bytes().to_vec()))
        }

        fn backend(&self) -> SynthBackend {
            self.backend
        }
    }

    #[tokio::test]
    async fn cloud_success_never_touches_local() {
        let cloud = MockSynth::new(SynthBackend::Cloud, 0);
        let local = MockSynth::new(SynthBackend::Local, 0);
        let synth = FallbackSynthesizer::new(
            Some(cloud.clone() as Arc<dyn SpeechSynthesizer>),
            local.clone(),
        );

        synth.synthesize("hello", 1.0).await.expect("cloud path");
        assert_eq!(cloud.calls(), 1);
        assert_eq!(local.calls(), 0);
        assert!(synth.cloud_available());
    }

    #[tokio::test]
    async fn auth_failure_disables_cloud_for_the_session() {
        let cloud = MockSynth::new(SynthBackend::Cloud, u32::MAX);
        let local = MockSynth::new(SynthBackend::Local, 0);
        let synth = FallbackSynthesizer::new(
            Some(cloud.clone() as Arc<dyn SpeechSynthesizer>),
            local.clone(),
        );

        synth.synthesize("first", 1.0).await.expect("local fallback");
        synth.synthesize("second", 1.0).await.expect("local again");
        synth.synthesize("third", 1.0).await.expect("local again");

        // Cloud was tried exactly once; every later chunk skipped it.
        assert_eq!(cloud.calls(), 1);
        assert_eq!(local.calls(), 3);
        assert!(!synth.cloud_available());
        assert_eq!(synth.backend(), SynthBackend::Local);
    }

    #[tokio::test]
    async fn reenabling_cloud_clears_the_failure_latch() {
        let cloud = MockSynth::new(SynthBackend::Cloud, 1);
        let local = MockSynth::new(SynthBackend::Local, 0);
        let synth = FallbackSynthesizer::new(
            Some(cloud.clone() as Arc<dyn SpeechSynthesizer>),
            local.clone(),
        );

        synth.synthesize("first", 1.0).await.expect("local fallback");
        assert!(!synth.cloud_available());

        synth.set_cloud_enabled(true);
        synth.synthesize("second", 1.0).await.expect("cloud retry");
        assert_eq!(cloud.calls(), 2);
        assert_eq!(local.calls(), 1);
        assert!(synth.cloud_available());
    }

    #[tokio::test]
    async fn no_cloud_configured_goes_straight_to_local() {
        let local = MockSynth::new(SynthBackend::Local, 0);
        let synth = FallbackSynthesizer::new(None, local.clone());

        synth.synthesize("hello", 1.0).await.expect("local path");
        assert_eq!(local.calls(), 1);
        assert!(!synth.cloud_available());
    }

    #[tokio::test]
    async fn local_failure_propagates() {
        let local = MockSynth::new(SynthBackend::Local, u32::MAX);
        let synth = FallbackSynthesizer::new(None, local);

        assert!(synth.synthesize("hello", 1.0).await.is_err());
    }

    #[test]
    fn audio_source_len() {
        assert_eq!(AudioSource::Mp3(vec![0; 4]).len(), 4);
        assert!(AudioSource::Wav(Vec::new()).is_empty());
    }
}
