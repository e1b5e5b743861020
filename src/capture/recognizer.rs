//! Cloud-backed recognition engine.
//!
//! Records from the default input device while a session is active, then
//! sends the audio to the Google Cloud `speech:recognize` endpoint when the
//! session is stopped.  Batch recognition emits no interim events; the
//! session sees `Started`, then `Final` / `Error`, then `Ended`.
//!
//! The cpal input stream is not `Send`, so it lives on a dedicated thread
//! that polls a stop flag; samples accumulate in a shared buffer the
//! callback appends to.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{debug, error, info, warn};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::tts::TokenProvider;

use super::engine::{CaptureError, EngineErrorKind, RecognitionEngine, RecognitionEvent};

/// Target rate for the recognition API.
const RECOGNIZE_SAMPLE_RATE: u32 = 16_000;

/// Recordings shorter than this are reported as no-speech without a
/// round trip.
const MIN_AUDIO: Duration = Duration::from_millis(300);

// ---------------------------------------------------------------------------
// Audio conversion helpers
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging.
fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

/// Resample mono audio to 16 kHz with linear interpolation.
fn resample_to_16k(samples: &[f32], source_rate: u32) -> Vec<f32> {
    if source_rate == RECOGNIZE_SAMPLE_RATE || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = source_rate as f64 / RECOGNIZE_SAMPLE_RATE as f64;
    let out_len = (samples.len() as f64 / ratio) as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos as usize;
        let frac = (pos - idx as f64) as f32;
        let a = samples[idx.min(samples.len() - 1)];
        let b = samples[(idx + 1).min(samples.len() - 1)];
        out.push(a + (b - a) * frac);
    }
    out
}

/// Encode f32 samples as little-endian 16-bit PCM (`LINEAR16`).
fn encode_linear16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

// ---------------------------------------------------------------------------
// Microphone thread
// ---------------------------------------------------------------------------

struct ActiveCapture {
    samples: Arc<Mutex<Vec<f32>>>,
    sample_rate: u32,
    channels: u16,
    stop_flag: Arc<AtomicBool>,
    events: mpsc::Sender<RecognitionEvent>,
    language: String,
}

/// Body of the recording thread: owns the stream, exits on the stop flag.
fn run_mic_thread(
    device: cpal::Device,
    config: cpal::StreamConfig,
    samples: Arc<Mutex<Vec<f32>>>,
    stop_flag: Arc<AtomicBool>,
) {
    let sink = Arc::clone(&samples);
    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            if let Ok(mut buf) = sink.lock() {
                buf.extend_from_slice(data);
            }
        },
        |err: cpal::StreamError| {
            error!("cpal input stream error: {err}");
        },
        None,
    );

    let stream = match stream {
        Ok(s) => s,
        Err(e) => {
            error!("failed to build input stream: {e}");
            return;
        }
    };
    if let Err(e) = stream.play() {
        error!("failed to start input stream: {e}");
        return;
    }

    while !stop_flag.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(50));
    }
    drop(stream);
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognizeResult>,
}

#[derive(Debug, Deserialize)]
struct RecognizeResult {
    #[serde(default)]
    alternatives: Vec<RecognizeAlternative>,
}

#[derive(Debug, Deserialize)]
struct RecognizeAlternative {
    #[serde(default)]
    transcript: String,
}

/// Join the best alternative of every result into one transcript.
fn extract_transcript(response: &RecognizeResponse) -> String {
    response
        .results
        .iter()
        .filter_map(|r| r.alternatives.first())
        .map(|a| a.transcript.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// CloudRecognizer
// ---------------------------------------------------------------------------

pub struct CloudRecognizer {
    client: reqwest::Client,
    tokens: Arc<TokenProvider>,
    endpoint: String,
    active: Mutex<Option<ActiveCapture>>,
}

impl CloudRecognizer {
    pub fn new(client: reqwest::Client, tokens: Arc<TokenProvider>) -> Self {
        Self {
            client,
            tokens,
            endpoint: "https://speech.googleapis.com/v1/speech:recognize".into(),
            active: Mutex::new(None),
        }
    }

    /// Finish a capture: convert the audio and run batch recognition.
    /// Always ends with `Ended` on the session's event channel.
    async fn recognize(&self, capture: ActiveCapture) {
        let raw = match capture.samples.lock() {
            Ok(buf) => buf.clone(),
            Err(_) => Vec::new(),
        };
        let mono = downmix_to_mono(&raw, capture.channels);
        let mono = resample_to_16k(&mono, capture.sample_rate);

        let recorded = Duration::from_secs_f64(mono.len() as f64 / RECOGNIZE_SAMPLE_RATE as f64);
        debug!("captured {:.1}s of audio", recorded.as_secs_f64());

        let events = capture.events;
        if recorded < MIN_AUDIO {
            let _ = events
                .send(RecognitionEvent::Error(EngineErrorKind::NoSpeech))
                .await;
            let _ = events.send(RecognitionEvent::Ended).await;
            return;
        }

        match self.request(&mono, &capture.language).await {
            Ok(transcript) if transcript.is_empty() => {
                info!("recognition returned no transcript");
                let _ = events
                    .send(RecognitionEvent::Error(EngineErrorKind::NoSpeech))
                    .await;
            }
            Ok(transcript) => {
                let _ = events.send(RecognitionEvent::Final(transcript)).await;
            }
            Err(kind) => {
                let _ = events.send(RecognitionEvent::Error(kind)).await;
            }
        }
        let _ = events.send(RecognitionEvent::Ended).await;
    }

    async fn request(&self, mono_16k: &[f32], language: &str) -> Result<String, EngineErrorKind> {
        let token = match self.tokens.access_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!("recognition auth failed: {e}");
                return Err(EngineErrorKind::NotAllowed);
            }
        };

        let content = base64::engine::general_purpose::STANDARD.encode(encode_linear16(mono_16k));
        let body = serde_json::json!({
            "config": {
                "encoding": "LINEAR16",
                "sampleRateHertz": RECOGNIZE_SAMPLE_RATE,
                "languageCode": language,
            },
            "audio": { "content": content },
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!("recognition request failed: {e}");
                EngineErrorKind::Network
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(EngineErrorKind::NotAllowed);
        }
        if !status.is_success() {
            warn!("recognition returned {status}");
            return Err(EngineErrorKind::Other);
        }

        let parsed: RecognizeResponse = response.json().await.map_err(|e| {
            warn!("failed to parse recognition response: {e}");
            EngineErrorKind::Other
        })?;
        Ok(extract_transcript(&parsed))
    }
}

#[async_trait]
impl RecognitionEngine for CloudRecognizer {
    async fn start(
        &self,
        language: &str,
        events: mpsc::Sender<RecognitionEvent>,
    ) -> Result<(), CaptureError> {
        {
            let active = self.active.lock().unwrap();
            if active.is_some() {
                return Err(CaptureError::AlreadyActive);
            }
        }

        let device = cpal::default_host()
            .default_input_device()
            .ok_or(CaptureError::NotSupported)?;
        let supported = device
            .default_input_config()
            .map_err(|e| CaptureError::Engine(e.to_string()))?;
        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        let samples = Arc::new(Mutex::new(Vec::new()));
        let stop_flag = Arc::new(AtomicBool::new(false));

        {
            let samples = Arc::clone(&samples);
            let stop_flag = Arc::clone(&stop_flag);
            std::thread::spawn(move || run_mic_thread(device, config, samples, stop_flag));
        }

        *self.active.lock().unwrap() = Some(ActiveCapture {
            samples,
            sample_rate,
            channels,
            stop_flag,
            events: events.clone(),
            language: language.to_string(),
        });

        info!("microphone capture started ({sample_rate} Hz, {channels}ch)");
        let _ = events.send(RecognitionEvent::Started).await;
        Ok(())
    }

    async fn stop(&self) {
        let capture = self.active.lock().unwrap().take();
        let Some(capture) = capture else { return };
        capture.stop_flag.store(true, Ordering::Relaxed);
        self.recognize(capture).await;
    }

    async fn abort(&self) {
        let capture = self.active.lock().unwrap().take();
        let Some(capture) = capture else { return };
        capture.stop_flag.store(true, Ordering::Relaxed);
        let _ = capture
            .events
            .send(RecognitionEvent::Error(EngineErrorKind::Aborted))
            .await;
        let _ = capture.events.send(RecognitionEvent::Ended).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // --- conversion helpers ---

    #[test]
    fn downmix_averages_channels() {
        let stereo = vec![0.5_f32, -0.5, 0.2, -0.2];
        let mono = downmix_to_mono(&stereo, 2);
        assert_eq!(mono.len(), 2);
        assert!(mono[0].abs() < 1e-6);
        assert!(mono[1].abs() < 1e-6);
    }

    #[test]
    fn downmix_mono_is_passthrough() {
        assert_eq!(downmix_to_mono(&[0.1, 0.2], 1), vec![0.1, 0.2]);
        assert!(downmix_to_mono(&[0.1, 0.2], 0).is_empty());
    }

    #[test]
    fn resample_16k_is_noop() {
        let samples = vec![0.1_f32; 160];
        assert_eq!(resample_to_16k(&samples, 16_000).len(), 160);
    }

    #[test]
    fn resample_halves_48k_to_16k() {
        let samples = vec![0.5_f32; 480];
        let out = resample_to_16k(&samples, 48_000);
        assert_eq!(out.len(), 160);
        assert!(out.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn linear16_encoding_is_little_endian() {
        let bytes = encode_linear16(&[0.0, 1.0, -1.0]);
        assert_eq!(bytes.len(), 6);
        assert_eq!(&bytes[0..2], &[0, 0]);
        assert_eq!(&bytes[2..4], &i16::MAX.to_le_bytes());
        assert_eq!(&bytes[4..6], &(-i16::MAX).to_le_bytes());
    }

    // --- response parsing ---

    #[test]
    fn transcript_joins_all_results() {
        let json = r#"{
            "results": [
                { "alternatives": [ { "transcript": "tell me about ", "confidence": 0.9 } ] },
                { "alternatives": [ { "transcript": "your experience" } ] },
                { "alternatives": [] }
            ]
        }"#;
        let parsed: RecognizeResponse = serde_json::from_str(json).expect("parse");
        assert_eq!(extract_transcript(&parsed), "tell me about your experience");
    }

    #[test]
    fn empty_response_yields_empty_transcript() {
        let parsed: RecognizeResponse = serde_json::from_str("{}").expect("parse");
        assert_eq!(extract_transcript(&parsed), "");
    }
}
