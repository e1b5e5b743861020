//! Local synthesis backend built on the system eSpeak-NG binary.
//!
//! Runs `espeak-ng --stdout` as a subprocess and captures the WAV output.
//! The voice is chosen once at startup from the installed inventory via
//! the priority ladder in [`super::voice`].

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::process::Command;

use super::synth::{AudioSource, SpeechSynthesizer, SynthBackend, SynthError};
use super::voice::{parse_voice_list, pick_best_voice};

/// Engine speed at a 1.0 rate multiplier, in words per minute.
const BASE_WPM: f32 = 175.0;

/// Map the 0.5 – 2.0 rate multiplier onto the engine's wpm range.
fn rate_to_wpm(rate: f32) -> u32 {
    let wpm = (BASE_WPM * rate).round() as i64;
    wpm.clamp(80, 450) as u32
}

// ---------------------------------------------------------------------------
// LocalSynthesizer
// ---------------------------------------------------------------------------

pub struct LocalSynthesizer {
    binary: PathBuf,
    voice: Option<String>,
}

impl LocalSynthesizer {
    /// Locate the engine binary on `PATH`, preferring `espeak-ng` over the
    /// older `espeak`.  Returns `Backend` when neither is installed.
    pub fn locate() -> Result<Self, SynthError> {
        let binary = which::which("espeak-ng")
            .or_else(|_| which::which("espeak"))
            .map_err(|_| SynthError::Backend("espeak-ng not found on PATH".into()))?;

        info!("local synthesis engine: {}", binary.display());
        Ok(Self {
            binary,
            voice: None,
        })
    }

    #[cfg(test)]
    fn with_binary(binary: PathBuf) -> Self {
        Self {
            binary,
            voice: None,
        }
    }

    /// Enumerate installed English voices and select the best one.
    ///
    /// Failure here is non-fatal; the engine default voice is used instead.
    pub async fn select_voice(&mut self) {
        let output = Command::new(&self.binary)
            .arg("--voices=en")
            .stdin(Stdio::null())
            .output()
            .await;

        let stdout = match output {
            Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).into_owned(),
            Ok(out) => {
                warn!("voice enumeration exited with {}", out.status);
                return;
            }
            Err(e) => {
                warn!("voice enumeration failed: {e}");
                return;
            }
        };

        let voices = parse_voice_list(&stdout);
        if let Some(best) = pick_best_voice(&voices) {
            info!("selected local voice: {} ({})", best.name, best.identifier);
            self.voice = Some(best.identifier.clone());
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for LocalSynthesizer {
    async fn synthesize(&self, text: &str, speaking_rate: f32) -> Result<AudioSource, SynthError> {
        let wpm = rate_to_wpm(speaking_rate);

        let mut cmd = Command::new(&self.binary);
        cmd.arg("--stdout")
            .arg("-s")
            .arg(wpm.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(voice) = &self.voice {
            cmd.arg("-v").arg(voice);
        }
        cmd.arg(text);

        let output = cmd
            .output()
            .await
            .map_err(|e| SynthError::Backend(format!("failed to run engine: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SynthError::Synthesis(format!(
                "engine exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(SynthError::Synthesis("engine produced no audio".into()));
        }

        debug!(
            "local synthesis returned {} WAV bytes at {wpm} wpm",
            output.stdout.len()
        );
        Ok(AudioSource::Wav(output.stdout))
    }

    fn backend(&self) -> SynthBackend {
        SynthBackend::Local
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_maps_onto_wpm_range() {
        assert_eq!(rate_to_wpm(1.0), 175);
        assert_eq!(rate_to_wpm(0.9), 158);
        assert_eq!(rate_to_wpm(2.0), 350);
    }

    #[test]
    fn rate_clamps_to_engine_limits() {
        assert_eq!(rate_to_wpm(0.1), 80);
        assert_eq!(rate_to_wpm(10.0), 450);
    }

    #[tokio::test]
    async fn missing_binary_is_a_backend_error() {
        let synth = LocalSynthesizer::with_binary(PathBuf::from("/nonexistent/espeak-ng"));
        let err = synth.synthesize("hello", 1.0).await.unwrap_err();
        assert!(matches!(err, SynthError::Backend(_)));
    }
}
