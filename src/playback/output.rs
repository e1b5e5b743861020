//! Audio output device abstraction.
//!
//! [`AudioOutput`] hides the sound card behind a trait so the sequencer can
//! be tested without hardware.  The real implementation, [`CpalOutput`],
//! runs each chunk on a dedicated blocking thread: cpal streams are not
//! `Send`, so the stream lives and dies on that thread while the rest of
//! the pipeline controls it through atomic flags.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use log::{debug, error};
use thiserror::Error;
use tokio::sync::mpsc;

use super::decode::DecodedAudio;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("audio device error: {0}")]
    Device(String),
}

// ---------------------------------------------------------------------------
// Events and handles
// ---------------------------------------------------------------------------

/// Lifecycle notifications for one played chunk.  `token` identifies the
/// play call so stale events from a superseded chunk can be ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    Started { token: u64 },
    Ended { token: u64 },
    Failed { token: u64, reason: String },
}

/// Live controls for the chunk currently playing.
pub trait PlaybackHandle: Send + Sync {
    fn pause(&self);
    fn resume(&self);
    /// Abandon the chunk without an `Ended` follow-up action.
    fn stop(&self);
    /// Jump to the end of the chunk; reported as a normal `Ended`.
    fn skip_to_end(&self);
    fn is_paused(&self) -> bool;
}

/// A device that can play decoded audio.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Start playing `audio`.  Lifecycle events tagged with `token` are
    /// delivered on `events`; the returned handle controls the playback.
    async fn play(
        &self,
        audio: DecodedAudio,
        token: u64,
        events: mpsc::Sender<PlaybackEvent>,
    ) -> Result<Arc<dyn PlaybackHandle>, PlaybackError>;
}

// ---------------------------------------------------------------------------
// Shared playback controls
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Controls {
    paused: AtomicBool,
    stopped: AtomicBool,
    skipped: AtomicBool,
    position: AtomicUsize,
}

struct ControlHandle {
    controls: Arc<Controls>,
}

impl PlaybackHandle for ControlHandle {
    fn pause(&self) {
        self.controls.paused.store(true, Ordering::Relaxed);
    }

    fn resume(&self) {
        self.controls.paused.store(false, Ordering::Relaxed);
    }

    fn stop(&self) {
        self.controls.stopped.store(true, Ordering::Relaxed);
    }

    fn skip_to_end(&self) {
        self.controls.skipped.store(true, Ordering::Relaxed);
    }

    fn is_paused(&self) -> bool {
        self.controls.paused.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// CpalOutput
// ---------------------------------------------------------------------------

/// Plays chunks on the default output device.
pub struct CpalOutput;

impl CpalOutput {
    /// Verify that an output device exists before committing to playback.
    pub fn new() -> Result<Self, PlaybackError> {
        cpal::default_host()
            .default_output_device()
            .ok_or_else(|| PlaybackError::Device("no output device available".into()))?;
        Ok(Self)
    }
}

#[async_trait]
impl AudioOutput for CpalOutput {
    async fn play(
        &self,
        audio: DecodedAudio,
        token: u64,
        events: mpsc::Sender<PlaybackEvent>,
    ) -> Result<Arc<dyn PlaybackHandle>, PlaybackError> {
        let controls = Arc::new(Controls::default());
        let handle = Arc::new(ControlHandle {
            controls: Arc::clone(&controls),
        });

        let samples = Arc::new(downmix(&audio));
        let sample_rate = audio.sample_rate;

        std::thread::spawn(move || {
            if let Err(e) = run_stream(&samples, sample_rate, &controls, token, &events) {
                error!("playback thread failed: {e}");
                let _ = events.blocking_send(PlaybackEvent::Failed {
                    token,
                    reason: e.to_string(),
                });
            }
        });

        Ok(handle)
    }
}

/// Body of the per-chunk playback thread.
fn run_stream(
    samples: &Arc<Vec<f32>>,
    sample_rate: u32,
    controls: &Arc<Controls>,
    token: u64,
    events: &mpsc::Sender<PlaybackEvent>,
) -> Result<(), PlaybackError> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| PlaybackError::Device("no output device".into()))?;

    let supported = device
        .supported_output_configs()
        .map_err(|e| PlaybackError::Device(e.to_string()))?
        .find(|c| {
            c.min_sample_rate() <= SampleRate(sample_rate)
                && c.max_sample_rate() >= SampleRate(sample_rate)
        })
        .ok_or_else(|| {
            PlaybackError::Device(format!("no output config supports {sample_rate} Hz"))
        })?;

    let config: StreamConfig = supported.with_sample_rate(SampleRate(sample_rate)).config();
    let channels = config.channels as usize;

    let cb_samples = Arc::clone(samples);
    let cb_controls = Arc::clone(controls);

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let paused = cb_controls.paused.load(Ordering::Relaxed);
                let halted = cb_controls.stopped.load(Ordering::Relaxed)
                    || cb_controls.skipped.load(Ordering::Relaxed);

                for frame in data.chunks_mut(channels) {
                    let pos = cb_controls.position.load(Ordering::Relaxed);
                    let sample = if paused || halted || pos >= cb_samples.len() {
                        0.0
                    } else {
                        cb_controls.position.store(pos + 1, Ordering::Relaxed);
                        cb_samples[pos]
                    };
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }
            },
            |err| error!("output stream error: {err}"),
            None,
        )
        .map_err(|e| PlaybackError::Device(e.to_string()))?;

    stream
        .play()
        .map_err(|e| PlaybackError::Device(e.to_string()))?;

    let _ = events.blocking_send(PlaybackEvent::Started { token });

    // Poll until the buffer drains or a control flag ends the chunk.  Paused
    // time does not count toward the safety timeout.
    let total = samples.len();
    let expected = Duration::from_millis(total as u64 * 1000 / u64::from(sample_rate.max(1)));
    let timeout = expected + Duration::from_secs(2);
    let mut active_since = Instant::now();
    let mut active = Duration::ZERO;

    loop {
        if controls.stopped.load(Ordering::Relaxed) {
            debug!("chunk stopped at sample {}", controls.position.load(Ordering::Relaxed));
            return Ok(());
        }
        if controls.skipped.load(Ordering::Relaxed)
            || controls.position.load(Ordering::Relaxed) >= total
        {
            // Grace period so the device drains its buffer.
            std::thread::sleep(Duration::from_millis(100));
            let _ = events.blocking_send(PlaybackEvent::Ended { token });
            return Ok(());
        }

        if controls.paused.load(Ordering::Relaxed) {
            active_since = Instant::now();
        } else {
            active += active_since.elapsed();
            active_since = Instant::now();
            if active > timeout {
                let _ = events.blocking_send(PlaybackEvent::Ended { token });
                return Ok(());
            }
        }
        std::thread::sleep(Duration::from_millis(25));
    }
}

/// Average interleaved channels down to mono for uniform fan-out.
fn downmix(audio: &DecodedAudio) -> Vec<f32> {
    let channels = audio.channels.max(1) as usize;
    if channels == 1 {
        return audio.samples.clone();
    }
    audio
        .samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_stereo_frames() {
        let audio = DecodedAudio {
            samples: vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0],
            sample_rate: 22050,
            channels: 2,
        };
        assert_eq!(downmix(&audio), vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn downmix_passes_mono_through() {
        let audio = DecodedAudio {
            samples: vec![0.1, 0.2],
            sample_rate: 22050,
            channels: 1,
        };
        assert_eq!(downmix(&audio), vec![0.1, 0.2]);
    }

    #[test]
    fn control_handle_flags() {
        let controls = Arc::new(Controls::default());
        let handle = ControlHandle {
            controls: Arc::clone(&controls),
        };

        handle.pause();
        assert!(handle.is_paused());
        handle.resume();
        assert!(!handle.is_paused());

        handle.skip_to_end();
        assert!(controls.skipped.load(Ordering::Relaxed));
        handle.stop();
        assert!(controls.stopped.load(Ordering::Relaxed));
    }
}
