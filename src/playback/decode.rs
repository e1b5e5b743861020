//! Decodes synthesized audio (MP3 or WAV) into interleaved f32 samples.

use std::io::Cursor;

use minimp3::{Decoder, Error as Mp3Error, Frame};
use thiserror::Error;

use crate::tts::AudioSource;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to decode MP3: {0}")]
    Mp3(String),

    #[error("failed to decode WAV: {0}")]
    Wav(String),

    #[error("audio stream contained no samples")]
    Empty,
}

/// PCM audio ready for the output device.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved samples in the -1.0 – 1.0 range.
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedAudio {
    /// Playback duration at the native sample rate.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        let frames = self.samples.len() / self.channels as usize;
        frames as f32 / self.sample_rate as f32
    }
}

/// Decode whatever the synthesizer produced.
pub fn decode(source: &AudioSource) -> Result<DecodedAudio, DecodeError> {
    match source {
        AudioSource::Mp3(bytes) => decode_mp3(bytes),
        AudioSource::Wav(bytes) => decode_wav(bytes),
    }
}

fn decode_mp3(bytes: &[u8]) -> Result<DecodedAudio, DecodeError> {
    let mut decoder = Decoder::new(Cursor::new(bytes));
    let mut samples = Vec::new();
    let mut sample_rate = 0u32;
    let mut channels = 0u16;

    loop {
        match decoder.next_frame() {
            Ok(Frame {
                data,
                sample_rate: rate,
                channels: ch,
                ..
            }) => {
                sample_rate = rate as u32;
                channels = ch as u16;
                samples.extend(data.iter().map(|&s| s as f32 / i16::MAX as f32));
            }
            Err(Mp3Error::Eof) => break,
            Err(e) => return Err(DecodeError::Mp3(e.to_string())),
        }
    }

    if samples.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio, DecodeError> {
    let reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|e| DecodeError::Wav(e.to_string()))?;
    let spec = reader.spec();

    let samples: Result<Vec<f32>, _> = match spec.sample_format {
        hound::SampleFormat::Float => reader.into_samples::<f32>().collect(),
        hound::SampleFormat::Int => reader
            .into_samples::<i16>()
            .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
            .collect(),
    };
    let samples = samples.map_err(|e| DecodeError::Wav(e.to_string()))?;

    if samples.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("writer");
            for &s in samples {
                writer.write_sample(s).expect("sample");
            }
            writer.finalize().expect("finalize");
        }
        cursor.into_inner()
    }

    #[test]
    fn decodes_int_wav() {
        let bytes = wav_bytes(&[0, i16::MAX, i16::MIN, 0], 22050, 1);
        let audio = decode(&AudioSource::Wav(bytes)).expect("decode");

        assert_eq!(audio.sample_rate, 22050);
        assert_eq!(audio.channels, 1);
        assert_eq!(audio.samples.len(), 4);
        assert!((audio.samples[1] - 1.0).abs() < 1e-4);
    }

    #[test]
    fn duration_uses_channel_count() {
        let bytes = wav_bytes(&[0; 44100], 22050, 2);
        let audio = decode(&AudioSource::Wav(bytes)).expect("decode");
        assert!((audio.duration_secs() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn empty_wav_is_rejected() {
        let bytes = wav_bytes(&[], 22050, 1);
        let err = decode(&AudioSource::Wav(bytes)).unwrap_err();
        assert!(matches!(err, DecodeError::Empty));
    }

    #[test]
    fn garbage_wav_is_rejected() {
        let err = decode(&AudioSource::Wav(vec![1, 2, 3, 4])).unwrap_err();
        assert!(matches!(err, DecodeError::Wav(_)));
    }

    #[test]
    fn empty_mp3_is_rejected() {
        let err = decode(&AudioSource::Mp3(Vec::new())).unwrap_err();
        assert!(matches!(err, DecodeError::Empty));
    }
}
