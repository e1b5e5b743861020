//! Ordered audio playback: decoding, the output-device seam, and the
//! sequencer that keeps chunks in order with at most one active at a time.

pub mod decode;
pub mod output;
pub mod sequencer;

pub use decode::{decode, DecodeError, DecodedAudio};
pub use output::{AudioOutput, CpalOutput, PlaybackError, PlaybackEvent, PlaybackHandle};
pub use sequencer::{PlaybackSequencer, PlaybackStatus};
