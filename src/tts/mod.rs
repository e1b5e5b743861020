//! Speech synthesis: chunking, normalization, voice selection, and the
//! cloud/local backends behind the [`SpeechSynthesizer`] trait.

pub mod auth;
pub mod chunker;
pub mod cloud;
pub mod local;
pub mod normalize;
pub mod synth;
pub mod voice;

pub use auth::{AuthError, ServiceAccountKey, TokenProvider};
pub use chunker::{chunk_text, is_sentence_terminator, PaceMode, SpeechChunk, TextChunker};
pub use cloud::CloudSynthesizer;
pub use local::LocalSynthesizer;
pub use normalize::clean_for_speech;
pub use synth::{
    log_backend_choice, AudioSource, FallbackSynthesizer, SpeechSynthesizer, SynthBackend,
    SynthError,
};
pub use voice::{parse_voice_list, pick_best_voice, Gender, VoiceInfo};
