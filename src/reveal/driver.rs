//! Incremental reveal of generated responses.
//!
//! Short responses are revealed character by character, long ones word by
//! word, with randomized delays that read like natural typing.  As text is
//! revealed it is fed through a [`TextChunker`] so speech synthesis starts
//! while the reveal is still running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::debug;
use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use crate::config::{ChunkerConfig, RevealConfig};
use crate::tts::{is_sentence_terminator, PaceMode, SpeechChunk, TextChunker};

// ---------------------------------------------------------------------------
// Control and updates
// ---------------------------------------------------------------------------

/// Shared flags that interrupt a running reveal.
#[derive(Default)]
pub struct RevealControl {
    cancelled: AtomicBool,
    skip: AtomicBool,
}

impl RevealControl {
    /// Abandon the reveal; remaining text is never shown or spoken.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Show the remaining text at once.  Remaining speech is still chunked
    /// and queued; what plays is up to the sequencer.
    pub fn skip_to_end(&self) {
        self.skip.store(true, Ordering::Relaxed);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    fn is_skipped(&self) -> bool {
        self.skip.load(Ordering::Relaxed)
    }
}

/// Text updates for the display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealUpdate {
    /// Append this piece to the displayed response.
    Increment(String),
    /// The full response is now visible.
    Done,
}

/// Pick the pace for a response: short answers feel best typed out
/// character by character, long ones would take too long that way.
pub fn select_mode(text: &str, config: &RevealConfig) -> PaceMode {
    if text.chars().count() < config.char_mode_max_len {
        PaceMode::Character
    } else {
        PaceMode::Word
    }
}

/// Punctuation that earns an extra beat in character mode.
fn pauses_after(c: char) -> bool {
    is_sentence_terminator(c) || matches!(c, ',' | ';' | ':')
}

// ---------------------------------------------------------------------------
// RevealDriver
// ---------------------------------------------------------------------------

pub struct RevealDriver {
    reveal: RevealConfig,
    chunker: ChunkerConfig,
}

impl RevealDriver {
    pub fn new(reveal: RevealConfig, chunker: ChunkerConfig) -> Self {
        Self { reveal, chunker }
    }

    /// Reveal `text`, streaming display updates on `ui` and speakable
    /// chunks on `chunks`.
    ///
    /// Returns early without a `Done` update when cancelled.  When
    /// `live_speech` is false the chunk channel stays silent.
    pub async fn run(
        &self,
        text: &str,
        live_speech: bool,
        control: Arc<RevealControl>,
        ui: mpsc::Sender<RevealUpdate>,
        chunks: mpsc::Sender<SpeechChunk>,
    ) {
        let mode = select_mode(text, &self.reveal);
        debug!("revealing {} chars in {mode:?} mode", text.len());
        let mut chunker = TextChunker::new(mode, self.chunker);

        match mode {
            PaceMode::Character => {
                let all: Vec<char> = text.chars().collect();
                for (i, &c) in all.iter().enumerate() {
                    if control.is_cancelled() {
                        return;
                    }
                    if control.is_skipped() {
                        let rest: String = all[i..].iter().collect();
                        let _ = ui.send(RevealUpdate::Increment(rest)).await;
                        if live_speech {
                            for &c in &all[i..] {
                                if let Some(chunk) = chunker.push_char(c) {
                                    let _ = chunks.send(chunk).await;
                                }
                            }
                        }
                        break;
                    }

                    let _ = ui.send(RevealUpdate::Increment(c.to_string())).await;
                    if live_speech {
                        if let Some(chunk) = chunker.push_char(c) {
                            let _ = chunks.send(chunk).await;
                        }
                    }

                    sleep(self.char_delay(c)).await;
                }
            }
            PaceMode::Word => {
                let words: Vec<&str> = text.split_whitespace().collect();
                for (i, &word) in words.iter().enumerate() {
                    if control.is_cancelled() {
                        return;
                    }
                    if control.is_skipped() {
                        let rest = words[i..].join(" ");
                        let prefix = if i > 0 { " " } else { "" };
                        let _ = ui
                            .send(RevealUpdate::Increment(format!("{prefix}{rest}")))
                            .await;
                        if live_speech {
                            for &word in &words[i..] {
                                if let Some(chunk) = chunker.push_word(word) {
                                    let _ = chunks.send(chunk).await;
                                }
                            }
                        }
                        break;
                    }

                    let piece = if i > 0 {
                        format!(" {word}")
                    } else {
                        word.to_string()
                    };
                    let _ = ui.send(RevealUpdate::Increment(piece)).await;
                    if live_speech {
                        if let Some(chunk) = chunker.push_word(word) {
                            let _ = chunks.send(chunk).await;
                        }
                    }

                    sleep(self.word_delay(word)).await;
                }
            }
        }

        if live_speech {
            if let Some(chunk) = chunker.finish() {
                let _ = chunks.send(chunk).await;
            }
        }
        let _ = ui.send(RevealUpdate::Done).await;
    }

    fn char_delay(&self, c: char) -> Duration {
        let (min, max) = self.reveal.char_delay_ms;
        let mut ms = rand::thread_rng().gen_range(min..=max);
        if pauses_after(c) {
            ms += self.reveal.char_punct_pause_ms;
        }
        Duration::from_millis(ms)
    }

    fn word_delay(&self, word: &str) -> Duration {
        let (min, max) = self.reveal.word_jitter_ms;
        let base = (word.chars().count() as u64 * 10).min(self.reveal.word_base_cap_ms);
        let mut ms = base + rand::thread_rng().gen_range(min..=max);
        if word.chars().any(is_sentence_terminator) {
            ms += self.reveal.sentence_pause_ms;
        }
        Duration::from_millis(ms)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
