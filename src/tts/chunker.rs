//! Splits response text into speakable chunks.
//!
//! The reveal driver pushes increments (a character or a word, depending on
//! pace mode) into a [`TextChunker`]; the chunker emits a [`SpeechChunk`]
//! whenever a sentence terminator is seen or the buffered text reaches the
//! configured flush length.  Chunks carry monotonically increasing sequence
//! numbers starting at 0, and the playback sequencer consumes them in that
//! order.
//!
//! Empty or whitespace-only buffers never produce a chunk.

use crate::config::ChunkerConfig;

// ---------------------------------------------------------------------------
// SpeechChunk
// ---------------------------------------------------------------------------

/// One speakable unit of response text.  Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechChunk {
    /// Trimmed chunk text.
    pub text: String,
    /// Position in the response, 0-based, strictly increasing.
    pub seq: u64,
}

// ---------------------------------------------------------------------------
// PaceMode
// ---------------------------------------------------------------------------

/// How the reveal driver paces the response, which also selects the
/// chunker's flush threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaceMode {
    /// Short responses: revealed character by character, flushed at
    /// sentence terminators or `char_flush_len` characters.
    Character,
    /// Long responses: revealed word by word, flushed at sentence-ending
    /// words or `word_flush_len` words.
    Word,
}

/// Returns `true` for the characters that end a sentence.
pub fn is_sentence_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Returns `true` when a word ends a sentence (contains a terminator, to
/// cover closing quotes and parentheses after the punctuation).
fn word_ends_sentence(word: &str) -> bool {
    word.chars().any(is_sentence_terminator)
}

// ---------------------------------------------------------------------------
// TextChunker
// ---------------------------------------------------------------------------

/// Stateful splitter fed by the reveal driver.
///
/// ```rust
/// use interview_coach::config::ChunkerConfig;
/// use interview_coach::tts::{PaceMode, TextChunker};
///
/// let mut chunker = TextChunker::new(PaceMode::Character, ChunkerConfig::default());
/// let mut chunks = Vec::new();
/// for c in "Hello world. This is great!".chars() {
///     chunks.extend(chunker.push_char(c));
/// }
/// chunks.extend(chunker.finish());
/// assert_eq!(chunks[0].text, "Hello world.");
/// assert_eq!(chunks[1].text, "This is great!");
/// ```
#[derive(Debug)]
pub struct TextChunker {
    mode: PaceMode,
    config: ChunkerConfig,
    buffer: String,
    buffered_words: usize,
    next_seq: u64,
}

impl TextChunker {
    /// Create a chunker for one response.
    pub fn new(mode: PaceMode, config: ChunkerConfig) -> Self {
        Self {
            mode,
            config,
            buffer: String::new(),
            buffered_words: 0,
            next_seq: 0,
        }
    }

    /// Push one revealed character (character-paced mode).
    ///
    /// Returns the chunk completed by this character, if any.
    pub fn push_char(&mut self, c: char) -> Option<SpeechChunk> {
        debug_assert_eq!(self.mode, PaceMode::Character);
        self.buffer.push(c);

        if is_sentence_terminator(c) || self.buffer.chars().count() >= self.config.char_flush_len {
            self.flush()
        } else {
            None
        }
    }

    /// Push one revealed word (word-paced mode).
    ///
    /// Returns the chunk completed by this word, if any.
    pub fn push_word(&mut self, word: &str) -> Option<SpeechChunk> {
        debug_assert_eq!(self.mode, PaceMode::Word);
        if !self.buffer.is_empty() {
            self.buffer.push(' ');
        }
        self.buffer.push_str(word);
        self.buffered_words += 1;

        if word_ends_sentence(word) || self.buffered_words >= self.config.word_flush_len {
            self.flush()
        } else {
            None
        }
    }

    /// Flush whatever remains once the source text is exhausted.
    pub fn finish(&mut self) -> Option<SpeechChunk> {
        self.flush()
    }

    /// Number of chunks emitted so far.
    pub fn emitted(&self) -> u64 {
        self.next_seq
    }

    fn flush(&mut self) -> Option<SpeechChunk> {
        let text = std::mem::take(&mut self.buffer);
        self.buffered_words = 0;

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }

        let chunk = SpeechChunk {
            text: trimmed.to_string(),
            seq: self.next_seq,
        };
        self.next_seq += 1;
        Some(chunk)
    }
}

// ---------------------------------------------------------------------------
// chunk_text  (whole-text convenience, used for answer replay)
// ---------------------------------------------------------------------------

/// Split a complete text into chunks in one pass.
///
/// Used when replaying a finished answer, where no paced reveal is running.
pub fn chunk_text(text: &str, mode: PaceMode, config: ChunkerConfig) -> Vec<SpeechChunk> {
    let mut chunker = TextChunker::new(mode, config);
    let mut chunks = Vec::new();

    match mode {
        PaceMode::Character => {
            for c in text.chars() {
                chunks.extend(chunker.push_char(c));
            }
        }
        PaceMode::Word => {
            for word in text.split_whitespace() {
                chunks.extend(chunker.push_word(word));
            }
        }
    }
    chunks.extend(chunker.finish());
    chunks
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ChunkerConfig {
        ChunkerConfig::default()
    }

    /// Strip whitespace for the reconstruction property: the length flush
    /// can land mid-word or on a space, so boundary whitespace is the one
    /// thing chunking may lose; every other character survives in order.
    fn without_whitespace(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    // --- sentence boundaries ---

    #[test]
    fn char_mode_splits_at_sentence_terminators() {
        let chunks = chunk_text("Hello world. This is great!", PaceMode::Character, config());
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "Hello world.");
        assert_eq!(chunks[1].text, "This is great!");
        assert_eq!(chunks[0].seq, 0);
        assert_eq!(chunks[1].seq, 1);
    }

    #[test]
    fn word_mode_splits_at_sentence_ending_words() {
        let chunks = chunk_text(
            "The first point stands. Then a second one follows?",
            PaceMode::Word,
            config(),
        );
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "The first point stands.");
        assert_eq!(chunks[1].text, "Then a second one follows?");
    }

    #[test]
    fn question_and_exclamation_terminate() {
        let chunks = chunk_text("Really? Yes!", PaceMode::Character, config());
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "Really?");
        assert_eq!(chunks[1].text, "Yes!");
    }

    // --- length thresholds ---

    #[test]
    fn char_mode_flushes_at_length_threshold() {
        // 120 characters of terminator-free text must flush at every 50.
        let text = "a".repeat(120);
        let chunks = chunk_text(&text, PaceMode::Character, config());
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text.len(), 50);
        assert_eq!(chunks[1].text.len(), 50);
        assert_eq!(chunks[2].text.len(), 20);
    }

    #[test]
    fn word_mode_flushes_at_word_threshold() {
        let text = vec!["word"; 40].join(" ");
        let chunks = chunk_text(&text, PaceMode::Word, config());
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text.split_whitespace().count(), 15);
        assert_eq!(chunks[1].text.split_whitespace().count(), 15);
        assert_eq!(chunks[2].text.split_whitespace().count(), 10);
    }

    // --- reconstruction property ---

    #[test]
    fn chunks_reconstruct_the_input() {
        let texts = [
            "Hello world. This is great!",
            "One sentence only",
            "  Leading and trailing whitespace.  ",
            "No terminators here just a very long run of words that keeps \
             going and going until the threshold forces a flush somewhere",
        ];
        for text in texts {
            for mode in [PaceMode::Character, PaceMode::Word] {
                let chunks = chunk_text(text, mode, config());
                let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
                assert_eq!(
                    without_whitespace(&joined),
                    without_whitespace(text),
                    "mode {mode:?}: {text:?}"
                );
            }
        }
    }

    #[test]
    fn sequence_numbers_are_dense_and_increasing() {
        let text = "First. Second. Third. Fourth!";
        let chunks = chunk_text(text, PaceMode::Character, config());
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.seq, i as u64);
        }
    }

    // --- degenerate inputs ---

    #[test]
    fn empty_input_produces_no_chunks() {
        assert!(chunk_text("", PaceMode::Character, config()).is_empty());
        assert!(chunk_text("", PaceMode::Word, config()).is_empty());
    }

    #[test]
    fn whitespace_only_produces_no_chunks() {
        assert!(chunk_text("   \n\t  ", PaceMode::Character, config()).is_empty());
        assert!(chunk_text("   \n\t  ", PaceMode::Word, config()).is_empty());
    }

    #[test]
    fn punctuation_runs_do_not_emit_empty_chunks() {
        // The second terminator lands on an empty buffer; no empty chunk.
        let chunks = chunk_text("Done.. ", PaceMode::Character, config());
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "Done.");
        assert_eq!(chunks[1].text, ".");
    }

    #[test]
    fn finish_flushes_remainder() {
        let mut chunker = TextChunker::new(PaceMode::Word, config());
        assert!(chunker.push_word("trailing").is_none());
        assert!(chunker.push_word("words").is_none());
        let last = chunker.finish().expect("remainder must flush");
        assert_eq!(last.text, "trailing words");
        assert!(chunker.finish().is_none(), "second finish is empty");
    }

    #[test]
    fn emitted_tracks_chunk_count() {
        let mut chunker = TextChunker::new(PaceMode::Character, config());
        for c in "One. Two.".chars() {
            chunker.push_char(c);
        }
        assert_eq!(chunker.emitted(), 2);
    }
}
