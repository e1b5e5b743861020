//! Conversation history: question/answer turns, API-shaped history, and
//! review navigation across past turns.

/// Who authored a history message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    /// Wire name used by the generation API.
    pub fn api_name(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// One message of prior conversation, as sent to the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryMessage {
    pub role: Role,
    pub text: String,
}

/// One interviewer question and, once generated, its answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: Option<String>,
}

// ---------------------------------------------------------------------------
// ConversationLog
// ---------------------------------------------------------------------------

/// Ordered log of turns with a review cursor.
///
/// The cursor normally tracks the newest turn; `prev` / `next` move it for
/// reviewing earlier exchanges and clamp at both ends.
#[derive(Debug, Default)]
pub struct ConversationLog {
    turns: Vec<ConversationTurn>,
    cursor: usize,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Start a new turn and move the cursor to it.
    pub fn push_question(&mut self, question: String) {
        self.turns.push(ConversationTurn {
            question,
            answer: None,
        });
        self.cursor = self.turns.len() - 1;
    }

    /// Attach the generated answer to the newest turn.
    pub fn complete_answer(&mut self, answer: String) {
        if let Some(turn) = self.turns.last_mut() {
            turn.answer = Some(answer);
        }
    }

    /// The turn under the review cursor.
    pub fn current(&self) -> Option<&ConversationTurn> {
        self.turns.get(self.cursor)
    }

    /// Cursor position for display, 1-based.
    pub fn position(&self) -> (usize, usize) {
        if self.turns.is_empty() {
            (0, 0)
        } else {
            (self.cursor + 1, self.turns.len())
        }
    }

    /// Move to the previous turn; clamps at the oldest.
    pub fn prev(&mut self) -> Option<&ConversationTurn> {
        if self.cursor > 0 {
            self.cursor -= 1;
        }
        self.current()
    }

    /// Move to the next turn; clamps at the newest.
    pub fn next(&mut self) -> Option<&ConversationTurn> {
        if self.cursor + 1 < self.turns.len() {
            self.cursor += 1;
        }
        self.current()
    }

    /// Prior completed turns flattened into API messages, oldest first.
    /// The newest turn is excluded while its answer is pending.
    pub fn history(&self) -> Vec<HistoryMessage> {
        let mut messages = Vec::new();
        for turn in &self.turns {
            let Some(answer) = &turn.answer else { continue };
            messages.push(HistoryMessage {
                role: Role::User,
                text: turn.question.clone(),
            });
            messages.push(HistoryMessage {
                role: Role::Model,
                text: answer.clone(),
            });
        }
        messages
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.cursor = 0;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
