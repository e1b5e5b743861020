//! Response generation: prompt assembly, conversation history, and the
//! Gemini client behind the [`ResponseGenerator`] trait.

pub mod conversation;
pub mod generator;
pub mod prompt;

pub use conversation::{ConversationLog, ConversationTurn, HistoryMessage, Role};
pub use generator::{GeminiClient, LlmError, ResponseGenerator};
pub use prompt::PromptBuilder;
