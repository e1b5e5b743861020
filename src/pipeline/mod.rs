//! Pipeline orchestration: shared state and the command-driven runner.

pub mod runner;
pub mod state;

pub use runner::{PipelineOrchestrator, UiCommand, UiUpdate};
pub use state::{new_shared_state, AppState, Phase, SharedState};
