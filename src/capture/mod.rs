//! Speech capture: the recognition-engine seam and the session state
//! machine that turns engine events into a final transcript.

pub mod engine;
pub mod recognizer;
pub mod session;

pub use engine::{
    CaptureError, EngineErrorKind, PermissionProbe, PermissionState, RecognitionEngine,
    RecognitionEvent,
};
pub use recognizer::CloudRecognizer;
pub use session::{CaptureCommand, CaptureSession, CaptureUpdate};
