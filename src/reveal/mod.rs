//! Paced reveal of generated responses, driving both the display and the
//! live speech chunker.

pub mod driver;

pub use driver::{select_mode, RevealControl, RevealDriver, RevealUpdate};
