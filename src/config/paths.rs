//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings + candidate profile):
//!   Windows: %APPDATA%\interview-coach\
//!   macOS:   ~/Library/Application Support/interview-coach/
//!   Linux:   ~/.config/interview-coach/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml` and the profile text files.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Plain-text resume used for the interview role-play preamble.
    pub resume_file: PathBuf,
    /// Plain-text job description used for the role-play preamble.
    pub job_description_file: PathBuf,
    /// Google service-account JSON for cloud speech synthesis.
    pub credentials_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "interview-coach";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path (should be extremely rare in practice).
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let resume_file = config_dir.join("resume.txt");
        let job_description_file = config_dir.join("job-description.txt");
        let credentials_file = config_dir.join("gcp-credentials.json");

        Self {
            config_dir,
            settings_file,
            resume_file,
            job_description_file,
            credentials_file,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
